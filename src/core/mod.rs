pub mod cap;
pub mod engine;
pub mod mailer;
pub mod pitch;
pub mod store;
pub mod sync;
pub mod terminal;
