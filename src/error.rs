use thiserror::Error;

/// Failure taxonomy for the dispatch pipeline.
///
/// `Config` is always fatal before any work starts. In single-lead mode,
/// `Generation` and `Transport` abort the run; in batch mode they are caught
/// per lead and the lead is skipped. `Sync` is always caught and logged and
/// never changes the run outcome.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("lead store unreadable: {0}")]
    NotFound(String),

    #[error("lead store write failed: {0}")]
    Store(String),

    #[error("row index {index} out of range (store has {len} rows)")]
    Range { index: usize, len: usize },

    #[error("pitch generation failed: {0}")]
    Generation(String),

    #[error("email transport failed: {0}")]
    Transport(String),

    #[error("remote sync failed: {0}")]
    Sync(String),
}
