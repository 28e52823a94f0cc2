mod gemini;
mod openai;

use std::time::Duration;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use crate::config::{GenerationConfig, ProviderKind};
use crate::core::pitch::{PitchProvider, ProviderError};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn build(cfg: &GenerationConfig) -> Box<dyn PitchProvider> {
    match cfg.provider {
        ProviderKind::Gemini => {
            Box::new(GeminiProvider::new(cfg.api_key.clone(), cfg.model.clone()))
        }
        ProviderKind::OpenAi => {
            Box::new(OpenAiProvider::new(cfg.api_key.clone(), cfg.model.clone()))
        }
    }
}

/// Map a transport-level reqwest failure onto the retry taxonomy.
pub(crate) fn classify_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status onto the retry taxonomy.
pub(crate) fn classify_status(status: u16, detail: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        402 => ProviderError::QuotaExhausted,
        _ => ProviderError::Http { status, detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_covers_the_retry_table() {
        assert!(matches!(
            classify_status(429, String::new()),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_status(402, String::new()),
            ProviderError::QuotaExhausted
        ));
        assert!(matches!(
            classify_status(500, String::new()),
            ProviderError::Http { status: 500, .. }
        ));
        assert!(matches!(
            classify_status(400, String::new()),
            ProviderError::Http { status: 400, .. }
        ));
    }
}
