use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

const DEFAULT_STORE_PATH: &str = "leads.csv";
const DEFAULT_VALUE_ADD: &str = "I bring strong skills in AI/ML, data science, and full-stack \
     development with a passion for building impactful products.";

/// Run-level knobs for one invocation. Constructed once at startup and
/// passed into the engine; nothing reads the environment after that.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub batch_size: usize,
    pub daily_cap: usize,
    pub drip_delay: Duration,
    pub max_retries: u32,
    pub token_reduction_factor: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            daily_cap: 450,
            drip_delay: Duration::from_secs(30),
            max_retries: 5,
            token_reduction_factor: 0.75,
        }
    }
}

/// Fields woven into the prompt sign-off and the outgoing signature block.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    pub name: String,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub portfolio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub token: String,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub run: RunConfig,
    pub sender: SenderIdentity,
    pub value_add: String,
    pub generation: GenerationConfig,
    pub smtp: SmtpConfig,
    /// Remote push target. None means the snapshot stays local.
    pub sync: Option<SyncConfig>,
}

impl Config {
    /// Read the full configuration from the environment. Missing credentials
    /// are fatal here, before any lead is touched.
    pub fn from_env() -> Result<Self, Error> {
        let provider = match env_opt("PITCH_PROVIDER") {
            Some(raw) => ProviderKind::parse(&raw)
                .ok_or_else(|| Error::Config(format!("unknown PITCH_PROVIDER '{raw}'")))?,
            None => ProviderKind::Gemini,
        };
        let api_key = match provider {
            ProviderKind::Gemini => required("GEMINI_API_KEY")?,
            ProviderKind::OpenAi => required("OPENAI_API_KEY")?,
        };

        let defaults = RunConfig::default();
        let run = RunConfig {
            batch_size: env_parsed("BATCH_SIZE", defaults.batch_size),
            daily_cap: env_parsed("DAILY_CAP", defaults.daily_cap),
            drip_delay: Duration::from_secs(env_parsed("DRIP_DELAY_SECS", 30)),
            max_retries: env_parsed("MAX_RETRIES", defaults.max_retries),
            token_reduction_factor: defaults.token_reduction_factor,
        };

        let sender = SenderIdentity {
            name: env_opt("SENDER_NAME").unwrap_or_else(|| "Mohammad Hussain".to_string()),
            phone: env_opt("SENDER_PHONE"),
            linkedin: env_opt("SENDER_LINKEDIN"),
            portfolio: env_opt("SENDER_PORTFOLIO"),
        };

        let smtp = SmtpConfig {
            host: env_opt("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: env_parsed("SMTP_PORT", 587),
            email: required("SMTP_EMAIL")?,
            password: required("SMTP_PASSWORD")?,
        };

        // Sync is optional as a whole: without a token the run simply keeps
        // the store local. A token without a repo is a misconfiguration.
        let sync = match env_opt("GH_TOKEN") {
            Some(token) => Some(SyncConfig {
                token,
                repo: required("GITHUB_REPO")?,
                branch: env_opt("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
            }),
            None => None,
        };

        Ok(Self {
            store_path: env_opt("LEADS_CSV")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            run,
            sender,
            value_add: env_opt("MY_VALUE_ADD").unwrap_or_else(|| DEFAULT_VALUE_ADD.to_string()),
            generation: GenerationConfig {
                model: env_opt("PITCH_MODEL")
                    .unwrap_or_else(|| provider.default_model().to_string()),
                provider,
                api_key,
                temperature: 0.7,
                max_output_tokens: env_parsed("PITCH_MAX_TOKENS", 600),
            },
            smtp,
            sync,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String, Error> {
    env_opt(key).ok_or_else(|| Error::Config(format!("{key} is not set")))
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
