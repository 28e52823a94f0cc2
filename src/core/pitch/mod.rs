pub mod providers;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ProviderKind;
use crate::core::store::Lead;
use crate::error::Error;

/// Ephemeral generation result. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pitch {
    pub subject: String,
    pub body: String,
}

/// One round trip to a generation backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// How a failed completion should be treated by the retry loop.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("quota exhausted (HTTP 402)")]
    QuotaExhausted,
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(String),
}

/// A generation backend. The retry/backoff contract lives in
/// [`PitchGenerator`], so every provider variant shares it.
#[async_trait]
pub trait PitchProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Retry knobs shared by all providers. The rate-limit schedule is linear in
/// the attempt number, so waits never decrease across a run of 429s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_base: Duration,
    pub error_pause: Duration,
    pub token_reduction_factor: f32,
    pub token_floor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            rate_limit_base: Duration::from_secs(15),
            error_pause: Duration::from_secs(10),
            token_reduction_factor: 0.75,
            token_floor: 100,
        }
    }
}

impl RetryPolicy {
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        self.rate_limit_base * attempt.max(1)
    }
}

pub struct PitchGenerator {
    provider: Box<dyn PitchProvider>,
    policy: RetryPolicy,
    temperature: f32,
    initial_token_budget: u32,
}

impl PitchGenerator {
    pub fn new(
        provider: Box<dyn PitchProvider>,
        policy: RetryPolicy,
        temperature: f32,
        initial_token_budget: u32,
    ) -> Self {
        Self {
            provider,
            policy,
            temperature,
            initial_token_budget,
        }
    }

    /// Generate a pitch for one lead, retrying per the response class:
    /// timeouts retry immediately, 429s back off linearly, 402s shrink the
    /// token budget until the floor, other HTTP failures pause briefly.
    /// Exhausting all attempts is a `Generation` error.
    pub async fn generate(
        &self,
        lead: &Lead,
        value_add: &str,
        sender_name: &str,
    ) -> Result<Pitch, Error> {
        let system_prompt = build_system_prompt(sender_name);
        let user_prompt = build_user_prompt(lead, value_add, sender_name);
        let mut token_budget = self.initial_token_budget;

        for attempt in 1..=self.policy.max_retries {
            let req = CompletionRequest {
                system_prompt: system_prompt.clone(),
                user_prompt: user_prompt.clone(),
                max_output_tokens: token_budget,
                temperature: self.temperature,
            };

            match self.provider.complete(&req).await {
                Ok(text) => {
                    info!(attempt, provider = ?self.provider.kind(), "pitch generated");
                    return Ok(parse_pitch(&text));
                }
                Err(ProviderError::Timeout) => {
                    warn!(attempt, "generation timed out, retrying");
                }
                Err(ProviderError::RateLimited) => {
                    if attempt == self.policy.max_retries {
                        return Err(Error::Generation(format!(
                            "still rate limited after {attempt} attempts"
                        )));
                    }
                    let wait = self.policy.rate_limit_backoff(attempt);
                    warn!(attempt, wait_secs = wait.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(ProviderError::QuotaExhausted) => {
                    let next =
                        (token_budget as f32 * self.policy.token_reduction_factor) as u32;
                    if next < self.policy.token_floor {
                        return Err(Error::Generation(format!(
                            "token budget {next} fell below the floor of {}",
                            self.policy.token_floor
                        )));
                    }
                    warn!(attempt, token_budget = next, "quota exhausted, shrinking budget");
                    token_budget = next;
                }
                Err(e) => {
                    if attempt == self.policy.max_retries {
                        return Err(Error::Generation(e.to_string()));
                    }
                    warn!(attempt, error = %e, "generation failed, pausing before retry");
                    tokio::time::sleep(self.policy.error_pause).await;
                }
            }
        }

        Err(Error::Generation(format!(
            "no pitch after {} attempts",
            self.policy.max_retries
        )))
    }
}

fn build_system_prompt(sender_name: &str) -> String {
    format!(
        "You are a professional career coach writing cold emails on behalf of {sender_name}. \
         Rules you MUST follow:\n\
         1. Output ONLY plain text, absolutely no markdown, no bold, no bullet points, no asterisks.\n\
         2. The first line must be the subject line in the format: Subject: <subject text>\n\
         3. Then leave one blank line and write the email body.\n\
         4. NEVER use placeholders like [Your Name], [Company Name], [Role]. \
         Use the actual values provided.\n\
         5. Keep the tone professional yet warm, like a real human wrote it.\n\
         6. The email must be concise (under 200 words for the body).\n\
         7. Do NOT include a signature block; it will be appended separately.\n\
         8. End the body with a brief, confident call to action.\n"
    )
}

fn build_user_prompt(lead: &Lead, value_add: &str, sender_name: &str) -> String {
    let mut prompt = format!(
        "Write a cold email to {} for the role of {}.",
        lead.company_name, lead.role
    );
    prompt.push_str(&format!("\nJob description snippet: {}", lead.context_jd));
    prompt.push_str(&format!("\nMy unique value add: {value_add}"));
    if !lead.why_i_love_them.trim().is_empty() {
        prompt.push_str(&format!(
            "\nPersonal connection / why I love them: {} \
             (Weave this naturally into the opening line to show genuine interest.)",
            lead.why_i_love_them
        ));
    }
    prompt.push_str(&format!(
        "\nThe sender's name is {sender_name}. Use it in the sign-off."
    ));
    prompt
}

/// Split raw model output into subject and body. A first line of
/// `Subject: ...` (any case) becomes the subject; otherwise the subject is
/// empty and everything is body. Markup characters are stripped from the
/// body unconditionally.
pub fn parse_pitch(raw: &str) -> Pitch {
    let raw = raw.trim();
    let (first, rest) = match raw.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (raw, ""),
    };

    let (subject, body) = if has_subject_prefix(first) {
        (first["subject:".len()..].trim().to_string(), rest.trim())
    } else {
        (String::new(), raw)
    };

    Pitch {
        subject,
        body: sanitize_body(body),
    }
}

fn has_subject_prefix(line: &str) -> bool {
    line.get(.."subject:".len())
        .is_some_and(|p| p.eq_ignore_ascii_case("subject:"))
}

fn sanitize_body(body: &str) -> String {
    body.replace("**", "").replace('*', "").replace('#', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn lead() -> Lead {
        Lead {
            company_name: "Acme".to_string(),
            contact_email: "a@acme.io".to_string(),
            role: "Engineer".to_string(),
            context_jd: "build rockets".to_string(),
            why_i_love_them: String::new(),
            sent_status: String::new(),
            sent_time: String::new(),
        }
    }

    struct ScriptedProvider {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PitchProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Gemini
        }

        async fn complete(&self, req: &CompletionRequest) -> Result<String, ProviderError> {
            self.requests.lock().unwrap().push(req.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(ProviderError::RateLimited)
            } else {
                replies.remove(0)
            }
        }
    }

    fn generator(provider: ScriptedProvider, policy: RetryPolicy) -> PitchGenerator {
        PitchGenerator::new(Box::new(provider), policy, 0.7, 600)
    }

    #[test]
    fn parse_splits_subject_and_body() {
        let pitch = parse_pitch("Subject: Hello\n\nBody text");
        assert_eq!(pitch.subject, "Hello");
        assert_eq!(pitch.body, "Body text");
    }

    #[test]
    fn parse_without_subject_prefix_keeps_full_text_as_body() {
        let pitch = parse_pitch("Just a body\nwith two lines");
        assert_eq!(pitch.subject, "");
        assert_eq!(pitch.body, "Just a body\nwith two lines");
    }

    #[test]
    fn parse_subject_prefix_is_case_insensitive() {
        let pitch = parse_pitch("SUBJECT: Loud\n\nquiet body");
        assert_eq!(pitch.subject, "Loud");
        assert_eq!(pitch.body, "quiet body");
    }

    #[test]
    fn parse_strips_markup_from_body() {
        let pitch = parse_pitch("Subject: Hi\n\nThis is **bold** and *starred* and # headed");
        assert_eq!(pitch.body, "This is bold and starred and  headed");
    }

    #[test]
    fn rate_limit_backoff_never_decreases() {
        let policy = RetryPolicy::default();
        let mut last = Duration::ZERO;
        for attempt in 1..=5 {
            let wait = policy.rate_limit_backoff(attempt);
            assert!(wait >= last, "backoff shrank at attempt {attempt}");
            last = wait;
        }
        assert_eq!(policy.rate_limit_backoff(1), Duration::from_secs(15));
        assert_eq!(policy.rate_limit_backoff(3), Duration::from_secs(45));
    }

    #[test]
    fn user_prompt_includes_the_love_hook_only_when_present() {
        let mut l = lead();
        let without = build_user_prompt(&l, "value", "Sam");
        assert!(!without.contains("Personal connection"));
        l.why_i_love_them = "open source culture".to_string();
        let with = build_user_prompt(&l, "value", "Sam");
        assert!(with.contains("Personal connection"));
        assert!(with.contains("open source culture"));
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_rate_limits_exhaust_into_generation_error() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
        ]);
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        let err = generator(provider, policy)
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn final_rate_limited_attempt_fails_without_a_parting_backoff() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
        ]);
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        // Backoff after attempts 1 and 2 only: 15s + 30s.
        let started = tokio::time::Instant::now();
        let err = generator(provider, policy)
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_success_returns_the_pitch() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Timeout),
            Ok("Subject: Hi Acme\n\nShort body.".to_string()),
        ]);
        let pitch = generator(provider, RetryPolicy::default())
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap();
        assert_eq!(pitch.subject, "Hi Acme");
        assert_eq!(pitch.body, "Short body.");
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exhaustion_shrinks_the_token_budget_each_attempt() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::QuotaExhausted),
            Err(ProviderError::QuotaExhausted),
            Ok("Subject: Hi\n\nBody".to_string()),
        ]);
        let requests = Arc::clone(&provider.requests);
        generator(provider, RetryPolicy::default())
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap();
        let budgets: Vec<u32> = requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.max_output_tokens)
            .collect();
        assert_eq!(budgets, [600, 450, 337]);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_floor_aborts_with_generation_error() {
        let provider = ScriptedProvider::new(
            (0..10).map(|_| Err(ProviderError::QuotaExhausted)).collect(),
        );
        let policy = RetryPolicy {
            max_retries: 10,
            ..RetryPolicy::default()
        };
        // 600 -> 450 -> 337 -> 252 -> 189 -> 141 -> 105 -> 78: below the
        // 100-token floor on the eighth shrink.
        let err = generator(provider, policy)
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_on_final_attempt_is_fatal() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Http {
                status: 500,
                detail: "boom".to_string(),
            }),
            Err(ProviderError::Http {
                status: 503,
                detail: "still down".to_string(),
            }),
        ]);
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let err = generator(provider, policy)
            .generate(&lead(), "value", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
