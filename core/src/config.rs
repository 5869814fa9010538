//! Environment-sourced configuration, validated once at startup.
//!
//! Every required key is checked before any network call is made, and all
//! missing or malformed values are reported together in a single
//! [`CoreError::Config`].

use crate::error::{CoreError, CoreResult};
use crate::llm::interface::SamplingConfig;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use time::macros::format_description;
use time::UtcOffset;
use url::Url;

pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const ENV_SLACK_USER_TOKEN: &str = "SLACK_USER_TOKEN";
pub const ENV_SLACK_CHANNEL_ID: &str = "SLACK_CHANNEL_ID";
pub const ENV_INFERENCE_API_KEY: &str = "GROQ_API_KEY";
pub const ENV_SLACK_API_BASE: &str = "SLACK_API_BASE";
pub const ENV_INFERENCE_API_BASE: &str = "INFERENCE_API_BASE";
pub const ENV_INFERENCE_MODEL: &str = "INFERENCE_MODEL";
pub const ENV_INFERENCE_TEMPERATURE: &str = "INFERENCE_TEMPERATURE";
pub const ENV_INFERENCE_MAX_TOKENS: &str = "INFERENCE_MAX_TOKENS";
pub const ENV_REPORTS_DIR: &str = "REPORTS_DIR";
pub const ENV_REPORT_UTC_OFFSET: &str = "REPORT_UTC_OFFSET";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_INFERENCE_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_REPORTS_DIR: &str = "incident_reports";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const REQUIRED_KEYS: [&str; 4] = [
    ENV_SLACK_BOT_TOKEN,
    ENV_SLACK_USER_TOKEN,
    ENV_SLACK_CHANNEL_ID,
    ENV_INFERENCE_API_KEY,
];

#[derive(Debug)]
pub struct SlackSettings {
    pub api_base: String,
    pub bot_token: SecretString,
    pub user_token: SecretString,
    pub channel_id: String,
}

#[derive(Debug)]
pub struct InferenceSettings {
    pub api_base: String,
    pub api_key: SecretString,
    pub sampling: SamplingConfig,
}

#[derive(Debug)]
pub struct ReporterConfig {
    pub slack: SlackSettings,
    pub inference: InferenceSettings,
    pub reports_dir: PathBuf,
    pub utc_offset: UtcOffset,
    pub http_timeout: Duration,
}

impl ReporterConfig {
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Blank values
    /// count as missing.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| value(key).is_none())
            .collect();
        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        let slack_api_base = value(ENV_SLACK_API_BASE)
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string());
        let slack_api_base = collect(
            &mut problems,
            validate_base_url(ENV_SLACK_API_BASE, &slack_api_base),
        );

        let inference_api_base = value(ENV_INFERENCE_API_BASE)
            .unwrap_or_else(|| DEFAULT_INFERENCE_API_BASE.to_string());
        let inference_api_base = collect(
            &mut problems,
            validate_base_url(ENV_INFERENCE_API_BASE, &inference_api_base),
        );

        let mut sampling = SamplingConfig::default();
        if let Some(model) = value(ENV_INFERENCE_MODEL) {
            sampling.model = model;
        }
        if let Some(raw) = value(ENV_INFERENCE_TEMPERATURE) {
            if let Some(t) = collect(&mut problems, parse_temperature(&raw)) {
                sampling.temperature = t;
            }
        }
        if let Some(raw) = value(ENV_INFERENCE_MAX_TOKENS) {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => sampling.max_tokens = n,
                _ => problems.push(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_INFERENCE_MAX_TOKENS, raw
                )),
            }
        }

        let utc_offset = match value(ENV_REPORT_UTC_OFFSET) {
            Some(raw) => collect(&mut problems, parse_utc_offset(&raw)),
            None => Some(UtcOffset::UTC),
        };

        let http_timeout = match value(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    problems.push(format!(
                        "{} must be a positive number of seconds, got {:?}",
                        ENV_HTTP_TIMEOUT_SECS, raw
                    ));
                    None
                }
            },
            None => Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        };

        let reports_dir =
            PathBuf::from(value(ENV_REPORTS_DIR).unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()));

        if !problems.is_empty() {
            return Err(CoreError::Config(problems.join("; ")));
        }

        let required = |key: &str| value(key).unwrap_or_default();
        Ok(Self {
            slack: SlackSettings {
                api_base: slack_api_base.unwrap_or_default(),
                bot_token: secret(required(ENV_SLACK_BOT_TOKEN)),
                user_token: secret(required(ENV_SLACK_USER_TOKEN)),
                channel_id: required(ENV_SLACK_CHANNEL_ID),
            },
            inference: InferenceSettings {
                api_base: inference_api_base.unwrap_or_default(),
                api_key: secret(required(ENV_INFERENCE_API_KEY)),
                sampling,
            },
            reports_dir,
            utc_offset: utc_offset.unwrap_or(UtcOffset::UTC),
            http_timeout: http_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        })
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.slack.channel_id = channel_id.into();
        self
    }
}

fn secret(value: String) -> SecretString {
    SecretString::new(value.into_boxed_str())
}

fn collect<T>(problems: &mut Vec<String>, result: Result<T, String>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(problem) => {
            problems.push(problem);
            None
        }
    }
}

/// Accepts http(s) URLs and returns them without a trailing slash so method
/// paths can be appended directly.
fn validate_base_url(key: &str, raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("{} is not a valid URL ({}): {:?}", key, e, raw))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("{} must use http or https, got {:?}", key, raw));
    }
    if url.host_str().is_none() {
        return Err(format!("{} is missing a host: {:?}", key, raw));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    match raw.parse::<f32>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Ok(t),
        _ => Err(format!(
            "{} must be a number between 0.0 and 2.0, got {:?}",
            ENV_INFERENCE_TEMPERATURE, raw
        )),
    }
}

/// Parses `Z`, `UTC` or a signed `±HH:MM` offset.
pub fn parse_utc_offset(raw: &str) -> Result<UtcOffset, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| {
        format!(
            "{} must look like +05:30, -08:00 or UTC, got {:?}",
            ENV_REPORT_UTC_OFFSET, raw
        )
    })
}
