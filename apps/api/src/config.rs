use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_RATE_WINDOW_MS: u64 = 60_000;

/// Application configuration loaded from environment variables.
/// Fails at startup if a set variable cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub cv_dir: PathBuf,
    /// Résumé answered from when a chat request names no stored CV.
    pub default_resume_path: PathBuf,
    pub max_upload_bytes: usize,
    pub llm: LlmConfig,
    pub smtp: Option<SmtpConfig>,
    pub rate_limits: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    /// Missing keys are reported per request, not at startup.
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub chat: u32,
    pub upload: u32,
    pub list: u32,
    pub email: u32,
}

impl RateLimitSettings {
    pub fn chat(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.chat, self.window)
    }

    pub fn upload(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.upload, self.window)
    }

    pub fn list(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.list, self.window)
    }

    pub fn email(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.email, self.window)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_RATE_WINDOW_MS),
            chat: 20,
            upload: 20,
            list: 60,
            email: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RateLimitSettings::default();

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cv_dir: optional_env("CV_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/cvs")),
            default_resume_path: optional_env("RESUME_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/resume.pdf")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            llm: LlmConfig {
                api_url: optional_env("LLM_API_URL")
                    .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
                api_key: optional_env("LLM_API_KEY"),
                model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            },
            smtp: smtp_from_env()?,
            rate_limits: RateLimitSettings {
                window: Duration::from_millis(parse_env(
                    "RATE_LIMIT_WINDOW_MS",
                    DEFAULT_RATE_WINDOW_MS,
                )?),
                chat: parse_env("CHAT_RATE_LIMIT", defaults.chat)?,
                upload: parse_env("UPLOAD_RATE_LIMIT", defaults.upload)?,
                list: parse_env("LIST_RATE_LIMIT", defaults.list)?,
                email: parse_env("EMAIL_RATE_LIMIT", defaults.email)?,
            },
        })
    }
}

/// SMTP is configured only when host, user and password are all present.
fn smtp_from_env() -> Result<Option<SmtpConfig>> {
    let (Some(host), Some(username), Some(password)) = (
        optional_env("EMAIL_HOST"),
        optional_env("EMAIL_USER"),
        optional_env("EMAIL_PASS"),
    ) else {
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host,
        port: parse_env("EMAIL_PORT", 587)?,
        username,
        password,
        from_name: optional_env("EMAIL_FROM_NAME")
            .unwrap_or_else(|| "Resume Assistant".to_string()),
    }))
}

/// Unset and blank variables are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}"))
}
