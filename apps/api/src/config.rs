use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables or input files are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub port: u16,
    pub rust_log: String,
    pub output_dir: PathBuf,
    pub master_profile_path: PathBuf,
    pub cv_template_path: PathBuf,
    pub cover_letter_template_path: PathBuf,
    pub latex_compiler: String,
    pub job_workers: usize,
    pub job_queue_capacity: usize,
    pub generation_concurrency: usize,
    pub smtp: SmtpConfig,
}

/// Outbound mail settings. Credentials are optional: without both of them
/// notification is skipped rather than treated as an error.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    /// Returns `(username, password)` only when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.5-pro"),
            gemini_api_base: env_or(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "outputs")),
            master_profile_path: PathBuf::from(env_or("MASTER_PROFILE_PATH", "master_profile.md")),
            cv_template_path: PathBuf::from(env_or("CV_TEMPLATE_PATH", "templates/cv.tex")),
            cover_letter_template_path: PathBuf::from(env_or(
                "COVER_LETTER_TEMPLATE_PATH",
                "templates/cover_letter.tex",
            )),
            latex_compiler: env_or("LATEX_COMPILER", "pdflatex"),
            job_workers: parse_env("JOB_WORKERS", 2)?,
            job_queue_capacity: parse_env("JOB_QUEUE_CAPACITY", 32)?,
            generation_concurrency: parse_env("GENERATION_CONCURRENCY", 4)?,
            smtp: SmtpConfig {
                host: env_or("SMTP_HOST", "smtp.gmail.com"),
                port: parse_env("SMTP_PORT", 465)?,
                username: optional_env("GMAIL_USER"),
                password: optional_env("GMAIL_PASSWORD").map(|p| normalize_app_password(&p)),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Presence checks for everything the pipeline reads from disk or executes.
    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is set but empty");
        }

        for (key, path) in [
            ("MASTER_PROFILE_PATH", &self.master_profile_path),
            ("CV_TEMPLATE_PATH", &self.cv_template_path),
            ("COVER_LETTER_TEMPLATE_PATH", &self.cover_letter_template_path),
        ] {
            require_file(key, path)?;
        }

        if self.latex_compiler.contains(std::path::MAIN_SEPARATOR) || self.latex_compiler.contains('/') {
            require_file("LATEX_COMPILER", Path::new(&self.latex_compiler))?;
        }

        for (key, value) in [
            ("JOB_WORKERS", self.job_workers),
            ("JOB_QUEUE_CAPACITY", self.job_queue_capacity),
            ("GENERATION_CONCURRENCY", self.generation_concurrency),
        ] {
            if value == 0 {
                bail!("{key} must be at least 1");
            }
        }

        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value: '{raw}'"))
}

/// App passwords are shown in groups of four; the spaces are not part of it.
fn normalize_app_password(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn require_file(key: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("{key} points to '{}', which does not exist", path.display());
    }
    Ok(())
}
