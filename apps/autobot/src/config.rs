use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::RunError;
use crate::llm_client::DEFAULT_MODEL;

const DEFAULT_SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/?keywords=machine%20learning%20intern&location=Silicon%20Valley%2C%20California&f_AL=true&f_TPR=r604800";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Where the façade persists the run configuration, and where `run` reads it from.
    pub config_path: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    pub search_url: String,
    pub max_pages: u32,
    pub groq_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            port: get("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG", "info"),
            config_path: PathBuf::from(get("CONFIG_PATH", "backend/config.json")),
            webdriver_url: get("WEBDRIVER_URL", "http://localhost:9515"),
            headless: parse_bool(&get("HEADLESS", "false")).context("HEADLESS must be a boolean")?,
            search_url: get("SEARCH_URL", DEFAULT_SEARCH_URL),
            max_pages: get("MAX_PAGES", "10")
                .parse::<u32>()
                .context("MAX_PAGES must be a positive integer")?
                .max(1),
            groq_model: get("GROQ_MODEL", DEFAULT_MODEL),
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("'{other}' is not a boolean"),
    }
}

/// Static answers supplied by the user. Read-only for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub salary_expectation: i64,
    pub location: String,
    pub commuting: String,
    pub veteran_status: String,
    pub disability: String,
    pub ethnicity: String,
    pub gender: String,
    pub address: String,
    pub zip_code: String,
    pub middle_name: String,
    pub phone: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            salary_expectation: 0,
            location: String::new(),
            commuting: String::new(),
            veteran_status: "No".to_string(),
            disability: "No".to_string(),
            ethnicity: String::new(),
            gender: String::new(),
            address: String::new(),
            zip_code: String::new(),
            middle_name: String::new(),
            phone: String::new(),
        }
    }
}

/// Everything one automation run needs from the user. Serialized flat, the same shape
/// the start endpoint accepts and persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub groq_api_key: String,
    pub linkedin_email: String,
    pub linkedin_password: String,
    pub cv_path: String,
    #[serde(flatten)]
    pub preferences: UserPreferences,
}

impl RunConfig {
    /// Reads the persisted file when it exists, otherwise falls back to environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading run configuration from {}", path.display());
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Invalid run configuration in {}", path.display()));
        }

        info!(
            "No run configuration at {}; reading environment variables",
            path.display()
        );
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(RunConfig {
            groq_api_key: get("GROQ_API_KEY", ""),
            linkedin_email: get("LINKEDIN_EMAIL", ""),
            linkedin_password: get("LINKEDIN_PASSWORD", ""),
            cv_path: get("CV_PATH", ""),
            preferences: UserPreferences {
                salary_expectation: get("SALARY_EXPECTATION", "0")
                    .trim()
                    .parse::<i64>()
                    .context("SALARY_EXPECTATION must be an integer")?,
                location: get("LOCATION", ""),
                commuting: get("COMMUTING", ""),
                veteran_status: get("VETERAN_STATUS", "No"),
                disability: get("DISABILITY", "No"),
                ethnicity: get("ETHNICITY", ""),
                gender: get("GENDER", ""),
                address: get("ADDRESS", ""),
                zip_code: get("ZIP_CODE", ""),
                middle_name: get("MIDDLE_NAME", ""),
                phone: get("PHONE", ""),
            },
        })
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Fails on the settings a run cannot start without.
    pub fn validate(&self) -> Result<(), RunError> {
        let required = [
            ("linkedin_email", &self.linkedin_email),
            ("linkedin_password", &self.linkedin_password),
            ("groq_api_key", &self.groq_api_key),
            ("cv_path", &self.cv_path),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(RunError::MissingSetting(*name)),
            None => Ok(()),
        }
    }
}
