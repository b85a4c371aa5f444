use std::env;

use crate::stt::SttConfig;

/// Application configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub access_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub language: String,
    pub sample_rate: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let access_key =
            env::var("SIGNANS_ACCESS_KEY").map_err(|_| "SIGNANS_ACCESS_KEY is not set")?;
        let secret_key =
            env::var("SIGNANS_SECRET_KEY").map_err(|_| "SIGNANS_SECRET_KEY is not set")?;

        let base_url = env::var("SIGNANS_BASE_URL")
            .unwrap_or_else(|_| "wss://translate.signans.io".to_string());
        let language = env::var("SIGNANS_LANGUAGE").unwrap_or_else(|_| "ja".to_string());
        let sample_rate = env::var("SIGNANS_SAMPLE_RATE")
            .unwrap_or_else(|_| "16000".to_string())
            .parse::<u32>()
            .map_err(|e| format!("Invalid sampling rate: {e}"))?;

        Ok(AppConfig {
            access_key,
            secret_key,
            base_url,
            language,
            sample_rate,
        })
    }

    /// Build the session configuration for the streaming client.
    ///
    /// Environment-provided values override the endpoint defaults; timing
    /// parameters keep their defaults.
    pub fn stt_config(&self) -> SttConfig {
        SttConfig {
            base_url: self.base_url.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            language: self.language.clone(),
            sample_rate: self.sample_rate,
            ..SttConfig::default()
        }
    }
}
