//! Session configuration.

use std::time::Duration;

use url::Url;

use super::SttError;

/// Configuration for one streaming STT session.
///
/// Everything the driver needs is injected here; nothing is read from the
/// environment at this layer.
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// WebSocket endpoint, e.g. `wss://translate.signans.io`.
    pub base_url: String,
    /// Streaming STT API path.
    pub api_path: String,
    /// API access key identifying the caller.
    pub access_key: String,
    /// API secret key used to sign the session token.
    pub secret_key: String,
    /// Speech language code sent in SET_LANGUAGE.
    pub language: String,
    /// Audio sampling rate in Hz sent in SET_SAMPLING_RATE.
    pub sample_rate: u32,
    /// Validity window of the signed session token.
    pub token_ttl: Duration,
    /// Maximum time to wait for the websocket to open.
    pub connect_timeout: Duration,
    /// Size of one binary audio frame in bytes.
    pub chunk_size: usize,
    /// Pacing delay between consecutive audio frames.
    pub chunk_interval: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "wss://translate.signans.io".to_string(),
            api_path: "/api/v1/translate/stt-streaming".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            language: "ja".to_string(),
            sample_rate: 16000,
            token_ttl: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            chunk_size: 4096,
            chunk_interval: Duration::from_millis(100),
        }
    }
}

impl SttConfig {
    /// Check structural validity before a connection attempt.
    ///
    /// Credential values are not checked here; empty keys are rejected by
    /// token issuance with a credential error.
    pub fn validate(&self) -> Result<(), SttError> {
        if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            return Err(SttError::Configuration(format!(
                "base URL must use the ws or wss scheme, got '{}'",
                self.base_url
            )));
        }
        if !self.api_path.starts_with('/') {
            return Err(SttError::Configuration(format!(
                "API path must be absolute, got '{}'",
                self.api_path
            )));
        }
        if self.language.is_empty() {
            return Err(SttError::Configuration(
                "language must not be empty".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(SttError::Configuration(
                "sample rate must be positive".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(SttError::Configuration(
                "chunk size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the connection URL carrying the bearer token in the query.
    ///
    /// The token parameter is form-encoded, so the space in
    /// `Bearer <token>` becomes `+`. The server expects exactly this
    /// encoding.
    pub fn build_session_url(&self, token: &str) -> Result<String, SttError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            SttError::Configuration(format!("invalid base URL '{}': {e}", self.base_url))
        })?;
        url.set_path(&self.api_path);
        url.query_pairs_mut()
            .append_pair("token", &format!("Bearer {token}"));
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SttConfig::default();
        assert_eq!(config.base_url, "wss://translate.signans.io");
        assert_eq!(config.api_path, "/api/v1/translate/stt-streaming");
        assert_eq!(config.language, "ja");
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.token_ttl, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.chunk_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(SttConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_websocket_scheme() {
        let config = SttConfig {
            base_url: "https://translate.signans.io".to_string(),
            ..SttConfig::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(SttError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_relative_api_path() {
        let config = SttConfig {
            api_path: "api/v1/translate/stt-streaming".to_string(),
            ..SttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_language() {
        let config = SttConfig {
            language: String::new(),
            ..SttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let config = SttConfig {
            sample_rate: 0,
            ..SttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = SttConfig {
            chunk_size: 0,
            ..SttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_session_url_encodes_bearer_token() {
        let config = SttConfig::default();
        let url = config.build_session_url("abc.def.ghi").unwrap();
        assert_eq!(
            url,
            "wss://translate.signans.io/api/v1/translate/stt-streaming?token=Bearer+abc.def.ghi"
        );
    }

    #[test]
    fn test_build_session_url_escapes_reserved_characters() {
        let config = SttConfig::default();
        let url = config.build_session_url("a b/c").unwrap();
        assert!(url.ends_with("?token=Bearer+a+b%2Fc"));
    }

    #[test]
    fn test_build_session_url_custom_endpoint() {
        let config = SttConfig {
            base_url: "ws://127.0.0.1:9000".to_string(),
            ..SttConfig::default()
        };
        let url = config.build_session_url("tok").unwrap();
        assert_eq!(
            url,
            "ws://127.0.0.1:9000/api/v1/translate/stt-streaming?token=Bearer+tok"
        );
    }

    #[test]
    fn test_build_session_url_rejects_unparsable_base() {
        let config = SttConfig {
            base_url: "wss://".to_string(),
            ..SttConfig::default()
        };
        assert!(config.build_session_url("tok").is_err());
    }
}
