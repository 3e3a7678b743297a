//! Server configuration loading from file and environment variables.

use parla_types::{Persona, PersonaError};
use parla_voice::{ConvaiConfig, ElevenLabsConfig, GoogleTtsConfig, OpenAiConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Cross-origin allow-list.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Outbound HTTP client settings shared by every vendor client.
    #[serde(default)]
    pub http: HttpClientConfig,

    /// The agent this instance relays.
    #[serde(default)]
    pub persona: Persona,

    /// Language model settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Speech synthesis settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Hosted agent settings for the REST pass-throughs.
    #[serde(default)]
    pub convai: ConvaiConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parla_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Origins allowed to call the REST endpoints and open the WebSocket.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Exact origin strings. `"*"` allows any origin (without credentials).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    /// Per-request timeout for vendor calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which vendor synthesizes speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    #[default]
    ElevenLabs,
    Google,
}

impl FromStr for SpeechProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elevenlabs" => Ok(Self::ElevenLabs),
            "google" => Ok(Self::Google),
            other => Err(format!("unknown speech provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub provider: SpeechProvider,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
    #[serde(default)]
    pub google: GoogleTtsConfig,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:4200".to_string(),
        "https://0j7f3mhw-4200.use2.devtunnels.ms".to_string(),
        "https://agente-lait.web.app".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment variable held a value that cannot be used.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    /// The configured persona is incomplete.
    #[error("invalid persona: {0}")]
    Persona(#[from] PersonaError),
}

/// Loads configuration from a TOML file and the process environment.
///
/// See [`load_config_with_env`] for the variables consulted.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// the resulting configuration is invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies overrides from `env`.
///
/// Environment variable overrides:
/// - `PARLA_HOST` overrides `server.host`
/// - `PARLA_PORT` overrides `server.port`
/// - `PARLA_LOG_LEVEL` overrides `logging.level`
/// - `PARLA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PARLA_CORS_ORIGINS` overrides `cors.allowed_origins` (comma-separated)
/// - `PARLA_SPEECH_PROVIDER` overrides `speech.provider`
///
/// Secrets and vendor identifiers are only read from the environment:
/// `OPENAI_API_KEY`, `ELEVENLABS_API_KEY`, `XI_API_KEY`, `AGENT_ID`,
/// `AGENT_ID_LAIT`, `GOOGLE_APPLICATION_CREDENTIALS` and
/// `GOOGLE_OAUTH_ACCESS_TOKEN`. Blank values count as unset.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// `PARLA_SPEECH_PROVIDER` names an unknown provider, or the persona fails
/// validation.
pub fn load_config_with_env<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

    if let Some(host) = env("PARLA_HOST") {
        match host.parse() {
            Ok(parsed) => config.server.host = parsed,
            Err(_) => tracing::warn!(value = %host, "ignoring unparsable PARLA_HOST"),
        }
    }
    if let Some(port) = env("PARLA_PORT") {
        match port.parse() {
            Ok(parsed) => config.server.port = parsed,
            Err(_) => tracing::warn!(value = %port, "ignoring unparsable PARLA_PORT"),
        }
    }
    if let Some(level) = env("PARLA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("PARLA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(origins) = env("PARLA_CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(provider) = env("PARLA_SPEECH_PROVIDER") {
        config.speech.provider = provider
            .parse()
            .map_err(|reason| ConfigError::InvalidEnv {
                var: "PARLA_SPEECH_PROVIDER",
                reason,
            })?;
    }

    if let Some(key) = env("OPENAI_API_KEY") {
        config.openai.api_key = key;
    }
    if let Some(key) = env("ELEVENLABS_API_KEY") {
        config.speech.elevenlabs.api_key = Some(key);
    }
    if let Some(path) = env("GOOGLE_APPLICATION_CREDENTIALS") {
        config.speech.google.credentials_path = path;
    }
    if let Some(token) = env("GOOGLE_OAUTH_ACCESS_TOKEN") {
        config.speech.google.access_token = Some(token);
    }
    if let Some(key) = env("XI_API_KEY") {
        config.convai.api_key = Some(key);
    }
    if let Some(agent_id) = env("AGENT_ID") {
        config.convai.agent_id = Some(agent_id);
    }
    if let Some(agent_id) = env("AGENT_ID_LAIT") {
        config.convai.lait_agent_id = Some(agent_id);
    }

    config.persona.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parla_voice::OPENAI_API_KEY_PLACEHOLDER;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = load_config_with_env(None, env_from(&[])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.speech.provider, SpeechProvider::ElevenLabs);
        assert_eq!(config.openai.api_key, OPENAI_API_KEY_PLACEHOLDER);
        assert_eq!(config.openai.max_tokens, 150);
        assert_eq!(config.cors.allowed_origins.len(), 3);
        assert!(config.convai.agent_id.is_none());
        assert!(config.speech.elevenlabs.api_key.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_with_env(path.to_str(), env_from(&[])).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn env_overrides_file_and_fills_secrets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 9000

            [persona]
            name = "Sofía"
            voice_id = "voice-from-file"
            farewell_keywords = []
            "#
        )
        .unwrap();

        let env = env_from(&[
            ("PARLA_PORT", "9100"),
            ("PARLA_LOG_JSON", "1"),
            ("PARLA_CORS_ORIGINS", "https://a.example, https://b.example ,"),
            ("PARLA_SPEECH_PROVIDER", "Google"),
            ("OPENAI_API_KEY", "sk-live"),
            ("ELEVENLABS_API_KEY", "el-live"),
            ("XI_API_KEY", "xi-live"),
            ("AGENT_ID", "agent-1"),
            ("AGENT_ID_LAIT", "agent-lait"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/secrets/sa.json"),
        ]);
        let config = load_config_with_env(file.path().to_str(), env).unwrap();

        assert_eq!(config.server.port, 9100);
        assert!(config.logging.json);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.speech.provider, SpeechProvider::Google);
        assert_eq!(config.openai.api_key, "sk-live");
        assert_eq!(config.speech.elevenlabs.api_key.as_deref(), Some("el-live"));
        assert_eq!(config.convai.api_key.as_deref(), Some("xi-live"));
        assert_eq!(config.convai.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(config.convai.lait_agent_id.as_deref(), Some("agent-lait"));
        assert_eq!(config.speech.google.credentials_path, "/secrets/sa.json");
        assert_eq!(config.persona.name, "Sofía");
        assert_eq!(config.persona.voice_id, "voice-from-file");
        assert!(!config.persona.detects_farewells());
    }

    #[test]
    fn blank_env_values_count_as_unset() {
        let env = env_from(&[("AGENT_ID", "  "), ("OPENAI_API_KEY", "")]);
        let config = load_config_with_env(None, env).unwrap();
        assert!(config.convai.agent_id.is_none());
        assert_eq!(config.openai.api_key, OPENAI_API_KEY_PLACEHOLDER);
    }

    #[test]
    fn unparsable_port_is_ignored() {
        let config = load_config_with_env(None, env_from(&[("PARLA_PORT", "eighty")])).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn unknown_speech_provider_is_rejected() {
        let err = load_config_with_env(None, env_from(&[("PARLA_SPEECH_PROVIDER", "polly")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "PARLA_SPEECH_PROVIDER",
                ..
            }
        ));
    }

    #[test]
    fn blank_persona_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[persona]\ngreeting_text = \"\"").unwrap();
        let err = load_config_with_env(file.path().to_str(), env_from(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Persona(PersonaError::BlankField("greeting_text"))
        ));
    }

    #[test]
    fn example_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config.example.toml");
        let config = load_config_with_env(Some(path), env_from(&[])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.speech.provider, SpeechProvider::ElevenLabs);
        assert_eq!(config.persona, Persona::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let err = load_config_with_env(file.path().to_str(), env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
