//! Google Cloud Text-to-Speech adapter.
//!
//! Authenticates either with a pre-issued OAuth access token or with a
//! service-account key file. With a key file, every synthesis call signs a
//! short-lived RS256 assertion and exchanges it at the key's `token_uri`, so
//! the client holds no mutable token cache.

use crate::config::GoogleTtsConfig;
use crate::error::VoiceError;
use crate::tts::{check_input_size, SpeechAdapter};
use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SERVICE: &str = "Google Cloud TTS";
const TOKEN_SERVICE: &str = "Google OAuth";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_TTL_SECS: u64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a service-account key file needed to mint tokens.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Clone)]
struct ServiceAccount {
    client_email: String,
    token_uri: String,
    key: EncodingKey,
}

#[derive(Clone)]
enum Credentials {
    AccessToken(String),
    ServiceAccount(ServiceAccount),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken([REDACTED])"),
            Credentials::ServiceAccount(account) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &account.client_email)
                .field("token_uri", &account.token_uri)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Derives a BCP-47 language code from a Google voice name.
///
/// `es-US-Journey-F` becomes `es-US`. Returns `None` when the name does not
/// start with two dash-separated segments.
pub fn language_code_from_voice(voice_name: &str) -> Option<String> {
    let mut parts = voice_name.split('-');
    let language = parts.next().filter(|p| !p.is_empty())?;
    let region = parts.next().filter(|p| !p.is_empty())?;
    Some(format!("{}-{}", language, region))
}

/// Google Cloud Text-to-Speech client.
#[derive(Debug, Clone)]
pub struct GoogleCloudTts {
    http: reqwest::Client,
    base_url: String,
    language_code: Option<String>,
    audio_encoding: String,
    credentials: Credentials,
}

impl GoogleCloudTts {
    /// Creates a client, loading the service-account key if no access token
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Credentials`] if the key file cannot be read or
    /// does not contain a usable RSA private key.
    pub async fn new(http: reqwest::Client, config: &GoogleTtsConfig) -> Result<Self, VoiceError> {
        let credentials = match config
            .access_token
            .as_ref()
            .filter(|token| !token.trim().is_empty())
        {
            Some(token) => Credentials::AccessToken(token.clone()),
            None => {
                let contents = tokio::fs::read_to_string(&config.credentials_path)
                    .await
                    .map_err(|e| {
                        VoiceError::Credentials(format!(
                            "failed to read service-account key {}: {}",
                            config.credentials_path, e
                        ))
                    })?;
                Credentials::ServiceAccount(parse_service_account(&contents)?)
            }
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language_code: config.language_code.clone(),
            audio_encoding: config.audio_encoding.clone(),
            credentials,
        })
    }

    async fn access_token(&self) -> Result<String, VoiceError> {
        let account = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(account) => account,
        };

        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = AssertionClaims {
            iss: &account.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &account.token_uri,
            iat,
            exp: iat + ASSERTION_TTL_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &account.key)
            .map_err(|e| VoiceError::Credentials(format!("failed to sign assertion: {}", e)))?;

        let response = self
            .http
            .post(&account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoiceError::from_response(TOKEN_SERVICE, response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn parse_service_account(contents: &str) -> Result<ServiceAccount, VoiceError> {
    let key: ServiceAccountKey = serde_json::from_str(contents)
        .map_err(|e| VoiceError::Credentials(format!("invalid service-account key: {}", e)))?;
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| VoiceError::Credentials(format!("invalid private key: {}", e)))?;
    Ok(ServiceAccount {
        client_email: key.client_email,
        token_uri: key.token_uri,
        key: encoding_key,
    })
}

#[async_trait]
impl SpeechAdapter for GoogleCloudTts {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        check_input_size(text)?;

        let language_code = match &self.language_code {
            Some(code) => code.clone(),
            None => language_code_from_voice(voice_id).ok_or_else(|| {
                VoiceError::Config(format!(
                    "cannot derive a language code from voice name {:?}",
                    voice_id
                ))
            })?,
        };

        let token = self.access_token().await?;
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &language_code,
                name: voice_id,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.audio_encoding,
            },
        };

        debug!(voice_id, %language_code, chars = text.len(), "requesting speech");

        let response = self
            .http
            .post(format!("{}/v1/text:synthesize", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoiceError::from_response(SERVICE, response).await);
        }

        let body: SynthesizeResponse = response.json().await?;
        base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| VoiceError::MalformedResponse {
                service: SERVICE,
                reason: format!("audioContent is not valid base64: {}", e),
            })
    }
}
