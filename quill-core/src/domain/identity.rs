//! Identity domain model and the social-login payload
//!
//! An identity links a user to one external account. The payload is the
//! plain data handed over by whichever OAuth client ran the login.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::result::{Error, Result};

/// Supported login providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Twitter,
    Github,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Twitter, Provider::Github];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Twitter => "twitter",
            Provider::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "twitter" => Ok(Provider::Twitter),
            "github" => Ok(Provider::Github),
            other => Err(Error::invalid(
                "provider",
                format!("'{}' is not a supported provider", other),
            )),
        }
    }
}

/// Profile fields reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub urls: Option<JsonValue>,
}

/// OAuth credentials issued for the login
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthCredentials {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Provider-specific extras; `raw_info` is the provider's own user object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthExtra {
    #[serde(default)]
    pub raw_info: JsonValue,
}

/// Authentication payload from a completed social login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub provider: Provider,
    /// The provider's stable account id
    pub uid: String,
    #[serde(default)]
    pub info: AuthInfo,
    #[serde(default)]
    pub credentials: AuthCredentials,
    #[serde(default)]
    pub extra: AuthExtra,
}

impl AuthPayload {
    pub fn new(provider: Provider, uid: impl Into<String>) -> Self {
        Self {
            provider,
            uid: uid.into(),
            info: AuthInfo::default(),
            credentials: AuthCredentials::default(),
            extra: AuthExtra::default(),
        }
    }

    /// Email with surrounding whitespace removed; blank counts as missing
    pub fn email(&self) -> Option<&str> {
        self.info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Normalized fields pulled from `extra.raw_info`
    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile::extract(self)
    }
}

/// Normalized, provider-independent view of the provider profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub username: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl ProviderProfile {
    /// Extract handle, counts and account creation time.
    ///
    /// Missing or malformed values become `None`, counts default to 0.
    pub fn extract(payload: &AuthPayload) -> Self {
        let raw = &payload.extra.raw_info;
        let nickname = payload
            .info
            .nickname
            .clone()
            .filter(|n| !n.trim().is_empty());

        match payload.provider {
            Provider::Twitter => Self {
                username: raw_str(raw, "screen_name").or(nickname),
                followers_count: raw_i64(raw, "followers_count"),
                following_count: raw_i64(raw, "friends_count"),
                created_at: raw_str(raw, "created_at")
                    .and_then(|s| parse_twitter_timestamp(&s)),
            },
            Provider::Github => Self {
                username: raw_str(raw, "login").or(nickname),
                followers_count: raw_i64(raw, "followers"),
                following_count: raw_i64(raw, "following"),
                created_at: raw_str(raw, "created_at")
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
            },
        }
    }
}

/// A per-provider link between a user and an external account
///
/// Serialized output never carries OAuth credentials: `token` and `secret`
/// are skipped and the dump is written without its `credentials` object.
/// The repository stores all three as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: Provider,
    pub uid: String,
    /// Full payload as received, kept for later re-extraction
    #[serde(serialize_with = "serialize_dump_without_credentials")]
    pub auth_data_dump: JsonValue,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn serialize_dump_without_credentials<S>(
    dump: &JsonValue,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match dump {
        JsonValue::Object(map) if map.contains_key("credentials") => {
            let mut redacted = map.clone();
            redacted.remove("credentials");
            redacted.serialize(serializer)
        }
        other => other.serialize(serializer),
    }
}

impl Identity {
    /// Build an identity for `user_id` from a login payload
    pub fn from_payload(user_id: Uuid, payload: &AuthPayload) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            provider: payload.provider,
            uid: payload.uid.clone(),
            auth_data_dump: serde_json::to_value(payload)?,
            token: payload.credentials.token.clone(),
            secret: payload.credentials.secret.clone(),
            created_at: Utc::now(),
        })
    }

    /// Provider name recorded inside the raw dump
    pub fn dumped_provider(&self) -> Option<&str> {
        self.auth_data_dump.get("provider").and_then(JsonValue::as_str)
    }

    /// `extra.raw_info.<key>` from the dump, as a string
    pub fn raw_info_str(&self, key: &str) -> Option<String> {
        self.auth_data_dump
            .get("extra")
            .and_then(|e| e.get("raw_info"))
            .and_then(|raw| raw_str(raw, key))
    }
}

fn raw_str(raw: &JsonValue, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn raw_i64(raw: &JsonValue, key: &str) -> i64 {
    match raw.get(key) {
        Some(JsonValue::Number(n)) => n.as_i64().unwrap_or(0),
        Some(JsonValue::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Twitter's `Wed Jun 19 21:19:43 +0000 2013`, falling back to RFC 3339
fn parse_twitter_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
