//! Redis-over-HTTP store speaking the Upstash REST command protocol.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::store::KvStore;

pub const REST_URL_ENV_VAR: &str = "UPSTASH_REDIS_REST_URL";
pub const REST_TOKEN_ENV_VAR: &str = "UPSTASH_REDIS_REST_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct UpstashConfig {
    pub rest_url: String,
    pub rest_token: String,
    pub timeout: Option<Duration>,
}

impl UpstashConfig {
    #[must_use]
    pub fn new(rest_url: impl Into<String>, rest_token: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into(),
            rest_token: rest_token.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads the REST endpoint and token from the process environment.
    ///
    /// Returns `None` unless both variables are set to non-empty values.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Some(Self::new(
            non_empty(REST_URL_ENV_VAR)?,
            non_empty(REST_TOKEN_ENV_VAR)?,
        ))
    }
}

impl fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("rest_url", &self.rest_url)
            .field("rest_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking [`KvStore`] over the Upstash REST API.
///
/// Calls block the current thread on a private current-thread runtime and
/// must not be made from inside an async task.
#[derive(Debug)]
pub struct UpstashStore {
    http: Client,
    config: UpstashConfig,
    runtime: tokio::runtime::Runtime,
}

impl UpstashStore {
    pub fn new(config: UpstashConfig) -> Result<Self, StoreError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;

        Ok(Self {
            http,
            config,
            runtime,
        })
    }

    fn endpoint(&self) -> &str {
        self.config.rest_url.trim_end_matches('/')
    }

    fn command(&self, args: Value) -> Result<Value, StoreError> {
        let verb = args
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let request = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.rest_token)
            .json(&args);

        self.runtime.block_on(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            tracing::debug!(command = %verb, status, "upstash reply");
            parse_reply(status, &body)
        })
    }
}

impl KvStore for UpstashStore {
    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        match self.command(json!(["SET", key, value, "EX", ttl_seconds]))? {
            Value::String(reply) if reply == "OK" => Ok(()),
            other => Err(StoreError::Protocol(format!("SET replied {other}"))),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(json!(["GET", key]))? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(StoreError::Protocol(format!("GET replied {other}"))),
        }
    }

    fn size(&self) -> Result<u64, StoreError> {
        let reply = self.command(json!(["DBSIZE"]))?;
        reply
            .as_u64()
            .ok_or_else(|| StoreError::Protocol(format!("DBSIZE replied {reply}")))
    }
}

fn parse_reply(status: u16, body: &str) -> Result<Value, StoreError> {
    let success = (200..300).contains(&status);
    match serde_json::from_str::<UpstashReply>(body) {
        Ok(UpstashReply {
            error: Some(message),
            ..
        }) => {
            if success {
                Err(StoreError::Command(message))
            } else {
                Err(StoreError::Status { status, message })
            }
        }
        Ok(UpstashReply { result, error: None }) if success => Ok(result.unwrap_or(Value::Null)),
        _ if !success => Err(StoreError::Status {
            status,
            message: if body.trim().is_empty() {
                "request failed".to_string()
            } else {
                body.trim().to_string()
            },
        }),
        _ => Err(StoreError::Protocol(format!("unparseable reply body: {body}"))),
    }
}
