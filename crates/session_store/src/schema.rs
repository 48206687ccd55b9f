use agent_provider::HistoryMessage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ShareError;

pub const SNAPSHOT_VERSION: u32 = 1;
pub const RECORD_VERSION: u32 = 1;

/// Minimal reproducible state of a shared conversation.
///
/// Canonical form: compact `serde_json` output with fields in declaration
/// order, internally tagged message/part enums, and free-form JSON values
/// (tool arguments and returns) emitted with sorted object keys. Equal
/// snapshots therefore always produce equal bytes and equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSnapshot {
    pub version: u32,
    pub agent_name: String,
    pub show_function_calls: bool,
    pub sidebar_collapsed: bool,
    pub messages: Vec<HistoryMessage>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn new(
        agent_name: impl Into<String>,
        show_function_calls: bool,
        sidebar_collapsed: bool,
        messages: Vec<HistoryMessage>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            agent_name: agent_name.into(),
            show_function_calls,
            sidebar_collapsed,
            messages,
        }
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ShareError> {
        serde_json::to_vec(self).map_err(ShareError::serialize)
    }

    /// Content-addressed key: lowercase hex SHA-256 of the canonical bytes.
    pub fn content_key(&self) -> Result<String, ShareError> {
        Ok(content_key(&self.canonical_bytes()?))
    }
}

#[must_use]
pub fn content_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stored envelope around a snapshot. Only `snapshot` feeds the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedSessionRecord {
    pub version: u32,
    pub key: String,
    pub access_count: u64,
    pub ttl_seconds: u64,
    pub created_at: String,
    pub last_accessed_at: Option<String>,
    pub snapshot: SessionSnapshot,
}

impl SharedSessionRecord {
    #[must_use]
    pub fn v1(
        key: impl Into<String>,
        ttl_seconds: u64,
        created_at: impl Into<String>,
        snapshot: SessionSnapshot,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            key: key.into(),
            access_count: 0,
            ttl_seconds,
            created_at: created_at.into(),
            last_accessed_at: None,
            snapshot,
        }
    }

    pub(crate) fn encode(&self) -> Result<String, ShareError> {
        serde_json::to_string(self).map_err(ShareError::serialize)
    }

    pub(crate) fn decode(key: &str, raw: &str) -> Result<Self, ShareError> {
        let record: Self =
            serde_json::from_str(raw).map_err(|source| ShareError::invalid_record(key, source))?;

        if record.version != RECORD_VERSION {
            return Err(ShareError::UnsupportedVersion {
                key: key.to_string(),
                found: record.version,
                expected: RECORD_VERSION,
            });
        }
        if record.snapshot.version != SNAPSHOT_VERSION {
            return Err(ShareError::UnsupportedVersion {
                key: key.to_string(),
                found: record.snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        if record.key != key {
            return Err(ShareError::KeyMismatch {
                key: key.to_string(),
                found: record.key,
            });
        }

        Ok(record)
    }
}
