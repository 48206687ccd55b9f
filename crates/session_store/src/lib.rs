mod error;
mod schema;
mod share;
mod store;
mod upstash;

pub use error::{ShareError, StoreError};
pub use schema::{
    content_key, SessionSnapshot, SharedSessionRecord, RECORD_VERSION, SNAPSHOT_VERSION,
};
pub use share::SharedSessions;
pub use store::{KvStore, MemoryStore};
pub use upstash::{UpstashConfig, UpstashStore, REST_TOKEN_ENV_VAR, REST_URL_ENV_VAR};
