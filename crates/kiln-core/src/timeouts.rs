use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};

/// Upper bounds for every external wait, in seconds when serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "secs")]
    pub build: Duration,
    #[serde(with = "secs")]
    pub connect: Duration,
    #[serde(with = "secs")]
    pub signature: Duration,
    #[serde(with = "secs")]
    pub inclusion: Duration,
    #[serde(with = "secs")]
    pub finalization: Duration,
    #[serde(with = "secs")]
    pub query: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(600),
            connect: Duration::from_secs(30),
            signature: Duration::from_secs(120),
            inclusion: Duration::from_secs(120),
            finalization: Duration::from_secs(300),
            query: Duration::from_secs(30),
        }
    }
}

/// Run `fut` under `limit`, turning an elapsed deadline into a stage timeout
/// and adapter RPC errors into stage-labelled connectivity errors.
pub async fn bounded<T, F>(stage: Stage, limit: Duration, tx_hash: Option<String>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(|e| e.at_stage(stage)),
        Err(_) => Err(Error::Timeout {
            stage,
            after: limit,
            tx_hash,
        }),
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
