use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::types::ProviderId;

/// Where the data in a [`TypedResult`] came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataSource {
    /// Fetched (or remembered from a fetch) from this provider.
    Provider(ProviderId),
    /// Produced by the synthetic fallback generator.
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &str {
        match self {
            DataSource::Provider(id) => id.as_ref(),
            DataSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Freshness of the data in a [`TypedResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultStatus {
    /// Fresh from the provider.
    Success,
    /// Last known good value from an earlier successful fetch.
    Cached,
    /// Synthetic data; render with a stale/synthetic indicator.
    Degraded,
}

/// Envelope returned by every public fetch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedResult<T> {
    pub data: T,
    pub source: DataSource,
    pub status: ResultStatus,
    pub timestamp: DateTime<Utc>,
}

impl<T> TypedResult<T> {
    /// Fresh data from a provider.
    pub fn live(data: T, provider: ProviderId) -> Self {
        Self {
            data,
            source: DataSource::Provider(provider),
            status: ResultStatus::Success,
            timestamp: Utc::now(),
        }
    }

    /// Synthetic data from the fallback generator.
    pub fn degraded(data: T) -> Self {
        Self {
            data,
            source: DataSource::Fallback,
            status: ResultStatus::Degraded,
            timestamp: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ResultStatus::Degraded
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }

    /// Transform the data, keeping source, status and timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TypedResult<U> {
        TypedResult {
            data: f(self.data),
            source: self.source,
            status: self.status,
            timestamp: self.timestamp,
        }
    }

    /// Fallible [`map`](Self::map).
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<TypedResult<U>, E> {
        Ok(TypedResult {
            data: f(self.data)?,
            source: self.source,
            status: self.status,
            timestamp: self.timestamp,
        })
    }
}
