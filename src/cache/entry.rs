//! Cache Entry Module
//!
//! Defines the envelope every backend persists: a serialized payload paired
//! with an absolute expiration time, plus the two-part record format used by
//! the file store.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A serialized value and the instant it stops being visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Canonical JSON encoding of the cached value
    pub payload: String,
    /// Absolute expiration time, computed as `now + ttl` at write time
    pub expires_at: DateTime<Utc>,
}

impl Entry {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now.
    ///
    /// A zero TTL produces an entry that is already expired.
    pub fn new(payload: String, ttl: Duration) -> Self {
        Self {
            payload,
            expires_at: expires_after(ttl),
        }
    }

    /// Creates an entry whose expiration lands on a whole Unix second.
    ///
    /// Used by stores that persist seconds. The TTL is rounded up, so a
    /// positive TTL always yields an entry that is live right after the write
    /// and dead no later than one second past `now + ttl`. A zero TTL still
    /// produces an entry that is already expired.
    pub fn persisted(payload: String, ttl: Duration) -> Self {
        let secs = i64::try_from(ceil_secs(ttl)).unwrap_or(i64::MAX);
        let expires_at = DateTime::from_timestamp(unix_now().saturating_add(secs), 0)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            payload,
            expires_at,
        }
    }

    /// Rebuilds an entry from a persisted Unix-seconds expiration.
    ///
    /// Returns None when the timestamp is outside chrono's range.
    pub fn from_unix(payload: String, expires_at: i64) -> Option<Self> {
        Some(Self {
            payload,
            expires_at: DateTime::from_timestamp(expires_at, 0)?,
        })
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Expiration as integer Unix seconds (truncated), the persisted form.
    pub fn expires_at_unix(&self) -> i64 {
        self.expires_at.timestamp()
    }

    // == Record Format ==
    /// Encodes the entry as `"<unix-secs>\n<payload>"`.
    ///
    /// Payloads are compact JSON, which never contains a raw newline.
    pub fn to_record(&self) -> String {
        format!("{}\n{}", self.expires_at_unix(), self.payload)
    }

    /// Parses a record written by [`Entry::to_record`].
    ///
    /// Returns None when the record is malformed.
    pub fn from_record(record: &str) -> Option<Self> {
        let (expires_at, payload) = record.split_once('\n')?;
        let expires_at = expires_at.trim().parse::<i64>().ok()?;
        Self::from_unix(payload.to_string(), expires_at)
    }
}

// == Utility Functions ==
/// Absolute time `ttl` from now, saturating at the maximum representable instant.
pub fn expires_after(ttl: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whole seconds in `ttl`, rounded up. Zero stays zero.
pub fn ceil_secs(ttl: Duration) -> u64 {
    if ttl.subsec_nanos() > 0 {
        ttl.as_secs().saturating_add(1)
    } else {
        ttl.as_secs()
    }
}

/// Returns current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
