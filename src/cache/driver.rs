//! Driver identity for the available cache backends.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Closed set of cache backends a process can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Memory,
    File,
    Database,
    Redis,
    Memcached,
    DynamoDb,
}

impl Driver {
    /// Every driver, in declaration order.
    pub const ALL: [Driver; 6] = [
        Driver::Memory,
        Driver::File,
        Driver::Database,
        Driver::Redis,
        Driver::Memcached,
        Driver::DynamoDb,
    ];

    /// Configuration name of the driver.
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Memory => "memory",
            Driver::File => "file",
            Driver::Database => "database",
            Driver::Redis => "redis",
            Driver::Memcached => "memcached",
            Driver::DynamoDb => "dynamodb",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for names outside the driver set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cache driver '{0}'")]
pub struct UnknownDriver(pub String);

impl FromStr for Driver {
    type Err = UnknownDriver;

    /// Case-insensitive; `swing` is accepted as an alias of `memory`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "swing" => Ok(Driver::Memory),
            "file" => Ok(Driver::File),
            "database" => Ok(Driver::Database),
            "redis" => Ok(Driver::Redis),
            "memcached" => Ok(Driver::Memcached),
            "dynamodb" => Ok(Driver::DynamoDb),
            _ => Err(UnknownDriver(s.to_string())),
        }
    }
}
