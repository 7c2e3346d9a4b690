// # Resource records
//
// Wire-level shape of one DNS record set as read from, and written to, a zone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record type
///
/// Only address and text records take part in reconciliation; everything
/// else read from a zone is carried as `Other` and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Address record (IPv4)
    A,
    /// Text record, used as the ownership marker
    Txt,
    /// Any other record type (SOA, NS, CNAME, ...)
    Other(String),
}

impl RecordType {
    /// The record type as written on the wire
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Txt => "TXT",
            RecordType::Other(other) => other,
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value {
            "A" => RecordType::A,
            "TXT" => RecordType::Txt,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(RecordType::from(value.as_str()))
    }
}

/// One resource record set: every value of one type under one name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Fully-qualified record name (trailing dot)
    pub name: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Time-to-live in seconds
    #[serde(default)]
    pub ttl: u32,

    /// Record values
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl ResourceRecord {
    /// Create an address record
    pub fn a(name: impl Into<String>, ttl: u32, ips: Vec<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            ttl,
            rrdatas: ips,
        }
    }

    /// Create a text record; values are quoted as TXT character strings
    pub fn txt(name: impl Into<String>, ttl: u32, values: &[String]) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::Txt,
            ttl,
            rrdatas: values.iter().map(|v| quote(v)).collect(),
        }
    }
}

/// Wrap a value in double quotes
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value)
}

/// Strip surrounding double quotes from a TXT value
pub fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}
