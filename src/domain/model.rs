use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("shared"),
            LockMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn readable(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Read => f.write_str("read-only"),
            OpenMode::Write => f.write_str("write-only"),
            OpenMode::ReadWrite => f.write_str("read-write"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadOutcome {
    pub path: PathBuf,
    #[serde(serialize_with = "utf8_or_bytes")]
    pub contents: Vec<u8>,
    #[serde(rename = "waited_ms", serialize_with = "as_millis")]
    pub waited: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldOutcome {
    pub path: PathBuf,
    pub bytes_written: usize,
    #[serde(rename = "held_ms", serialize_with = "as_millis")]
    pub held: Duration,
}

/// Text stays a string; anything else goes out as raw byte values so nothing is
/// replaced.
fn utf8_or_bytes<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(bytes) {
        Ok(text) => s.serialize_str(text),
        Err(_) => s.collect_seq(bytes),
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
