// Error types for ctx7.
// Covers cache misses, identifier validation, filesystem and decode failures, and API errors.

#![allow(dead_code)]

use std::fmt;

use thiserror::Error;

/// Why a cache read did not produce an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// Nothing stored at the entry path.
    Absent,
    /// Files exist but could not be read or decoded as a complete entry.
    Unreadable,
    /// Entry is older than the requested max age.
    Expired,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::Absent => f.write_str("not cached"),
            MissReason::Unreadable => f.write_str("unreadable entry"),
            MissReason::Expired => f.write_str("expired"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Ctx7Error {
    #[error("cache miss: {0}")]
    CacheMiss(MissReason),

    #[error("invalid library ID: {0} (expected: org/library)")]
    InvalidIdentifier(String),

    #[error("not found in cache: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("Context7 API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("no libraries found for {0:?}")]
    NoResults(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Ctx7Error {
    /// True for the expected "not cached / expired" path.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Ctx7Error::CacheMiss(_))
    }
}

pub type Result<T> = std::result::Result<T, Ctx7Error>;
