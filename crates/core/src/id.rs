// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions shared by every entity in the data model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for truncating identifiers to a short prefix (used for `#N`-style
/// display and for log lines that shouldn't spell out a full UUID).
pub trait ShortId {
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`
/// implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id (UUID v4).
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates unique identifiers. Production code uses [`UuidIdGen`]; tests
/// use [`SequentialIdGen`] for deterministic, readable ids.
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Classify a raw identifier string as one of the four forms a session or
/// task reference may take, per the reference-resolution rule shared by
/// the Session Registry and the MCP Tool Registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefForm<'a> {
    /// `#12` — a per-project ordinal.
    Ordinal(u64),
    /// A bare decimal integer (treated the same as an ordinal).
    Integer(u64),
    /// A full UUID.
    Uuid(&'a str),
    /// A prefix of a UUID, at least 4 hex characters.
    UuidPrefix(&'a str),
}

pub fn classify_ref(raw: &str) -> Option<RefForm<'_>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix('#') {
        return rest.parse::<u64>().ok().map(RefForm::Ordinal);
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Some(RefForm::Integer(n));
    }
    if uuid::Uuid::parse_str(raw).is_ok() {
        return Some(RefForm::Uuid(raw));
    }
    let is_hex_prefix = raw.len() >= 4
        && raw.len() < 36
        && raw.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    if is_hex_prefix {
        return Some(RefForm::UuidPrefix(raw));
    }
    None
}
