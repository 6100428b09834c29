use std::fmt;

use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};

/// Length of generated session ids.
///
/// `Alphanumeric` yields `log2(62) > 5.95` bits per character, so a generated id carries more than
/// 190 bits of entropy.
pub const ID_LENGTH: usize = 32;

/// An opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Generate a fresh id from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut rand::thread_rng(), ID_LENGTH))
    }

    /// Adopt an id received from a client. Empty strings are not valid ids.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
