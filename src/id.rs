//! ULID identifiers and the generator port.
//!
//! Every aggregate id and event id in this crate is a 26-character Crockford
//! base32 ULID (§6). `Id` wraps `ulid::Ulid` so the rest of the crate never
//! has to think about the encoding, and `IdGenerator` is the injectable port
//! so tests can supply deterministic, monotonically increasing ids instead of
//! one seeded from the system clock.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const ULID_LENGTH: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Ulid);

impl Id {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn nil() -> Self {
        Self(Ulid::nil())
    }

    /// True when `s` has the shape of a ULID: exactly 26 characters, all
    /// drawn from the Crockford base32 alphabet. Used by the Resolver to
    /// distinguish an id reference from an alias reference without a parse
    /// attempt that could partially match a short alias.
    pub fn looks_like_ulid(s: &str) -> bool {
        s.len() == ULID_LENGTH
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric())
            && Ulid::from_string(s).is_ok()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string())
    }
}

impl FromStr for Id {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Id)
    }
}

/// Injectable ULID source. The default generator seeds from the system clock
/// and entropy; tests substitute one with a fixed seed for reproducibility.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Id;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn generate(&self) -> Id {
        Id(Ulid::new())
    }
}
