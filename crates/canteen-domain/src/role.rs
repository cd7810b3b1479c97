//! Principal role types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Kind of principal behind a session.
///
/// Storage format: `i16` (0 = Student, 1 = Manager, 2 = Admin).
/// Wire format (JSON, JWT): `"STUDENT"`, `"MANAGER"`, `"ADMIN"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student = 0,
    Manager = 1,
    Admin = 2,
}

impl Role {
    /// Convert from the stored `u8` value. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Student),
            1 => Some(Self::Manager),
            2 => Some(Self::Admin),
            _ => None,
        }
    }

    /// Convert to the stored `u8` value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Self::Student),
            "MANAGER" => Ok(Self::Manager),
            "ADMIN" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}
