//! Meal record status machine and verification channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Lifecycle state of a meal record.
///
/// ```text
/// PENDING --approve--> APPROVED --complete--> COMPLETED
///    \
///     `----deny-----> DENIED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealStatus {
    Pending,
    Approved,
    Denied,
    Completed,
}

/// A manager action against a meal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealTransition {
    Approve,
    Deny,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {transition} a {from} meal record")]
pub struct InvalidTransition {
    pub from: MealStatus,
    pub transition: MealTransition,
}

impl MealStatus {
    /// Statuses that count as "served" for the one-meal-per-day rule.
    pub const SERVED: [MealStatus; 2] = [MealStatus::Approved, MealStatus::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn is_served(self) -> bool {
        Self::SERVED.contains(&self)
    }

    /// Apply a transition, returning the next status or rejecting the move.
    pub fn apply(self, transition: MealTransition) -> Result<MealStatus, InvalidTransition> {
        match (self, transition) {
            (Self::Pending, MealTransition::Approve) => Ok(Self::Approved),
            (Self::Pending, MealTransition::Deny) => Ok(Self::Denied),
            (Self::Approved, MealTransition::Complete) => Ok(Self::Completed),
            (from, transition) => Err(InvalidTransition { from, transition }),
        }
    }
}

impl fmt::Display for MealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "DENIED" => Ok(Self::Denied),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(UnknownVariant::new("meal status", other)),
        }
    }
}

impl fmt::Display for MealTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Complete => "complete",
        })
    }
}

/// Credential channel used to resolve a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    Face,
    IdCard,
    Pin,
    Manual,
}

impl VerificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Face => "FACE",
            Self::IdCard => "ID_CARD",
            Self::Pin => "PIN",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FACE" => Ok(Self::Face),
            "ID_CARD" => Ok(Self::IdCard),
            "PIN" => Ok(Self::Pin),
            "MANUAL" => Ok(Self::Manual),
            other => Err(UnknownVariant::new("verification method", other)),
        }
    }
}
