//! Error taxonomy shared by the arena core and its request handlers.

use std::fmt;

use thiserror::Error;

/// Message sent to the front-end for any failed request.
pub const GENERIC_FAILURE_MESSAGE: &str = "The request could not be completed.";

/// Kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Trainer,
    Battle,
    Modifier,
    Experience,
    QueueEntry,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Trainer => "trainer",
            EntityKind::Battle => "battle",
            EntityKind::Modifier => "modifier",
            EntityKind::Experience => "experience record",
            EntityKind::QueueEntry => "queue entry",
        };
        write!(f, "{}", label)
    }
}

/// Enumerations that can be supplied out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    StatTarget,
    Weapon,
    Rarity,
    Potency,
    ExpTrack,
}

impl fmt::Display for EnumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EnumKind::StatTarget => "stat target",
            EnumKind::Weapon => "weapon",
            EnumKind::Rarity => "rarity tier",
            EnumKind::Potency => "potency tier",
            EnumKind::ExpTrack => "experience track",
        };
        write!(f, "{}", label)
    }
}

/// Coarse classification used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Ownership,
    InvalidEnum,
    /// Not enough unspent experience for a level advance
    Insufficient,
    Internal,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("{kind} {id} does not belong to user {user}")]
    NotOwner { kind: EntityKind, id: u64, user: u64 },

    #[error("invalid {kind}: {value}")]
    InvalidEnum { kind: EnumKind, value: i64 },

    #[error("advancing needs {needed} exp but only {available} is unspent")]
    NotEnoughExp { needed: u64, available: u32 },

    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, GameError>;

impl GameError {
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn invalid(kind: EnumKind, value: impl Into<i64>) -> Self {
        Self::InvalidEnum { kind, value: value.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotOwner { .. } => ErrorKind::Ownership,
            Self::InvalidEnum { .. } => ErrorKind::InvalidEnum,
            Self::NotEnoughExp { .. } => ErrorKind::Insufficient,
            Self::Persistence(_) => ErrorKind::Internal,
        }
    }

    /// Failures that happen during normal play
    pub fn is_expected(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Ownership | ErrorKind::Insufficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = GameError::not_found(EntityKind::Battle, 7);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_expected());
        assert_eq!(err.to_string(), "battle 7 not found");

        let err = GameError::invalid(EnumKind::Weapon, 12);
        assert_eq!(err.kind(), ErrorKind::InvalidEnum);
        assert!(!err.is_expected());

        let err = GameError::NotOwner { kind: EntityKind::Trainer, id: 3, user: 9 };
        assert!(err.is_expected());
        assert_eq!(err.to_string(), "trainer 3 does not belong to user 9");

        let err = GameError::NotEnoughExp { needed: 48, available: 20 };
        assert_eq!(err.kind(), ErrorKind::Insufficient);
        assert!(err.is_expected());
    }
}
