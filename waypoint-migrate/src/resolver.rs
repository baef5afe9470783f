//! Destination policies for the planner.

use std::fmt;

use crate::error::{MigrateResult, MigrationError};
use crate::source::Repository;

/// A position in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Before the first migration; nothing applied.
    Base,
    /// The migration at this catalog index is the last one applied.
    Migration(usize),
}

impl Destination {
    /// Signed offset, with [`Destination::Base`] at -1.
    pub fn offset(self) -> i64 {
        match self {
            Self::Base => -1,
            Self::Migration(idx) => idx as i64,
        }
    }

    /// Catalog index, if this is not the base position.
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Base => None,
            Self::Migration(idx) => Some(idx),
        }
    }
}

impl From<Option<usize>> for Destination {
    fn from(cursor: Option<usize>) -> Self {
        cursor.map_or(Self::Base, Self::Migration)
    }
}

/// Picks where the planner should go from a given cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolver {
    /// The newest migration.
    MostRecent,
    /// The start of the history; every migration gets undone.
    First,
    /// Move `n` positions from the cursor. Negative values undo.
    Step(i64),
    /// A specific migration.
    To(String),
}

impl Resolver {
    /// Resolve against `repository`, with `cursor` being the index of the
    /// last applied migration (`None` when nothing is applied).
    pub fn resolve(
        &self,
        repository: &Repository,
        cursor: Option<usize>,
    ) -> MigrateResult<Destination> {
        let len = repository.list()?.len();

        match self {
            Self::MostRecent => Ok(Destination::Migration(len - 1)),
            Self::First => Ok(Destination::Base),
            Self::Step(0) => cursor
                .map(Destination::Migration)
                .ok_or(MigrationError::StepOutOfBounds { step: 0 }),
            Self::Step(step) => {
                let target = Destination::from(cursor).offset() + step;
                if target < -1 || target >= len as i64 {
                    return Err(MigrationError::StepOutOfBounds { step: *step });
                }
                Ok(if target == -1 {
                    Destination::Base
                } else {
                    Destination::Migration(target as usize)
                })
            }
            Self::To(id) => repository
                .position(id)
                .map(Destination::Migration)
                .ok_or_else(|| MigrationError::MigrationNotListed(id.clone())),
        }
    }
}

impl fmt::Display for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MostRecent => f.write_str("most recent"),
            Self::First => f.write_str("first"),
            Self::Step(step) => write!(f, "step {:+}", step),
            Self::To(id) => write!(f, "to {}", id),
        }
    }
}
