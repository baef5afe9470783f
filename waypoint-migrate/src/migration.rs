//! Migrations, actions and plans.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

use crate::context::ExecutionContext;
use crate::error::{BoxError, MigrateResult, MigrationError};

/// Layout of migration IDs: a UTC timestamp to the second, such as
/// `20240101120000`. Fixed width keeps lexical and chronological order equal.
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// One direction of a migration.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Run the step.
    async fn run(&self, ctx: ExecutionContext) -> Result<(), BoxError>;
}

struct FnStep<F>(F);

#[async_trait]
impl<F, Fut> MigrationStep for FnStep<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn run(&self, ctx: ExecutionContext) -> Result<(), BoxError> {
        (self.0)(ctx).await
    }
}

/// An identified, ordered unit of forward work with an optional undo.
///
/// IDs order lexicographically, so fixed-width timestamps sort chronologically.
#[derive(Clone)]
pub struct Migration {
    id: String,
    description: String,
    forward: Arc<dyn MigrationStep>,
    backward: Option<Arc<dyn MigrationStep>>,
}

impl Migration {
    /// Create an irreversible migration from an async closure.
    pub fn new<F, Fut>(id: impl Into<String>, description: impl Into<String>, forward: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::from_step(id, description, FnStep(forward))
    }

    /// Create an irreversible migration from a [`MigrationStep`].
    pub fn from_step(
        id: impl Into<String>,
        description: impl Into<String>,
        forward: impl MigrationStep + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            forward: Arc::new(forward),
            backward: None,
        }
    }

    /// Create a migration whose ID and description come from a file name
    /// such as `20250107022114_seed_users.rs`.
    ///
    /// Usually called through [`code_migration!`](crate::code_migration).
    pub fn from_file_name<F, Fut>(path: &str, forward: F) -> MigrateResult<Self>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MigrationError::invalid_migration(format!("invalid path: {}", path)))?;
        let (id, description) = parse_migration_name(stem)?;
        Ok(Self::new(id, description, forward))
    }

    /// Attach an undo closure, making the migration reversible.
    pub fn with_undo<F, Fut>(self, backward: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.with_undo_step(FnStep(backward))
    }

    /// Attach an undo [`MigrationStep`].
    pub fn with_undo_step(mut self, backward: impl MigrationStep + 'static) -> Self {
        self.backward = Some(Arc::new(backward));
        self
    }

    /// Migration ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the migration can be undone.
    pub fn is_reversible(&self) -> bool {
        self.backward.is_some()
    }

    /// Run the step for `kind`, wrapping its error in [`MigrationError::Failed`].
    pub async fn execute(&self, kind: ActionKind, ctx: ExecutionContext) -> MigrateResult<()> {
        let step = match kind {
            ActionKind::Do => &self.forward,
            ActionKind::Undo => self
                .backward
                .as_ref()
                .ok_or_else(|| MigrationError::MigrationNotUndoable(self.id.clone()))?,
        };

        step.run(ctx).await.map_err(|source| MigrationError::Failed {
            id: self.id.clone(),
            kind,
            source,
        })
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.description)
    }
}

/// Split `<timestamp>_<words>` into an ID and a description with spaces.
///
/// The ID must be a valid [`ID_FORMAT`] timestamp.
pub fn parse_migration_name(name: &str) -> MigrateResult<(String, String)> {
    let Some((id, rest)) = name.split_once('_') else {
        return Err(MigrationError::invalid_migration(format!(
            "Invalid migration name format: {}",
            name
        )));
    };

    let is_timestamp = id.len() == 14
        && id.chars().all(|c| c.is_ascii_digit())
        && NaiveDateTime::parse_from_str(id, ID_FORMAT).is_ok();
    if !is_timestamp {
        return Err(MigrationError::invalid_migration(format!(
            "Invalid migration ID (expected a YYYYMMDDHHMMSS timestamp): {}",
            id
        )));
    }

    if rest.is_empty() {
        return Err(MigrationError::invalid_migration(format!(
            "Missing description: {}",
            name
        )));
    }

    Ok((id.to_string(), rest.replace('_', " ")))
}

/// Build a [`Migration`] named after the calling source file.
///
/// The file must be named `<id>_<description>.rs`.
///
/// ```rust,ignore
/// // migrations/20250107022114_seed_users.rs
/// pub fn migration() -> waypoint_migrate::MigrateResult<waypoint_migrate::Migration> {
///     waypoint_migrate::code_migration!(|ctx| async move { seed(ctx).await })
/// }
/// ```
#[macro_export]
macro_rules! code_migration {
    ($forward:expr $(,)?) => {
        $crate::Migration::from_file_name(file!(), $forward)
    };
    ($forward:expr, $backward:expr $(,)?) => {
        $crate::Migration::from_file_name(file!(), $forward).map(|m| m.with_undo($backward))
    };
}

/// Direction of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Apply the migration.
    Do,
    /// Revert the migration.
    Undo,
}

impl ActionKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Do => "do",
            Self::Undo => "undo",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "do" | "up" => Ok(Self::Do),
            "undo" | "down" => Ok(Self::Undo),
            _ => Err(MigrationError::InvalidAction(s.to_string())),
        }
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single Do or Undo bound to one migration.
#[derive(Debug, Clone)]
pub struct Action {
    /// Direction.
    pub kind: ActionKind,
    /// Migration to run.
    pub migration: Arc<Migration>,
}

impl Action {
    /// Create an action.
    pub fn new(kind: ActionKind, migration: Arc<Migration>) -> Self {
        Self { kind, migration }
    }

    /// ID of the migration.
    pub fn id(&self) -> &str {
        self.migration.id()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.migration)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Action", 3)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("id", self.migration.id())?;
        state.serialize_field("description", self.migration.description())?;
        state.end()
    }
}

/// Ordered list of actions. An empty plan means the target is already there.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(transparent)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    /// Create a plan from actions.
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Actions in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over actions.
    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// `(kind, id)` pairs, handy for comparisons and logging.
    pub fn steps(&self) -> Vec<(ActionKind, &str)> {
        self.actions.iter().map(|a| (a.kind, a.id())).collect()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        let apply = self
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Do)
            .count();
        let undo = self.actions.len() - apply;

        let mut parts = Vec::new();
        if apply > 0 {
            parts.push(format!("{} to apply", apply));
        }
        if undo > 0 {
            parts.push(format!("{} to undo", undo));
        }

        if parts.is_empty() {
            "Nothing to do".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{}", action)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: ExecutionContext) -> std::future::Ready<Result<(), BoxError>> {
        std::future::ready(Ok(()))
    }

    #[test]
    fn test_parse_migration_name() {
        let (id, description) = parse_migration_name("20231215120000_create_users").unwrap();
        assert_eq!(id, "20231215120000");
        assert_eq!(description, "create users");
    }

    #[test]
    fn test_parse_migration_name_invalid() {
        assert!(parse_migration_name("invalid").is_err());
        assert!(parse_migration_name("abc_test").is_err());
        assert!(parse_migration_name("123_").is_err());
        assert!(parse_migration_name("10_short_id").is_err());
        assert!(parse_migration_name("202312151200001_too_long").is_err());
        assert!(parse_migration_name("20231315120000_bad_month").is_err());
    }

    #[test]
    fn test_from_file_name() {
        let m = Migration::from_file_name("src/migrations/20250107022114_seed_users.rs", noop)
            .unwrap();
        assert_eq!(m.id(), "20250107022114");
        assert_eq!(m.description(), "seed users");
        assert_eq!(m.to_string(), "20250107022114_seed users");
        assert!(!m.is_reversible());
    }

    #[test]
    fn test_code_migration_macro_needs_named_file() {
        // This file is `migration.rs`, which carries no ID.
        let result = code_migration!(noop);
        assert!(matches!(result, Err(MigrationError::InvalidMigration(_))));
    }

    #[test]
    fn test_action_kind_from_str() {
        assert_eq!("do".parse::<ActionKind>().unwrap(), ActionKind::Do);
        assert_eq!("UP".parse::<ActionKind>().unwrap(), ActionKind::Do);
        assert_eq!("down".parse::<ActionKind>().unwrap(), ActionKind::Undo);
        assert!(matches!(
            "sideways".parse::<ActionKind>(),
            Err(MigrationError::InvalidAction(s)) if s == "sideways"
        ));
    }

    #[tokio::test]
    async fn test_execute_wraps_errors() {
        let m = Migration::new("1", "boom", |_| async { Err::<(), BoxError>("nope".into()) });
        let err = m
            .execute(ActionKind::Do, ExecutionContext::new())
            .await
            .unwrap_err();
        match err {
            MigrationError::Failed { id, kind, source } => {
                assert_eq!(id, "1");
                assert_eq!(kind, ActionKind::Do);
                assert_eq!(source.to_string(), "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = m
            .execute(ActionKind::Undo, ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::MigrationNotUndoable(_)));
    }

    #[test]
    fn test_plan_summary_and_json() {
        let m1 = Arc::new(Migration::new("1", "one", noop).with_undo(noop));
        let m2 = Arc::new(Migration::new("2", "two", noop));
        let plan = Plan::new(vec![
            Action::new(ActionKind::Undo, m1.clone()),
            Action::new(ActionKind::Do, m1),
            Action::new(ActionKind::Do, m2),
        ]);

        assert_eq!(plan.summary(), "2 to apply, 1 to undo");
        assert_eq!(Plan::default().summary(), "Nothing to do");
        assert_eq!(plan.to_string(), "undo 1_one\ndo 1_one\ndo 2_two\n");

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json[0]["kind"], "undo");
        assert_eq!(json[2]["id"], "2");
        assert_eq!(json[2]["description"], "two");
    }
}
