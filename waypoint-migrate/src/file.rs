//! SQL migration files.
//!
//! A migrations directory holds one or two files per migration:
//!
//! ```text
//! migrations/
//! ├── 20240101120000_create_users.do.sql
//! ├── 20240101120000_create_users.undo.sql
//! └── 20240102090000_add_posts.sql        # no suffix means "do"; irreversible
//! ```
//!
//! `.up`/`.down` are accepted as aliases of `.do`/`.undo`. IDs are
//! `YYYYMMDDHHMMSS` UTC timestamps. Any other `.sql` file in the directory is
//! an error rather than being skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Utc;
use regex_lite::Regex;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{BoxError, MigrateResult, MigrationError, QueryError};
use crate::migration::{parse_migration_name, ActionKind, Migration, MigrationStep, ID_FORMAT};
use crate::source::{Repository, Source};

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(?:\.(do|undo|down|up))?\.sql$").expect("valid file name pattern")
});

/// Runs raw SQL for file migrations.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute one or more statements.
    async fn execute(&self, sql: &str) -> Result<(), BoxError>;
}

/// One direction of a SQL file migration.
pub struct SqlStep {
    path: PathBuf,
    sql: String,
    executor: Arc<dyn SqlExecutor>,
}

impl SqlStep {
    /// File the SQL was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl MigrationStep for SqlStep {
    async fn run(&self, _ctx: ExecutionContext) -> Result<(), BoxError> {
        debug!(path = %self.path.display(), "Executing migration file");
        self.executor
            .execute(&self.sql)
            .await
            .map_err(|source| QueryError::new(self.sql.clone(), source).into())
    }
}

/// A parsed migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFileName {
    /// Migration ID.
    pub id: String,
    /// Description, with underscores replaced by spaces.
    pub description: String,
    /// Direction of the file.
    pub kind: ActionKind,
}

impl MigrationFileName {
    /// Parse a `.sql` file name such as `20240101120000_create_users.do.sql`.
    pub fn parse(name: &str) -> MigrateResult<Self> {
        let caps = FILE_NAME.captures(name).ok_or_else(|| {
            MigrationError::invalid_migration(format!("{} is not a .sql file", name))
        })?;
        let (id, description) = parse_migration_name(&caps[1]).map_err(|_| {
            MigrationError::invalid_migration(format!(
                "{} does not match <YYYYMMDDHHMMSS>_<name>[.do|.undo].sql",
                name
            ))
        })?;
        let kind = match caps.get(2).map(|m| m.as_str()) {
            None | Some("do") | Some("up") => ActionKind::Do,
            Some(_) => ActionKind::Undo,
        };

        Ok(Self {
            id,
            description,
            kind,
        })
    }
}

#[derive(Default)]
struct FilePair {
    description: String,
    forward: Option<PathBuf>,
    backward: Option<PathBuf>,
}

/// A [`Source`] that reads SQL migrations from a directory.
pub struct SqlFileSource {
    dir: PathBuf,
    executor: Arc<dyn SqlExecutor>,
}

impl SqlFileSource {
    /// Create a source for `dir`, running SQL through `executor`.
    pub fn new(dir: impl Into<PathBuf>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            dir: dir.into(),
            executor,
        }
    }

    /// Get the migrations directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn scan(&self) -> MigrateResult<BTreeMap<String, FilePair>> {
        let mut pairs: BTreeMap<String, FilePair> = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().filter(|name| name.ends_with(".sql")) else {
                continue;
            };
            let parsed = MigrationFileName::parse(name)?;

            let pair = pairs.entry(parsed.id.clone()).or_default();
            if pair.description.is_empty() {
                pair.description = parsed.description;
            }

            let slot = match parsed.kind {
                ActionKind::Do => &mut pair.forward,
                ActionKind::Undo => &mut pair.backward,
            };
            if let Some(existing) = slot.as_ref() {
                return Err(MigrationError::invalid_migration(format!(
                    "{} for migration {} is defined by both {} and {}",
                    parsed.kind,
                    parsed.id,
                    existing.display(),
                    entry.path().display()
                )));
            }
            *slot = Some(entry.path());
        }

        Ok(pairs)
    }

    async fn step(&self, path: PathBuf) -> MigrateResult<SqlStep> {
        let sql = tokio::fs::read_to_string(&path).await?;
        Ok(SqlStep {
            path,
            sql,
            executor: self.executor.clone(),
        })
    }
}

#[async_trait]
impl Source for SqlFileSource {
    async fn load(&self) -> MigrateResult<Repository> {
        let mut repository = Repository::new();

        for (id, pair) in self.scan().await? {
            let Some(forward) = pair.forward else {
                return Err(MigrationError::invalid_migration(format!(
                    "migration {} has an undo file but no do file",
                    id
                )));
            };

            let mut migration = Migration::from_step(&id, pair.description, self.step(forward).await?);
            if let Some(backward) = pair.backward {
                migration = migration.with_undo_step(self.step(backward).await?);
            }
            repository.add(migration)?;
        }

        info!(dir = %self.dir.display(), "Loaded {} migration files", repository.len());
        Ok(repository)
    }
}

/// Generate a new migration ID from the current UTC time.
pub fn generate_id() -> String {
    Utc::now().format(ID_FORMAT).to_string()
}

/// Write an empty `<id>_<name>.do.sql` (and `.undo.sql` when `reversible`)
/// into `dir`, creating it if needed. Returns the written paths.
pub async fn create_migration_files(
    dir: impl AsRef<Path>,
    name: &str,
    reversible: bool,
) -> MigrateResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let name = sanitize_name(name);
    if name.is_empty() {
        return Err(MigrationError::invalid_migration(
            "migration name must contain letters or digits",
        ));
    }

    tokio::fs::create_dir_all(dir).await?;

    let base = format!("{}_{}", generate_id(), name);
    let mut files = vec![(dir.join(format!("{}.do.sql", base)), "-- Write your migration here\n")];
    if reversible {
        files.push((
            dir.join(format!("{}.undo.sql", base)),
            "-- Write the statements that revert the migration here\n",
        ));
    }

    let mut written = Vec::with_capacity(files.len());
    for (path, contents) in files {
        if tokio::fs::try_exists(&path).await? {
            return Err(MigrationError::invalid_migration(format!(
                "{} already exists",
                path.display()
            )));
        }
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), "Created migration file");
        written.push(path);
    }

    Ok(written)
}

fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
