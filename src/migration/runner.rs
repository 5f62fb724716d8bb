use super::source::{discover, scaffold, SqlMigration};
use super::{identifier, Migration, MigrationRegistry};
use crate::db::{Db, Transaction};
use crate::error::Error;
use crate::model::{Field, Record, Schema};
use crate::sql::{Operator, Predicate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const AUDIT_TABLE: &str = "core_migrations";
const INITIAL: &str = "Initial";

fn audit_schema() -> Result<Schema, Error> {
    Ok(Schema::builder(AUDIT_TABLE)
        .field("prefix", Field::char(256))
        .field("name", Field::char(256))
        .field("applied_at", Field::created_at())
        .without_default_fields()
        .build()?)
}

/// Applies pending units of one prefix and records each in `core_migrations`.
/// Concurrent runners on the same prefix are not coordinated.
pub struct Migrator {
    root: PathBuf,
    registry: MigrationRegistry,
    audit: Arc<Schema>,
}

impl Migrator {
    pub fn new(root: impl Into<PathBuf>, registry: MigrationRegistry) -> Result<Self, Error> {
        Ok(Migrator {
            root: root.into(),
            registry,
            audit: Arc::new(audit_schema()?),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, prefix: &str) -> PathBuf {
        if prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(prefix)
        }
    }

    /// Unit names on disk plus those registered in code, sorted.
    pub fn discover(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut names = discover(&self.dir(prefix))?;
        names.extend(self.registry.names(prefix));
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Registered code first, then `<name>.sql` in the prefix directory.
    pub fn resolve(&self, prefix: &str, name: &str) -> Result<Arc<dyn Migration>, Error> {
        if let Some(unit) = self.registry.get(prefix, name) {
            return Ok(unit);
        }
        let path = self.dir(prefix).join(format!("{}.sql", name));
        if path.is_file() {
            return Ok(Arc::new(SqlMigration::load(&path)?));
        }
        Err(Error::MigrationNotFound(identifier(prefix, name)))
    }

    /// Names recorded as applied under `prefix`, in application order.
    pub async fn applied(&self, db: &mut Db, prefix: &str) -> Result<Vec<String>, Error> {
        if !db.has_table(AUDIT_TABLE).await {
            return Ok(Vec::new());
        }
        let query = Record::query(&self.audit)
            .filter(Predicate::equal("prefix", prefix))
            .order_by([("id", "ASC")]);
        let mut names = Vec::new();
        for row in query.select(db).await? {
            let record = Record::from_row(&self.audit, &row)?;
            names.push(record.get_as::<String>("name")?);
        }
        Ok(names)
    }

    /// Discovered minus applied, ascending.
    pub async fn pending(&self, db: &mut Db, prefix: &str) -> Result<Vec<String>, Error> {
        let applied = self.applied(db, prefix).await?;
        Ok(self
            .discover(prefix)?
            .into_iter()
            .filter(|n| !applied.contains(n))
            .collect())
    }

    /// Apply every pending unit of `prefix`, each in its own transaction together with
    /// its audit row. Stops at the first failure. Returns the names applied.
    pub async fn run(&self, db: &mut Db, prefix: &str) -> Result<Vec<String>, Error> {
        if !db.has_table(AUDIT_TABLE).await {
            self.bootstrap(db).await?;
        }
        let mut done = Vec::new();
        for name in self.pending(db, prefix).await? {
            let unit = self.resolve(prefix, &name)?;
            let id = identifier(prefix, &name);
            tracing::info!(unit = %id, "applying migration");
            self.apply(db, prefix, &name, unit.as_ref())
                .await
                .map_err(|e| Error::MigrationApply {
                    unit: id.clone(),
                    source: Box::new(e),
                })?;
            tracing::info!(unit = %id, "migration applied");
            done.push(name);
        }
        Ok(done)
    }

    /// Run `down` for one applied unit and drop its audit row, in one transaction.
    pub async fn revert(&self, db: &mut Db, prefix: &str, name: &str) -> Result<(), Error> {
        let id = identifier(prefix, name);
        if !self.applied(db, prefix).await?.iter().any(|n| n == name) {
            return Err(Error::MigrationNotFound(format!("{} is not applied", id)));
        }
        let unit = self.resolve(prefix, name)?;
        let mut tx = db.begin().await?;
        let outcome = async {
            unit.down(&mut tx).await?;
            let predicate = Predicate::and()
                .set("prefix", Operator::Eq, prefix)
                .set("name", Operator::Eq, name);
            tx.delete(AUDIT_TABLE, &predicate).await.map(|_| ())
        }
        .await;
        finish(tx, outcome)
            .await
            .map_err(|e| Error::MigrationApply {
                unit: id.clone(),
                source: Box::new(e),
            })?;
        tracing::info!(unit = %id, "migration reverted");
        Ok(())
    }

    /// New empty SQL unit for `prefix`; returns its path.
    pub fn scaffold(&self, prefix: &str, name: &str) -> Result<PathBuf, Error> {
        let path = scaffold(&self.dir(prefix), name)?;
        tracing::info!(path = %path.display(), "migration created");
        Ok(path)
    }

    async fn bootstrap(&self, db: &mut Db) -> Result<(), Error> {
        let mut tx = db.begin().await?;
        let outcome = async {
            self.audit.create_table(&mut tx).await?;
            self.record(&mut tx, "", INITIAL).await
        }
        .await;
        finish(tx, outcome).await?;
        tracing::info!(table = AUDIT_TABLE, "migration table created");
        Ok(())
    }

    async fn apply(&self, db: &mut Db, prefix: &str, name: &str, unit: &dyn Migration) -> Result<(), Error> {
        let mut tx = db.begin().await?;
        let outcome = async {
            unit.up(&mut tx).await?;
            self.record(&mut tx, prefix, name).await
        }
        .await;
        finish(tx, outcome).await
    }

    async fn record(&self, db: &mut Db, prefix: &str, name: &str) -> Result<(), Error> {
        let mut audit = Record::new(&self.audit);
        audit.set("prefix", prefix)?;
        audit.set("name", name)?;
        audit.save(db).await
    }

    /// All audit rows of `prefix` as records, oldest first.
    pub async fn history(&self, db: &mut Db, prefix: &str) -> Result<Vec<Record>, Error> {
        let query = Record::query(&self.audit)
            .filter(Predicate::equal("prefix", prefix))
            .order_by([("id", "ASC")]);
        let rows = query.select(db).await?;
        rows.iter().map(|row| Record::from_row(&self.audit, row)).collect()
    }
}

/// Commit on success; on failure roll back and return the original error.
async fn finish(tx: Transaction<'_>, outcome: Result<(), Error>) -> Result<(), Error> {
    match outcome {
        Ok(()) => tx.commit().await,
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
