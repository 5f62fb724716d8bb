//! Migrations defined in code. SQL units under `MIGRATIONS_DIR` need no registration.

use async_trait::async_trait;
use mason_sdk::{Db, Error, Field, Migration, MigrationRegistry};

struct MakeUserTable;

#[async_trait]
impl Migration for MakeUserTable {
    async fn up(&self, db: &mut Db) -> Result<(), Error> {
        let fields = [
            ("first_name", Field::char(512)),
            ("last_name", Field::char(512)),
            ("login", Field::login(64)),
            ("login_hash", Field::random_hash(64)),
        ];
        db.create_table("users", fields, true, true).await
    }

    async fn down(&self, db: &mut Db) -> Result<(), Error> {
        db.drop_table("users").await
    }
}

pub fn registry() -> MigrationRegistry {
    MigrationRegistry::new().register("CreateNew", "Migration_0000000002_MakeUserTable", MakeUserTable)
}
