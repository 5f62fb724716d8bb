use super::Db;
use crate::error::Error;
use std::ops::{Deref, DerefMut};

/// An open transaction (or savepoint) on a [`Db`]. Statements run through the guard
/// via deref. Dropping it unfinished queues a rollback that the `Db` issues before its
/// next statement.
pub struct Transaction<'a> {
    db: &'a mut Db,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(db: &'a mut Db) -> Self {
        Transaction { db, finished: false }
    }

    pub async fn commit(mut self) -> Result<(), Error> {
        self.db.end_transaction(true).await?;
        self.finished = true;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), Error> {
        self.db.end_transaction(false).await?;
        self.finished = true;
        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = Db;

    fn deref(&self) -> &Db {
        &*self.db
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Db {
        &mut *self.db
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("transaction dropped without commit; rollback queued");
            self.db.queue_rollback();
        }
    }
}
