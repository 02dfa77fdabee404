//! Single-writer transactions.
//!
//! A transaction captures a full store snapshot on begin. Commit discards
//! the snapshot (all work was applied in place); rollback restores it.
//! Nesting is rejected: the store has exactly one writer and one
//! transaction scope at a time.

use quiverdb_graph::Snapshot;
use tracing::debug;

use crate::error::{Error, Result};
use crate::GraphDb;

impl GraphDb {
    /// Runs `f` inside a transaction scope.
    ///
    /// On `Ok` the changes stay; on `Err` the store is restored to its
    /// state at entry and the error is passed through.
    ///
    /// ```
    /// # use quiverdb::GraphDb;
    /// let mut db = GraphDb::new();
    /// let result: Result<(), quiverdb::Error> = db.transaction(|db| {
    ///     db.execute("CREATE (n:Person {name: 'Ada'})")?;
    ///     Err(quiverdb::Error::NoActiveTransaction) // any error rolls back
    /// });
    /// assert!(result.is_err());
    /// assert_eq!(db.node_count(), 0);
    /// ```
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut GraphDb) -> Result<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback_transaction()?;
                Err(err)
            }
        }
    }

    /// Begins an explicit transaction. Fails with
    /// [`Error::NestedTransaction`] if one is already active.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.active_snapshot.is_some() {
            return Err(Error::NestedTransaction);
        }
        debug!("transaction begin");
        self.active_snapshot = Some(self.store.snapshot());
        Ok(())
    }

    /// Commits the active transaction. Work was applied in place, so this
    /// only drops the rollback snapshot.
    pub fn commit_transaction(&mut self) -> Result<()> {
        if self.active_snapshot.take().is_none() {
            return Err(Error::NoActiveTransaction);
        }
        debug!("transaction commit");
        Ok(())
    }

    /// Rolls the store back to its state at transaction begin.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        let snapshot: Snapshot = self
            .active_snapshot
            .take()
            .ok_or(Error::NoActiveTransaction)?;
        self.store.restore(snapshot)?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Whether a transaction is currently active.
    pub fn in_transaction(&self) -> bool {
        self.active_snapshot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_initial_state() {
        let mut db = GraphDb::new();
        db.create_node(vec!["Keep".into()], Default::default());

        let result: Result<()> = db.transaction(|db| {
            for _ in 0..10 {
                db.create_node(vec!["Temp".into()], Default::default());
            }
            Err(Error::NoActiveTransaction)
        });

        assert!(result.is_err());
        assert_eq!(db.node_count(), 1);
        assert!(!db.in_transaction());
    }

    #[test]
    fn commit_keeps_changes() {
        let mut db = GraphDb::new();
        db.transaction(|db| {
            db.create_node(vec![], Default::default());
            Ok(())
        })
        .unwrap();
        assert_eq!(db.node_count(), 1);
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let mut db = GraphDb::new();
        db.begin_transaction().unwrap();
        assert!(matches!(
            db.begin_transaction(),
            Err(Error::NestedTransaction)
        ));
        db.rollback_transaction().unwrap();
        assert!(matches!(
            db.commit_transaction(),
            Err(Error::NoActiveTransaction)
        ));
    }
}
