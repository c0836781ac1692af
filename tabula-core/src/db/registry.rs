//! Model registration and startup bootstrap.
//!
//! The registry is an explicit value populated once during startup and
//! handed to `bootstrap`, not a process-global. Features declare their
//! models, the host registers them, and bootstrap creates every table
//! before any feature logic runs.

use crate::db::conn::Database;
use crate::db::model::Model;
use crate::error::Result;

/// Ordered collection of the process's models.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model. Order of registration is the order bootstrap
    /// creates tables in.
    pub fn register(&mut self, model: Model) {
        self.models.push(model);
    }

    /// Looks up a registered model by table name.
    pub fn get(&self, table: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.table() == table)
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Creates every registered model's table, in registration order.
    /// Safe to re-run against an existing file. The first failure aborts:
    /// the process must not continue with a partially-initialized schema.
    pub fn bootstrap(&self, db: &Database) -> Result<()> {
        tracing::info!(models = self.models.len(), "bootstrapping model tables");
        for model in &self.models {
            model.create_table(db)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{Column, TableSchema};

    fn sample(table: &str) -> Model {
        Model::new(TableSchema::new(
            table,
            vec![
                Column::integer("id").primary_key().autoincrement(),
                Column::text("name"),
            ],
        ))
    }

    #[test]
    fn bootstrap_creates_all_tables() {
        let db = Database::open_in_memory().unwrap();
        let mut registry = ModelRegistry::new();
        registry.register(sample("alpha"));
        registry.register(sample("beta"));

        registry.bootstrap(&db).unwrap();
        assert!(db.table_exists("alpha").unwrap());
        assert!(db.table_exists("beta").unwrap());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let mut registry = ModelRegistry::new();
        registry.register(sample("alpha"));

        registry.bootstrap(&db).unwrap();
        registry.bootstrap(&db).unwrap();
    }

    #[test]
    fn bootstrap_aborts_on_malformed_schema() {
        let db = Database::open_in_memory().unwrap();
        let mut registry = ModelRegistry::new();
        registry.register(sample("alpha"));
        // No primary key: fails validation during create_table.
        registry.register(Model::new(TableSchema::new(
            "broken",
            vec![Column::text("name")],
        )));
        registry.register(sample("gamma"));

        assert!(registry.bootstrap(&db).is_err());
        assert!(db.table_exists("alpha").unwrap());
        assert!(!db.table_exists("gamma").unwrap());
    }

    #[test]
    fn lookup_by_table_name() {
        let mut registry = ModelRegistry::new();
        registry.register(sample("alpha"));
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }
}
