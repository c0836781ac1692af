//! Generic CRUD over a declared schema.
//!
//! A [`Model`] binds a [`TableSchema`] to the standard operation set:
//! table creation, key lookup, conditional queries, insert, update, and
//! delete. Every operation builds a parameterized statement; values are
//! bound, never spliced into SQL text. Column names come only from the
//! validated schema.

use crate::db::conn::Executor;
use crate::db::schema::{Column, TableSchema};
use crate::db::value::{Record, Value};
use crate::error::{Error, Result};

/// Comparison operator for a filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
        }
    }
}

/// Sort direction for [`Filter::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Conjunction of column comparisons, built incrementally. An empty
/// filter matches every row.
///
/// ```
/// use tabula_core::db::{Filter, Op, Order};
///
/// let due = Filter::new()
///     .eq("user_id", 42)
///     .cmp("expires_at", Op::Le, 1_700_000_000)
///     .order_by("expires_at", Order::Asc);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    terms: Vec<(String, Op, Value)>,
    order: Option<(String, Order)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality term, the common case.
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(column, Op::Eq, value)
    }

    /// Adds a comparison term with an explicit operator.
    pub fn cmp(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
        self.terms.push((column.to_string(), op, value.into()));
        self
    }

    /// Orders the result set by one column. Without this, rows come back
    /// in store order.
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.order.is_none()
    }
}

/// Reusable CRUD facade bound to one table through its schema.
///
/// A model is a stateless descriptor: it holds no connection and no row
/// state. Callers pass an [`Executor`] (the [`Database`] itself, or a
/// [`Transaction`] scope) to every operation.
///
/// [`Database`]: crate::db::Database
/// [`Transaction`]: crate::db::Transaction
#[derive(Debug, Clone)]
pub struct Model {
    schema: TableSchema,
}

impl Model {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema }
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Creates the table if it does not exist. Idempotent; a malformed
    /// schema fails here, before any statement reaches the engine.
    pub fn create_table(&self, exec: &impl Executor) -> Result<()> {
        let sql = self.schema.create_sql()?;
        exec.execute(&sql, &[])?;
        tracing::debug!(table = self.table(), "ensured table");
        Ok(())
    }

    /// Looks up the record whose primary key equals `key`.
    pub fn get_by_id(
        &self,
        exec: &impl Executor,
        key: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let sql = format!(
            "{} WHERE {} = ?1",
            self.select_clause(),
            self.primary_key()?.name()
        );
        exec.fetch_one(&sql, &[key.into()])
    }

    /// Every record in the table, in store order.
    pub fn get_all(&self, exec: &impl Executor) -> Result<Vec<Record>> {
        exec.fetch_all(&self.select_clause(), &[])
    }

    /// Records matching every term of the filter. An empty filter is
    /// equivalent to [`Model::get_all`]. A term or ordering that names an
    /// undeclared column fails with [`Error::Schema`].
    pub fn find(&self, exec: &impl Executor, filter: &Filter) -> Result<Vec<Record>> {
        let mut sql = self.select_clause();
        let mut params = Vec::with_capacity(filter.terms.len());

        if !filter.terms.is_empty() {
            let mut clauses = Vec::with_capacity(filter.terms.len());
            for (column, op, value) in &filter.terms {
                self.check_column(column)?;
                clauses.push(format!("{} {} ?{}", column, op.as_sql(), params.len() + 1));
                params.push(value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some((column, order)) = &filter.order {
            self.check_column(column)?;
            sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
        }

        exec.fetch_all(&sql, &params)
    }

    /// Inserts a new row and returns its primary-key value: the caller's
    /// if `data` carries one, the engine-assigned rowid otherwise. An
    /// empty `data` inserts a row of defaults.
    pub fn create(&self, exec: &impl Executor, data: &Record) -> Result<Value> {
        for column in data.columns() {
            self.check_column(column)?;
        }
        let pk = self.primary_key()?;

        let result = if data.is_empty() {
            exec.execute(&format!("INSERT INTO {} DEFAULT VALUES", self.table()), &[])?
        } else {
            let columns: Vec<&str> = data.columns().collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table(),
                columns.join(", "),
                placeholders.join(", ")
            );
            let params: Vec<Value> = data.iter().map(|(_, value)| value.clone()).collect();
            exec.execute(&sql, &params)?
        };

        match data.get(pk.name()) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Ok(Value::Integer(result.last_insert_id)),
        }
    }

    /// Applies the column changes in `data` to the row identified by
    /// `key`, returning the affected-row count. A missing key is a 0-row
    /// no-op, not an error, so updates stay idempotent. The primary key
    /// itself cannot be changed.
    pub fn update(
        &self,
        exec: &impl Executor,
        key: impl Into<Value>,
        data: &Record,
    ) -> Result<usize> {
        let pk = self.primary_key()?;
        if data.is_empty() {
            return Err(Error::Schema(format!(
                "update on {} carries no columns",
                self.table()
            )));
        }
        if data.contains(pk.name()) {
            return Err(Error::Schema(format!(
                "primary key {}.{} cannot be updated",
                self.table(),
                pk.name()
            )));
        }
        for column in data.columns() {
            self.check_column(column)?;
        }

        let assignments: Vec<String> = data
            .columns()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            self.table(),
            assignments.join(", "),
            pk.name(),
            data.len() + 1
        );

        let mut params: Vec<Value> = data.iter().map(|(_, value)| value.clone()).collect();
        params.push(key.into());

        Ok(exec.execute(&sql, &params)?.rows_affected)
    }

    /// Removes the row identified by `key`, returning the affected-row
    /// count. Deleting a missing key is not an error.
    pub fn delete(&self, exec: &impl Executor, key: impl Into<Value>) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            self.table(),
            self.primary_key()?.name()
        );
        Ok(exec.execute(&sql, &[key.into()])?.rows_affected)
    }

    // Selecting the schema's columns explicitly (rather than *) pins the
    // record shape to the descriptor: exactly the declared columns, in
    // declared order, null where absent.
    fn select_clause(&self) -> String {
        format!("SELECT {} FROM {}", self.schema.column_list(), self.table())
    }

    fn primary_key(&self) -> Result<&Column> {
        self.schema.primary_key().ok_or_else(|| {
            Error::Schema(format!("table {} declares no primary key", self.table()))
        })
    }

    fn check_column(&self, name: &str) -> Result<()> {
        if self.schema.has_column(name) {
            Ok(())
        } else {
            Err(Error::Schema(format!(
                "column {} is not declared on table {}",
                name,
                self.table()
            )))
        }
    }
}
