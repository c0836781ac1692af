//! Declarative table schemas.
//!
//! A [`TableSchema`] is the single source of truth for a model's table: it
//! generates the `CREATE TABLE` statement and tells the CRUD layer which
//! columns exist. Column names end up interpolated into statement text, so
//! they are restricted to identifier characters and checked before any DDL
//! is issued; values always travel as bound parameters.

use crate::db::value::Value;
use crate::error::{Error, Result};

/// Column type affinity, the closed set a column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// A single column declaration, built fluently:
///
/// ```
/// use tabula_core::db::Column;
///
/// let id = Column::integer("id").primary_key().autoincrement();
/// let name = Column::text("name").not_null().unique();
/// let score = Column::integer("score").default_value(0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    ty: ColumnType,
    primary_key: bool,
    autoincrement: bool,
    not_null: bool,
    unique: bool,
    default: Option<Value>,
}

impl Column {
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            primary_key: false,
            autoincrement: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn real(name: &str) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn blob(name: &str) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as engine-assigned. Implies `primary_key`.
    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.ty
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.as_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.autoincrement {
            sql.push_str(" AUTOINCREMENT");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&literal(default));
        }
        sql
    }
}

/// Renders a default value as an SQL literal. Only defaults go through
/// this path; runtime values are always bound as parameters.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for byte in bytes {
                hex.push_str(&format!("{byte:02X}"));
            }
            hex.push('\'');
            hex
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ordered column declarations for one table.
///
/// Declared once per model and immutable afterwards. Validation runs before
/// table creation rather than on every statement build.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table: String,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(table: &str, columns: Vec<Column>) -> Self {
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The declared primary-key column, if exactly one was marked.
    pub fn primary_key(&self) -> Option<&Column> {
        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(pk), None) => Some(pk),
            _ => None,
        }
    }

    /// Checks the descriptor: identifier-safe names, no duplicates, exactly
    /// one primary key, autoincrement only on an integer primary key.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.table) {
            return Err(Error::Schema(format!(
                "invalid table name: {:?}",
                self.table
            )));
        }
        if self.columns.is_empty() {
            return Err(Error::Schema(format!(
                "table {} declares no columns",
                self.table
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if !is_identifier(&column.name) {
                return Err(Error::Schema(format!(
                    "invalid column name on table {}: {:?}",
                    self.table, column.name
                )));
            }
            let duplicate = self.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name));
            if duplicate {
                return Err(Error::Schema(format!(
                    "duplicate column on table {}: {}",
                    self.table, column.name
                )));
            }
            if column.autoincrement && column.ty != ColumnType::Integer {
                return Err(Error::Schema(format!(
                    "autoincrement column {}.{} must be INTEGER",
                    self.table, column.name
                )));
            }
        }
        let key_count = self.columns.iter().filter(|c| c.primary_key).count();
        match key_count {
            1 => Ok(()),
            0 => Err(Error::Schema(format!(
                "table {} declares no primary key",
                self.table
            ))),
            n => Err(Error::Schema(format!(
                "table {} declares {} primary keys",
                self.table, n
            ))),
        }
    }

    /// The `CREATE TABLE IF NOT EXISTS` statement for this schema.
    /// Validates first, so a malformed descriptor never reaches the engine.
    pub fn create_sql(&self) -> Result<String> {
        self.validate()?;
        let columns: Vec<String> = self.columns.iter().map(Column::to_sql).collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        ))
    }

    /// Comma-separated column list for SELECT statements, in declared order.
    pub(crate) fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
