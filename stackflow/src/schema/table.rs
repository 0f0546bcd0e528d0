//! Table descriptions and their create-if-absent DDL.

use serde::{Deserialize, Serialize};

/// Name of the table every environment's database starts with.
pub const EXAMPLE_TABLE: &str = "example";

/// SQL flavour a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Aurora MySQL.
    MySql,
    /// Embedded SQLite, for tests and local runs.
    Sqlite,
}

impl Dialect {
    fn quote(self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{ident}`"),
            Self::Sqlite => format!("\"{ident}\""),
        }
    }
}

/// Column types the applicator knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit integer.
    Integer,
    /// Bounded string.
    VarChar(u16),
    /// Date and time.
    DateTime,
}

impl ColumnType {
    fn render(self) -> String {
        match self {
            Self::Integer => "INTEGER".to_string(),
            Self::VarChar(len) => format!("VARCHAR({len})"),
            Self::DateTime => "DATETIME".to_string(),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Auto-incrementing primary key.
    pub primary_key: bool,
    /// Defaults to the current time on insert.
    pub default_now: bool,
}

impl ColumnDef {
    /// A nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default_now: false,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Makes the column the auto-incrementing primary key.
    #[must_use]
    pub fn auto_increment_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Defaults the column to the current time.
    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default_now = true;
        self
    }

    fn render(&self, dialect: Dialect) -> String {
        let mut sql = format!("{} {}", dialect.quote(&self.name), self.column_type.render());

        if self.primary_key {
            match dialect {
                Dialect::MySql => sql.push_str(" NOT NULL AUTO_INCREMENT"),
                Dialect::Sqlite => sql.push_str(" PRIMARY KEY AUTOINCREMENT"),
            }
            return sql;
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.default_now {
            sql.push_str(" DEFAULT CURRENT_TIMESTAMP");
        }
        sql
    }
}

/// A table the database must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates an empty table description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Renders `CREATE TABLE IF NOT EXISTS` for the dialect.
    #[must_use]
    pub fn create_if_absent_sql(&self, dialect: Dialect) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.render(dialect)).collect();

        if dialect == Dialect::MySql {
            if let Some(key) = self.columns.iter().find(|c| c.primary_key) {
                parts.push(format!("PRIMARY KEY ({})", dialect.quote(&key.name)));
            }
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote(&self.name),
            parts.join(", ")
        );
        if dialect == Dialect::MySql {
            sql.push_str(" ENGINE=InnoDB");
        }
        sql
    }
}

/// The `example` table: id, message and creation time.
#[must_use]
pub fn example_table() -> TableSchema {
    TableSchema::new(EXAMPLE_TABLE)
        .with_column(ColumnDef::new("id", ColumnType::Integer).auto_increment_key())
        .with_column(ColumnDef::new("message", ColumnType::VarChar(100)).not_null())
        .with_column(ColumnDef::new("createdAt", ColumnType::DateTime).default_now())
}
