//! One-shot relational schema setup for an environment's database.

mod applicator;
mod session;
mod table;

pub use applicator::{ApplyReport, SchemaApplicator, SchemaMigration};
pub use session::{
    MySqlConnector, MySqlSession, SchemaSession, SessionConnector, SqliteConnector, SqliteSession,
    CONNECT_TIMEOUT,
};
pub use table::{example_table, ColumnDef, ColumnType, Dialect, TableSchema, EXAMPLE_TABLE};
