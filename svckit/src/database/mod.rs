pub mod literal;
pub mod query_builder;
pub mod scylla;

pub use query_builder::{BlankPolicy, GeneratedStatement, QueryBuilder, StatementKind};
pub use self::scylla::{DatabaseConnection, RowStream, ScyllaConnection};
