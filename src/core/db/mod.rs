/// Database Module
///
/// The data-access core, organized leaves first:
/// - **Query results** (`query.rs`): materialized rows and the `Scan` destination trait
/// - **Connection capability** (`connection.rs`): the operation set shared by a root
///   connection and an open transaction
/// - **CRUD primitives** (`crud.rs`): mutate, then re-read the canonical row
/// - **Transaction coordinator** (`transaction.rs`): exactly-once commit or rollback
/// - **Facade** (`database.rs`): the pooled entry point applications hold
///
/// ## Error Handling
///
/// Everything crossing this boundary is a classified `Error` from `crate::core`.
pub mod connection;
pub mod crud;
pub mod database;
pub mod query;
pub mod transaction;

pub use connection::*;
pub use crud::*;
pub use database::*;
pub use query::*;
pub use transaction::*;
