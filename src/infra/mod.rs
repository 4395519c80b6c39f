// Adapters implementing the application ports

pub mod sqlite_source;

#[cfg(feature = "db")]
pub mod libsql_source;
