pub mod backup;
pub mod connection;
pub mod transaction;

pub use backup::{create_backup, list_backup_files, restore_from_backup};
pub use connection::{create_tables, initialize_database, initialize_in_memory_database};
pub use transaction::run_in_transaction;
