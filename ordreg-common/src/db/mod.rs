//! Database access for ORDREG services

pub mod init;
pub mod settings;

pub use init::init_database;
