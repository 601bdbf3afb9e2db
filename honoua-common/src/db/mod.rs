//! Local SQLite database

pub mod init;
pub mod storage;

pub use init::*;
pub use storage::*;
