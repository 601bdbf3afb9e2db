//! Remote services used by the scanner

pub mod honoua_client;

pub use honoua_client::{ApiError, HonouaClient};
