//! honoua-scan library
//!
//! Scan sessions fed by barcode decoder output, the Honoua CO₂ API client,
//! and the commands behind the `honoua-scan` binary.

pub mod commands;
pub mod services;
pub mod session;

pub use commands::{check_codes, App, ScanReport};
pub use services::{ApiError, HonouaClient};
pub use session::{parse_decoder_line, DecoderEvent, ScanSession};
