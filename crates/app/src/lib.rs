//! Duka Cart application pieces: HTTP client, file storage, configuration
//! and logging for the command-line cart.

pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod render;
pub mod storage;
