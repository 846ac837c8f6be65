//! Application errors.

use std::io;

use duka_cart::CartError;
use thiserror::Error;

/// Errors a CLI command can end with.
#[derive(Debug, Error)]
pub enum AppError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),

    /// The cart refused the command.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The given line id is not in the cart.
    #[error("no line {0} in the cart")]
    UnknownLine(String),

    /// Printing the cart failed.
    #[error("failed to write output")]
    Output(#[from] io::Error),
}
