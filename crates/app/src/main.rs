//! Duka Cart CLI

use std::{error::Error, process::ExitCode};

use duka_cart_app::observability;
use tracing::error;

mod cli;

#[tokio::main]
#[expect(
    clippy::print_stderr,
    reason = "Errors are reported to the user before logging is up"
)]
async fn main() -> ExitCode {
    let cli = match cli::Cli::load() {
        Ok(cli) => cli,
        Err(error) => {
            // Help and version requests land here too.
            let _printed = error.print();
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(error) = observability::init(&cli.config.logging) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "command failed");
            eprintln!("{}", report(&error));
            ExitCode::FAILURE
        }
    }
}

fn report(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
