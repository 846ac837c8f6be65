use std::{io, sync::Arc};

use clap::{Parser, Subcommand};
use duka_cart::{
    Cart,
    cart::CartState,
    identity::{Identity, Session},
    persistence::LocalPersistence,
    sync::PendingSync,
};
use duka_cart_app::{
    client::HttpCartClient, config::CartConfig, errors::AppError, render, storage::FileStorage,
};
use tracing::{info, warn};

mod cart;
mod items;

#[derive(Debug, Parser)]
#[command(name = "duka-cart", about = "Duka storefront cart", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) config: CartConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the cart.
    Show,

    /// Add a product to the cart.
    Add(items::AddArgs),

    /// Remove a line.
    Remove(items::RemoveArgs),

    /// Change a line's quantity; zero or less removes it.
    Update(items::UpdateArgs),

    /// Empty the cart.
    Clear,

    /// Reconcile with the server and wait for the result.
    Sync,

    /// Forget the cart after the server consumed it at checkout.
    CheckoutComplete,
}

impl Cli {
    /// Load `.env`, then parse flags and environment.
    pub(crate) fn load() -> Result<Self, clap::Error> {
        duka_cart_app::config::load_dotenv();

        Self::try_parse()
    }

    pub(crate) async fn run(self) -> Result<(), AppError> {
        let session = Arc::new(match &self.config.api.token {
            Some(token) => Session::signed_in(self.config.api.user_id.clone(), token.clone()),
            None => Session::anonymous(),
        });

        let client = HttpCartClient::new(self.config.api.client_config(), session.clone())?;
        let storage = FileStorage::new(&self.config.storage.storage_dir);
        let persistence =
            LocalPersistence::with_key(Arc::new(storage), self.config.storage.storage_key.clone());

        info!(
            authenticated = session.is_authenticated(),
            api_url = %self.config.api.api_url,
            "starting cart"
        );

        let mut cart = Cart::start(
            persistence,
            session,
            Arc::new(client),
            self.config.sync.policy(),
        );

        match self.command {
            Commands::Show => {}
            Commands::Add(args) => items::add(&mut cart, args).await?,
            Commands::Remove(args) => items::remove(&mut cart, &args).await?,
            Commands::Update(args) => items::update(&mut cart, &args).await?,
            Commands::Clear => cart::clear(&mut cart).await,
            Commands::Sync => cart::sync(&mut cart).await?,
            Commands::CheckoutComplete => cart.checkout_completed(),
        }

        let state = cart.shutdown().await;

        print(&state)
    }
}

/// Wait for the remote half of a mutation. A rejection is reported but the
/// local change stands.
async fn settle(pending: PendingSync) {
    if pending.is_local_only() {
        return;
    }

    if let Err(error) = pending.outcome().await {
        warn!(%error, "server did not accept the change; it is kept locally");
    }
}

fn print(state: &CartState) -> Result<(), AppError> {
    render::write_cart(io::stdout().lock(), state)?;

    Ok(())
}
