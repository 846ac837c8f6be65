use duka_cart::Cart;
use duka_cart_app::errors::AppError;
use tracing::info;

use super::settle;

pub(crate) async fn clear(cart: &mut Cart) {
    settle(cart.clear_cart()).await;
}

pub(crate) async fn sync(cart: &mut Cart) -> Result<(), AppError> {
    let outcome = cart.sync_cart().await?;

    info!(
        pushed = outcome.pushed,
        skipped = outcome.skipped,
        failed_pushes = outcome.failed_pushes,
        "cart synced"
    );

    Ok(())
}
