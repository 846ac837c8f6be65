use clap::Args;
use duka_cart::{
    Cart,
    cart::{LineId, Product},
};
use duka_cart_app::errors::AppError;
use rust_decimal::Decimal;

use super::settle;

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    /// Product id
    #[arg(long)]
    product_id: u64,

    /// Product title
    #[arg(long)]
    title: String,

    /// Unit price
    #[arg(long)]
    price: Decimal,

    /// Units to add
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    quantity: i64,

    /// Size variant; "Default" when omitted
    #[arg(long)]
    size: Option<String>,

    /// Color variant; "Default" when omitted
    #[arg(long)]
    color: Option<String>,

    /// Product image URL
    #[arg(long, default_value = "")]
    image_url: String,

    /// Units in stock
    #[arg(long, default_value_t = 0)]
    stock: u32,

    /// Brand id
    #[arg(long)]
    brand_id: Option<u64>,

    /// Brand name
    #[arg(long, default_value = "")]
    brand_name: String,
}

#[derive(Debug, Args)]
pub(crate) struct RemoveArgs {
    /// Line id, e.g. `7-M-Red`
    line: String,
}

#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    /// Line id, e.g. `7-M-Red`
    line: String,

    /// New quantity
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
}

pub(crate) async fn add(cart: &mut Cart, args: AddArgs) -> Result<(), AppError> {
    let product = Product {
        id: args.product_id,
        title: args.title,
        price: args.price,
        image_url: args.image_url,
        stock_quantity: args.stock,
        brand_id: args.brand_id,
        brand_name: args.brand_name,
    };

    let pending = cart.add_to_cart(
        product,
        args.quantity,
        args.size.as_deref(),
        args.color.as_deref(),
    )?;

    settle(pending).await;

    Ok(())
}

pub(crate) async fn remove(cart: &mut Cart, args: &RemoveArgs) -> Result<(), AppError> {
    let line = known_line(cart, &args.line)?;

    settle(cart.remove_from_cart(&line)).await;

    Ok(())
}

pub(crate) async fn update(cart: &mut Cart, args: &UpdateArgs) -> Result<(), AppError> {
    let line = known_line(cart, &args.line)?;

    settle(cart.update_quantity(&line, args.quantity)).await;

    Ok(())
}

fn known_line(cart: &Cart, raw: &str) -> Result<LineId, AppError> {
    let line = LineId::from(raw);

    if cart.state().item(&line).is_none() {
        return Err(AppError::UnknownLine(raw.to_string()));
    }

    Ok(line)
}
