//! Cart rendering for the terminal.

use std::io;

use duka_cart::cart::CartState;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};

/// Write `state` as a table followed by its totals.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_cart(mut out: impl io::Write, state: &CartState) -> io::Result<()> {
    if state.is_empty() {
        writeln!(out, "cart is empty ({})", state.sync_status())?;
        return Ok(());
    }

    let mut builder = Builder::default();

    builder.push_record(["Line", "Item", "Brand", "Qty", "Unit Price", "Total", "Server Id"]);

    for item in state.items() {
        builder.push_record([
            item.id.to_string(),
            item.title.clone(),
            item.brand_name.clone(),
            item.quantity.to_string(),
            item.unit_price.to_string(),
            item.line_total().to_string(),
            item.remote_item_id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(3..6), Alignment::right());

    writeln!(out, "{table}")?;
    writeln!(
        out,
        "{} item(s), total {} ({})",
        state.total_item_count(),
        state.total_amount(),
        state.sync_status()
    )?;

    if let Some(error) = state.last_error() {
        writeln!(out, "last sync error: {error}")?;
    }

    Ok(())
}
