//! Duka Cart
//!
//! Client-side shopping cart engine for a multi-brand storefront. Keeps an
//! authoritative local cart that survives restarts and outages, and merges
//! it with the server-held cart of a signed-in shopper.

pub mod cart;
pub mod errors;
pub mod facade;
pub mod identity;
pub mod ids;
pub mod persistence;
pub mod reconcile;
pub mod remote;
pub mod sync;

pub use errors::CartError;
pub use facade::Cart;
