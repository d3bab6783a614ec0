//! Trolley
//!
//! Trolley keeps a storefront client's cart in step with a remote commerce
//! backend. Edits are applied optimistically and confirmed in the background,
//! rapid quantity changes are debounced into a single request, and a signed-in
//! customer's previously associated cart is reconciled with the anonymous one.

pub mod backend;
pub mod cart;
pub mod clock;
pub mod connectivity;
pub mod debounce;
pub mod driver;
pub mod ids;
pub mod memory;
pub mod prelude;
pub mod session;
pub mod settings;
pub mod signal;
pub mod store;
