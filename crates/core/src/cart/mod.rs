//! Carts

pub mod errors;
pub mod lines;
pub mod local;
pub mod snapshot;

pub use errors::CartError;
pub use lines::{CartLine, LineInput, LineUpdate, NewCartLine};
pub use local::{LineRollback, LocalCart, QuantityChange};
pub use snapshot::CartSnapshot;
