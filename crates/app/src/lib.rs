//! Trolley storefront adapters.
//!
//! Concrete collaborators for a [`trolley`] cart store: a GraphQL storefront
//! backend, a REST key-value association store and file-backed client
//! storage, plus the configuration and logging that wire them together.

pub mod associations;
pub mod config;
pub mod context;
pub mod observability;
pub mod storage;
pub mod storefront;
