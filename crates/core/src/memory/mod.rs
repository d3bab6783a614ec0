//! In-memory collaborators
//!
//! Process-local implementations of every collaborator trait, for tests and
//! offline demos.

mod associations;
mod carts;
mod identity;
mod storage;

pub use associations::InMemoryAssociationStore;
pub use carts::{BackendOperation, InMemoryCartBackend};
pub use identity::StaticCustomerIdentity;
pub use storage::MemoryClientStorage;
