//! Trolley prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    backend::{
        AssociationStoreError, CartAssociationStore, CartBackend, CartBackendError, ClientStorage,
        CustomerIdentity, IdentityError, StorageError,
    },
    cart::{CartError, CartLine, CartSnapshot, LineInput, LineUpdate, LocalCart, NewCartLine},
    clock::{Clock, ManualClock, SystemClock},
    connectivity::Connectivity,
    driver::{CartSyncDriver, DriverStopped, SessionEvents},
    ids::{CartId, CustomerId, LineId, VariantId},
    memory::{
        BackendOperation, InMemoryAssociationStore, InMemoryCartBackend, MemoryClientStorage,
        StaticCustomerIdentity,
    },
    session::{Customer, CustomerAccessToken, SessionEvent, Visibility},
    settings::SyncSettings,
    signal::{SyncSignal, SyncStatus, SyncTicket, SyncWait},
    store::{
        CartNotice, CartStore, CartView, Collaborators, MutationOutcome, RefreshOutcome,
        RefreshSkip, RetryAction, SyncPhase, SyncResolution,
    },
};
