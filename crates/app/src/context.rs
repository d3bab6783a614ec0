//! App Context

use std::sync::Arc;

use thiserror::Error;
use trolley::{
    backend::StorageError,
    clock::SystemClock,
    connectivity::Connectivity,
    store::{CartStore, Collaborators},
};

use crate::{
    associations::{KvAssociationStore, KvError},
    config::{AppConfig, ConfigError},
    storage::FileClientStorage,
    storefront::{StorefrontClient, StorefrontError},
};

/// Errors raised while wiring the cart store.
#[derive(Debug, Error)]
pub enum AppInitError {
    /// Configuration could not be turned into runtime settings.
    #[error("invalid configuration")]
    Config(#[source] ConfigError),

    /// The storefront client could not be built.
    #[error("failed to build storefront client")]
    Storefront(#[source] StorefrontError),

    /// The association store client could not be built.
    #[error("failed to build association store client")]
    Associations(#[source] KvError),

    /// The state directory could not be opened.
    #[error("failed to open client storage")]
    Storage(#[source] StorageError),
}

/// A cart store wired to the storefront, the association store and local files.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// The cart store.
    pub store: Arc<CartStore>,

    /// The storefront the store talks to, for resolving customers directly.
    pub storefront: Arc<StorefrontClient>,
}

impl AppContext {
    /// Build the store described by `config`. The store is not mounted yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or a collaborator
    /// cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppInitError> {
        let settings = config.sync_settings().map_err(AppInitError::Config)?;

        let storefront =
            Arc::new(StorefrontClient::new(&config.storefront).map_err(AppInitError::Storefront)?);

        let associations =
            KvAssociationStore::new(&config.associations).map_err(AppInitError::Associations)?;

        let storage =
            FileClientStorage::open(&config.storage.state_dir).map_err(AppInitError::Storage)?;

        let store = CartStore::new(
            Collaborators {
                backend: storefront.clone(),
                associations: Arc::new(associations),
                identity: storefront.clone(),
                storage: Arc::new(storage),
                clock: Arc::new(SystemClock::new()),
                connectivity: Connectivity::online(),
            },
            settings,
        );

        Ok(Self {
            store: Arc::new(store),
            storefront,
        })
    }
}
