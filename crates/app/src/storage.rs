//! File-backed client storage.
//!
//! The active cart id and the customer token live in a single JSON document,
//! rewritten through a temporary file so a crash never leaves half a document
//! behind.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trolley::{
    backend::{ClientStorage, StorageError},
    ids::CartId,
    session::CustomerAccessToken,
};
use zeroize::Zeroize;

const FILE_NAME: &str = "session.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cart_id: Option<CartId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_token: Option<String>,
}

impl Drop for Document {
    fn drop(&mut self) {
        self.customer_token.zeroize();
    }
}

/// A [`ClientStorage`] persisted as JSON in a directory.
#[derive(Debug)]
pub struct FileClientStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileClientStorage {
    /// Storage in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();

        fs::create_dir_all(dir)?;

        Ok(Self {
            path: dir.join(FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    /// Path of the JSON document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Document, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(error) => return Err(error.into()),
        };

        serde_json::from_slice(&bytes).map_err(|error| StorageError::Corrupt(error.to_string()))
    }

    fn write(&self, document: &Document) -> Result<(), StorageError> {
        let mut bytes =
            serde_json::to_vec_pretty(document).map_err(|error| StorageError::Corrupt(error.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        let written = fs::write(&staging, &bytes).and_then(|()| fs::rename(&staging, &self.path));

        bytes.zeroize();

        Ok(written?)
    }

    fn update(&self, change: impl FnOnce(&mut Document)) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut document = self.read()?;

        change(&mut document);

        self.write(&document)
    }
}

impl ClientStorage for FileClientStorage {
    fn cart_id(&self) -> Result<Option<CartId>, StorageError> {
        let _guard = self.lock.lock();

        Ok(self.read()?.cart_id.take())
    }

    fn set_cart_id(&self, cart: &CartId) -> Result<(), StorageError> {
        self.update(|document| document.cart_id = Some(cart.clone()))
    }

    fn clear_cart_id(&self) -> Result<(), StorageError> {
        self.update(|document| document.cart_id = None)
    }

    fn customer_token(&self) -> Result<Option<CustomerAccessToken>, StorageError> {
        let _guard = self.lock.lock();

        Ok(self
            .read()?
            .customer_token
            .as_deref()
            .map(CustomerAccessToken::new))
    }

    fn set_customer_token(&self, token: &CustomerAccessToken) -> Result<(), StorageError> {
        self.update(|document| {
            document.customer_token.zeroize();
            document.customer_token = Some(token.expose().to_string());
        })
    }

    fn clear_customer_token(&self) -> Result<(), StorageError> {
        self.update(|document| {
            document.customer_token.zeroize();
            document.customer_token = None;
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn values_survive_reopening() -> TestResult {
        let dir = tempfile::tempdir()?;

        {
            let storage = FileClientStorage::open(dir.path())?;

            storage.set_cart_id(&CartId::new("gid://shopify/Cart/c1"))?;
            storage.set_customer_token(&CustomerAccessToken::new("token-1"))?;
        }

        let storage = FileClientStorage::open(dir.path())?;

        assert_eq!(storage.cart_id()?, Some(CartId::new("gid://shopify/Cart/c1")));
        assert_eq!(
            storage.customer_token()?.as_ref().map(CustomerAccessToken::expose),
            Some("token-1")
        );

        Ok(())
    }

    #[test]
    fn clearing_one_value_keeps_the_other() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileClientStorage::open(dir.path())?;

        storage.set_cart_id(&CartId::new("c1"))?;
        storage.set_customer_token(&CustomerAccessToken::new("token-1"))?;
        storage.clear_customer_token()?;

        assert_eq!(storage.cart_id()?, Some(CartId::new("c1")));
        assert!(storage.customer_token()?.is_none());

        storage.clear_cart_id()?;

        assert_eq!(storage.cart_id()?, None);

        Ok(())
    }

    #[test]
    fn missing_directory_is_created() -> TestResult {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("state").join("trolley");

        let storage = FileClientStorage::open(&nested)?;

        assert_eq!(storage.cart_id()?, None);
        assert!(nested.is_dir());

        Ok(())
    }

    #[test]
    fn corrupt_document_is_reported() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileClientStorage::open(dir.path())?;

        fs::write(storage.path(), b"{ not json")?;

        assert!(
            matches!(storage.cart_id(), Err(StorageError::Corrupt(_))),
            "corrupt file should not read as empty"
        );

        Ok(())
    }
}
