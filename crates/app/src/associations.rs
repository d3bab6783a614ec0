//! REST key-value association store.
//!
//! Associations are plain string keys in an Upstash-style Redis REST API:
//! `customer-cart:{customer id}` → cart id, written with an `EX` expiry so
//! every write slides the association's lifetime.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use async_trait::async_trait;
use jiff::SignedDuration;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use trolley::{
    backend::{AssociationStoreError, CartAssociationStore},
    ids::{CartId, CustomerId},
};
use zeroize::Zeroizing;

use crate::config::AssociationConfig;

const KEY_PREFIX: &str = "customer-cart:";

/// Errors raised talking to the key-value REST API.
#[derive(Debug, Error)]
pub enum KvError {
    /// The configured endpoint is not a usable base URL.
    #[error("invalid key-value endpoint: {0}")]
    InvalidUrl(String),

    /// An HTTP transport or decoding error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-2xx status.
    #[error("key-value store responded with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,

        /// Response body, for diagnostics.
        body: String,
    },

    /// The store refused the command.
    #[error("key-value command failed: {0}")]
    Command(String),

    /// The command result was not what the command returns.
    #[error("unexpected key-value result: {0}")]
    UnexpectedResult(String),
}

impl From<KvError> for AssociationStoreError {
    fn from(error: KvError) -> Self {
        match error {
            KvError::Http(_) | KvError::Status { .. } | KvError::Command(_) => {
                Self::Unavailable(error.to_string())
            }
            KvError::InvalidUrl(_) | KvError::UnexpectedResult(_) => Self::Malformed(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,

    error: Option<String>,
}

/// A [`CartAssociationStore`] backed by a Redis REST API.
#[derive(Clone)]
pub struct KvAssociationStore {
    base: Url,
    token: Zeroizing<String>,
    http: Client,
}

impl KvAssociationStore {
    /// Create a store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(config: &AssociationConfig) -> Result<Self, KvError> {
        let base = Url::parse(&config.url).map_err(|error| KvError::InvalidUrl(error.to_string()))?;

        if base.cannot_be_a_base() {
            return Err(KvError::InvalidUrl(config.url.clone()));
        }

        Ok(Self {
            base,
            token: Zeroizing::new(config.token.clone()),
            http: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
        })
    }

    fn key(customer: &CustomerId) -> String {
        format!("{KEY_PREFIX}{customer}")
    }

    /// The URL for a command, one path segment per argument.
    fn command_url(&self, arguments: &[&str]) -> Result<Url, KvError> {
        let mut url = self.base.clone();

        url.path_segments_mut()
            .map_err(|()| KvError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(arguments);

        Ok(url)
    }

    #[tracing::instrument(name = "kv.command", skip(self, arguments), fields(command = arguments.first().copied().unwrap_or_default()))]
    async fn command(&self, arguments: &[&str]) -> Result<Value, KvError> {
        let url = self.command_url(arguments)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(KvError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CommandResponse = response.json().await?;

        if let Some(error) = parsed.error {
            return Err(KvError::Command(error));
        }

        debug!("key-value command succeeded");

        Ok(parsed.result)
    }
}

impl Debug for KvAssociationStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("KvAssociationStore")
            .field("base", &self.base.as_str())
            .field("token", &"**redacted**")
            .finish_non_exhaustive()
    }
}

fn expiry_seconds(ttl: SignedDuration) -> String {
    ttl.as_secs().max(1).to_string()
}

fn cart_from_result(result: Value) -> Result<Option<CartId>, KvError> {
    match result {
        Value::Null => Ok(None),
        Value::String(cart) if !cart.is_empty() => Ok(Some(CartId::new(cart))),
        other => Err(KvError::UnexpectedResult(other.to_string())),
    }
}

#[async_trait]
impl CartAssociationStore for KvAssociationStore {
    async fn get(&self, customer: &CustomerId) -> Result<Option<CartId>, AssociationStoreError> {
        let key = Self::key(customer);
        let result = self.command(&["get", &key]).await?;

        Ok(cart_from_result(result)?)
    }

    async fn set(
        &self,
        customer: &CustomerId,
        cart: &CartId,
        ttl: SignedDuration,
    ) -> Result<(), AssociationStoreError> {
        let key = Self::key(customer);
        let seconds = expiry_seconds(ttl);

        match self
            .command(&["set", &key, cart.as_str(), "EX", &seconds])
            .await?
        {
            Value::String(reply) if reply == "OK" => Ok(()),
            other => Err(KvError::UnexpectedResult(other.to_string()).into()),
        }
    }

    async fn delete(&self, customer: &CustomerId) -> Result<(), AssociationStoreError> {
        let key = Self::key(customer);

        self.command(&["del", &key]).await?;

        Ok(())
    }
}
