//! Storefront GraphQL client
//!
//! [`StorefrontClient`] is both the [`CartBackend`] and the
//! [`CustomerIdentity`] of a storefront API in the Shopify Storefront mould:
//! one GraphQL endpoint, a public access token header, and mutations that
//! answer with `{ cart, userErrors }`.

mod errors;
mod responses;

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{Span, debug};
use trolley::{
    backend::{CartBackend, CartBackendError, CustomerIdentity, IdentityError},
    cart::{CartSnapshot, LineInput, LineUpdate},
    ids::{CartId, LineId},
    session::{Customer, CustomerAccessToken},
};
use zeroize::Zeroizing;

use crate::config::StorefrontConfig;

pub use errors::StorefrontError;

use responses::{
    BuyerIdentityData, CartCreateData, CartLinesAddData, CartLinesRemoveData, CartLinesUpdateData,
    CartQuery, CustomerQuery, GraphQlResponse,
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";

const CART: &str = concat!(
    include_str!("queries/cart.graphql"),
    include_str!("queries/cart_fields.graphql"),
);

const CART_CREATE: &str = concat!(
    include_str!("queries/cart_create.graphql"),
    include_str!("queries/cart_fields.graphql"),
    include_str!("queries/user_errors.graphql"),
);

const CART_LINES_ADD: &str = concat!(
    include_str!("queries/cart_lines_add.graphql"),
    include_str!("queries/cart_fields.graphql"),
    include_str!("queries/user_errors.graphql"),
);

const CART_LINES_UPDATE: &str = concat!(
    include_str!("queries/cart_lines_update.graphql"),
    include_str!("queries/cart_fields.graphql"),
    include_str!("queries/user_errors.graphql"),
);

const CART_LINES_REMOVE: &str = concat!(
    include_str!("queries/cart_lines_remove.graphql"),
    include_str!("queries/cart_fields.graphql"),
    include_str!("queries/user_errors.graphql"),
);

const CART_BUYER_IDENTITY_UPDATE: &str = concat!(
    include_str!("queries/cart_buyer_identity_update.graphql"),
    include_str!("queries/user_errors.graphql"),
);

const CUSTOMER: &str = include_str!("queries/customer.graphql");

/// HTTP client for the storefront GraphQL API.
#[derive(Clone)]
pub struct StorefrontClient {
    endpoint: String,
    access_token: Zeroizing<String>,
    http: Client,
}

impl StorefrontClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig) -> Result<Self, StorefrontError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.url.clone(),
            access_token: Zeroizing::new(config.token.clone()),
            http,
        })
    }

    #[tracing::instrument(
        name = "storefront.request",
        skip(self, query, variables),
        fields(status = tracing::field::Empty)
    )]
    async fn execute<T>(
        &self,
        operation: &'static str,
        query: &'static str,
        variables: Value,
    ) -> Result<T, StorefrontError>
    where
        T: DeserializeOwned,
    {
        let body = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, self.access_token.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        Span::current().record("status", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(StorefrontError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphQlResponse<T> = response.json().await?;

        debug!("storefront request succeeded");

        parsed.into_data()
    }
}

impl Debug for StorefrontClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StorefrontClient")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"**redacted**")
            .finish_non_exhaustive()
    }
}

fn line_inputs(lines: &[LineInput]) -> Value {
    lines
        .iter()
        .map(|line| {
            json!({
                "merchandiseId": line.variant_id.as_str(),
                "quantity": line.quantity,
            })
        })
        .collect()
}

#[async_trait]
impl CartBackend for StorefrontClient {
    async fn create(&self, lines: Vec<LineInput>) -> Result<CartSnapshot, CartBackendError> {
        let data: CartCreateData = self
            .execute("CartCreate", CART_CREATE, json!({ "lines": line_inputs(&lines) }))
            .await?;

        Ok(data.cart_create.into_snapshot()?)
    }

    async fn fetch(&self, cart: &CartId) -> Result<Option<CartSnapshot>, CartBackendError> {
        let data: CartQuery = self
            .execute("Cart", CART, json!({ "cartId": cart.as_str() }))
            .await?;

        Ok(data.cart.map(|cart| cart.into_snapshot()).transpose()?)
    }

    async fn add_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineInput>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let data: CartLinesAddData = self
            .execute(
                "CartLinesAdd",
                CART_LINES_ADD,
                json!({ "cartId": cart.as_str(), "lines": line_inputs(&lines) }),
            )
            .await?;

        Ok(data.cart_lines_add.into_snapshot()?)
    }

    async fn update_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineUpdate>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let lines: Value = lines
            .iter()
            .map(|line| json!({ "id": line.line_id.as_str(), "quantity": line.quantity }))
            .collect();

        let data: CartLinesUpdateData = self
            .execute(
                "CartLinesUpdate",
                CART_LINES_UPDATE,
                json!({ "cartId": cart.as_str(), "lines": lines }),
            )
            .await?;

        Ok(data.cart_lines_update.into_snapshot()?)
    }

    async fn remove_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineId>,
    ) -> Result<CartSnapshot, CartBackendError> {
        let line_ids: Vec<&str> = lines.iter().map(LineId::as_str).collect();

        let data: CartLinesRemoveData = self
            .execute(
                "CartLinesRemove",
                CART_LINES_REMOVE,
                json!({ "cartId": cart.as_str(), "lineIds": line_ids }),
            )
            .await?;

        Ok(data.cart_lines_remove.into_snapshot()?)
    }

    async fn update_buyer_identity(
        &self,
        cart: &CartId,
        token: &CustomerAccessToken,
    ) -> Result<(), CartBackendError> {
        let data: BuyerIdentityData = self
            .execute(
                "CartBuyerIdentityUpdate",
                CART_BUYER_IDENTITY_UPDATE,
                json!({
                    "cartId": cart.as_str(),
                    "buyerIdentity": { "customerAccessToken": token.expose() },
                }),
            )
            .await?;

        Ok(data.cart_buyer_identity_update.into_result()?)
    }
}

#[async_trait]
impl CustomerIdentity for StorefrontClient {
    async fn resolve(
        &self,
        token: &CustomerAccessToken,
    ) -> Result<Option<Customer>, IdentityError> {
        let data: CustomerQuery = self
            .execute(
                "Customer",
                CUSTOMER,
                json!({ "customerAccessToken": token.expose() }),
            )
            .await?;

        Ok(data.customer.map(Customer::from))
    }
}
