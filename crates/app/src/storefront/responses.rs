//! Storefront response shapes and their mapping onto cart snapshots.

use std::str::FromStr;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, de::IgnoredAny};
use trolley::{
    cart::{CartLine, CartSnapshot},
    ids::{CartId, LineId},
    session::Customer,
};

use super::StorefrontError;

#[derive(Debug, Deserialize)]
pub(super) struct GraphQlResponse<T> {
    pub(super) data: Option<T>,

    #[serde(default)]
    pub(super) errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphQlError {
    pub(super) message: String,
}

impl<T> GraphQlResponse<T> {
    pub(super) fn into_data(self) -> Result<T, StorefrontError> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|error| error.message).collect();

            return Err(StorefrontError::GraphQl(messages.join("; ")));
        }

        self.data
            .ok_or_else(|| StorefrontError::Unexpected("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartQuery {
    pub(super) cart: Option<CartNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartCreateData {
    pub(super) cart_create: CartPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartLinesAddData {
    pub(super) cart_lines_add: CartPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartLinesUpdateData {
    pub(super) cart_lines_update: CartPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartLinesRemoveData {
    pub(super) cart_lines_remove: CartPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BuyerIdentityData {
    pub(super) cart_buyer_identity_update: BuyerIdentityPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BuyerIdentityPayload {
    cart: Option<IgnoredAny>,

    #[serde(default)]
    user_errors: Vec<UserError>,
}

impl BuyerIdentityPayload {
    pub(super) fn into_result(self) -> Result<(), StorefrontError> {
        check_user_errors(self.user_errors)?;

        self.cart.map(|_| ()).ok_or(StorefrontError::MissingCart)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerQuery {
    pub(super) customer: Option<CustomerNode>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CustomerNode {
    id: String,
    email: Option<String>,
}

impl From<CustomerNode> for Customer {
    fn from(node: CustomerNode) -> Self {
        let customer = Customer::new(node.id);

        match node.email {
            Some(email) => customer.with_email(email),
            None => customer,
        }
    }
}

/// The `{ cart, userErrors }` payload every cart mutation returns.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartPayload {
    cart: Option<CartNode>,

    #[serde(default)]
    user_errors: Vec<UserError>,
}

impl CartPayload {
    pub(super) fn into_snapshot(self) -> Result<CartSnapshot, StorefrontError> {
        check_user_errors(self.user_errors)?;

        self.cart.ok_or(StorefrontError::MissingCart)?.into_snapshot()
    }
}

#[derive(Debug, Deserialize)]
struct UserError {
    field: Option<Vec<String>>,
    message: String,
}

fn check_user_errors(errors: Vec<UserError>) -> Result<(), StorefrontError> {
    if errors.is_empty() {
        return Ok(());
    }

    let messages: Vec<String> = errors
        .into_iter()
        .map(|error| match error.field {
            Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), error.message),
            _ => error.message,
        })
        .collect();

    Err(StorefrontError::UserErrors(messages.join("; ")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartNode {
    id: String,
    checkout_url: Option<String>,
    cost: Cost,
    lines: Connection<LineNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cost {
    total_amount: MoneyV2,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoneyV2 {
    amount: String,
    currency_code: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct LineNode {
    id: String,
    quantity: u32,
    merchandise: Merchandise,
}

/// A `ProductVariant`; every field is absent for other merchandise types.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Merchandise {
    id: Option<String>,
    title: Option<String>,
    available_for_sale: Option<bool>,
    quantity_available: Option<i64>,
    price: Option<MoneyV2>,
    image: Option<Image>,
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Product {
    title: String,
}

impl CartNode {
    pub(super) fn into_snapshot(self) -> Result<CartSnapshot, StorefrontError> {
        let currency = self.cost.total_amount.currency_code;

        let lines = self
            .lines
            .edges
            .into_iter()
            .map(|edge| edge.node.into_line(&currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CartSnapshot {
            id: CartId::new(self.id),
            lines,
            checkout_url: self.checkout_url,
            currency,
        })
    }
}

impl LineNode {
    fn into_line(self, currency: &str) -> Result<CartLine, StorefrontError> {
        let merchandise = self.merchandise;

        let variant_id = merchandise
            .id
            .ok_or_else(|| StorefrontError::Unexpected(format!("line {} is not a product variant", self.id)))?;

        let price = merchandise
            .price
            .ok_or_else(|| StorefrontError::Unexpected(format!("variant {variant_id} has no price")))?;

        if price.currency_code != currency {
            return Err(StorefrontError::Unexpected(format!(
                "variant {variant_id} is priced in {} but the cart is in {currency}",
                price.currency_code
            )));
        }

        Ok(CartLine {
            variant_id: variant_id.into(),
            line_id: Some(LineId::new(self.id)),
            quantity: self.quantity,
            unit_price: minor_units(&price.amount, currency)?,
            title: merchandise.product.map(|product| product.title).unwrap_or_default(),
            variant_title: merchandise.title.filter(|title| title != "Default Title"),
            image_url: merchandise.image.map(|image| image.url),
            available: merchandise.available_for_sale.unwrap_or(true),
            quantity_available: merchandise
                .quantity_available
                .map(|quantity| u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)),
        })
    }
}

/// Convert a decimal amount such as `"19.99"` into minor units of `currency`.
pub(super) fn minor_units(amount: &str, currency: &str) -> Result<u64, StorefrontError> {
    let exponent = rusty_money::iso::find(currency)
        .map(|currency| currency.exponent)
        .ok_or_else(|| StorefrontError::Unexpected(format!("unknown currency {currency}")))?;

    let amount = Decimal::from_str(amount)
        .map_err(|error| StorefrontError::Unexpected(format!("invalid amount {amount}: {error}")))?;

    let scale = Decimal::from(10_u64.pow(exponent));

    amount
        .checked_mul(scale)
        .map(|minor| minor.round())
        .and_then(|minor| minor.to_u64())
        .ok_or_else(|| StorefrontError::Unexpected(format!("amount {amount} is out of range")))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const CART: &str = r#"{
        "data": {
            "cartLinesAdd": {
                "cart": {
                    "id": "gid://shopify/Cart/c1",
                    "checkoutUrl": "https://shop.test/cart/c/c1",
                    "cost": { "totalAmount": { "amount": "27.5", "currencyCode": "USD" } },
                    "lines": {
                        "edges": [
                            {
                                "node": {
                                    "id": "gid://shopify/CartLine/l1",
                                    "quantity": 2,
                                    "merchandise": {
                                        "id": "gid://shopify/ProductVariant/v1",
                                        "title": "Default Title",
                                        "availableForSale": true,
                                        "quantityAvailable": 5,
                                        "price": { "amount": "10.0", "currencyCode": "USD" },
                                        "image": { "url": "https://cdn.test/tee.png" },
                                        "product": { "title": "Tee" }
                                    }
                                }
                            },
                            {
                                "node": {
                                    "id": "gid://shopify/CartLine/l2",
                                    "quantity": 1,
                                    "merchandise": {
                                        "id": "gid://shopify/ProductVariant/v2",
                                        "title": "Large",
                                        "availableForSale": false,
                                        "quantityAvailable": -3,
                                        "price": { "amount": "7.50", "currencyCode": "USD" },
                                        "image": null,
                                        "product": { "title": "Cap" }
                                    }
                                }
                            }
                        ]
                    }
                },
                "userErrors": []
            }
        }
    }"#;

    #[test]
    fn cart_payload_maps_to_snapshot() -> TestResult {
        let response: GraphQlResponse<CartLinesAddData> = serde_json::from_str(CART)?;
        let snapshot = response.into_data()?.cart_lines_add.into_snapshot()?;

        assert_eq!(snapshot.id.as_str(), "gid://shopify/Cart/c1");
        assert_eq!(snapshot.currency, "USD");
        assert_eq!(snapshot.total_quantity(), 3);

        let [tee, cap] = snapshot.lines.as_slice() else {
            return Err("expected two lines".into());
        };

        assert_eq!(tee.unit_price, 10_00);
        assert_eq!(tee.title, "Tee");
        assert_eq!(tee.variant_title, None);
        assert_eq!(tee.quantity_available, Some(5));
        assert_eq!(tee.line_id.as_ref().map(LineId::as_str), Some("gid://shopify/CartLine/l1"));

        assert_eq!(cap.unit_price, 7_50);
        assert_eq!(cap.variant_title.as_deref(), Some("Large"));
        assert!(!cap.available);
        assert_eq!(cap.quantity_available, Some(0));

        Ok(())
    }

    #[test]
    fn user_errors_become_rejections() -> TestResult {
        let response: GraphQlResponse<CartLinesAddData> = serde_json::from_str(
            r#"{
                "data": {
                    "cartLinesAdd": {
                        "cart": null,
                        "userErrors": [
                            { "field": ["lines", "0", "merchandiseId"], "message": "is sold out" }
                        ]
                    }
                }
            }"#,
        )?;

        let result = response.into_data()?.cart_lines_add.into_snapshot();

        assert!(
            matches!(&result, Err(StorefrontError::UserErrors(message)) if message == "lines.0.merchandiseId: is sold out"),
            "unexpected result {result:?}"
        );

        Ok(())
    }

    #[test]
    fn top_level_errors_are_reported() -> TestResult {
        let response: GraphQlResponse<CartQuery> = serde_json::from_str(
            r#"{ "data": null, "errors": [{ "message": "Throttled" }] }"#,
        )?;

        let result = response.into_data();

        assert!(
            matches!(&result, Err(StorefrontError::GraphQl(message)) if message == "Throttled"),
            "unexpected result {result:?}"
        );

        Ok(())
    }

    #[test]
    fn missing_cart_reads_as_none() -> TestResult {
        let response: GraphQlResponse<CartQuery> =
            serde_json::from_str(r#"{ "data": { "cart": null } }"#)?;

        assert!(response.into_data()?.cart.is_none());

        Ok(())
    }

    #[test]
    fn minor_units_follow_currency_exponent() -> TestResult {
        assert_eq!(minor_units("19.99", "USD")?, 19_99);
        assert_eq!(minor_units("1500", "JPY")?, 1_500);
        assert_eq!(minor_units("1.005", "USD")?, 1_00);
        assert!(minor_units("-1.00", "USD").is_err());
        assert!(minor_units("1.00", "XXQ").is_err());

        Ok(())
    }

    #[test]
    fn customer_maps_email() -> TestResult {
        let response: GraphQlResponse<CustomerQuery> = serde_json::from_str(
            r#"{ "data": { "customer": { "id": "gid://shopify/Customer/7", "email": "ada@example.com" } } }"#,
        )?;

        let customer = response.into_data()?.customer.map(Customer::from).ok_or("no customer")?;

        assert_eq!(customer.id.as_str(), "gid://shopify/Customer/7");
        assert_eq!(customer.email.as_deref(), Some("ada@example.com"));

        Ok(())
    }
}
