use clap::Args;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tokio::sync::broadcast::{self, error::TryRecvError};
use trolley::{
    cart::NewCartLine,
    ids::VariantId,
    store::CartNotice,
};
use trolley_app::context::AppContext;

use super::output;

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    /// Variant id
    variant_id: String,

    /// Units to add
    #[arg(short, long, default_value_t = 1_u32)]
    quantity: u32,

    /// Unit price shown until the storefront confirms, e.g. 19.99
    #[arg(long)]
    price: Option<Decimal>,

    /// Product title shown until the storefront confirms
    #[arg(long)]
    title: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct SetArgs {
    /// Variant id
    variant_id: String,

    /// New quantity; zero or less removes the line
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
}

#[derive(Debug, Args)]
pub(crate) struct RemoveArgs {
    /// Variant id
    variant_id: String,
}

pub(crate) async fn add(context: &AppContext, args: AddArgs) -> Result<(), String> {
    let store = &context.store;
    let exponent = store.settings().currency.exponent;

    let unit_price = match args.price {
        Some(price) => minor_units(price, exponent)
            .ok_or_else(|| format!("price {price} cannot be represented"))?,
        None => 0,
    };

    let mut line = NewCartLine::new(args.variant_id, args.quantity, unit_price);

    if let Some(title) = args.title {
        line = line.with_title(title);
    }

    let mut notices = store.notices();
    let outcome = store.add_line(line).await;

    output::outcome(&outcome);
    settle(context, &mut notices).await
}

pub(crate) async fn set(context: &AppContext, args: SetArgs) -> Result<(), String> {
    let mut notices = context.store.notices();
    let outcome = context
        .store
        .update_quantity(&VariantId::new(args.variant_id), args.quantity);

    output::outcome(&outcome);
    settle(context, &mut notices).await
}

pub(crate) async fn remove(context: &AppContext, args: RemoveArgs) -> Result<(), String> {
    let mut notices = context.store.notices();
    let outcome = context.store.remove_line(&VariantId::new(args.variant_id));

    output::outcome(&outcome);
    settle(context, &mut notices).await
}

pub(crate) async fn checkout(context: &AppContext) -> Result<(), String> {
    let url = context
        .store
        .checkout_url()
        .await
        .ok_or_else(|| "the cart has no checkout URL".to_string())?;

    output::line(&url);

    Ok(())
}

/// Send pending edits, print the cart and fail if any edit was rolled back.
async fn settle(
    context: &AppContext,
    notices: &mut broadcast::Receiver<CartNotice>,
) -> Result<(), String> {
    context.store.flush_all().await;

    output::cart(&context.store.view());

    let mut failed = 0_usize;

    loop {
        match notices.try_recv() {
            Ok(notice) => {
                output::notice(&notice);
                failed += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                failed += usize::try_from(skipped).unwrap_or(usize::MAX);
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    if failed == 0 {
        Ok(())
    } else {
        Err(format!("{failed} cart edit(s) failed"))
    }
}

fn minor_units(price: Decimal, exponent: u32) -> Option<u64> {
    price
        .checked_mul(Decimal::from(10_u64.checked_pow(exponent)?))?
        .round()
        .to_u64()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn prices_convert_to_minor_units() -> TestResult {
        assert_eq!(minor_units(Decimal::from_str("19.99")?, 2), Some(19_99));
        assert_eq!(minor_units(Decimal::from_str("500")?, 0), Some(500));
        assert_eq!(minor_units(Decimal::from_str("-1")?, 2), None);

        Ok(())
    }
}
