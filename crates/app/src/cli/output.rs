#![expect(clippy::print_stdout, reason = "command output goes to stdout")]

use rusty_money::{Money, iso::Currency};
use trolley::store::{CartNotice, CartView, MutationOutcome};

pub(crate) fn cart(view: &CartView) {
    let currency = view.total_price.currency();

    match &view.cart_id {
        Some(cart_id) => println!("cart: {cart_id} ({:?})", view.phase),
        None => println!("cart: none ({:?})", view.phase),
    }

    for line in &view.lines {
        let title = match &line.variant_title {
            Some(variant_title) => format!("{} / {variant_title}", line.title),
            None => line.title.clone(),
        };

        println!(
            "  {:>3} × {title} [{}] {}",
            line.quantity,
            line.variant_id,
            minor(line.line_total(), currency)
        );
    }

    println!("items: {}", view.total_quantity);
    println!("total: {}", view.total_price);

    if view.pending {
        println!("(edits pending)");
    }
}

pub(crate) fn outcome(outcome: &MutationOutcome) {
    match outcome {
        MutationOutcome::Confirmed => println!("confirmed"),
        MutationOutcome::Scheduled => println!("scheduled"),
        MutationOutcome::RolledBack(notice) => println!("rolled back: {notice}"),
        MutationOutcome::Offline => println!("offline, nothing changed"),
        MutationOutcome::Unavailable => println!("variant is unavailable"),
        MutationOutcome::Unchanged => println!("nothing to change"),
    }
}

pub(crate) fn notice(notice: &CartNotice) {
    println!("notice: {notice}");
}

pub(crate) fn line(text: &str) {
    println!("{text}");
}

fn minor(amount: u64, currency: &'static Currency) -> Money<'static, Currency> {
    Money::from_minor(i64::try_from(amount).unwrap_or(i64::MAX), currency)
}
