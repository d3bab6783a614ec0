use std::sync::Arc;

use clap::Args;
use trolley::{
    backend::CustomerIdentity,
    driver::CartSyncDriver,
    session::CustomerAccessToken,
    signal::SyncWait,
};
use trolley_app::context::AppContext;

use super::output;

#[derive(Debug, Args)]
pub(crate) struct LoginArgs {
    /// Customer access token from the storefront's login flow
    #[arg(long, env = "CUSTOMER_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

pub(crate) async fn login(context: &AppContext, args: LoginArgs) -> Result<(), String> {
    let token = CustomerAccessToken::new(args.token);

    let customer = context
        .storefront
        .resolve(&token)
        .await
        .map_err(|error| format!("failed to resolve customer: {error}"))?
        .ok_or_else(|| "the access token does not belong to a customer".to_string())?;

    let (driver, events) = CartSyncDriver::new(Arc::clone(&context.store));
    let running = tokio::spawn(driver.run());

    let wait = events
        .login(token, customer)
        .await
        .map_err(|error| error.to_string())?;

    match wait {
        SyncWait::Completed(Some(resolution)) => output::line(&format!("synchronized: {resolution:?}")),
        SyncWait::Completed(None) => output::line("synchronized"),
        SyncWait::TimedOut => output::line("synchronization is still running"),
    }

    drop(events);

    running
        .await
        .map_err(|error| format!("cart sync driver failed: {error}"))?;

    output::cart(&context.store.view());

    Ok(())
}

pub(crate) fn logout(context: &AppContext) {
    context.store.logout();

    output::line("signed out");
    output::cart(&context.store.view());
}
