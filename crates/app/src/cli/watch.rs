use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use trolley::driver::CartSyncDriver;
use trolley_app::context::AppContext;

use super::output;

/// Run the sync driver until Ctrl-C, printing the cart whenever it changes.
pub(crate) async fn run(context: &AppContext) -> Result<(), String> {
    let store = &context.store;
    let mut view = store.subscribe();
    let mut notices = store.notices();

    let (driver, events) = CartSyncDriver::new(Arc::clone(store));
    let running = tokio::spawn(driver.run());

    output::cart(&view.borrow_and_update());

    info!("watching cart, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(%error, "failed to listen for Ctrl-C");
                }

                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }

                output::cart(&view.borrow_and_update());
            }
            notice = notices.recv() => match notice {
                Ok(notice) => output::notice(&notice),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed cart notices"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(events);

    running
        .await
        .map_err(|error| format!("cart sync driver failed: {error}"))
}
