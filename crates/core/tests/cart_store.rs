//! Integration tests for optimistic cart mutations and debouncing

use std::sync::Arc;

use async_trait::async_trait;
use jiff::SignedDuration;
use rusty_money::{Money, iso::USD};
use testresult::TestResult;
use tokio::sync::Notify;

use trolley::{
    backend::{CartBackend, CartBackendError, MockCartAssociationStore, MockCartBackend},
    cart::{CartLine, CartSnapshot, LineInput, LineUpdate, NewCartLine},
    clock::ManualClock,
    connectivity::Connectivity,
    ids::{CartId, LineId, VariantId},
    memory::{BackendOperation, InMemoryCartBackend, MemoryClientStorage, StaticCustomerIdentity},
    session::CustomerAccessToken,
    settings::SyncSettings,
    store::{CartStore, Collaborators, MutationOutcome, RetryAction},
};

struct Harness {
    store: Arc<CartStore>,
    backend: Arc<InMemoryCartBackend>,
    clock: ManualClock,
    connectivity: Connectivity,
}

impl Harness {
    async fn mounted() -> Self {
        let backend = Arc::new(
            InMemoryCartBackend::new("USD")
                .with_product(NewCartLine::new("V1", 1, 10_00).with_title("Tee"))
                .with_product(NewCartLine::new("V2", 1, 7_50).with_title("Cap"))
                .with_product(NewCartLine::new("V3", 1, 3_00).with_quantity_available(2)),
        );

        let clock = ManualClock::default();
        let connectivity = Connectivity::online();

        let mut associations = MockCartAssociationStore::new();
        associations.expect_set().never();

        let store = Arc::new(CartStore::new(
            Collaborators {
                backend: backend.clone(),
                associations: Arc::new(associations),
                identity: Arc::new(StaticCustomerIdentity::new()),
                storage: Arc::new(MemoryClientStorage::new()),
                clock: Arc::new(clock.clone()),
                connectivity: connectivity.clone(),
            },
            SyncSettings::default(),
        ));

        store.mount().await;

        Self {
            store,
            backend,
            clock,
            connectivity,
        }
    }

    fn advance_millis(&self, millis: i64) {
        self.clock.advance(SignedDuration::from_millis(millis));
    }

    fn quantity(&self, variant: &str) -> Option<u32> {
        self.store
            .view()
            .lines
            .iter()
            .find(|line| line.variant_id.as_str() == variant)
            .map(|line| line.quantity)
    }

    fn remote(&self) -> Result<CartSnapshot, &'static str> {
        let cart_id = self.store.view().cart_id.ok_or("no active cart")?;

        self.backend.cart(&cart_id).ok_or("cart missing from backend")
    }
}

fn line(variant: &str, quantity: u32) -> NewCartLine {
    let price = match variant {
        "V1" => 10_00,
        "V2" => 7_50,
        _ => 3_00,
    };

    NewCartLine::new(variant, quantity, price)
}

#[tokio::test]
async fn add_then_update_to_zero_empties_cart() -> TestResult {
    let harness = Harness::mounted().await;

    let outcome = harness.store.add_line(line("V1", 2)).await;

    assert_eq!(outcome, MutationOutcome::Confirmed);
    assert_eq!(harness.store.total_price(), Money::from_minor(20_00, USD));
    assert_eq!(harness.store.total_quantity(), 2);

    let outcome = harness.store.update_quantity(&VariantId::new("V1"), 0);

    assert_eq!(outcome, MutationOutcome::Scheduled);
    assert!(harness.store.is_empty(), "line should disappear at once");

    harness.advance_millis(800);
    harness.store.flush_due().await;

    assert!(harness.remote()?.is_empty());
    assert_eq!(harness.backend.call_count(BackendOperation::RemoveLines), 1);
    assert!(!harness.store.has_pending_edits());

    Ok(())
}

#[tokio::test]
async fn failed_add_restores_previous_state_and_can_be_retried() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;

    let before = harness.store.view();

    harness.backend.fail_next(
        BackendOperation::AddLines,
        CartBackendError::Unavailable("timeout".to_string()),
    );

    let MutationOutcome::RolledBack(notice) = harness.store.add_line(line("V2", 1)).await else {
        return Err("expected the add to roll back".into());
    };

    assert_eq!(harness.store.view(), before);
    assert_eq!(notice.retry, RetryAction::AddLine(line("V2", 1)));

    let outcome = harness.store.retry(notice.retry).await;

    assert_eq!(outcome, MutationOutcome::Confirmed);
    assert_eq!(harness.quantity("V2"), Some(1));

    Ok(())
}

#[tokio::test]
async fn offline_mutations_leave_state_untouched() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;

    let before = harness.store.view();

    harness.connectivity.set_online(false);

    assert_eq!(harness.store.add_line(line("V2", 1)).await, MutationOutcome::Offline);
    assert_eq!(
        harness.store.update_quantity(&VariantId::new("V1"), 4),
        MutationOutcome::Offline
    );
    assert_eq!(
        harness.store.remove_line(&VariantId::new("V1")),
        MutationOutcome::Offline
    );

    assert_eq!(harness.store.view(), before);
    assert_eq!(harness.backend.call_count(BackendOperation::AddLines), 1);
    assert!(!harness.store.has_pending_edits());

    Ok(())
}

#[tokio::test]
async fn unavailable_variant_is_refused() -> TestResult {
    let harness = Harness::mounted().await;

    let outcome = harness.store.add_line(line("V2", 1).unavailable()).await;

    assert_eq!(outcome, MutationOutcome::Unavailable);
    assert!(harness.store.is_empty());
    assert_eq!(harness.backend.call_count(BackendOperation::AddLines), 0);

    Ok(())
}

#[tokio::test]
async fn quantities_are_clamped_to_what_is_available() -> TestResult {
    let harness = Harness::mounted().await;

    harness
        .store
        .add_line(line("V3", 1).with_quantity_available(2))
        .await;

    harness.store.update_quantity(&VariantId::new("V3"), 10);

    assert_eq!(harness.quantity("V3"), Some(2));

    Ok(())
}

#[tokio::test]
async fn sold_out_variant_never_leaves_an_empty_line() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 2)).await;

    let outcome = harness
        .store
        .add_line(line("V1", 1).with_quantity_available(0))
        .await;

    assert_eq!(outcome, MutationOutcome::Unchanged);
    assert_eq!(harness.quantity("V1"), Some(2));
    assert_eq!(harness.store.total_quantity(), 2);
    assert_eq!(harness.backend.call_count(BackendOperation::AddLines), 1);
    assert_eq!(harness.remote()?.total_quantity(), 2);

    Ok(())
}

#[tokio::test]
async fn add_at_the_limit_sends_only_what_fits() -> TestResult {
    let mut capped = CartLine::from(line("V3", 1).with_quantity_available(2));
    capped.line_id = Some(LineId::new("line-3"));

    let initial = CartSnapshot {
        id: CartId::new("cart-1"),
        lines: vec![capped],
        checkout_url: None,
        currency: "USD".to_string(),
    };

    let mut full = initial.clone();
    if let Some(line) = full.lines.first_mut() {
        line.quantity = 2;
    }

    let mut backend = MockCartBackend::new();

    backend
        .expect_create()
        .times(1)
        .returning(move |_| Ok(initial.clone()));

    backend
        .expect_add_lines()
        .withf(|_, lines| {
            lines
                == &vec![LineInput {
                    variant_id: VariantId::new("V3"),
                    quantity: 1,
                }]
        })
        .times(1)
        .returning(move |_, _| Ok(full.clone()));

    let store = CartStore::new(
        Collaborators {
            backend: Arc::new(backend),
            associations: Arc::new(MockCartAssociationStore::new()),
            identity: Arc::new(StaticCustomerIdentity::new()),
            storage: Arc::new(MemoryClientStorage::new()),
            clock: Arc::new(ManualClock::default()),
            connectivity: Connectivity::online(),
        },
        SyncSettings::default(),
    );

    store.mount().await;

    assert_eq!(store.add_line(line("V3", 5)).await, MutationOutcome::Confirmed);
    assert_eq!(store.total_quantity(), 2);

    assert_eq!(store.add_line(line("V3", 1)).await, MutationOutcome::Unchanged);
    assert_eq!(store.total_quantity(), 2);

    Ok(())
}

#[tokio::test]
async fn rapid_updates_send_last_value_once() -> TestResult {
    let harness = Harness::mounted().await;
    let variant = VariantId::new("V1");

    harness.store.add_line(line("V1", 1)).await;

    harness.store.update_quantity(&variant, 2);
    harness.advance_millis(300);
    harness.store.update_quantity(&variant, 3);
    harness.advance_millis(300);
    harness.store.update_quantity(&variant, 5);

    harness.advance_millis(799);
    assert_eq!(harness.store.flush_due().await, 0, "window restarts on each call");

    harness.advance_millis(1);
    assert_eq!(harness.store.flush_due().await, 1);

    assert_eq!(harness.backend.call_count(BackendOperation::UpdateLines), 1);
    assert_eq!(harness.remote()?.total_quantity(), 5);
    assert_eq!(harness.quantity("V1"), Some(5));

    Ok(())
}

#[tokio::test]
async fn debounced_update_issues_exactly_one_backend_call() -> TestResult {
    let mut line_one = CartLine::from(line("V1", 1));
    line_one.line_id = Some(LineId::new("line-1"));

    let initial = CartSnapshot {
        id: CartId::new("cart-1"),
        lines: vec![line_one],
        checkout_url: None,
        currency: "USD".to_string(),
    };

    let mut confirmed = initial.clone();
    if let Some(line) = confirmed.lines.first_mut() {
        line.quantity = 4;
    }

    let mut backend = MockCartBackend::new();

    backend
        .expect_create()
        .times(1)
        .returning(move |_| Ok(initial.clone()));

    backend
        .expect_update_lines()
        .withf(|cart, lines| {
            cart.as_str() == "cart-1"
                && lines
                    == &vec![LineUpdate {
                        line_id: LineId::new("line-1"),
                        quantity: 4,
                    }]
        })
        .times(1)
        .returning(move |_, _| Ok(confirmed.clone()));

    let clock = ManualClock::default();

    let store = CartStore::new(
        Collaborators {
            backend: Arc::new(backend),
            associations: Arc::new(MockCartAssociationStore::new()),
            identity: Arc::new(StaticCustomerIdentity::new()),
            storage: Arc::new(MemoryClientStorage::new()),
            clock: Arc::new(clock.clone()),
            connectivity: Connectivity::online(),
        },
        SyncSettings::default(),
    );

    store.mount().await;

    let variant = VariantId::new("V1");

    for quantity in [2, 3, 4] {
        store.update_quantity(&variant, quantity);
        clock.advance(SignedDuration::from_millis(100));
    }

    clock.advance(SignedDuration::from_millis(800));

    assert_eq!(store.flush_due().await, 1);
    assert_eq!(store.flush_due().await, 0);
    assert_eq!(store.total_quantity(), 4);

    Ok(())
}

#[tokio::test]
async fn failed_update_rolls_back_and_notifies() -> TestResult {
    let harness = Harness::mounted().await;
    let mut notices = harness.store.notices();

    harness.store.add_line(line("V1", 2)).await;
    harness.store.update_quantity(&VariantId::new("V1"), 5);

    assert_eq!(harness.quantity("V1"), Some(5));

    harness.backend.fail_next(
        BackendOperation::UpdateLines,
        CartBackendError::Rejected("not enough stock".to_string()),
    );

    harness.advance_millis(800);
    harness.store.flush_due().await;

    assert_eq!(harness.quantity("V1"), Some(2));

    let notice = notices.try_recv()?;

    assert_eq!(
        notice.retry,
        RetryAction::UpdateQuantity {
            variant_id: VariantId::new("V1"),
            quantity: 5,
        }
    );

    Ok(())
}

#[tokio::test]
async fn removal_waits_for_its_window() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;
    harness.store.add_line(line("V2", 1)).await;

    assert_eq!(
        harness.store.remove_line(&VariantId::new("V1")),
        MutationOutcome::Scheduled
    );
    assert_eq!(harness.quantity("V1"), None);
    assert_eq!(harness.remote()?.lines.len(), 2, "backend untouched until the window closes");

    harness.advance_millis(599);
    assert_eq!(harness.store.flush_due().await, 0);

    harness.advance_millis(1);
    assert_eq!(harness.store.flush_due().await, 1);

    let remote = harness.remote()?;

    assert_eq!(remote.lines.len(), 1);
    assert_eq!(harness.backend.call_count(BackendOperation::RemoveLines), 1);

    Ok(())
}

#[tokio::test]
async fn re_add_during_pending_removal_revives_line() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 2)).await;
    harness.store.remove_line(&VariantId::new("V1"));

    let outcome = harness.store.add_line(line("V1", 1)).await;

    assert_eq!(outcome, MutationOutcome::Scheduled);
    assert_eq!(harness.quantity("V1"), Some(1));

    harness.advance_millis(800);
    harness.store.flush_due().await;

    assert_eq!(harness.backend.call_count(BackendOperation::RemoveLines), 0);
    assert_eq!(harness.backend.call_count(BackendOperation::UpdateLines), 1);
    assert_eq!(harness.remote()?.total_quantity(), 1);
    assert_eq!(harness.quantity("V1"), Some(1));

    Ok(())
}

#[tokio::test]
async fn failed_removal_puts_line_back_in_place() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;
    harness.store.add_line(line("V2", 3)).await;

    let before = harness.store.view();

    harness.backend.fail_next(
        BackendOperation::RemoveLines,
        CartBackendError::Unavailable("timeout".to_string()),
    );

    harness.store.remove_line(&VariantId::new("V1"));
    harness.advance_millis(600);
    harness.store.flush_due().await;

    assert_eq!(harness.store.view().lines, before.lines);

    Ok(())
}

#[tokio::test]
async fn confirmed_snapshot_keeps_pending_edits_visible() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;
    harness.store.update_quantity(&VariantId::new("V1"), 4);

    harness.store.add_line(line("V2", 1)).await;

    assert_eq!(harness.quantity("V1"), Some(4), "pending edit survives the add snapshot");
    assert_eq!(harness.quantity("V2"), Some(1));
    assert_eq!(harness.remote()?.total_quantity(), 2);

    Ok(())
}

#[tokio::test]
async fn checkout_url_flushes_pending_edits() -> TestResult {
    let harness = Harness::mounted().await;

    harness.store.add_line(line("V1", 1)).await;
    harness.store.update_quantity(&VariantId::new("V1"), 3);

    let url = harness.store.checkout_url().await.ok_or("no checkout url")?;

    assert!(url.starts_with("https://checkout.trolley.test/"));
    assert_eq!(harness.remote()?.total_quantity(), 3);
    assert!(!harness.store.has_pending_edits());

    Ok(())
}

#[tokio::test]
async fn subscribers_see_every_change() -> TestResult {
    let harness = Harness::mounted().await;
    let mut views = harness.store.subscribe();

    harness.store.add_line(line("V1", 2)).await;

    assert!(views.has_changed()?);
    assert_eq!(views.borrow_and_update().total_quantity, 2);

    harness.store.update_quantity(&VariantId::new("V1"), 1);

    assert!(views.has_changed()?);
    assert!(views.borrow_and_update().pending);

    Ok(())
}

/// Holds every `add_lines` call until released.
struct SlowAdds {
    inner: InMemoryCartBackend,
    gate: Notify,
}

#[async_trait]
impl CartBackend for SlowAdds {
    async fn create(&self, lines: Vec<LineInput>) -> Result<CartSnapshot, CartBackendError> {
        self.inner.create(lines).await
    }

    async fn fetch(&self, cart: &CartId) -> Result<Option<CartSnapshot>, CartBackendError> {
        self.inner.fetch(cart).await
    }

    async fn add_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineInput>,
    ) -> Result<CartSnapshot, CartBackendError> {
        self.gate.notified().await;

        self.inner.add_lines(cart, lines).await
    }

    async fn update_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineUpdate>,
    ) -> Result<CartSnapshot, CartBackendError> {
        self.inner.update_lines(cart, lines).await
    }

    async fn remove_lines(
        &self,
        cart: &CartId,
        lines: Vec<LineId>,
    ) -> Result<CartSnapshot, CartBackendError> {
        self.inner.remove_lines(cart, lines).await
    }

    async fn update_buyer_identity(
        &self,
        cart: &CartId,
        token: &CustomerAccessToken,
    ) -> Result<(), CartBackendError> {
        self.inner.update_buyer_identity(cart, token).await
    }
}

#[tokio::test]
async fn update_made_while_add_is_in_flight_is_sent_after_it() -> TestResult {
    let backend = Arc::new(SlowAdds {
        inner: InMemoryCartBackend::new("USD").with_product(line("V1", 1).with_title("Tee")),
        gate: Notify::new(),
    });

    let clock = ManualClock::default();

    let store = CartStore::new(
        Collaborators {
            backend: backend.clone(),
            associations: Arc::new(MockCartAssociationStore::new()),
            identity: Arc::new(StaticCustomerIdentity::new()),
            storage: Arc::new(MemoryClientStorage::new()),
            clock: Arc::new(clock.clone()),
            connectivity: Connectivity::online(),
        },
        SyncSettings::default(),
    );

    store.mount().await;

    let variant = VariantId::new("V1");

    let edit = async {
        tokio::task::yield_now().await;

        let outcome = store.update_quantity(&variant, 5);

        clock.advance(SignedDuration::from_millis(800));
        let flushed = store.flush_due().await;

        backend.gate.notify_one();

        (outcome, flushed)
    };

    let (added, (outcome, flushed)) = tokio::join!(store.add_line(line("V1", 1)), edit);

    assert_eq!(added, MutationOutcome::Confirmed);
    assert_eq!(outcome, MutationOutcome::Scheduled);
    assert_eq!(flushed, 0, "the update waits for the line to exist remotely");
    assert_eq!(store.total_quantity(), 5);
    assert!(store.has_pending_edits());

    clock.advance(SignedDuration::from_millis(800));

    assert_eq!(store.flush_due().await, 1);

    let cart_id = store.view().cart_id.ok_or("no active cart")?;
    let remote = backend.inner.cart(&cart_id).ok_or("cart missing from backend")?;

    assert_eq!(remote.total_quantity(), 5);
    assert_eq!(store.total_quantity(), 5);
    assert!(!store.has_pending_edits());

    Ok(())
}
