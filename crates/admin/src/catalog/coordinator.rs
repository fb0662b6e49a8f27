//! Optimistic mutation coordinator.
//!
//! Every mutation runs snapshot, speculate, settle, reconcile:
//!
//! 1. Cancel in-flight reads of the product list and take a snapshot.
//! 2. Write the speculative change to the cache.
//! 3. When the remote call resolves, either keep (and merge) the change or
//!    undo it, then notify the admin.
//! 4. Ask the cache for an authoritative refresh.
//!
//! Mutations on the same product id are serialized. Every read-modify-write
//! of the cached list holds one list lock, so concurrent mutations on
//! different ids never overwrite each other's speculative change. Undo is
//! the inverse of the speculative change rather than a wholesale restore of
//! the snapshot, so a concurrent mutation on another product keeps its own
//! change.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use stockroom_core::{Product, ProductId, ProductInput, ValidationError, validate};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

use super::locks::{KeyGuard, KeyedLocks};
use super::mutation::{MutationKind, MutationState, MutationStatus};
use super::query::{QueryCache, QueryKey};
use super::{ProductService, ServiceError};
use crate::notify::Notifier;

/// Why a mutation did not go through.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Input failed the pre-submission rules. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The remote call failed and the speculative change was undone.
    #[error("{message}")]
    Remote {
        kind: MutationKind,
        message: String,
        #[source]
        source: ServiceError,
    },
}

impl MutationError {
    /// Whether the remote call failed because the product no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                source: ServiceError::NotFound(_),
                ..
            }
        )
    }
}

type InFlightCounters = [AtomicUsize; MutationKind::COUNT];

/// Held across every get-modify-set of the cached list.
type ListLock = Arc<Mutex<()>>;

/// Applies creates, updates and deletes optimistically.
pub struct ProductMutations {
    service: Arc<dyn ProductService>,
    cache: Arc<dyn QueryCache>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<KeyedLocks<ProductId>>,
    list_lock: ListLock,
    last_temporary_id: AtomicI32,
    in_flight: Arc<InFlightCounters>,
}

impl ProductMutations {
    #[must_use]
    pub fn new(
        service: Arc<dyn ProductService>,
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            service,
            cache,
            notifier,
            locks: Arc::new(KeyedLocks::new()),
            list_lock: Arc::new(Mutex::new(())),
            last_temporary_id: AtomicI32::new(0),
            in_flight: Arc::new(std::array::from_fn(|_| AtomicUsize::new(0))),
        }
    }

    /// Whether a mutation of `kind` is between speculation and settlement.
    #[must_use]
    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.in_flight[kind.slot()].load(Ordering::SeqCst) > 0
    }

    /// Whether a create or update is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.is_pending(MutationKind::Create) || self.is_pending(MutationKind::Update)
    }

    /// Create a product, showing it in the cache under a temporary id until
    /// the service assigns the real one.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Validation` without calling the service, or
    /// `MutationError::Remote` after undoing the speculative entry.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: ProductInput) -> Result<Product, MutationError> {
        let pending = self.begin_create(input.clone()).await?;
        match self.service.create(&input).await {
            Ok(created) => {
                pending.succeed(Some(created.clone())).await;
                Ok(created)
            }
            Err(e) => Err(pending.fail(e).await),
        }
    }

    /// Replace the product `id` with `input`.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Validation` without calling the service, or
    /// `MutationError::Remote` after restoring the previous record.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update(&self, id: ProductId, input: ProductInput) -> Result<Product, MutationError> {
        let pending = self.begin_update(id, input.clone()).await?;
        match self.service.update(id, &input).await {
            Ok(updated) => {
                pending.succeed(Some(updated.clone())).await;
                Ok(updated)
            }
            Err(e) => Err(pending.fail(e).await),
        }
    }

    /// Delete the product `id`.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Remote` after putting the record back where it
    /// was.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), MutationError> {
        let pending = self.begin_delete(id).await;
        match self.service.delete(id).await {
            Ok(()) => {
                pending.succeed(None).await;
                Ok(())
            }
            Err(e) => Err(pending.fail(e).await),
        }
    }

    /// Validate `input` and append it to the cache under a fresh temporary id.
    ///
    /// The caller performs the remote call and settles the returned handle.
    ///
    /// # Errors
    ///
    /// Returns the first violated validation rule. The cache is not touched.
    pub async fn begin_create(&self, input: ProductInput) -> Result<PendingMutation, MutationError> {
        self.check(&input)?;
        let mut state = MutationState::new(MutationKind::Create);
        let in_flight = self.track(MutationKind::Create);

        let (_list, mut products) = self.snapshot().await;
        let temporary = Product::from_input(self.next_temporary_id(), input);
        products.push(temporary.clone());
        self.cache.set(QueryKey::Products, products).await;
        state.advance(MutationStatus::Speculating);

        info!(
            mutation_id = %state.id(),
            temporary_id = %temporary.id,
            "Speculatively added product"
        );
        Ok(self.pending(
            state,
            Undo::Remove(temporary.id),
            Some(temporary),
            None,
            in_flight,
        ))
    }

    /// Validate `input` and write it over product `id` in the cache.
    ///
    /// Waits for any other mutation of `id` to settle first.
    ///
    /// # Errors
    ///
    /// Returns the first violated validation rule. The cache is not touched.
    pub async fn begin_update(
        &self,
        id: ProductId,
        input: ProductInput,
    ) -> Result<PendingMutation, MutationError> {
        self.check(&input)?;
        let mut state = MutationState::new(MutationKind::Update);
        let key_guard = self.locks.acquire(id).await;
        let in_flight = self.track(MutationKind::Update);

        let (_list, mut products) = self.snapshot().await;
        let speculative = Product::from_input(id, input);
        let undo = match products.iter_mut().find(|p| p.id == id) {
            Some(slot) => Undo::Restore(std::mem::replace(slot, speculative.clone())),
            None => Undo::Nothing,
        };
        self.cache.set(QueryKey::Products, products).await;
        state.advance(MutationStatus::Speculating);

        info!(mutation_id = %state.id(), product_id = %id, "Speculatively updated product");
        Ok(self.pending(
            state,
            undo,
            Some(speculative),
            Some(key_guard),
            in_flight,
        ))
    }

    /// Remove product `id` from the cache.
    ///
    /// Waits for any other mutation of `id` to settle first.
    pub async fn begin_delete(&self, id: ProductId) -> PendingMutation {
        let mut state = MutationState::new(MutationKind::Delete);
        let key_guard = self.locks.acquire(id).await;
        let in_flight = self.track(MutationKind::Delete);

        let (_list, mut products) = self.snapshot().await;
        let undo = match products.iter().position(|p| p.id == id) {
            Some(index) => Undo::Reinsert {
                index,
                product: products.remove(index),
            },
            None => Undo::Nothing,
        };
        self.cache.set(QueryKey::Products, products).await;
        state.advance(MutationStatus::Speculating);

        info!(mutation_id = %state.id(), product_id = %id, "Speculatively removed product");
        self.pending(state, undo, None, Some(key_guard), in_flight)
    }

    fn check(&self, input: &ProductInput) -> Result<(), MutationError> {
        validate(input).map_err(|e| {
            self.notifier.error(e.message);
            MutationError::from(e)
        })
    }

    /// Lock the list, stop stale reads from landing, then read it.
    ///
    /// The guard must be held until the speculative list is written back.
    async fn snapshot(&self) -> (MutexGuard<'_, ()>, Vec<Product>) {
        let guard = self.list_lock.lock().await;
        self.cache.cancel(QueryKey::Products).await;
        let products = self.cache.get(QueryKey::Products).await.unwrap_or_default();
        (guard, products)
    }

    fn next_temporary_id(&self) -> ProductId {
        ProductId::new(self.last_temporary_id.fetch_sub(1, Ordering::SeqCst) - 1)
    }

    fn track(&self, kind: MutationKind) -> InFlight {
        self.in_flight[kind.slot()].fetch_add(1, Ordering::SeqCst);
        InFlight {
            counters: Arc::clone(&self.in_flight),
            slot: kind.slot(),
        }
    }

    fn pending(
        &self,
        state: MutationState,
        undo: Undo,
        speculative: Option<Product>,
        key_guard: Option<KeyGuard<ProductId>>,
        in_flight: InFlight,
    ) -> PendingMutation {
        PendingMutation {
            state,
            cache: Arc::clone(&self.cache),
            list_lock: Arc::clone(&self.list_lock),
            notifier: Arc::clone(&self.notifier),
            undo,
            speculative,
            key_guard,
            _in_flight: in_flight,
            armed: true,
        }
    }
}

/// A speculative change waiting for its remote call.
///
/// Settle it with [`succeed`](Self::succeed) or [`fail`](Self::fail).
/// Dropping it unsettled undoes the change in the background.
pub struct PendingMutation {
    state: MutationState,
    cache: Arc<dyn QueryCache>,
    list_lock: ListLock,
    notifier: Arc<dyn Notifier>,
    undo: Undo,
    speculative: Option<Product>,
    key_guard: Option<KeyGuard<ProductId>>,
    _in_flight: InFlight,
    armed: bool,
}

impl PendingMutation {
    /// The record written to the cache, if any (none for deletes).
    #[must_use]
    pub const fn speculative(&self) -> Option<&Product> {
        self.speculative.as_ref()
    }

    #[must_use]
    pub const fn state(&self) -> &MutationState {
        &self.state
    }

    /// Keep the change, merging the record the service returned.
    ///
    /// A created product replaces its temporary entry; an updated product is
    /// written in place.
    pub async fn succeed(mut self, confirmed: Option<Product>) {
        self.armed = false;
        self.state.advance(MutationStatus::SettledSuccess);

        if let Some(confirmed) = confirmed {
            let _list = self.list_lock.lock().await;
            if let Some(mut products) = self.cache.get(QueryKey::Products).await {
                let merged = match self.state.kind() {
                    MutationKind::Create => self.speculative.as_ref().is_some_and(|temporary| {
                        replace_temporary(&mut products, temporary.id, confirmed)
                    }),
                    MutationKind::Update => replace_record(&mut products, confirmed),
                    MutationKind::Delete => false,
                };
                if merged {
                    self.cache.set(QueryKey::Products, products).await;
                }
            }
        }

        info!(
            mutation_id = %self.state.id(),
            kind = %self.state.kind(),
            "Mutation succeeded"
        );
        self.notifier.success(self.state.kind().success_message());
        self.reconcile().await;
    }

    /// Undo the change and report `error`.
    ///
    /// Returns the error to hand back to the caller.
    pub async fn fail(mut self, error: ServiceError) -> MutationError {
        let kind = self.state.kind();
        self.state.advance(MutationStatus::SettledFailure);

        rollback(self.cache.as_ref(), &self.list_lock, &self.undo).await;
        self.armed = false;

        let message = error
            .message()
            .unwrap_or_else(|| kind.failure_message().to_string());
        warn!(
            mutation_id = %self.state.id(),
            %kind,
            error = %error,
            "Mutation failed, speculative change undone"
        );
        self.notifier.error(&message);
        self.reconcile().await;

        MutationError::Remote {
            kind,
            message,
            source: error,
        }
    }

    async fn reconcile(&mut self) {
        self.cache.invalidate(QueryKey::Products).await;
        self.state.advance(MutationStatus::Reconciled);
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mutation_id = self.state.id();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(%mutation_id, "Unsettled mutation dropped outside a runtime, cache left speculative");
            return;
        };

        warn!(%mutation_id, "Unsettled mutation dropped, undoing speculative change");
        let cache = Arc::clone(&self.cache);
        let list_lock = Arc::clone(&self.list_lock);
        let undo = std::mem::replace(&mut self.undo, Undo::Nothing);
        let key_guard = self.key_guard.take();
        handle.spawn(async move {
            rollback(cache.as_ref(), &list_lock, &undo).await;
            cache.invalidate(QueryKey::Products).await;
            drop(key_guard);
        });
    }
}

/// Inverse of a speculative change.
#[derive(Debug, Clone)]
enum Undo {
    /// Drop the temporary entry of a create.
    Remove(ProductId),
    /// Put back the record an update overwrote.
    Restore(Product),
    /// Put back a deleted record at its old position.
    Reinsert { index: usize, product: Product },
    /// The target was not cached; nothing changed.
    Nothing,
}

impl Undo {
    /// Apply to `products`. Returns whether anything changed.
    fn apply(&self, products: &mut Vec<Product>) -> bool {
        match self {
            Self::Remove(id) => {
                let before = products.len();
                products.retain(|p| p.id != *id);
                products.len() != before
            }
            Self::Restore(previous) => replace_record(products, previous.clone()),
            Self::Reinsert { index, product } => {
                if products.iter().any(|p| p.id == product.id) {
                    return false;
                }
                products.insert((*index).min(products.len()), product.clone());
                true
            }
            Self::Nothing => false,
        }
    }
}

async fn rollback(cache: &dyn QueryCache, list_lock: &Mutex<()>, undo: &Undo) {
    let _list = list_lock.lock().await;
    let mut products = cache.get(QueryKey::Products).await.unwrap_or_default();
    if undo.apply(&mut products) {
        cache.set(QueryKey::Products, products).await;
    }
}

/// Swap the temporary entry for the created record.
///
/// If a refresh already brought in the created record, the temporary entry is
/// dropped instead so ids stay unique.
fn replace_temporary(products: &mut Vec<Product>, temporary: ProductId, created: Product) -> bool {
    if products.iter().any(|p| p.id == created.id) {
        let before = products.len();
        products.retain(|p| p.id != temporary);
        return products.len() != before;
    }
    match products.iter_mut().find(|p| p.id == temporary) {
        Some(slot) => {
            *slot = created;
            true
        }
        None => false,
    }
}

fn replace_record(products: &mut [Product], record: Product) -> bool {
    match products.iter_mut().find(|p| p.id == record.id) {
        Some(slot) => {
            *slot = record;
            true
        }
        None => false,
    }
}

/// Decrements the per-kind in-flight counter on drop.
struct InFlight {
    counters: Arc<InFlightCounters>,
    slot: usize,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counters[self.slot].fetch_sub(1, Ordering::SeqCst);
    }
}
