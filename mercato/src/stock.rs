use crate::domain::{Product, StockSnapshot};
use crate::events::StockUpdate;
use crate::ports::StockFeed;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Callback invoked for every stock update, on the stream task.
/// Must be cheap; heavy consumers should hand off to their own channel.
pub type StockCallback = Arc<dyn Fn(&StockUpdate) + Send + Sync>;

type Registry = Mutex<Vec<(Uuid, StockCallback)>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handle for one registered callback. Dropping it (or calling
/// `unsubscribe`) removes exactly that callback; other subscribers are
/// unaffected.
pub struct Subscription {
    id: Uuid,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the callback. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Client for the live stock push stream.
///
/// Keeps the authoritative in-memory snapshot per product and fans valid
/// updates out to subscribers in subscription order. The connection runs
/// `Disconnected -> Connecting -> Connected` and falls back to
/// `Disconnected` on any error, reconnecting after a jittered backoff for
/// as long as the process lives. There is no terminal failure state.
pub struct StockStream {
    feed: Arc<dyn StockFeed>,
    snapshots: DashMap<String, StockSnapshot>,
    subscribers: Arc<Registry>,
    state: Mutex<ConnectionState>,
    backoff: Duration,
    started: AtomicBool,
}

impl StockStream {
    pub fn new(feed: Arc<dyn StockFeed>, backoff: Duration) -> Arc<Self> {
        Arc::new(Self {
            feed,
            snapshots: DashMap::new(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            state: Mutex::new(ConnectionState::Disconnected),
            backoff,
            started: AtomicBool::new(false),
        })
    }

    /// Start the connection loop. Idempotent: a second call while the loop
    /// is already running is a no-op.
    pub fn init(self: Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("stock stream already initialized");
            return;
        }
        tokio::spawn(async move {
            self.run().await;
        });
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Register a callback for future updates. The returned handle removes
    /// the callback when dropped.
    pub fn subscribe(&self, callback: impl Fn(&StockUpdate) + Send + Sync + 'static) -> Subscription {
        let id = Uuid::new_v4();
        self.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Latest known availability for a product, or a variant of it.
    ///
    /// `None` means no push or seed has ever been seen for the product.
    /// A variant missing from the snapshot's map falls back to the
    /// product-level figure: variant-less stock is the ceiling until
    /// variant-specific data arrives.
    pub fn available(&self, product_id: &str, variant_id: Option<&str>) -> Option<u32> {
        let snapshot = self.snapshots.get(product_id)?;
        match variant_id {
            Some(variant) => Some(
                snapshot
                    .variant_stocks
                    .get(variant)
                    .copied()
                    .unwrap_or(snapshot.stock),
            ),
            None => Some(snapshot.stock),
        }
    }

    /// Pre-populate the snapshot from data the caller already holds, e.g.
    /// a page-load API response, so readers see figures before the first
    /// push arrives. Seeding without a variant map keeps a previously known
    /// map rather than clobbering it.
    pub fn seed(
        &self,
        product_id: impl Into<String>,
        stock: u32,
        variant_stocks: Option<HashMap<String, u32>>,
    ) {
        match self.snapshots.entry(product_id.into()) {
            Entry::Occupied(mut entry) => {
                let snapshot = entry.get_mut();
                snapshot.stock = stock;
                if let Some(variants) = variant_stocks {
                    snapshot.variant_stocks = variants;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(StockSnapshot {
                    stock,
                    variant_stocks: variant_stocks.unwrap_or_default(),
                });
            }
        }
    }

    /// Seed from a freshly fetched product listing, closing the gap
    /// between page load and the first push. Listings without variant data
    /// leave any previously known variant map in place.
    pub fn seed_products(&self, products: &[Product]) {
        for product in products {
            let variants =
                (!product.variant_stocks.is_empty()).then(|| product.variant_stocks.clone());
            self.seed(product.id.clone(), product.stock, variants);
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.set_state(ConnectionState::Connecting);
            match self.feed.connect().await {
                Ok(mut frames) => {
                    self.set_state(ConnectionState::Connected);
                    info!("stock stream connected");
                    while let Some(frame) = frames.next().await {
                        match frame {
                            Ok(body) => self.apply(&body),
                            Err(e) => {
                                warn!("stock stream read failed: {}", e);
                                break;
                            }
                        }
                    }
                    self.set_state(ConnectionState::Disconnected);
                    info!("stock stream disconnected");
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    warn!("stock stream connect failed: {}", e);
                }
            }
            tokio::time::sleep(jittered(self.backoff)).await;
        }
    }

    /// Apply one raw event body: parse, overwrite the snapshot, fan out.
    /// Malformed payloads are dropped; they never terminate the stream.
    fn apply(&self, body: &str) {
        let update: StockUpdate = match serde_json::from_str(body) {
            Ok(update) => update,
            Err(e) => {
                debug!("dropping malformed stock payload: {}", e);
                return;
            }
        };

        self.snapshots.insert(
            update.product_id.clone(),
            StockSnapshot {
                stock: update.stock,
                variant_stocks: update.variant_stocks.clone(),
            },
        );

        let callbacks: Vec<StockCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        debug!(
            "stock update for '{}' fanned out to {} subscriber(s)",
            update.product_id,
            callbacks.len()
        );
        for callback in callbacks {
            callback(&update);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock() = next;
    }
}

impl std::fmt::Debug for StockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockStream")
            .field("state", &self.state())
            .field("products", &self.snapshots.len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

/// Spread reconnect attempts so a fleet of clients does not hit the stream
/// endpoint in lockstep after a backend restart.
fn jittered(base: Duration) -> Duration {
    let factor = rand::rng().random_range(0.8..1.2);
    base.mul_f64(factor)
}
