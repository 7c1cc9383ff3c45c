use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fexpr_lang::{Filter, Record, Value};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use smol_str::SmolStr;

use crate::config::{Config, PendingPolicy};
use crate::source::{FeatureRequest, FeatureSource};

/// Identifies one lookup: a dataset, an attribute and the looked-up value.
///
/// The value is kept in its canonical text form, so `42` and `"42"` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: SmolStr,
    pub attribute: SmolStr,
    pub value: SmolStr,
}

impl CacheKey {
    pub fn new(dataset: &str, attribute: &str, value: &Value) -> Self {
        Self {
            dataset: SmolStr::new(dataset),
            attribute: SmolStr::new(attribute),
            value: SmolStr::new(value.to_string()),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}={}", self.dataset, self.attribute, self.value)
    }
}

/// Completes once the fetch it was created for has stored its result.
#[derive(Clone)]
pub struct PendingFetch(Shared<BoxFuture<'static, ()>>);

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingFetch").finish()
    }
}

impl Future for PendingFetch {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Found(Arc<Record>),
    /// The lookup completed without exactly one matching record.
    Absent,
    Pending,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub value: Option<Arc<Record>>,
    pub pending: Option<PendingFetch>,
}

#[derive(Clone)]
enum Slot {
    Pending {
        fetch_id: u64,
        done: PendingFetch,
    },
    Resolved(Option<Arc<Record>>),
}

/// Memoizes fetched records and deduplicates in-flight fetches.
///
/// Cloning yields another handle to the same cache.
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<DashMap<CacheKey, Slot>>,
    next_fetch_id: Arc<AtomicU64>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("resolved", &self.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CacheKey) -> LookupResult {
        match self.entries.get(key).as_deref() {
            Some(Slot::Resolved(Some(record))) => LookupResult::Found(Arc::clone(record)),
            Some(Slot::Resolved(None)) => LookupResult::Absent,
            Some(Slot::Pending { .. }) => LookupResult::Pending,
            None => LookupResult::Unknown,
        }
    }

    /// Returns the cached record for the key, dispatching a fetch when the key was never requested.
    ///
    /// At most one fetch per key is in flight; the check and the insertion of the
    /// pending marker happen under the same entry lock.
    pub fn resolve_dependency(
        &self,
        dataset: &str,
        attribute: &str,
        value: &Value,
        source: &dyn FeatureSource,
        config: &Config,
    ) -> Resolution {
        let key = CacheKey::new(dataset, attribute, value);

        let (fetch_id, done, tx) = match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                return match entry.get() {
                    Slot::Resolved(record) => {
                        tracing::trace!(%key, found = record.is_some(), "Cache hit");
                        Resolution {
                            value: record.clone(),
                            pending: None,
                        }
                    }
                    Slot::Pending { done, .. } => {
                        tracing::trace!(%key, policy = %config.pending_policy, "Fetch already in flight");
                        Resolution {
                            value: None,
                            pending: match config.pending_policy {
                                PendingPolicy::Attach => Some(done.clone()),
                                PendingPolicy::Detach => None,
                            },
                        }
                    }
                };
            }
            Entry::Vacant(entry) => {
                let fetch_id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel::<()>();
                let done = PendingFetch(rx.map(|_| ()).boxed().shared());
                entry.insert(Slot::Pending {
                    fetch_id,
                    done: done.clone(),
                });
                (fetch_id, done, tx)
            }
        };

        tracing::debug!(%key, fetch_id, "Dispatching feature request");

        let request = FeatureRequest {
            dataset: key.dataset.clone(),
            crs: config.crs.clone(),
            page_size: config.page_size,
            filters: vec![Filter::eq(attribute, value.clone())],
        };
        let completion = Completion {
            entries: Arc::clone(&self.entries),
            key,
            fetch_id,
            done: Some(tx),
        };

        source.get_features(request, Box::new(move |records| completion.finish(records)));

        Resolution {
            value: None,
            pending: Some(done),
        }
    }

    /// Forgets every entry. Fetches still in flight complete and release their
    /// waiters, but their results are not stored.
    pub fn clear(&self) {
        tracing::debug!(
            resolved = self.len(),
            pending = self.pending_count(),
            "Clearing cache"
        );
        self.entries.clear();
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Resolved(_)))
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Pending { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stores a fetch's result when the source answers. A source that drops the
/// callback without answering frees the key so a later lookup dispatches again.
struct Completion {
    entries: Arc<DashMap<CacheKey, Slot>>,
    key: CacheKey,
    fetch_id: u64,
    done: Option<oneshot::Sender<()>>,
}

impl Completion {
    fn finish(mut self, records: Vec<Arc<Record>>) {
        let matched = records.len();
        let record = match <[_; 1]>::try_from(records) {
            Ok([record]) => Some(record),
            Err(_) => None,
        };

        match self.entries.get_mut(&self.key) {
            Some(mut slot) if self.owns(&slot) => {
                tracing::debug!(key = %self.key, fetch_id = self.fetch_id, matched, "Feature request completed");
                *slot = Slot::Resolved(record);
            }
            _ => {
                tracing::debug!(key = %self.key, fetch_id = self.fetch_id, "Discarding result of a fetch issued before the cache was cleared");
            }
        }

        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }

    fn owns(&self, slot: &Slot) -> bool {
        matches!(slot, Slot::Pending { fetch_id, .. } if *fetch_id == self.fetch_id)
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.done.is_none() {
            return;
        }

        let removed = self
            .entries
            .remove_if(&self.key, |_, slot| self.owns(slot))
            .is_some();
        tracing::debug!(key = %self.key, fetch_id = self.fetch_id, removed, "Feature request dropped without an answer");
        // Dropping the sender wakes every waiter.
    }
}
