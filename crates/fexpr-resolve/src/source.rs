use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fexpr_lang::{Filter, Record};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Receives the records matching a request. Must be called exactly once.
pub type FetchCallback = Box<dyn FnOnce(Vec<Arc<Record>>) + Send + 'static>;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    pub dataset: SmolStr,
    pub crs: String,
    pub page_size: Option<usize>,
    pub filters: Vec<Filter>,
}

impl FeatureRequest {
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }
}

/// The external service that serves feature records.
///
/// `get_features` returns immediately; results are delivered later through
/// `on_result`, possibly from another thread.
pub trait FeatureSource: Send + Sync {
    fn get_features(&self, request: FeatureRequest, on_result: FetchCallback);
}

/// A feature source answering from datasets held in memory.
///
/// When called inside a tokio runtime the answer is delivered from a spawned
/// task after the configured latency; otherwise it is delivered inline.
#[derive(Debug, Default)]
pub struct MemorySource {
    datasets: FxHashMap<SmolStr, Vec<Arc<Record>>>,
    latency: Option<Duration>,
    requests: Mutex<Vec<FeatureRequest>>,
    dispatched: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, name: &str, records: impl IntoIterator<Item = Record>) -> Self {
        self.datasets
            .entry(SmolStr::new(name))
            .or_default()
            .extend(records.into_iter().map(Arc::new));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `get_features` calls received so far.
    pub fn dispatch_count(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FeatureRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn select(&self, request: &FeatureRequest) -> Vec<Arc<Record>> {
        let records = self
            .datasets
            .get(&request.dataset)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| request.matches(record))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        match request.page_size {
            Some(page_size) => records.into_iter().take(page_size).collect(),
            None => records,
        }
    }
}

impl FeatureSource for MemorySource {
    fn get_features(&self, request: FeatureRequest, on_result: FetchCallback) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        let records = self.select(&request);

        tracing::debug!(
            dataset = %request.dataset,
            matched = records.len(),
            "Serving features from memory"
        );

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let latency = self.latency;
                handle.spawn(async move {
                    if let Some(latency) = latency {
                        tokio::time::sleep(latency).await;
                    }
                    on_result(records);
                });
            }
            Err(_) => on_result(records),
        }
    }
}
