use std::sync::Arc;

use fexpr_lang::{FeatureLookup, Record, Value};

use crate::cache::{Cache, PendingFetch};
use crate::config::Config;
use crate::source::FeatureSource;

/// Binds `getFeature` to the cache for one evaluation round and collects the
/// fetches the round has to wait for.
pub struct RoundLookup<'a> {
    cache: &'a Cache,
    source: &'a dyn FeatureSource,
    config: &'a Config,
    pending: Vec<PendingFetch>,
}

impl<'a> RoundLookup<'a> {
    pub fn new(cache: &'a Cache, source: &'a dyn FeatureSource, config: &'a Config) -> Self {
        Self {
            cache,
            source,
            config,
            pending: Vec::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn into_pending(self) -> Vec<PendingFetch> {
        self.pending
    }
}

impl FeatureLookup for RoundLookup<'_> {
    fn get_feature(&mut self, dataset: &str, attribute: &str, value: &Value) -> Option<Arc<Record>> {
        let resolution =
            self.cache
                .resolve_dependency(dataset, attribute, value, self.source, self.config);

        if let Some(pending) = resolution.pending {
            self.pending.push(pending);
        }

        resolution.value
    }
}
