use std::sync::Arc;

use crate::value::{Record, Value};

/// Access to features of other datasets during evaluation.
///
/// Implementations must not block: a feature that is not available yet is
/// reported as `None`, and the caller is expected to evaluate again once it is.
pub trait FeatureLookup {
    fn get_feature(&mut self, dataset: &str, attribute: &str, value: &Value)
    -> Option<Arc<Record>>;
}

/// A lookup for expressions evaluated without any foreign dataset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLookup;

impl FeatureLookup for NoLookup {
    fn get_feature(&mut self, _: &str, _: &str, _: &Value) -> Option<Arc<Record>> {
        None
    }
}

/// State threaded through one evaluation of an expression tree.
pub struct Context<'a> {
    record: &'a Record,
    filter_mode: bool,
    lookup: &'a mut dyn FeatureLookup,
}

impl<'a> Context<'a> {
    pub fn new(record: &'a Record, lookup: &'a mut dyn FeatureLookup) -> Self {
        Self {
            record,
            filter_mode: false,
            lookup,
        }
    }

    pub fn with_filter_mode(mut self, filter_mode: bool) -> Self {
        self.filter_mode = filter_mode;
        self
    }

    pub fn record(&self) -> &Record {
        self.record
    }

    pub fn is_filter_mode(&self) -> bool {
        self.filter_mode
    }

    pub fn get_feature(
        &mut self,
        dataset: &str,
        attribute: &str,
        value: &Value,
    ) -> Option<Arc<Record>> {
        self.lookup.get_feature(dataset, attribute, value)
    }
}
