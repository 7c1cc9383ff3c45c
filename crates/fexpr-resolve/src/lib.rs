//! `fexpr-resolve` evaluates fexpr expressions whose feature lookups are
//! served asynchronously.
//!
//! Each round evaluates the expression against the cache. Lookups that miss
//! dispatch one fetch per key and evaluate to `None`; once every fetch of the
//! round has completed the expression is evaluated again, until a round needs
//! nothing new.
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use fexpr_lang::{Record, Value};
//! use fexpr_resolve::{Cache, Evaluator, MemorySource, Mode};
//!
//! # tokio_test_block(async {
//! let source = MemorySource::new()
//!     .with_dataset("parcels", vec![Record::new().with("id", "42").with("area", 150)]);
//! let evaluator = Evaluator::new(Cache::new(), Arc::new(source));
//! let record = Record::new().with("parcel_id", "42");
//!
//! let outcome = evaluator
//!     .evaluate_settled("getFeature('parcels', 'id', {parcel_id}).area", &record, Mode::Value)
//!     .await;
//!
//! assert_eq!(outcome.value, Value::from(150));
//! assert_eq!(outcome.rounds, 2);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```
mod batch;
mod cache;
mod config;
mod context;
mod error;
mod evaluator;
mod source;

pub use batch::BatchOutcome;
pub use cache::{Cache, CacheKey, LookupResult, PendingFetch, Resolution};
pub use config::{Config, InvalidValue, NewlineMode, PendingPolicy};
pub use context::RoundLookup;
pub use error::Error;
pub use evaluator::{Evaluation, Evaluator, Mode, Outcome};
pub use source::{FeatureRequest, FeatureSource, FetchCallback, MemorySource};
