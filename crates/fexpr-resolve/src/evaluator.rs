use std::sync::Arc;

use fexpr_lang::{Context, Record, Value};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::Error;
use crate::cache::{Cache, PendingFetch};
use crate::config::Config;
use crate::context::RoundLookup;
use crate::source::FeatureSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The expression's value is returned as is.
    #[default]
    Value,
    /// Comparisons against fields become filters; the result is wrapped in a one-element array.
    Filter,
}

impl Mode {
    pub fn is_filter(&self) -> bool {
        matches!(self, Mode::Filter)
    }

    fn wrap(&self, raw: Value) -> Value {
        match self {
            Mode::Value => raw,
            Mode::Filter => Value::Array(vec![raw]),
        }
    }

    /// Result reported for an expression that could not be evaluated.
    pub fn neutral(&self) -> Value {
        match self {
            Mode::Value => Value::None,
            Mode::Filter => Value::Array(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Value,
    /// Number of rounds evaluated so far, starting at 1.
    pub rounds: usize,
    pub diagnostics: Vec<Error>,
    /// `false` while lookups of the last round are still outstanding.
    pub settled: bool,
}

pub enum Evaluation {
    Final(Outcome),
    /// The first round needed features that were not cached yet. `settled`
    /// drives the remaining rounds.
    Provisional {
        outcome: Outcome,
        settled: BoxFuture<'static, Outcome>,
    },
}

impl Evaluation {
    pub fn outcome(&self) -> &Outcome {
        match self {
            Evaluation::Final(outcome) => outcome,
            Evaluation::Provisional { outcome, .. } => outcome,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Evaluation::Final(_))
    }

    pub async fn settle(self) -> Outcome {
        match self {
            Evaluation::Final(outcome) => outcome,
            Evaluation::Provisional { settled, .. } => settled.await,
        }
    }
}

pub(crate) struct Round<T> {
    pub value: T,
    pub pending: Vec<PendingFetch>,
    pub diagnostics: Vec<Error>,
}

/// Evaluates expressions against a record, re-running them until every
/// feature they look up is in the cache.
#[derive(Clone)]
pub struct Evaluator {
    cache: Cache,
    source: Arc<dyn FeatureSource>,
    config: Config,
}

impl Evaluator {
    pub fn new(cache: Cache, source: Arc<dyn FeatureSource>) -> Self {
        Self {
            cache,
            source,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn lookup(&self) -> RoundLookup<'_> {
        RoundLookup::new(&self.cache, self.source.as_ref(), &self.config)
    }

    /// Evaluates one expression with a lookup that may be shared with other expressions of the same round.
    pub(crate) fn eval_in(
        &self,
        text: &str,
        record: &Record,
        mode: Mode,
        lookup: &mut RoundLookup<'_>,
    ) -> Result<Value, fexpr_lang::Error> {
        let text = self.config.newline_mode.normalize(text);
        let mut ctx = Context::new(record, lookup).with_filter_mode(mode.is_filter());

        fexpr_lang::eval(&text, &mut ctx)
            .map(|raw| mode.wrap(raw))
            .inspect_err(|err| {
                tracing::warn!(expression = %text, error = %err, "Failed to evaluate expression");
            })
    }

    fn round(&self, text: &str, record: &Record, mode: Mode) -> Round<Value> {
        let mut lookup = self.lookup();

        match self.eval_in(text, record, mode, &mut lookup) {
            Ok(value) => Round {
                value,
                pending: lookup.into_pending(),
                diagnostics: Vec::new(),
            },
            Err(err) => Round {
                value: mode.neutral(),
                pending: Vec::new(),
                diagnostics: vec![err.into()],
            },
        }
    }

    /// Runs the first round now. If it needed features that are not cached yet,
    /// the remaining rounds are returned as a future.
    pub fn evaluate(&self, text: &str, record: &Record, mode: Mode) -> Evaluation {
        let round = self.round(text, record, mode);

        if round.pending.is_empty() {
            return Evaluation::Final(Outcome {
                value: round.value,
                rounds: 1,
                diagnostics: round.diagnostics,
                settled: true,
            });
        }

        tracing::debug!(pending = round.pending.len(), "First round is provisional");

        let outcome = Outcome {
            value: round.value.clone(),
            rounds: 1,
            diagnostics: round.diagnostics.clone(),
            settled: false,
        };
        let this = self.clone();
        let text = text.to_string();
        let record = record.clone();

        Evaluation::Provisional {
            outcome,
            settled: async move { this.settle(text, record, mode, round).await }.boxed(),
        }
    }

    pub async fn evaluate_settled(&self, text: &str, record: &Record, mode: Mode) -> Outcome {
        self.evaluate(text, record, mode).settle().await
    }

    /// Returns the first round's outcome. When it is provisional the remaining
    /// rounds run on the tokio runtime and `on_reevaluate` receives the settled
    /// outcome, exactly once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn evaluate_with_callback<F>(
        &self,
        text: &str,
        record: &Record,
        mode: Mode,
        on_reevaluate: F,
    ) -> Outcome
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        match self.evaluate(text, record, mode) {
            Evaluation::Final(outcome) => outcome,
            Evaluation::Provisional { outcome, settled } => {
                tokio::spawn(async move {
                    on_reevaluate(settled.await);
                });
                outcome
            }
        }
    }

    async fn settle(self, text: String, record: Record, mode: Mode, first: Round<Value>) -> Outcome {
        let mut last = first;
        let mut rounds = 1;

        loop {
            if last.pending.is_empty() {
                tracing::debug!(rounds, "Evaluation settled");
                return Outcome {
                    value: last.value,
                    rounds,
                    diagnostics: last.diagnostics,
                    settled: true,
                };
            }

            if rounds >= self.config.max_rounds {
                tracing::warn!(expression = %text, rounds, "Evaluation did not settle");
                let mut diagnostics = last.diagnostics;
                diagnostics.push(Error::RoundLimitExceeded { rounds });
                return Outcome {
                    value: last.value,
                    rounds,
                    diagnostics,
                    settled: false,
                };
            }

            tracing::debug!(round = rounds, pending = last.pending.len(), "Waiting for features");
            join_all(last.pending).await;
            rounds += 1;
            last = self.round(&text, &record, mode);
        }
    }
}
