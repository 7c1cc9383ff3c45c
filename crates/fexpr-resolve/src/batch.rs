use std::collections::BTreeMap;

use fexpr_lang::{Record, Value};
use futures::future::join_all;

use crate::Error;
use crate::evaluator::{Evaluator, Mode, Round};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Results by expression name. Expressions that failed to evaluate are absent.
    pub values: BTreeMap<String, Value>,
    pub rounds: usize,
    pub diagnostics: Vec<Error>,
    pub settled: bool,
}

impl Evaluator {
    /// Evaluates named expressions against one record, sharing a single lookup
    /// per round. Any pending feature re-runs the whole batch.
    pub async fn evaluate_all<K, V>(
        &self,
        exprs: impl IntoIterator<Item = (K, V)>,
        record: &Record,
        mode: Mode,
    ) -> BatchOutcome
    where
        K: Into<String>,
        V: Into<String>,
    {
        let exprs = exprs
            .into_iter()
            .map(|(name, text)| (name.into(), text.into()))
            .collect::<Vec<(String, String)>>();
        let mut rounds = 0;

        loop {
            rounds += 1;
            let round = self.batch_round(&exprs, record, mode);

            if round.pending.is_empty() {
                tracing::debug!(rounds, expressions = exprs.len(), "Batch settled");
                return BatchOutcome {
                    values: round.value,
                    rounds,
                    diagnostics: round.diagnostics,
                    settled: true,
                };
            }

            if rounds >= self.config().max_rounds {
                tracing::warn!(rounds, "Batch did not settle");
                let mut diagnostics = round.diagnostics;
                diagnostics.push(Error::RoundLimitExceeded { rounds });
                return BatchOutcome {
                    values: round.value,
                    rounds,
                    diagnostics,
                    settled: false,
                };
            }

            tracing::debug!(round = rounds, pending = round.pending.len(), "Batch waiting for features");
            join_all(round.pending).await;
        }
    }

    fn batch_round(
        &self,
        exprs: &[(String, String)],
        record: &Record,
        mode: Mode,
    ) -> Round<BTreeMap<String, Value>> {
        let mut lookup = self.lookup();
        let mut values = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for (name, text) in exprs {
            match self.eval_in(text, record, mode, &mut lookup) {
                Ok(value) => {
                    values.insert(name.clone(), value);
                }
                Err(err) => diagnostics.push(err.into()),
            }
        }

        Round {
            value: values,
            pending: lookup.into_pending(),
            diagnostics,
        }
    }
}
