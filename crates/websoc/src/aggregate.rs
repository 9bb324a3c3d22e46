//! Fan-out of sub-queries against WebSoc with round-based retries.
//!
//! Each round issues every pending sub-query concurrently and waits for all
//! of them to settle. Successes are folded into a running accumulator;
//! failures are retried in the next round after an exponential backoff:
//! 1. Round 0 fetches every sub-query
//! 2. Round `n` re-fetches only what failed in round `n - 1`, after
//!    sleeping `base_backoff * 2^(n-1)`
//! 3. The loop stops when nothing failed or the attempt budget is spent
//! 4. The accumulated tree is normalized and sorted

use crate::config::{AggregatorConfig, TerminalPolicy};
use crate::error::{AggregateError, FetchError};
use crate::merge::{merge, TreeAccumulator};
use crate::normalize::normalize_tree;
use crate::sort::sorted;
use crate::types::{MergedTree, RawPartialTree, SubQuery};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Something that can answer one sub-query with a partial tree.
#[async_trait]
pub trait SubQueryFetcher: Send + Sync {
    async fn fetch(&self, query: &SubQuery) -> Result<RawPartialTree, FetchError>;
}

#[async_trait]
impl<T: SubQueryFetcher + ?Sized> SubQueryFetcher for Arc<T> {
    async fn fetch(&self, query: &SubQuery) -> Result<RawPartialTree, FetchError> {
        (**self).fetch(query).await
    }
}

/// Adapts an async closure into a [`SubQueryFetcher`].
pub struct FnFetcher<F>(pub F);

#[async_trait]
impl<F, Fut> SubQueryFetcher for FnFetcher<F>
where
    F: Fn(SubQuery) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawPartialTree, FetchError>> + Send,
{
    async fn fetch(&self, query: &SubQuery) -> Result<RawPartialTree, FetchError> {
        (self.0)(query.clone()).await
    }
}

/// Settled results of one round, in sub-query input order.
#[derive(Debug, Default)]
struct RoundOutcome {
    successes: Vec<RawPartialTree>,
    failed: Vec<(usize, SubQuery)>,
}

/// What happened during one aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    /// Rounds run, including the first
    pub rounds: u32,
    /// Total fetch calls issued
    pub attempts: usize,
    /// Sub-queries that never succeeded and whose data is missing
    pub dropped: Vec<SubQuery>,
}

impl AggregationReport {
    pub fn retry_rounds(&self) -> u32 {
        self.rounds.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub tree: MergedTree,
    pub report: AggregationReport,
}

/// Per-call loop state. Nothing here outlives a single `aggregate` call.
struct RoundState {
    round: u32,
    pending: Vec<(usize, SubQuery)>,
    accumulator: TreeAccumulator,
    attempts: usize,
}

/// Drives sub-queries through a [`SubQueryFetcher`] and assembles the result.
pub struct Aggregator<F> {
    fetcher: F,
    config: AggregatorConfig,
}

impl<F: SubQueryFetcher> Aggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, AggregatorConfig::default())
    }

    pub fn with_config(fetcher: F, config: AggregatorConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Fetches, merges, normalizes and sorts every sub-query.
    ///
    /// Returns either the complete tree or a single terminal error; partial
    /// failures that do not trip the terminal policy are left out silently.
    pub async fn aggregate(
        &self,
        queries: Vec<SubQuery>,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<MergedTree, AggregateError> {
        self.aggregate_with_report(queries, correlation_id, cancel)
            .await
            .map(|aggregation| aggregation.tree)
    }

    /// Same as [`Aggregator::aggregate`] but also returns what happened.
    pub async fn aggregate_with_report(
        &self,
        queries: Vec<SubQuery>,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AggregateError> {
        validate(&queries)?;

        let start = Instant::now();
        info!(
            correlation_id = %correlation_id,
            sub_queries = queries.len(),
            "Starting WebSoc aggregation"
        );

        let mut state = RoundState {
            round: 0,
            pending: queries.into_iter().enumerate().collect(),
            accumulator: TreeAccumulator::new(),
            attempts: 0,
        };

        loop {
            state.attempts += state.pending.len();
            let pending = std::mem::take(&mut state.pending);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(correlation_id = %correlation_id, round = state.round, "Aggregation cancelled mid-round");
                    return Err(AggregateError::Cancelled);
                }
                outcome = self.run_round(state.round, pending, correlation_id) => outcome,
            };

            for tree in outcome.successes {
                state.accumulator.absorb(tree);
            }
            state.pending = outcome.failed;

            if state.pending.is_empty() || state.round + 1 >= self.config.max_attempts {
                break;
            }

            let delay = self.config.backoff(state.round);
            info!(
                correlation_id = %correlation_id,
                round = state.round,
                failed = state.pending.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying failed sub-queries after backoff"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(correlation_id = %correlation_id, round = state.round, "Aggregation cancelled during backoff");
                    return Err(AggregateError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            state.round += 1;
        }

        let report = AggregationReport {
            rounds: state.round + 1,
            attempts: state.attempts,
            dropped: state.pending.into_iter().map(|(_, q)| q).collect(),
        };

        if self.is_terminal(&report) {
            error!(
                correlation_id = %correlation_id,
                rounds = report.rounds,
                residual = report.dropped.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "WebSoc failed to respond too many times"
            );
            return Err(AggregateError::UpstreamUnavailable {
                rounds: report.rounds,
                residual: report.dropped.len(),
            });
        }

        for query in &report.dropped {
            warn!(
                correlation_id = %correlation_id,
                sub_query = %query,
                "Dropping sub-query after exhausting retries"
            );
        }

        let tree = sorted(normalize_tree(state.accumulator.finish()));
        info!(
            correlation_id = %correlation_id,
            rounds = report.rounds,
            attempts = report.attempts,
            schools = tree.schools.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "WebSoc aggregation completed"
        );

        Ok(Aggregation { tree, report })
    }

    fn is_terminal(&self, report: &AggregationReport) -> bool {
        match self.config.terminal_policy {
            // Trips whenever the last permitted round ran, whatever its result.
            TerminalPolicy::RoundCount => {
                report.retry_rounds() > 0 && report.rounds >= self.config.max_attempts
            }
            TerminalPolicy::ResidualFailures => !report.dropped.is_empty(),
        }
    }

    /// Issues every pending sub-query at once (bounded by `max_concurrency`)
    /// and waits for all of them. Results are put back in input order so the
    /// fold is independent of completion order.
    async fn run_round(
        &self,
        round: u32,
        pending: Vec<(usize, SubQuery)>,
        correlation_id: &str,
    ) -> RoundOutcome {
        let mut settled: Vec<(usize, SubQuery, Result<RawPartialTree, FetchError>, Duration)> =
            stream::iter(pending)
                .map(|(index, query)| async move {
                    let start = Instant::now();
                    let result = self.fetcher.fetch(&query).await;
                    (index, query, result, start.elapsed())
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;
        settled.sort_by_key(|(index, ..)| *index);

        let mut outcome = RoundOutcome::default();
        for (index, query, result, elapsed) in settled {
            match result {
                Ok(tree) => {
                    info!(
                        correlation_id = %correlation_id,
                        round = round,
                        sub_query = %query,
                        duration_ms = elapsed.as_millis() as u64,
                        "Sub-query succeeded"
                    );
                    outcome.successes.push(tree);
                }
                Err(e) => {
                    warn!(
                        correlation_id = %correlation_id,
                        round = round,
                        sub_query = %query,
                        error = %e,
                        retryable = e.is_retryable(),
                        duration_ms = elapsed.as_millis() as u64,
                        "Sub-query failed"
                    );
                    outcome.failed.push((index, query));
                }
            }
        }

        debug!(
            correlation_id = %correlation_id,
            round = round,
            succeeded = outcome.successes.len(),
            failed = outcome.failed.len(),
            "Round settled"
        );
        outcome
    }
}

/// Rejects an empty sub-query list or a sub-query that narrows nothing.
pub fn validate(queries: &[SubQuery]) -> Result<(), AggregateError> {
    if queries.is_empty() {
        return Err(AggregateError::InvalidInput {
            message: "at least one sub-query is required".to_string(),
        });
    }
    for (index, query) in queries.iter().enumerate() {
        if query.term.trim().is_empty() {
            return Err(AggregateError::InvalidInput {
                message: format!("sub-query {index} has no term"),
            });
        }
        if !query.has_filter() {
            return Err(AggregateError::InvalidInput {
                message: format!("sub-query {index} ({query}) has no filter"),
            });
        }
    }
    Ok(())
}

/// Merges, normalizes and sorts already-fetched partial trees.
pub fn assemble<I>(trees: I) -> MergedTree
where
    I: IntoIterator<Item = RawPartialTree>,
{
    sorted(normalize_tree(merge(trees)))
}

/// Generates a unique correlation ID for request tracing.
pub fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawDepartment, RawSchool};

    fn dept_tree(code: &str) -> RawPartialTree {
        RawPartialTree {
            schools: vec![RawSchool {
                name: "ICS".to_string(),
                departments: vec![RawDepartment {
                    name: code.to_string(),
                    code: code.to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            validate(&[]),
            Err(AggregateError::InvalidInput { .. })
        ));
        let unfiltered = SubQuery {
            term: "2024 Fall".to_string(),
            ..Default::default()
        };
        assert!(validate(&[unfiltered]).is_err());
        assert!(validate(&[SubQuery::department("2024 Fall", "COMPSCI")]).is_ok());
    }

    #[test]
    fn test_assemble_is_order_independent() {
        let a = assemble(vec![dept_tree("COMPSCI"), dept_tree("I&C SCI")]);
        let b = assemble(vec![dept_tree("I&C SCI"), dept_tree("COMPSCI")]);
        assert_eq!(a, b);
        assert_eq!(a.schools[0].departments[0].code, "COMPSCI");
    }

    #[test]
    fn test_correlation_ids_differ() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }

    #[tokio::test]
    async fn test_fn_fetcher_single_round() {
        let aggregator = Aggregator::new(FnFetcher(|q: SubQuery| async move {
            Ok::<_, FetchError>(dept_tree(q.department.as_deref().unwrap_or_default()))
        }));
        let aggregation = aggregator
            .aggregate_with_report(
                vec![SubQuery::department("2024 Fall", "COMPSCI")],
                "test",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(aggregation.report.rounds, 1);
        assert_eq!(aggregation.report.attempts, 1);
        assert_eq!(aggregation.tree.schools[0].departments[0].code, "COMPSCI");
    }
}
