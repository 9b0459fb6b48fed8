//! Pipeline controller: drives pagination, filtering, dedup and publishing
//! for every work item on a bounded worker pool.
//!
//! Per item the state machine is `PENDING → PAGING → EXHAUSTED`, with the
//! side exits `DEFERRED` (fetch retries exhausted, cursor kept), `STOPPED`
//! (run-level stop seen at a page boundary) and `HALTED` (publish or
//! checkpoint failure). Pagination within an item is strictly sequential.
//!
//! Cursor ordering: a page's cursor is persisted only once every record
//! taken from that page has been flushed. Until then it is staged and
//! written together with the batch commit that covers those records.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::fetch::PageFetcher;
use crate::filter::RecordFilter;
use crate::ledger::{Admission, Ledger};
use crate::progress::{ProgressContext, SharedProgress};
use crate::publish::{BatchPublisher, RecordSink};
use crate::record::Position;
use crate::retry::BackoffPolicy;
use crate::shutdown::{StopReason, StopToken};
use crate::stats::{RunStats, RunSummary};
use crate::work_queue::ItemQueue;

/// Run-level knobs. `retries` lives in [`BackoffPolicy`], the popularity
/// cutoff in [`RecordFilter`] and `target_total` in [`Ledger`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub page_size: usize,
    /// Worker pool size
    pub concurrency: usize,
    /// Publish threshold
    pub batch_size: usize,
    pub inter_page_delay: Duration,
    pub inter_item_delay: Duration,
    /// Pages fetched per item per run; the cursor is kept for the next run
    pub max_pages_per_item: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            concurrency: 4,
            batch_size: 25,
            inter_page_delay: Duration::from_secs(2),
            inter_item_delay: Duration::from_secs(2),
            max_pages_per_item: None,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.page_size > 0, "page_size must be at least 1");
        anyhow::ensure!(self.concurrency > 0, "concurrency must be at least 1");
        anyhow::ensure!(self.batch_size > 0, "batch_size must be at least 1");
        anyhow::ensure!(
            self.max_pages_per_item != Some(0),
            "max_pages_per_item must be at least 1"
        );
        Ok(())
    }
}

/// How one item's processing ended in this run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Source has no more pages
    Exhausted,
    /// Fetch failed after all retries; cursor kept for a future run
    Deferred,
    /// Per-item page limit reached; cursor kept
    PageLimit,
    /// Run-level stop observed (target, interrupt, another worker halted)
    Stopped,
    /// Publish or checkpoint write failed
    Halted,
}

/// Final state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every item exhausted or deferred
    Complete,
    /// `target_total` reached
    TargetReached,
    /// Unrecoverable publish/checkpoint failure; re-run to resume
    Halted,
    /// Stopped by signal; re-run to resume
    Interrupted,
}

impl RunStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete | Self::TargetReached)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::TargetReached => "target reached",
            Self::Halted => "halted",
            Self::Interrupted => "interrupted",
        })
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub summary: RunSummary,
    /// Outcome per processed item, in completion order
    pub outcomes: Vec<(String, ItemOutcome)>,
}

/// Orchestrates a run over a set of items.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn RecordSink>,
    filter: RecordFilter,
    policy: BackoffPolicy,
    options: RunOptions,
    progress: SharedProgress,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("filter", &self.filter)
            .field("policy", &self.policy)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Per-run shared context handed to every worker.
struct RunCtx<'a> {
    ledger: &'a Ledger,
    stop: &'a StopToken,
    stats: &'a RunStats,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        sink: Arc<dyn RecordSink>,
        filter: RecordFilter,
        policy: BackoffPolicy,
        options: RunOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            filter,
            policy,
            options,
            progress: Arc::new(ProgressContext::hidden()),
        }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Process `items` against `ledger` until all are done or the run stops.
    ///
    /// Errors only for setup problems (invalid options, thread pool); every
    /// runtime failure is reported through [`RunReport::status`] after a
    /// final checkpoint save.
    pub fn run(&self, items: Vec<String>, ledger: &Ledger) -> anyhow::Result<RunReport> {
        self.options.validate()?;
        let start = Instant::now();
        let stop = StopToken::new();
        let stats = RunStats::default();
        let outcomes: Mutex<Vec<(String, ItemOutcome)>> = Mutex::new(Vec::new());

        let items_total = items.len();
        if ledger.target_met() {
            log::info!(
                "target already reached: total_accepted={} target={}",
                ledger.total_accepted(),
                ledger.target_total().unwrap_or_default()
            );
            return Ok(RunReport {
                status: RunStatus::TargetReached,
                summary: stats.summary(items_total, ledger.total_accepted(), start.elapsed()),
                outcomes: Vec::new(),
            });
        }

        let queue = ItemQueue::pending(items, ledger);
        let workers = self.options.concurrency.min(queue.total()).max(1);
        log::info!(
            "run starting: items={} pending={} workers={} batch_size={} page_size={} target={}",
            items_total,
            queue.total(),
            workers,
            self.options.batch_size,
            self.options.page_size,
            ledger
                .target_total()
                .map_or_else(|| "none".to_string(), |t| t.to_string())
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tagsweep-worker-{i}"))
            .build()
            .context("Failed to create worker pool")?;

        let ctx = RunCtx {
            ledger,
            stop: &stop,
            stats: &stats,
        };

        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| self.worker(&queue, &ctx, &outcomes));
            }
        });

        if let Err(e) = ledger.save() {
            log::error!("final checkpoint save failed: {e}");
            stop.stop(StopReason::Halted);
        }

        let status = match stop.reason() {
            Some(StopReason::Halted) => RunStatus::Halted,
            Some(StopReason::Interrupted) => RunStatus::Interrupted,
            Some(StopReason::TargetReached) => RunStatus::TargetReached,
            None if ledger.target_met() => RunStatus::TargetReached,
            None => RunStatus::Complete,
        };

        RunStats::add(&stats.items_exhausted, queue.skipped());
        let summary = stats.summary(items_total, ledger.total_accepted(), start.elapsed());
        log::info!(
            "run {status}: total_accepted={} published={} elapsed={:.1}s",
            summary.total_accepted,
            summary.published,
            summary.elapsed.as_secs_f64()
        );
        if status == RunStatus::Halted {
            log::warn!("run halted; checkpoint kept at last good state, re-run to resume");
        }

        Ok(RunReport {
            status,
            summary,
            outcomes: outcomes.into_inner().expect("worker thread panicked"),
        })
    }

    fn worker(
        &self,
        queue: &ItemQueue,
        ctx: &RunCtx<'_>,
        outcomes: &Mutex<Vec<(String, ItemOutcome)>>,
    ) {
        let mut first = true;
        while let Some(item) = queue.next() {
            if ctx.stop.is_stopped() {
                break;
            }
            if !first && !ctx.stop.sleep(self.options.inter_item_delay) {
                break;
            }
            first = false;

            let outcome = self.process_item(item, ctx);
            match outcome {
                ItemOutcome::Exhausted => RunStats::incr(&ctx.stats.items_exhausted),
                ItemOutcome::Deferred => RunStats::incr(&ctx.stats.items_deferred),
                _ => {}
            }
            outcomes
                .lock()
                .expect("worker thread panicked")
                .push((item.to_string(), outcome));
        }
    }

    /// Page through one item until it is exhausted or processing must stop.
    fn process_item(&self, item: &str, ctx: &RunCtx<'_>) -> ItemOutcome {
        let pb = self.progress.item_bar(item);
        let mut publisher =
            BatchPublisher::new(self.sink.clone(), self.policy.clone(), self.options.batch_size);

        let mut position = ctx.ledger.position(item);
        if position.is_exhausted() {
            pb.finish_and_clear();
            return ItemOutcome::Exhausted;
        }
        log::debug!("item={item} start position={position:?}");

        // Newest position whose records are all in the publisher buffer
        let mut staged: Option<Position> = None;
        let mut pages = 0usize;
        let mut queued_total = 0usize;

        let outcome = loop {
            if ctx.stop.is_stopped() {
                break ItemOutcome::Stopped;
            }
            if self.options.max_pages_per_item.is_some_and(|max| pages >= max) {
                log::info!("item={item} page limit reached at page={pages}");
                break ItemOutcome::PageLimit;
            }
            if pages > 0 && !ctx.stop.sleep(self.options.inter_page_delay) {
                break ItemOutcome::Stopped;
            }

            pb.set_message(format!("page {} · fetching", pages + 1));
            let label = format!("fetch item={item} page={}", pages + 1);
            let page = match self.policy.run(&label, ctx.stop, || {
                self.fetcher
                    .fetch(item, position.cursor(), self.options.page_size)
            }) {
                Ok(page) => page,
                Err(e) => {
                    RunStats::incr(&ctx.stats.fetch_failures);
                    log::warn!("item={item} deferred page={} error={e}", pages + 1);
                    break ItemOutcome::Deferred;
                }
            };
            pages += 1;
            RunStats::incr(&ctx.stats.pages_fetched);
            RunStats::add(&ctx.stats.records_seen, page.records.len());

            if page.records.is_empty() {
                log::debug!("item={item} page={pages} empty");
                break ItemOutcome::Exhausted;
            }

            let mut queued = 0usize;
            let mut cut_off = false;
            for (idx, raw) in page.records.iter().enumerate() {
                let Some(record) = self.filter.accept(raw, item) else {
                    RunStats::incr(&ctx.stats.filtered_out);
                    continue;
                };
                match ctx.ledger.admit(&record.key()) {
                    Admission::Admitted => {
                        publisher.enqueue(record);
                        queued += 1;
                        if publisher.is_full()
                            && self.flush(item, &mut publisher, staged.take(), ctx).is_err()
                        {
                            pb.finish_and_clear();
                            return ItemOutcome::Halted;
                        }
                    }
                    Admission::Duplicate => RunStats::incr(&ctx.stats.duplicates),
                    Admission::TargetReached => {
                        RunStats::add(&ctx.stats.over_target, page.records.len() - idx);
                        cut_off = true;
                        break;
                    }
                }
            }
            queued_total += queued;

            let next = match page.next_cursor {
                Some(cursor) => Position::At(cursor),
                None => Position::Exhausted,
            };
            log::debug!(
                "item={item} page={pages} records={} queued={queued} next={next:?}",
                page.records.len()
            );
            pb.set_message(format!(
                "page {pages} · {queued_total} queued · {} buffered",
                publisher.len()
            ));

            if cut_off {
                // Remaining records of this page were never looked at, so
                // the page must be fetched again by a later run.
                log::info!("item={item} target reached mid-page page={pages}");
                ctx.stop.stop(StopReason::TargetReached);
                break ItemOutcome::Stopped;
            }
            if next.is_exhausted() {
                break ItemOutcome::Exhausted;
            }
            if publisher.is_empty() {
                staged = None;
                if self.persist(ctx.ledger.advance(item, next.clone()), ctx).is_err() {
                    pb.finish_and_clear();
                    return ItemOutcome::Halted;
                }
            } else {
                staged = Some(next.clone());
            }
            position = next;
        };

        // Finish: flush what is buffered and persist the final position
        let advance = match outcome {
            ItemOutcome::Exhausted => Some(Position::Exhausted),
            _ => staged,
        };
        let result = if publisher.is_empty() {
            match advance {
                Some(pos) => self.persist(ctx.ledger.advance(item, pos), ctx),
                None => Ok(()),
            }
        } else {
            self.flush(item, &mut publisher, advance, ctx)
        };
        pb.finish_and_clear();

        if result.is_err() {
            return ItemOutcome::Halted;
        }
        log::info!("item={item} {outcome:?} pages={pages} queued={queued_total}");
        outcome
    }

    /// Flush the publisher and commit the batch, optionally advancing the
    /// item's position in the same checkpoint write.
    ///
    /// On publish failure the batch's reservations are released, the
    /// checkpoint is saved as-is and the run is halted.
    fn flush(
        &self,
        item: &str,
        publisher: &mut BatchPublisher,
        advance: Option<Position>,
        ctx: &RunCtx<'_>,
    ) -> Result<(), ()> {
        let count = publisher.len();
        let label = format!("publish item={item} batch={count}");
        match publisher.flush(&label, ctx.stop) {
            Ok(keys) => {
                RunStats::incr(&ctx.stats.batches);
                RunStats::add(&ctx.stats.published, count);
                let committed = ctx
                    .ledger
                    .commit(keys.iter().map(String::as_str), advance.map(|p| (item, p)));
                match committed {
                    Ok(total) => {
                        log::info!("item={item} published={count} total_accepted={total}");
                        if ctx.ledger.target_met() {
                            ctx.stop.stop(StopReason::TargetReached);
                        }
                        Ok(())
                    }
                    Err(e) => {
                        log::error!("item={item} checkpoint write failed after publish: {e}");
                        ctx.stop.stop(StopReason::Halted);
                        Err(())
                    }
                }
            }
            Err(e) => {
                RunStats::incr(&ctx.stats.publish_failures);
                let keys = publisher.discard();
                ctx.ledger.release(keys.iter().map(String::as_str));
                log::error!("item={item} publish failed batch={count} error={e}; halting run");
                if let Err(e) = ctx.ledger.save() {
                    log::error!("checkpoint save failed: {e}");
                }
                ctx.stop.stop(StopReason::Halted);
                Err(())
            }
        }
    }

    fn persist(&self, result: std::io::Result<()>, ctx: &RunCtx<'_>) -> Result<(), ()> {
        result.map_err(|e| {
            log::error!("checkpoint write failed: {e}; halting run");
            ctx.stop.stop(StopReason::Halted);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(RunOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_sizes_rejected() {
        for opts in [
            RunOptions {
                page_size: 0,
                ..Default::default()
            },
            RunOptions {
                concurrency: 0,
                ..Default::default()
            },
            RunOptions {
                max_pages_per_item: Some(0),
                ..Default::default()
            },
        ] {
            assert!(opts.validate().is_err(), "{opts:?}");
        }
    }

    #[test]
    fn status_completeness() {
        assert!(RunStatus::Complete.is_complete());
        assert!(RunStatus::TargetReached.is_complete());
        assert!(!RunStatus::Halted.is_complete());
        assert_eq!(RunStatus::Interrupted.to_string(), "interrupted");
    }
}
