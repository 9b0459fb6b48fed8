//! Run counters and the end-of-run summary.
//!
//! Counters are atomics shared by all workers while the run is active;
//! [`RunStats::summary`] freezes them into a [`RunSummary`] for printing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::progress::fmt_num;

/// Live counters, updated by workers.
#[derive(Debug, Default)]
pub struct RunStats {
    pub pages_fetched: AtomicUsize,
    pub records_seen: AtomicUsize,
    /// Rejected by the record filter
    pub filtered_out: AtomicUsize,
    /// Identity already published or queued
    pub duplicates: AtomicUsize,
    /// Dropped because the target was already filled
    pub over_target: AtomicUsize,
    pub published: AtomicUsize,
    pub batches: AtomicUsize,
    pub fetch_failures: AtomicUsize,
    pub publish_failures: AtomicUsize,
    pub items_exhausted: AtomicUsize,
    pub items_deferred: AtomicUsize,
}

impl RunStats {
    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self, items_total: usize, total_accepted: u64, elapsed: Duration) -> RunSummary {
        let get = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        RunSummary {
            items_total,
            items_exhausted: get(&self.items_exhausted),
            items_deferred: get(&self.items_deferred),
            pages_fetched: get(&self.pages_fetched),
            records_seen: get(&self.records_seen),
            filtered_out: get(&self.filtered_out),
            duplicates: get(&self.duplicates),
            over_target: get(&self.over_target),
            published: get(&self.published),
            batches: get(&self.batches),
            fetch_failures: get(&self.fetch_failures),
            publish_failures: get(&self.publish_failures),
            total_accepted,
            elapsed,
        }
    }
}

/// Frozen counters of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub items_total: usize,
    pub items_exhausted: usize,
    pub items_deferred: usize,
    pub pages_fetched: usize,
    pub records_seen: usize,
    pub filtered_out: usize,
    pub duplicates: usize,
    pub over_target: usize,
    /// Records published during this run
    pub published: usize,
    pub batches: usize,
    pub fetch_failures: usize,
    pub publish_failures: usize,
    /// Running total from the checkpoint, including earlier runs
    pub total_accepted: u64,
    pub elapsed: Duration,
}

fn pct(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

impl RunSummary {
    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Run summary")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
                Cell::new("%").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Items"),
            Cell::new(format!(
                "{}/{} exhausted ({} deferred)",
                self.items_exhausted, self.items_total, self.items_deferred
            )),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Pages fetched"),
            Cell::new(fmt_num(self.pages_fetched)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Records seen"),
            Cell::new(fmt_num(self.records_seen)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Filtered out"),
            Cell::new(fmt_num(self.filtered_out)),
            Cell::new(format!("{:.1}", pct(self.filtered_out, self.records_seen))),
        ]);
        table.add_row(vec![
            Cell::new("Duplicates skipped"),
            Cell::new(fmt_num(self.duplicates)),
            Cell::new(format!("{:.1}", pct(self.duplicates, self.records_seen))),
        ]);
        if self.over_target > 0 {
            table.add_row(vec![
                Cell::new("Over target"),
                Cell::new(fmt_num(self.over_target)),
                Cell::new(""),
            ]);
        }
        table.add_row(vec![
            Cell::new("Published").fg(Color::Green),
            Cell::new(format!(
                "{} in {} batches",
                fmt_num(self.published),
                fmt_num(self.batches)
            ))
            .fg(Color::Green),
            Cell::new(format!("{:.1}", pct(self.published, self.records_seen))).fg(Color::Green),
        ]);
        if self.fetch_failures + self.publish_failures > 0 {
            table.add_row(vec![
                Cell::new("Failures").fg(Color::Red),
                Cell::new(format!(
                    "fetch {} / publish {}",
                    self.fetch_failures, self.publish_failures
                ))
                .fg(Color::Red),
                Cell::new(""),
            ]);
        }
        table.add_row(vec![
            Cell::new("Total accepted"),
            Cell::new(fmt_num(self.total_accepted as usize)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
            Cell::new(""),
        ]);

        format!("\n{table}")
    }

    /// Print table to stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log summary as key=value pairs (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "summary items={} exhausted={} deferred={} pages={} seen={} filtered={} duplicates={} \
             published={} batches={} fetch_failures={} publish_failures={} total_accepted={} elapsed={:.1}s",
            self.items_total,
            self.items_exhausted,
            self.items_deferred,
            self.pages_fetched,
            self.records_seen,
            self.filtered_out,
            self.duplicates,
            self.published,
            self.batches,
            self.fetch_failures,
            self.publish_failures,
            self.total_accepted,
            self.elapsed.as_secs_f64()
        );
    }
}
