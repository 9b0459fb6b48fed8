//! `tagsweep run` - sweep every item until exhausted, halted or stopped

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tagsweep_core::{
    CheckpointStore, FileItems, ItemSource, Ledger, PageFetcher, Pipeline, RunStatus,
    SharedProgress, StaticItems, expand_platforms,
};
use tagsweep_http::{HttpClient, JsonPageFetcher, PlatformRouter, RemoteItems, WebhookSink};

use crate::config::{Config, ItemsConfig, resolve_secret};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many published records in total
    #[arg(long)]
    pub target: Option<u64>,

    /// Number of items processed in parallel
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Records per publish batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Records requested per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Minimum popularity to accept a record
    #[arg(long)]
    pub min_threshold: Option<u64>,

    /// Attempts per fetch or publish call
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pages per item in this run (cursor kept for the next)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Item file, one hashtag per line (replaces [items])
    #[arg(long, conflicts_with = "tag")]
    pub items: Option<PathBuf>,

    /// Inline hashtag, repeatable (replaces [items])
    #[arg(short, long)]
    pub tag: Vec<String>,

    /// Skip the delays between pages and items
    #[arg(long)]
    pub no_delay: bool,
}

impl RunArgs {
    /// CLI flags override config file values.
    pub fn apply(&self, config: &mut Config) {
        let run = &mut config.run;
        if let Some(t) = self.target {
            run.target_total = Some(t);
        }
        if let Some(n) = self.concurrency {
            run.concurrency = n;
        }
        if let Some(n) = self.batch_size {
            run.batch_size = n;
        }
        if let Some(n) = self.page_size {
            run.page_size = n;
        }
        if let Some(n) = self.min_threshold {
            run.min_threshold = n;
        }
        if let Some(n) = self.retries {
            run.retries = n;
        }
        if let Some(n) = self.max_pages {
            run.max_pages_per_item = Some(n);
        }
        if let Some(path) = &self.checkpoint {
            run.checkpoint.clone_from(path);
        }
        if self.no_delay {
            run.inter_page_delay_ms = 0;
            run.inter_item_delay_ms = 0;
        }
        if let Some(path) = &self.items {
            config.items = ItemsConfig {
                file: Some(path.clone()),
                ..Default::default()
            };
        } else if !self.tag.is_empty() {
            config.items = ItemsConfig {
                list: Some(self.tag.clone()),
                ..Default::default()
            };
        }
    }
}

/// Everything a run needs, built and checked before any work starts.
struct Plan {
    items: Vec<String>,
    fetcher: Arc<dyn PageFetcher>,
    sink: WebhookSink,
}

fn plan(config: &Config) -> Result<Plan> {
    config.validate()?;
    let client = HttpClient::new(config.timeout()).context("Failed to build HTTP client")?;

    let items_cfg = &config.items;
    let source: Box<dyn ItemSource> = match (&items_cfg.file, &items_cfg.url, &items_cfg.list) {
        (Some(file), _, _) => Box::new(FileItems::new(file)),
        (_, Some(url), _) => Box::new(RemoteItems::new(
            client.clone(),
            url,
            resolve_secret(items_cfg.token.as_deref()).context("[items] token")?,
        )),
        (_, _, Some(list)) => Box::new(StaticItems(list.clone())),
        _ => anyhow::bail!("no item source configured"),
    };
    let hashtags = source.items()?;
    anyhow::ensure!(!hashtags.is_empty(), "item source returned no hashtags");

    let fetcher: Arc<dyn PageFetcher> = if config.platforms.is_empty() {
        Arc::new(JsonPageFetcher::new(client.clone(), config.fetch.resolve("default")?))
    } else {
        let mut router = PlatformRouter::new();
        for platform in &config.platforms {
            let fetch = platform.fetch.merged(&config.fetch).resolve(&platform.name)?;
            let fetcher = JsonPageFetcher::new(client.clone(), fetch);
            router = router.route(&platform.name, Arc::new(fetcher));
        }
        Arc::new(router)
    };
    let items = expand_platforms(&hashtags, &config.platform_names());

    let sink_url = config.sink.url.clone().context("[sink] url is not set")?;
    let sink_token = resolve_secret(config.sink.token.as_deref()).context("[sink] token")?;
    let sink = WebhookSink::new(client, sink_url, sink_token);

    Ok(Plan {
        items,
        fetcher,
        sink,
    })
}

/// Process exit code for a finished run.
pub fn exit_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Complete | RunStatus::TargetReached => 0,
        RunStatus::Halted => 1,
        RunStatus::Interrupted => 130,
    }
}

/// Errors returned here happened before any work and map to exit code 2.
pub fn run(args: RunArgs, mut config: Config, progress: SharedProgress) -> Result<ExitCode> {
    args.apply(&mut config);
    let plan = plan(&config)?;

    let store = CheckpointStore::new(&config.run.checkpoint);
    let ledger = Ledger::open(store, config.run.target_total);
    log::info!(
        "checkpoint={} total_accepted={} identities={}",
        config.run.checkpoint.display(),
        ledger.total_accepted(),
        ledger.snapshot().processed_identities.len()
    );

    let pipeline = Pipeline::new(
        plan.fetcher,
        Arc::new(plan.sink),
        config.record_filter(),
        config.backoff_policy(),
        config.run_options(),
    )
    .with_progress(progress.clone());

    let report = pipeline.run(plan.items, &ledger)?;

    if progress.is_tty() {
        report.summary.print();
    } else {
        report.summary.log();
    }
    match report.status {
        RunStatus::Halted => log::error!("Run halted; re-run to resume once the failing endpoint recovers"),
        RunStatus::Interrupted => log::warn!("Interrupted; re-run to resume"),
        RunStatus::Complete | RunStatus::TargetReached => {}
    }
    Ok(ExitCode::from(exit_code(report.status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.items.list = Some(vec!["travel".into()]);
        let args = RunArgs {
            target: Some(10),
            batch_size: Some(5),
            tag: vec!["food".into()],
            no_delay: true,
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.run.target_total, Some(10));
        assert_eq!(config.run.batch_size, 5);
        assert_eq!(config.run.inter_page_delay_ms, 0);
        assert_eq!(config.items.list, Some(vec!["food".to_string()]));
    }

    #[test]
    fn unset_flags_keep_config() {
        let mut config = Config::default();
        config.run.concurrency = 7;
        RunArgs::default().apply(&mut config);
        assert_eq!(config.run.concurrency, 7);
        assert_eq!(config.run.inter_item_delay_ms, 2000);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(RunStatus::Complete), 0);
        assert_eq!(exit_code(RunStatus::TargetReached), 0);
        assert_eq!(exit_code(RunStatus::Halted), 1);
        assert_eq!(exit_code(RunStatus::Interrupted), 130);
    }

    #[test]
    fn plan_rejects_missing_sink() {
        let mut config = Config::default();
        config.items.list = Some(vec!["travel".into()]);
        config.fetch.url = Some("http://localhost/search".into());
        assert!(plan(&config).is_err());
    }

    #[test]
    fn plan_expands_platforms() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("tags.txt");
        std::fs::write(&file, "hashtag\n#travel\nfood\n").unwrap();

        let config: Config = toml::from_str(&format!(
            r#"
[items]
file = "{}"

[fetch]
url = "http://localhost/search"

[[platforms]]
name = "instagram"

[[platforms]]
name = "tiktok"

[sink]
url = "http://localhost/hook"
"#,
            file.display()
        ))
        .unwrap();
        let plan = plan(&config).unwrap();
        assert_eq!(
            plan.items,
            vec!["instagram/travel", "tiktok/travel", "instagram/food", "tiktok/food"]
        );
    }
}
