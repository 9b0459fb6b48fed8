pub mod reset;
pub mod run;
pub mod status;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

pub(crate) fn table(header: [&str; 2]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(header[0]).fg(Color::Cyan),
            Cell::new(header[1]).fg(Color::Cyan),
        ]);
    table
}

fn secret_state(token: &Option<String>) -> &'static str {
    if token.is_some() {
        "configured"
    } else {
        "not set"
    }
}

/// `tagsweep config`: resolved settings, secrets masked
pub fn show_config(config: &Config) {
    let run = &config.run;
    let mut table = table(["Setting", "Value"]);

    let items = match (&config.items.file, &config.items.url, &config.items.list) {
        (Some(file), _, _) => format!("file {}", file.display()),
        (_, Some(url), _) => format!("url {url}"),
        (_, _, Some(list)) => format!("{} inline", list.len()),
        _ => "not set".to_string(),
    };
    table.add_row(vec!["Items", &items]);
    table.add_row(vec![
        "Target total",
        &run.target_total.map_or_else(|| "none".to_string(), |t| t.to_string()),
    ]);
    table.add_row(vec!["Min threshold", &run.min_threshold.to_string()]);
    table.add_row(vec!["Page size", &run.page_size.to_string()]);
    table.add_row(vec!["Batch size", &run.batch_size.to_string()]);
    table.add_row(vec!["Concurrency", &run.concurrency.to_string()]);
    table.add_row(vec!["Attempts per call", &run.retries.to_string()]);
    table.add_row(vec![
        "Delays",
        &format!(
            "{}ms between pages, {}ms between items",
            run.inter_page_delay_ms, run.inter_item_delay_ms
        ),
    ]);
    if let Some(max) = run.max_pages_per_item {
        table.add_row(vec!["Max pages per item", &max.to_string()]);
    }
    table.add_row(vec!["Checkpoint", &run.checkpoint.display().to_string()]);
    table.add_row(vec![
        "Fetch URL",
        config.fetch.url.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["Fetch token", secret_state(&config.fetch.token)]);
    for platform in &config.platforms {
        let merged = platform.fetch.merged(&config.fetch);
        table.add_row(vec![
            format!("Platform {}", platform.name).as_str(),
            merged.url.as_deref().unwrap_or("not set"),
        ]);
    }
    table.add_row(vec![
        "Filter",
        &format!(
            "{} by {}{}",
            config.filter.identity_field,
            config.filter.popularity_field,
            if config.filter.required_fields.is_empty() {
                String::new()
            } else {
                format!(", requires {}", config.filter.required_fields.join(", "))
            }
        ),
    ]);
    table.add_row(vec!["Sink URL", config.sink.url.as_deref().unwrap_or("not set")]);
    table.add_row(vec!["Sink token", secret_state(&config.sink.token)]);
    table.add_row(vec![
        "HTTP",
        &format!(
            "timeout {}s, backoff {}ms..{}ms (+{}ms jitter)",
            config.http.timeout_secs,
            config.http.base_delay_ms,
            config.http.max_delay_ms,
            config.http.jitter_ms
        ),
    ]);

    eprintln!("\n{table}");
}
