use ctxtrack_telemetry::{read_jsonl, AttributionRecord, Paths};
use std::collections::HashMap;

const TOP_FILES: usize = 5;

const DEFAULT_LIMIT: usize = 20;

/// Selection applied to history before listing or summarizing
#[derive(Debug, Default)]
pub struct HistoryFilter {
    /// Only responses that touched this path
    pub file: Option<String>,
    /// Only responses recorded within the last N hours
    pub hours: Option<u64>,
    /// Listing cap; `None` shows the default number
    pub limit: Option<usize>,
}

fn filter_records<'a>(
    records: &'a [AttributionRecord],
    filter: &HistoryFilter,
) -> Vec<&'a AttributionRecord> {
    // A span too large for chrono keeps everything
    let cutoff = filter
        .hours
        .and_then(|h| i64::try_from(h).ok())
        .and_then(chrono::Duration::try_hours)
        .and_then(|span| chrono::Utc::now().checked_sub_signed(span));

    records
        .iter()
        .filter(|r| {
            if let Some(ref cutoff) = cutoff {
                if r.recorded_at < *cutoff {
                    return false;
                }
            }
            if let Some(ref file) = filter.file {
                if !r.files.contains(file) {
                    return false;
                }
            }
            true
        })
        .collect()
}

fn top_files<'a>(records: &[&'a AttributionRecord], n: usize) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for file in &record.files {
            *counts.entry(file.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(n);
    ranked
}

fn compute_stats(records: &[&AttributionRecord]) -> String {
    if records.is_empty() {
        return "No attributions to analyze.".to_string();
    }
    let total = records.len();
    let with_edits = records.iter().filter(|r| !r.files.is_empty()).count();
    let total_files: usize = records.iter().map(|r| r.files.len()).sum();

    let mut out = format!(
        "Total responses: {}\n\
         With edits: {} ({:.0}%)\n\
         Files attributed: {}\n\
         Avg files per response: {:.1}",
        total,
        with_edits,
        with_edits as f64 / total as f64 * 100.0,
        total_files,
        total_files as f64 / total as f64
    );
    let top = top_files(records, TOP_FILES);
    if !top.is_empty() {
        out.push_str("\nMost attributed:");
        for (file, count) in top {
            out.push_str(&format!("\n  {count:>4}  {file}"));
        }
    }
    out
}

pub fn run(stats: bool, filter: HistoryFilter) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let read = read_jsonl::<AttributionRecord>(&paths.attributions_file())?;
    if read.skipped > 0 {
        tracing::warn!(skipped = read.skipped, "skipped malformed attribution records");
    }
    let records = read.records;

    if records.is_empty() {
        println!("No attribution history");
        return Ok(());
    }

    let filtered = filter_records(&records, &filter);
    if stats {
        println!("{}", compute_stats(&filtered));
        return Ok(());
    }

    let display = newest_first(filtered, &filter);

    println!("Recent Attributions (last {})", display.len());
    println!("======================");
    for record in &display {
        println!(
            "  {} | files:{} | {}",
            record.recorded_at.format("%Y-%m-%d %H:%M"),
            record.files.len(),
            record.response_preview,
        );
        for file in &record.files {
            println!("      {file}");
        }
    }
    Ok(())
}

fn newest_first<'a>(
    filtered: Vec<&'a AttributionRecord>,
    filter: &HistoryFilter,
) -> Vec<&'a AttributionRecord> {
    filtered
        .into_iter()
        .rev()
        .take(filter.limit.unwrap_or(DEFAULT_LIMIT))
        .collect()
}
