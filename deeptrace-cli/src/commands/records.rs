//! Records command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use deeptrace_core::{ClassificationRecord, RecordStore, SqliteRecordStore};

fn status_cell(status: &str) -> String {
    let padded = format!("{status:<16}");
    match status {
        "real" => padded.green().to_string(),
        "fake" => padded.red().to_string(),
        _ => padded.yellow().to_string(),
    }
}

fn print_table(records: &[ClassificationRecord]) {
    println!(
        "{}",
        format!(
            "{:>5}  {:<10}  {:<8}  {:<12}  {:<16}  {:>10}  {}",
            "ID", "DATE", "TIME", "PLATFORM", "STATUS", "CONFIDENCE", "FORMAT"
        )
        .bold()
    );
    for r in records {
        println!(
            "{:>5}  {:<10}  {:<8}  {:<12}  {}  {:>10.2}  {}",
            r.id,
            r.date,
            r.time,
            r.platform,
            status_cell(&r.status),
            r.confidence,
            r.media_format
        );
    }
}

/// Execute the records command.
pub async fn execute(database: &str, json: bool, quiet: bool) -> Result<()> {
    let store = SqliteRecordStore::connect(database)
        .await
        .with_context(|| format!("Failed to open record store: {database}"))?;
    store.migrate().await.context("Failed to prepare record store")?;

    let records = store.list_all().await.context("Failed to list records")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to serialize records")?
        );
    } else if !quiet {
        if records.is_empty() {
            println!("No records in {database}");
        } else {
            print_table(&records);
            println!();
            println!("{} record(s)", records.len());
        }
    }
    Ok(())
}
