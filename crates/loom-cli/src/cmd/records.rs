use crate::cmd::open_db;
use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use loom_core::LoomError;
use std::path::Path;

#[derive(Subcommand)]
pub enum RecordsSubcommand {
    /// List records, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },

    /// Show one record in full
    Show { id: String },
}

pub fn run(root: &Path, subcmd: RecordsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RecordsSubcommand::List { page, limit } => list(root, page, limit, json),
        RecordsSubcommand::Show { id } => show(root, &id, json),
    }
}

fn list(root: &Path, page: u64, limit: u64, json: bool) -> anyhow::Result<()> {
    let limit = if limit == 0 { 10 } else { limit };
    let page = open_db(root)?.list_page(page, limit)?;
    if json {
        return print_json(&page);
    }
    if page.items.is_empty() {
        println!("No records on page {} ({} total).", page.current_page, page.total);
        return Ok(());
    }
    let rows = page
        .items
        .iter()
        .map(|r| {
            vec![
                r.sequence_label.clone(),
                r.created_at.format("%Y-%m-%d %H:%M").to_string(),
                r.asset_refs.len().to_string(),
                truncate(&r.submission_prompt, 60),
            ]
        })
        .collect();
    print_table(&["LABEL", "CREATED", "ASSETS", "PROMPT"], rows);
    println!(
        "\npage {}/{} · {} records",
        page.current_page, page.page_count, page.total
    );
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let id: uuid::Uuid = id
        .parse()
        .map_err(|_| LoomError::InvalidRequest(format!("'{id}' is not a record id")))?;
    let record = open_db(root)?
        .get_record(id)?
        .ok_or(LoomError::RecordNotFound(id))?;
    if json {
        return print_json(&record);
    }

    println!("Record:     {}", record.id);
    println!("Label:      {}", record.sequence_label);
    println!("Created:    {}", record.created_at.to_rfc3339());
    println!("Updated:    {}", record.updated_at.to_rfc3339());
    println!("\nSeed:\n{}", record.seed_prompt);
    println!("\nStructured:\n{}", record.structured_prompt);
    println!("\nSubmission:\n{}", record.submission_prompt);
    if record.has_assets() {
        println!("\nAssets:");
        for url in &record.asset_refs {
            println!("  {url}");
        }
    } else {
        println!("\nAssets: none");
    }
    Ok(())
}
