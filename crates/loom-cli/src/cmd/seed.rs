use crate::cmd::open_db;
use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use clap::Subcommand;
use loom_core::io::split_seed_entries;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum SeedSubcommand {
    /// Add one seed prompt
    Add {
        /// Prompt text; may span several lines
        prompt: String,
    },

    /// Import seed prompts from a file, one entry per `---`-separated block
    Import { file: PathBuf },

    /// List the seed library, oldest first
    List,
}

pub fn run(root: &Path, subcmd: SeedSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SeedSubcommand::Add { prompt } => add(root, &prompt, json),
        SeedSubcommand::Import { file } => import(root, &file, json),
        SeedSubcommand::List => list(root, json),
    }
}

fn add(root: &Path, prompt: &str, json: bool) -> anyhow::Result<()> {
    let db = open_db(root)?;
    let seed = db.add_seed(prompt)?;
    if json {
        print_json(&seed)?;
    } else {
        println!("Added seed {}", seed.id);
    }
    Ok(())
}

fn import(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let entries = split_seed_entries(&text);
    if entries.is_empty() {
        anyhow::bail!("no seed prompts found in {}", file.display());
    }

    let db = open_db(root)?;
    let mut added = Vec::with_capacity(entries.len());
    for entry in &entries {
        added.push(db.add_seed(entry)?);
    }

    if json {
        print_json(&serde_json::json!({ "imported": added.len(), "seeds": added }))?;
    } else {
        println!("Imported {} seed prompts from {}", added.len(), file.display());
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let seeds = open_db(root)?.list_seeds()?;
    if json {
        return print_json(&seeds);
    }
    if seeds.is_empty() {
        println!("No seed prompts. Add one with `loom seed add`.");
        return Ok(());
    }
    let rows = seeds
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.created_at.format("%Y-%m-%d %H:%M").to_string(),
                truncate(&s.prompt, 60),
            ]
        })
        .collect();
    print_table(&["ID", "ADDED", "PROMPT"], rows);
    Ok(())
}
