use anyhow::Context;
use loom_core::config::Config;
use loom_core::db::RecordDb;
use loom_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing loom in: {}", root.display());

    let dir = paths::loom_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: .loom/config.yaml");
    } else {
        println!("  exists:  .loom/config.yaml");
    }

    let db_path = paths::db_path(root);
    let existed = db_path.exists();
    RecordDb::open(&db_path).with_context(|| format!("failed to open {}", db_path.display()))?;
    if existed {
        println!("  exists:  .loom/loom.db");
    } else {
        println!("  created: .loom/loom.db");
    }

    println!("\nNext: add seed prompts with `loom seed add` or `loom seed import`, then `loom serve`.");
    Ok(())
}
