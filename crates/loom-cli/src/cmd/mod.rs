pub mod config;
pub mod init;
pub mod records;
pub mod seed;
pub mod serve;
pub mod status;

use anyhow::Context;
use loom_core::config::Config;
use loom_core::db::RecordDb;
use std::path::Path;

/// Open the store of an initialized project.
pub fn open_db(root: &Path) -> anyhow::Result<RecordDb> {
    Config::load(root)?;
    let path = loom_core::paths::db_path(root);
    RecordDb::open(&path).with_context(|| format!("failed to open {}", path.display()))
}
