use std::path::{Path, PathBuf};

pub const LOOM_DIR: &str = ".loom";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DB_FILE: &str = "loom.db";

pub fn loom_dir(root: &Path) -> PathBuf {
    root.join(LOOM_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    loom_dir(root).join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    loom_dir(root).join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_loom_dir() {
        let root = Path::new("/tmp/proj");
        assert_eq!(config_path(root), PathBuf::from("/tmp/proj/.loom/config.yaml"));
        assert_eq!(db_path(root), PathBuf::from("/tmp/proj/.loom/loom.db"));
    }
}
