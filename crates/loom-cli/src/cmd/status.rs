use crate::cmd::open_db;
use crate::output::print_json;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let db = open_db(root)?;
    let records = db.count_records()?;
    let seeds = db.count_seeds()?;
    let latest = db.list_page(1, 1)?.items.into_iter().next();

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "records": records,
            "seeds": seeds,
            "latest": latest,
        }));
    }

    println!("Root:     {}", root.display());
    println!("Records:  {records}");
    println!("Seeds:    {seeds}");
    match latest {
        Some(r) => println!(
            "Latest:   {} ({} assets, {})",
            r.sequence_label,
            r.asset_refs.len(),
            r.created_at.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Latest:   none"),
    }
    Ok(())
}
