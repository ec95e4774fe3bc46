//! Status command handler

use std::path::Path;

use anyhow::Result;

use docsync_core::{MemoryStore, SyncContext};

use crate::models::CliInfo;
use crate::output::{Output, OutputFormat};

/// Show store location, contents and the active configuration
pub async fn show(
    ctx: &SyncContext,
    store: &MemoryStore,
    store_path: &Path,
    output: &Output,
) -> Result<()> {
    let config = ctx.config();
    let info: CliInfo = ctx.fetch_unique(CliInfo::NAME).await?.unwrap_or_default();
    let collections: Vec<_> = store
        .collection_names()
        .into_iter()
        .map(|name| {
            let count = store.document_count(&name);
            (name, count)
        })
        .collect();

    match output.format {
        OutputFormat::Json => {
            let counts: serde_json::Map<_, _> = collections
                .iter()
                .map(|(name, count)| (name.clone(), serde_json::json!(count)))
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "store_path": store_path,
                    "store_exists": store_path.exists(),
                    "collections": counts,
                    "use_cache": config.use_cache,
                    "batch_size": config.effective_batch_size(),
                    "relate_mode": config.relate_mode,
                    "writes": info.writes,
                    "last_write": info.last_write,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", store_path.display());
        }
        OutputFormat::Human => {
            println!("docsync Status");
            println!("==============");
            println!();
            println!("Store:");
            println!("  Location: {}", store_path.display());
            match info.last_write {
                Some(at) => println!(
                    "  Writes:   {} (last {})",
                    info.writes,
                    at.format("%Y-%m-%d %H:%M")
                ),
                None => println!("  Writes:   none yet"),
            }
            println!();
            println!("Sync:");
            println!("  Cache:       {}", if config.use_cache { "enabled" } else { "disabled" });
            println!("  Batch size:  {}", config.effective_batch_size());
            println!("  Relate mode: {:?}", config.relate_mode);
            println!();
            println!("Contents:");
            if collections.is_empty() {
                println!("  (empty)");
            }
            for (name, count) in &collections {
                println!("  {}: {}", name, count);
            }
        }
    }

    Ok(())
}
