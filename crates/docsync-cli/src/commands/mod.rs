//! Command handlers

pub mod config;
pub mod post;
pub mod status;
pub mod user;

use anyhow::{bail, Result};
use chrono::Utc;

use docsync_core::{Document, DocumentId, SyncContext};

use crate::models::CliInfo;

/// Resolve a full id or a unique id prefix among `documents`
fn resolve_id<D: Document>(documents: &[D], id: &str, kind: &str) -> Result<DocumentId> {
    if let Some(document) = documents.iter().find(|d| d.id() == id) {
        return Ok(document.id().to_string());
    }

    let matches: Vec<_> = documents
        .iter()
        .filter(|d| d.id().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, id),
        1 => Ok(matches[0].id().to_string()),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, id);
            for document in &matches {
                eprintln!("  {}", document.id());
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Note a successful write in the CLI's bookkeeping document
async fn record_write(ctx: &SyncContext) -> Result<()> {
    let mut info: CliInfo = ctx.fetch_unique(CliInfo::NAME).await?.unwrap_or_default();
    info.last_write = Some(Utc::now());
    info.writes += 1;
    ctx.write_unique(CliInfo::NAME, &info).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use docsync_core::{Config, MemoryStore, SyncContext};

    use crate::output::{Output, OutputFormat};

    pub fn context() -> (SyncContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SyncContext::new(store.clone(), Config::default()), store)
    }

    pub fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }
}
