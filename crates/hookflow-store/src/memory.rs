use std::collections::BTreeMap;
use std::path::Path;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use hookflow_core::error::Result;
use hookflow_core::traits::DefinitionStore;
use hookflow_core::types::Workflow;

use crate::workflow_key;

/// In-process definition store.
///
/// Keys are kept sorted so `list` is deterministic.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Workflow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` workflow in `dir`, keyed by `<prefix><id>`.
    ///
    /// The workflow's own `id` is used when present, the file stem otherwise.
    /// Files that fail to parse or validate are skipped with a warning.
    pub async fn from_dir(dir: &Path, prefix: &str) -> Result<Self> {
        let mut paths = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entries = BTreeMap::new();
        for path in paths {
            let text = tokio::fs::read_to_string(&path).await?;
            let mut workflow = match Workflow::from_json_str(&text) {
                Ok(wf) => wf,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable workflow file");
                    continue;
                }
            };
            if let Err(e) = workflow.validate() {
                warn!(path = %path.display(), error = %e, "Skipping invalid workflow file");
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = workflow.id.get_or_insert(stem).clone();
            debug!(path = %path.display(), id = %id, "Loaded workflow");
            entries.insert(workflow_key(prefix, &id), workflow);
        }

        info!(dir = %dir.display(), count = entries.len(), "Workflow definitions loaded");
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl DefinitionStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.entries.read().await.get(&key).cloned()) })
    }

    fn put(&self, key: &str, workflow: Workflow) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.entries.write().await.insert(key, workflow);
            Ok(())
        })
    }

    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            Ok(self
                .entries
                .read()
                .await
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect())
        })
    }
}
