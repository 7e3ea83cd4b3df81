use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use llmrelay_protocol::Group;
use tracing::warn;

/// The persistence boundary spec.md keeps external to the core (spec §1
/// "Out of scope ... Persistence and schema migrations"). The thin binary
/// needs *some* implementation of "the external store" to drive the demo
/// server and integration tests end-to-end; this one is it
/// (SPEC_FULL.md §C.3).
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn get_group(&self, name: &str) -> Option<Group>;
}

/// Re-reads `path` on every lookup and indexes by `Group::name`. Editing
/// the file on disk between requests is how the demo exercises
/// `ChannelFactory`'s staleness-triggered rebuild without a restart.
pub struct FileGroupStore {
    path: PathBuf,
    /// Last successfully parsed snapshot, served when a read/parse of the
    /// file fails transiently (e.g. a concurrent editor mid-write).
    last_good: RwLock<HashMap<String, Group>>,
}

impl FileGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: RwLock::new(HashMap::new()),
        }
    }

    fn reload(&self) -> HashMap<String, Group> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read groups file, serving last snapshot");
                return self.last_good.read().expect("lock poisoned").clone();
            }
        };
        let groups: Vec<Group> = match serde_json::from_slice(&bytes) {
            Ok(groups) => groups,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to parse groups file, serving last snapshot");
                return self.last_good.read().expect("lock poisoned").clone();
            }
        };
        let by_name: HashMap<String, Group> =
            groups.into_iter().map(|g| (g.name.clone(), g)).collect();
        *self.last_good.write().expect("lock poisoned") = by_name.clone();
        by_name
    }
}

#[async_trait]
impl GroupStore for FileGroupStore {
    async fn get_group(&self, name: &str) -> Option<Group> {
        self.reload().get(name).cloned()
    }
}
