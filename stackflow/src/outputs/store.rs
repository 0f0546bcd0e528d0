//! Output store implementations.

use super::record::{OutputDocument, OutputRecord};
use crate::core::StackId;
use crate::errors::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the output document inside each workspace directory.
pub const OUTPUTS_FILE_NAME: &str = "stack-outputs.json";

/// Durable hand-off of named outputs between independently deployed stacks.
///
/// Deploys are sequential and single-writer, so implementations do no locking
/// across processes.
pub trait OutputStore: Send + Sync + Debug {
    /// Returns the last record written for the stack, or an empty record.
    ///
    /// An absent file or stack entry is not an error.
    fn read(&self, stack_id: &StackId) -> Result<OutputRecord>;

    /// Replaces the stack's record wholesale.
    fn write(&self, stack_id: &StackId, record: &OutputRecord) -> Result<()>;

    /// Drops the stack's record after teardown.
    fn remove(&self, stack_id: &StackId) -> Result<()>;
}

/// One JSON document per stack group under `{root}/{workspace_dir}/`.
#[derive(Debug, Clone)]
pub struct FileOutputStore {
    root: PathBuf,
}

impl FileOutputStore {
    /// Creates a store rooted at the repository directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document holding the given stack's record.
    #[must_use]
    pub fn path_for(&self, stack_id: &StackId) -> PathBuf {
        self.root
            .join(stack_id.kind.workspace_dir())
            .join(OUTPUTS_FILE_NAME)
    }

    fn load(path: &Path) -> Result<OutputDocument> {
        if !path.exists() {
            return Ok(OutputDocument::new());
        }
        let json = fs::read_to_string(path)?;
        OutputDocument::parse(&json, &path.display().to_string())
    }

    fn save(path: &Path, document: &OutputDocument) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(document)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl OutputStore for FileOutputStore {
    fn read(&self, stack_id: &StackId) -> Result<OutputRecord> {
        let path = self.path_for(stack_id);
        let document = Self::load(&path)?;
        let record = document
            .stacks
            .get(&stack_id.to_string())
            .cloned()
            .unwrap_or_default();

        debug!(
            stack_id = %stack_id,
            path = %path.display(),
            outputs = record.len(),
            "Read output record"
        );
        Ok(record)
    }

    fn write(&self, stack_id: &StackId, record: &OutputRecord) -> Result<()> {
        let path = self.path_for(stack_id);
        let mut document = Self::load(&path)?;
        document.version = super::OUTPUT_DOCUMENT_VERSION;
        document.stacks.insert(stack_id.to_string(), record.clone());
        Self::save(&path, &document)?;

        info!(
            stack_id = %stack_id,
            path = %path.display(),
            outputs = record.len(),
            "Wrote output record"
        );
        Ok(())
    }

    fn remove(&self, stack_id: &StackId) -> Result<()> {
        let path = self.path_for(stack_id);
        if !path.exists() {
            return Ok(());
        }
        let mut document = Self::load(&path)?;
        if document.stacks.remove(&stack_id.to_string()).is_some() {
            Self::save(&path, &document)?;
            info!(stack_id = %stack_id, "Removed output record");
        }
        Ok(())
    }
}

/// In-process store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryOutputStore {
    records: RwLock<HashMap<String, OutputRecord>>,
}

impl MemoryOutputStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a record exists for the stack.
    #[must_use]
    pub fn contains(&self, stack_id: &StackId) -> bool {
        self.records.read().contains_key(&stack_id.to_string())
    }
}

impl OutputStore for MemoryOutputStore {
    fn read(&self, stack_id: &StackId) -> Result<OutputRecord> {
        Ok(self
            .records
            .read()
            .get(&stack_id.to_string())
            .cloned()
            .unwrap_or_default())
    }

    fn write(&self, stack_id: &StackId, record: &OutputRecord) -> Result<()> {
        self.records
            .write()
            .insert(stack_id.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, stack_id: &StackId) -> Result<()> {
        self.records.write().remove(&stack_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeploymentEnvironment, StackKind};
    use pretty_assertions::assert_eq;

    fn stack(env: &str, kind: StackKind) -> StackId {
        StackId::new(DeploymentEnvironment::new(env), kind)
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());

        let record = store.read(&stack("develop", StackKind::Infrastructure)).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_file_store_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());
        let id = stack("develop", StackKind::Infrastructure);

        let record = OutputRecord::new().with("vpcId", "vpc-123");
        store.write(&id, &record).unwrap();

        assert_eq!(store.read(&id).unwrap(), record);
        assert!(dir
            .path()
            .join("infrastructure")
            .join(OUTPUTS_FILE_NAME)
            .exists());
    }

    #[test]
    fn test_file_store_write_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());
        let id = stack("develop", StackKind::ProcessTasks);

        store
            .write(&id, &OutputRecord::new().with("a", "1").with("b", "2"))
            .unwrap();
        store.write(&id, &OutputRecord::new().with("c", "3")).unwrap();

        let record = store.read(&id).unwrap();
        assert_eq!(record, OutputRecord::new().with("c", "3"));
    }

    #[test]
    fn test_file_store_environments_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());
        let develop = stack("develop", StackKind::Infrastructure);
        let production = stack("production", StackKind::Infrastructure);

        store.write(&develop, &OutputRecord::new().with("vpcId", "dev")).unwrap();
        store
            .write(&production, &OutputRecord::new().with("vpcId", "prod"))
            .unwrap();

        assert_eq!(store.read(&develop).unwrap().get("vpcId"), Some("dev"));
        assert_eq!(store.read(&production).unwrap().get("vpcId"), Some("prod"));
    }

    #[test]
    fn test_file_store_reads_legacy_tool_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());
        let id = stack("develop", StackKind::Infrastructure);

        let path = store.path_for(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"develop-infrastructure-stack": {"eventLogTableName": "develop-event-log"}}"#,
        )
        .unwrap();

        let record = store.read(&id).unwrap();
        assert_eq!(record.get("eventLogTableName"), Some("develop-event-log"));
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOutputStore::new(dir.path());
        let id = stack("feature-x", StackKind::ProcessEvents);

        store.remove(&id).unwrap();
        store.write(&id, &OutputRecord::new().with("k", "v")).unwrap();
        store.remove(&id).unwrap();

        assert!(store.read(&id).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryOutputStore::new();
        let id = stack("develop", StackKind::Infrastructure);

        assert!(store.read(&id).unwrap().is_empty());
        store.write(&id, &OutputRecord::new().with("vpcId", "v")).unwrap();
        assert!(store.contains(&id));
        store.remove(&id).unwrap();
        assert!(!store.contains(&id));
    }
}
