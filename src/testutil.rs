//! Shared test helpers for media-gallery unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{Config, MetadataBackend, MetadataConfig, NodeConfig, StorageConfig};
use crate::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use crate::storage::models::{FileType, MediaRecord};
use crate::storage::{Database, MetadataStore, MetadataStoreError};
use crate::workflow::MediaWorkflow;
use crate::AppState;

pub const TEST_BASE_URL: &str = "http://127.0.0.1:5000";

/// Workflow over a temporary redb database and local object store.
pub fn test_workflow(temp_dir: &tempfile::TempDir) -> MediaWorkflow {
    let db = Database::open(temp_dir.path().join("data")).expect("Failed to open test database");
    let objects = LocalStore::new(temp_dir.path().join("files"), TEST_BASE_URL)
        .expect("Failed to create test object store");
    MediaWorkflow::new(Arc::new(objects), Arc::new(db))
}

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, test_workflow(temp_dir))
}

/// Create a test AppState around a caller-built workflow.
pub fn test_state_with(temp_dir: &tempfile::TempDir, workflow: MediaWorkflow) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            public_base_url: TEST_BASE_URL.to_string(),
            ..Default::default()
        },
        metadata: MetadataConfig {
            backend: MetadataBackend::Local,
            ..Default::default()
        },
        max_upload_size: 1024 * 1024,
        orphan_grace_seconds: 3600,
    };

    Arc::new(AppState::new(config, workflow))
}

/// Object store wrapper whose operations can be made to fail on demand.
pub struct FlakyObjectStore {
    inner: Arc<dyn ObjectStore>,
    conflict_put: AtomicBool,
    fail_delete: AtomicBool,
    fail_put: AtomicBool,
}

impl FlakyObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            conflict_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
        }
    }

    /// Make every put report that the name is already taken.
    pub fn conflict_put(&self, conflict: bool) {
        self.conflict_put.store(conflict, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        if self.conflict_put.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::AlreadyExists(name.to_string()));
        }
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("injected put failure".into()));
        }
        self.inner.put(name, data, content_type).await
    }

    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(name).await
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("injected delete failure".into()));
        }
        self.inner.delete(name).await
    }

    async fn exists(&self, name: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists(name).await
    }

    async fn list(&self) -> Result<Vec<String>, ObjectStoreError> {
        self.inner.list().await
    }

    fn url_for(&self, name: &str) -> String {
        self.inner.url_for(name)
    }
}

/// Metadata store wrapper whose writes can be made to fail on demand.
pub struct FlakyMetadataStore {
    inner: Arc<dyn MetadataStore>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyMetadataStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn create(&self, record: &MediaRecord) -> Result<MediaRecord, MetadataStoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Backend("injected create failure".into()));
        }
        self.inner.create(record).await
    }

    async fn query(&self) -> Result<Vec<MediaRecord>, MetadataStoreError> {
        self.inner.query().await
    }

    async fn delete(&self, name: &str, file_type: FileType) -> Result<(), MetadataStoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Backend("injected delete failure".into()));
        }
        self.inner.delete(name, file_type).await
    }
}
