//! In-memory collaborators shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chefsync_core::{
    ArtifactKind, ArtifactName, ChefServer, LogConfig, ReplicaConfig, ReplicaName, SyncConfig,
    ToolPaths, VersionToken,
};
use chefsync_engine::{
    FetchRequest, LocalService, ReplicaError, ReplicaTarget, SourceClient, SourceError,
    StagedVersions, Workspace,
};

pub fn tokens(list: &[&str]) -> Vec<VersionToken> {
    list.iter().map(|v| VersionToken::from(*v)).collect()
}

fn server(url: &str) -> ChefServer {
    ChefServer {
        url: url.to_string(),
        client: "admin".to_string(),
        key: PathBuf::from("keys/admin.pem"),
        knife_config: None,
    }
}

pub fn config(state: &Path, replicas: &[&str], max_parallel: usize) -> SyncConfig {
    SyncConfig {
        state_dir: Some(state.to_path_buf()),
        kinds: ArtifactKind::all().to_vec(),
        source: server("https://master"),
        replicas: replicas
            .iter()
            .map(|name| ReplicaConfig {
                name: ReplicaName::from(*name),
                site: None,
                address: format!("{name}.example.com"),
                ssh_user: "chef".to_string(),
                server: server(&format!("https://{name}")),
                remote_workspace: PathBuf::from(".chefsync/workspace"),
                remote_command: "chefsync".to_string(),
            })
            .collect(),
        max_parallel,
        tools: ToolPaths::default(),
        log: LogConfig::default(),
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSource {
    pub catalog: Mutex<BTreeMap<ArtifactKind, BTreeSet<ArtifactName>>>,
    pub history: Mutex<BTreeMap<ArtifactName, Vec<VersionToken>>>,
    pub fetches: Mutex<Vec<FetchRequest>>,
    pub unavailable_kinds: Mutex<BTreeSet<ArtifactKind>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, kind: ArtifactKind, name: &str) -> Self {
        self.catalog
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .insert(ArtifactName::from(name));
        self
    }

    pub fn with_cookbook(self, name: &str, versions: &[&str]) -> Self {
        self.history
            .lock()
            .unwrap()
            .insert(ArtifactName::from(name), tokens(versions));
        self.with_item(ArtifactKind::Cookbook, name)
    }

    pub fn set_history(&self, name: &str, versions: &[&str]) {
        self.history
            .lock()
            .unwrap()
            .insert(ArtifactName::from(name), tokens(versions));
    }

    pub fn make_unavailable(&self, kind: ArtifactKind) {
        self.unavailable_kinds.lock().unwrap().insert(kind);
    }

    pub fn fetch_log(&self) -> Vec<FetchRequest> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.fetches.lock().unwrap().clear();
    }

    pub fn version_fetches(&self) -> Vec<(String, String)> {
        self.fetch_log()
            .into_iter()
            .filter_map(|r| match r {
                FetchRequest::Version(cv) => Some((cv.name.0, cv.version.0)),
                FetchRequest::Current { .. } => None,
            })
            .collect()
    }

    pub fn current_fetches(&self) -> Vec<(ArtifactKind, String)> {
        self.fetch_log()
            .into_iter()
            .filter_map(|r| match r {
                FetchRequest::Current { kind, name } => Some((kind, name.0)),
                FetchRequest::Version(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn list_artifacts(
        &self,
        kind: ArtifactKind,
    ) -> Result<BTreeSet<ArtifactName>, SourceError> {
        if self.unavailable_kinds.lock().unwrap().contains(&kind) {
            return Err(SourceError::Unavailable(format!("{kind} listing timed out")));
        }
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_versions(&self, cookbook: &ArtifactName) -> Result<Vec<VersionToken>, SourceError> {
        self.history
            .lock()
            .unwrap()
            .get(cookbook)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(cookbook.0.clone()))
    }

    async fn fetch(&self, request: &FetchRequest, dest: &Path) -> Result<(), SourceError> {
        self.fetches.lock().unwrap().push(request.clone());
        match request {
            FetchRequest::Current { kind, name } => {
                let known = self
                    .catalog
                    .lock()
                    .unwrap()
                    .get(kind)
                    .map(|names| names.contains(name))
                    .unwrap_or(false);
                if !known {
                    return Err(SourceError::NotFound(format!("{kind} {name}")));
                }
                let dir = dest.join(kind.repo_dir());
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join(format!("{}.json", name.0)), "{}").unwrap();
            }
            FetchRequest::Version(cv) => {
                let known = self
                    .history
                    .lock()
                    .unwrap()
                    .get(&cv.name)
                    .map(|versions| versions.contains(&cv.version))
                    .unwrap_or(false);
                if !known {
                    return Err(SourceError::NotFound(cv.to_string()));
                }
                let dir = dest.join(&cv.name.0);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("metadata.json"), cv.version.0.as_bytes()).unwrap();
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Replica
// ---------------------------------------------------------------------------

pub struct FakeReplica {
    name: ReplicaName,
    pub fail_transfer: bool,
    pub fail_apply: bool,
    pub panic_apply: bool,
    pub delay: Option<Duration>,
    pub transfers: AtomicUsize,
    pub applies: AtomicUsize,
    pub received: Mutex<Vec<StagedVersions>>,
    pub in_flight: Option<Arc<Concurrency>>,
}

impl FakeReplica {
    pub fn new(name: &str) -> Self {
        Self {
            name: ReplicaName::from(name),
            fail_transfer: false,
            fail_apply: false,
            panic_apply: false,
            delay: None,
            transfers: AtomicUsize::new(0),
            applies: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            in_flight: None,
        }
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn panicking_apply(mut self) -> Self {
        self.panic_apply = true;
        self
    }

    pub fn failing_transfer(mut self) -> Self {
        self.fail_transfer = true;
        self
    }

    pub fn slow(mut self, delay: Duration, tracker: Arc<Concurrency>) -> Self {
        self.delay = Some(delay);
        self.in_flight = Some(tracker);
        self
    }

    /// Versions received by the last transfer, as `(cookbook, version)`.
    pub fn received_versions(&self) -> Vec<(String, String)> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .flat_map(|s| {
                s.versions
                    .iter()
                    .map(|v| (s.cookbook.0.clone(), v.0.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[async_trait]
impl ReplicaTarget for FakeReplica {
    fn name(&self) -> &ReplicaName {
        &self.name
    }

    async fn transfer(&self, workspace: &Path) -> Result<(), ReplicaError> {
        if let Some(tracker) = &self.in_flight {
            tracker.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(tracker) = &self.in_flight {
            tracker.leave();
        }
        if self.fail_transfer {
            return Err(ReplicaError::Transfer("connection refused".to_string()));
        }
        self.transfers.fetch_add(1, Ordering::SeqCst);
        let staged = Workspace::new(workspace).read_staged().unwrap();
        *self.received.lock().unwrap() = staged;
        Ok(())
    }

    async fn apply(&self) -> Result<(), ReplicaError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        if self.panic_apply {
            panic!("{} apply crashed", self.name);
        }
        if self.fail_apply {
            return Err(ReplicaError::Apply("knife upload exited with 1".to_string()));
        }
        Ok(())
    }
}

/// Tracks how many replica transfers run at the same time.
#[derive(Default)]
pub struct Concurrency {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Concurrency {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Replica-local service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeService {
    pub present: Mutex<BTreeMap<ArtifactName, Vec<VersionToken>>>,
    pub kind_uploads: Mutex<Vec<ArtifactKind>>,
    pub version_uploads: Mutex<Vec<(String, String, PathBuf)>>,
    pub fail_kind: Option<ArtifactKind>,
}

impl FakeService {
    pub fn with_present(self, cookbook: &str, versions: &[&str]) -> Self {
        self.present
            .lock()
            .unwrap()
            .insert(ArtifactName::from(cookbook), tokens(versions));
        self
    }
}

#[async_trait]
impl LocalService for FakeService {
    async fn upload_kind(&self, kind: ArtifactKind, _repo_dir: &Path) -> Result<(), ReplicaError> {
        if self.fail_kind == Some(kind) {
            return Err(ReplicaError::Apply(format!("upload of {kind} rejected")));
        }
        self.kind_uploads.lock().unwrap().push(kind);
        Ok(())
    }

    async fn list_versions(&self, cookbook: &ArtifactName) -> Result<Vec<VersionToken>, ReplicaError> {
        Ok(self
            .present
            .lock()
            .unwrap()
            .get(cookbook)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_version(
        &self,
        cookbook: &ArtifactName,
        version: &VersionToken,
        cookbook_path: &Path,
    ) -> Result<(), ReplicaError> {
        self.version_uploads.lock().unwrap().push((
            cookbook.0.clone(),
            version.0.clone(),
            cookbook_path.to_path_buf(),
        ));
        self.present
            .lock()
            .unwrap()
            .entry(cookbook.clone())
            .or_default()
            .push(version.clone());
        Ok(())
    }
}
