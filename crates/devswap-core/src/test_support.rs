//! Test support utilities for devswap-core
//!
//! Provides a stateful MockProvider for exercising the container swap
//! without requiring a real Docker/Podman runtime. Containers live in an
//! in-memory table; `wait` blocks until the test moves the container out of
//! the running state and `attach` blocks until the test releases it.

use async_trait::async_trait;
use devswap_provider::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    List { all: bool },
    Inspect { id: String },
    Create { name: String, image: String },
    Start { id: String },
    Stop { id: String, timeout: Option<u32> },
    Remove { id: String, force: bool },
    Wait { id: String },
    Attach { id: String },
    Ping,
}

impl MockCall {
    /// Whether the call changes runtime state
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Start { .. } | Self::Stop { .. } | Self::Remove { .. }
        )
    }
}

/// Provider operation, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    List,
    Inspect,
    Create,
    Start,
    Stop,
    Remove,
    Wait,
    Attach,
    Ping,
}

#[derive(Debug, Clone)]
struct MockContainer {
    id: ContainerId,
    spec: ContainerSpec,
    status: ContainerStatus,
    exit_code: Option<i64>,
}

#[derive(Default)]
struct MockState {
    containers: Vec<MockContainer>,
    next_id: u64,
    /// Failures keyed by operation and container name (`None` matches any container)
    failures: HashMap<(MockOp, Option<String>), ProviderError>,
    attach_outcome: Option<Result<AttachOutcome>>,
    /// Lookups that never answer, like a hung daemon
    stalled: HashSet<MockOp>,
}

impl MockState {
    /// Runtimes accept either the ID or the name
    fn find(&self, id: &ContainerId) -> Option<&MockContainer> {
        self.containers
            .iter()
            .find(|c| c.id == *id || c.spec.name == id.0)
    }

    fn find_mut(&mut self, id: &ContainerId) -> Option<&mut MockContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.id == *id || c.spec.name == id.0)
    }

    fn failure(&self, op: MockOp, name: Option<&str>) -> Option<ProviderError> {
        name.and_then(|n| self.failures.get(&(op, Some(n.to_string()))))
            .or_else(|| self.failures.get(&(op, None)))
            .map(clone_provider_error)
    }

    fn failure_for(&self, op: MockOp, id: &ContainerId) -> Option<ProviderError> {
        let name = self.find(id).map(|c| c.spec.name.clone());
        self.failure(op, name.as_deref())
    }
}

/// Configurable in-memory container provider for testing
pub struct MockProvider {
    pub provider_type: ProviderType,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    state: Arc<Mutex<MockState>>,
    /// Bumped on every container state change
    changed: watch::Sender<u64>,
    attach_released: Arc<Notify>,
}

impl MockProvider {
    /// Create an empty mock provider where every operation succeeds
    pub fn new(provider_type: ProviderType) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            provider_type,
            calls: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(MockState::default())),
            changed,
            attach_released: Arc::new(Notify::new()),
        }
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn notify_changed(&self) {
        self.changed.send_modify(|v| *v += 1);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a specific call was made
    pub fn was_called(&self, call: &MockCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    /// Seed a container directly, bypassing the call log
    pub fn add_container(&self, spec: ContainerSpec, status: ContainerStatus) -> ContainerId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = ContainerId::new(format!("mock-{}", state.next_id));
        state.containers.push(MockContainer {
            id: id.clone(),
            spec,
            status,
            exit_code: None,
        });
        id
    }

    /// Current state of the container called `name`
    pub fn container_named(&self, name: &str) -> Option<ContainerDetails> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.spec.name == name)
            .map(to_details)
    }

    /// Names of every container in the table
    pub fn container_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.containers.iter().map(|c| c.spec.name.clone()).collect()
    }

    /// Make the container's main process exit with `code`
    pub fn exit_container(&self, name: &str, code: i64) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(c) = state.containers.iter_mut().find(|c| c.spec.name == name) {
                c.status = ContainerStatus::Exited;
                c.exit_code = Some(code);
            }
        }
        self.notify_changed();
    }

    /// End the pending attach session with `outcome`
    pub fn release_attach(&self, outcome: Result<AttachOutcome>) {
        self.state.lock().unwrap().attach_outcome = Some(outcome);
        self.attach_released.notify_one();
    }

    /// Make `op` fail with `error`, for the container called `name` or for all containers
    pub fn fail(&self, op: MockOp, name: Option<&str>, error: ProviderError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, name.map(str::to_string)), error);
    }

    /// Make every `list` or `inspect` call hang
    pub fn stall(&self, op: MockOp) {
        self.state.lock().unwrap().stalled.insert(op);
    }

    async fn stall_point(&self, op: MockOp) {
        let stalled = self.state.lock().unwrap().stalled.contains(&op);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    /// Wait until a container called `name` exists and is running
    pub async fn wait_running(&self, name: &str) {
        let mut rx = self.changed.subscribe();
        loop {
            if self
                .container_named(name)
                .is_some_and(|c| c.status.is_running())
            {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

fn to_details(c: &MockContainer) -> ContainerDetails {
    ContainerDetails {
        id: c.id.clone(),
        status: c.status,
        exit_code: c.exit_code,
        spec: c.spec.clone(),
    }
}

/// Clone a ProviderError (thiserror types don't implement Clone)
fn clone_provider_error(e: &ProviderError) -> ProviderError {
    match e {
        ProviderError::ConnectionError(s) => ProviderError::ConnectionError(s.clone()),
        ProviderError::ContainerNotFound(s) => ProviderError::ContainerNotFound(s.clone()),
        ProviderError::Conflict(s) => ProviderError::Conflict(s.clone()),
        ProviderError::RuntimeError(s) => ProviderError::RuntimeError(s.clone()),
        ProviderError::AttachError(s) => ProviderError::AttachError(s.clone()),
        ProviderError::ConfigError(s) => ProviderError::ConfigError(s.clone()),
        ProviderError::IoError(e) => {
            ProviderError::IoError(std::io::Error::new(e.kind(), e.to_string()))
        }
    }
}

fn not_found(id: &ContainerId) -> ProviderError {
    ProviderError::ContainerNotFound(format!("No such container: {}", id))
}

#[async_trait]
impl ContainerProvider for MockProvider {
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        self.record(MockCall::List { all });
        self.stall_point(MockOp::List).await;
        let state = self.state.lock().unwrap();
        if let Some(e) = state.failure(MockOp::List, None) {
            return Err(e);
        }
        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.status.is_running())
            .map(|c| ContainerInfo {
                id: c.id.clone(),
                names: vec![format!("/{}", c.spec.name)],
                image: c.spec.image.clone(),
                status: c.status,
            })
            .collect())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails> {
        self.record(MockCall::Inspect { id: id.0.clone() });
        self.stall_point(MockOp::Inspect).await;
        let state = self.state.lock().unwrap();
        if let Some(e) = state.failure_for(MockOp::Inspect, id) {
            return Err(e);
        }
        state.find(id).map(to_details).ok_or_else(|| not_found(id))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        self.record(MockCall::Create {
            name: spec.name.clone(),
            image: spec.image.clone(),
        });
        {
            let state = self.state.lock().unwrap();
            if let Some(e) = state.failure(MockOp::Create, Some(&spec.name)) {
                return Err(e);
            }
            if state.containers.iter().any(|c| c.spec.name == spec.name) {
                return Err(ProviderError::Conflict(format!(
                    "The container name \"/{}\" is already in use",
                    spec.name
                )));
            }
        }
        let id = self.add_container(spec.clone(), ContainerStatus::Created);
        self.notify_changed();
        Ok(id)
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.record(MockCall::Start { id: id.0.clone() });
        {
            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.failure_for(MockOp::Start, id) {
                return Err(e);
            }
            let c = state.find_mut(id).ok_or_else(|| not_found(id))?;
            c.status = ContainerStatus::Running;
            c.exit_code = None;
        }
        self.notify_changed();
        Ok(())
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()> {
        self.record(MockCall::Stop {
            id: id.0.clone(),
            timeout,
        });
        {
            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.failure_for(MockOp::Stop, id) {
                return Err(e);
            }
            let c = state.find_mut(id).ok_or_else(|| not_found(id))?;
            if c.status.is_running() {
                c.status = ContainerStatus::Exited;
                // SIGKILL
                c.exit_code = Some(137);
            }
            // Started with --rm: the runtime deletes it once stopped
            if c.spec.extras.host_config["AutoRemove"].as_bool() == Some(true) {
                let gone = c.id.clone();
                state.containers.retain(|c| c.id != gone);
            }
        }
        self.notify_changed();
        Ok(())
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        self.record(MockCall::Remove {
            id: id.0.clone(),
            force,
        });
        {
            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.failure_for(MockOp::Remove, id) {
                return Err(e);
            }
            let pos = state
                .containers
                .iter()
                .position(|c| c.id == *id || c.spec.name == id.0)
                .ok_or_else(|| not_found(id))?;
            if state.containers[pos].status.is_running() && !force {
                return Err(ProviderError::Conflict(format!(
                    "cannot remove running container {}",
                    id
                )));
            }
            state.containers.remove(pos);
        }
        self.notify_changed();
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<WaitOutcome> {
        self.record(MockCall::Wait { id: id.0.clone() });
        let mut rx = self.changed.subscribe();
        loop {
            {
                let state = self.state.lock().unwrap();
                if let Some(e) = state.failure_for(MockOp::Wait, id) {
                    return Err(e);
                }
                match state.find(id) {
                    None => return Err(not_found(id)),
                    Some(c) if !c.status.is_running() => {
                        return Ok(WaitOutcome {
                            status_code: c.exit_code.unwrap_or(0),
                        })
                    }
                    Some(_) => {}
                }
            }
            if rx.changed().await.is_err() {
                return Err(ProviderError::RuntimeError("mock provider dropped".into()));
            }
        }
    }

    async fn attach(&self, id: &ContainerId) -> Result<AttachOutcome> {
        self.record(MockCall::Attach { id: id.0.clone() });
        {
            let state = self.state.lock().unwrap();
            if let Some(e) = state.failure_for(MockOp::Attach, id) {
                return Err(e);
            }
            match state.find(id) {
                Some(c) if c.status.is_running() => {}
                Some(_) => {
                    return Err(ProviderError::AttachError(format!(
                        "You cannot attach to a stopped container {}",
                        id
                    )))
                }
                None => return Err(not_found(id)),
            }
        }

        // The session lasts until the test releases it
        self.attach_released.notified().await;
        let outcome = self.state.lock().unwrap().attach_outcome.take();
        outcome.unwrap_or(Ok(AttachOutcome { exit_code: Some(0) }))
    }

    async fn ping(&self) -> Result<()> {
        self.record(MockCall::Ping);
        match self.state.lock().unwrap().failure(MockOp::Ping, None) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_type: self.provider_type,
            version: "mock".to_string(),
            api_version: "1.43".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        }
    }
}

/// Spec of a typical service container: image command, PATH, a named volume and one network
pub fn mock_spec(name: &str, image: &str) -> ContainerSpec {
    let mut networks = HashMap::new();
    networks.insert(
        "backend".to_string(),
        EndpointConfig {
            network_id: Some("net-backend".to_string()),
            aliases: vec![name.to_string()],
            ..Default::default()
        },
    );
    ContainerSpec {
        name: name.to_string(),
        image: image.to_string(),
        cmd: vec!["./server".to_string()],
        entrypoint: Vec::new(),
        env: vec![
            "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin".to_string(),
            "PORT=8080".to_string(),
        ],
        working_dir: Some("/srv".to_string()),
        terminal: TerminalConfig::default(),
        mounts: vec![MountConfig {
            mount_type: MountType::Volume,
            source: format!("{}-data", name),
            target: "/data".to_string(),
            read_only: false,
        }],
        networks,
        extras: RuntimeExtras::default(),
    }
}
