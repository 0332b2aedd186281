//! The seams charm code talks through: hook commands and the Pebble API.
//!
//! Under Juju these shell out to hook tools and a Unix socket. In a run they
//! are implemented by [`MockBackend`](crate::transport::MockBackend) and
//! [`MockPebble`](crate::transport::MockPebble) over the working state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use scenario_state::{
    CheckInfo, CloudSpec, ConfigValue, Databag, Layer, Network, Notice, NoticeId, Plan, Port,
    RelationId, RotatePolicy, SecretContent, SecretId, SecretOwner, ServiceInfo, Status,
    StorageIndex,
};
use serde_json::Value;

use crate::error::{ExecError, ModelError};
use crate::recorder::LogLevel;

/// Options for `secret-add`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSecret {
    /// Owner; application-owned secrets need leadership.
    pub owner: Option<SecretOwner>,
    /// Label.
    pub label: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Expiry, seconds since the epoch.
    pub expire: Option<u64>,
    /// Rotation policy.
    pub rotate: Option<RotatePolicy>,
}

/// Changes for `secret-set`. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretUpdate {
    /// New content, published as a new revision.
    pub content: Option<SecretContent>,
    /// New label.
    pub label: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New expiry.
    pub expire: Option<u64>,
    /// New rotation policy.
    pub rotate: Option<RotatePolicy>,
}

/// What `secret-info-get` reports to an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretInfo {
    /// Id.
    pub id: SecretId,
    /// Label.
    pub label: Option<String>,
    /// Latest revision.
    pub revision: u32,
    /// Expiry.
    pub expires: Option<u64>,
    /// Rotation policy.
    pub rotation: Option<RotatePolicy>,
    /// Description.
    pub description: Option<String>,
}

/// Hook-command surface of a unit.
///
/// Reads never change the state. Writes change exactly the fields the real
/// hook tool would and are refused with the same authorization rules.
pub trait ModelBackend {
    /// `<app>/<unit id>`.
    fn unit_name(&self) -> String;

    /// This application's name.
    fn app_name(&self) -> String;

    /// `is-leader`.
    fn is_leader(&self) -> bool;

    /// `config-get`: state config overlaid on schema defaults.
    fn config_get(&self) -> BTreeMap<String, ConfigValue>;

    /// `status-get`.
    ///
    /// # Errors
    ///
    /// Application status needs leadership.
    fn status_get(&self, app: bool) -> Result<Status, ModelError>;

    /// `status-set`.
    ///
    /// # Errors
    ///
    /// Application status needs leadership; `unknown` and `error` cannot be set.
    fn status_set(&mut self, status: Status, app: bool) -> Result<(), ModelError>;

    /// `application-version-set`.
    fn application_version_set(&mut self, version: &str);

    /// `relation-ids`.
    fn relation_ids(&self, endpoint: &str) -> Vec<RelationId>;

    /// `relation-list`: remote unit names.
    ///
    /// # Errors
    ///
    /// Unknown relation.
    fn relation_list(&self, id: RelationId) -> Result<Vec<String>, ModelError>;

    /// Name of the application on the other side.
    ///
    /// # Errors
    ///
    /// Unknown relation.
    fn relation_remote_app_name(&self, id: RelationId) -> Result<String, ModelError>;

    /// `relation-get`: the databag of `member` (a unit or application name).
    ///
    /// # Errors
    ///
    /// Unknown relation or member; reading the local application databag of
    /// a non-peer relation needs leadership.
    fn relation_get(&self, id: RelationId, member: &str, is_app: bool)
        -> Result<Databag, ModelError>;

    /// `relation-set` on the local unit or application databag. An empty
    /// value deletes the key.
    ///
    /// # Errors
    ///
    /// Unknown relation; writing application data needs leadership.
    fn relation_set(
        &mut self,
        id: RelationId,
        key: &str,
        value: &str,
        is_app: bool,
    ) -> Result<(), ModelError>;

    /// `opened-ports`.
    fn opened_ports(&self) -> Vec<Port>;

    /// `open-port`.
    ///
    /// # Errors
    ///
    /// Malformed port.
    fn open_port(&mut self, port: Port) -> Result<(), ModelError>;

    /// `close-port`.
    ///
    /// # Errors
    ///
    /// Malformed port.
    fn close_port(&mut self, port: Port) -> Result<(), ModelError>;

    /// `secret-add`.
    ///
    /// # Errors
    ///
    /// Application-owned secrets need leadership.
    fn secret_add(&mut self, content: SecretContent, options: NewSecret)
        -> Result<SecretId, ModelError>;

    /// `secret-get`. Passing both `id` and `label` sets the label.
    ///
    /// # Errors
    ///
    /// Unknown secret.
    fn secret_get(
        &mut self,
        id: Option<SecretId>,
        label: Option<&str>,
        refresh: bool,
        peek: bool,
    ) -> Result<SecretContent, ModelError>;

    /// `secret-info-get`.
    ///
    /// # Errors
    ///
    /// Unknown or unowned secret; app-owned secrets need leadership.
    fn secret_info_get(&self, id: Option<SecretId>, label: Option<&str>)
        -> Result<SecretInfo, ModelError>;

    /// `secret-set`.
    ///
    /// # Errors
    ///
    /// Unknown or unowned secret; app-owned secrets need leadership.
    fn secret_set(&mut self, id: SecretId, update: SecretUpdate) -> Result<(), ModelError>;

    /// `secret-grant` to a relation's remote application, or one of its units.
    ///
    /// # Errors
    ///
    /// Unknown secret or relation; ownership rules as for `secret-set`.
    fn secret_grant(
        &mut self,
        id: SecretId,
        relation: RelationId,
        unit: Option<&str>,
    ) -> Result<(), ModelError>;

    /// `secret-revoke`.
    ///
    /// # Errors
    ///
    /// As for [`secret_grant`](Self::secret_grant).
    fn secret_revoke(
        &mut self,
        id: SecretId,
        relation: RelationId,
        unit: Option<&str>,
    ) -> Result<(), ModelError>;

    /// `secret-remove`: one revision, or the whole secret.
    ///
    /// # Errors
    ///
    /// Ownership rules as for `secret-set`; a revision the secret never had
    /// is an invalid argument.
    fn secret_remove(&mut self, id: SecretId, revision: Option<u32>) -> Result<(), ModelError>;

    /// `storage-list <name>`.
    ///
    /// # Errors
    ///
    /// Storage not declared in metadata.
    fn storage_list(&self, name: &str) -> Result<Vec<StorageIndex>, ModelError>;

    /// `storage-get location` for `name/index`.
    ///
    /// # Errors
    ///
    /// Unknown storage instance, or its directory cannot be created.
    fn storage_get(&self, name: &str, index: StorageIndex) -> Result<PathBuf, ModelError>;

    /// `storage-add`. Only the request is recorded; no instance appears.
    ///
    /// # Errors
    ///
    /// Storage not declared in metadata.
    fn storage_add(&mut self, name: &str, count: u32) -> Result<(), ModelError>;

    /// `network-get`.
    ///
    /// # Errors
    ///
    /// Binding not declared in metadata.
    fn network_get(&self, binding: &str) -> Result<Network, ModelError>;

    /// `resource-get`.
    ///
    /// # Errors
    ///
    /// Unknown resource.
    fn resource_get(&self, name: &str) -> Result<PathBuf, ModelError>;

    /// `credential-get`.
    ///
    /// # Errors
    ///
    /// The application is not trusted, or the model has no cloud spec.
    fn credential_get(&self) -> Result<CloudSpec, ModelError>;

    /// `goal-state` unit count.
    fn planned_units(&self) -> u32;

    /// Stored state content for `owner`/`name`; empty if none is stored.
    fn stored_state_get(&self, owner: &str, name: &str) -> BTreeMap<String, Value>;

    /// Writes one stored state key.
    fn stored_state_set(&mut self, owner: &str, name: &str, key: &str, value: Value);

    /// `action-get`: parameters merged over schema defaults.
    ///
    /// # Errors
    ///
    /// Not running an action.
    fn action_get(&self) -> Result<BTreeMap<String, Value>, ModelError>;

    /// `action-set`.
    ///
    /// # Errors
    ///
    /// Not running an action.
    fn action_set(&mut self, results: BTreeMap<String, Value>) -> Result<(), ModelError>;

    /// `action-log`.
    ///
    /// # Errors
    ///
    /// Not running an action.
    fn action_log(&mut self, message: &str) -> Result<(), ModelError>;

    /// `action-fail`.
    ///
    /// # Errors
    ///
    /// Not running an action.
    fn action_fail(&mut self, message: &str) -> Result<(), ModelError>;

    /// `juju-log`.
    fn juju_log(&mut self, level: LogLevel, message: &str);

    /// Pebble client for `container`.
    ///
    /// # Errors
    ///
    /// Unknown container.
    fn pebble(&mut self, container: &str) -> Result<Box<dyn PebbleClient + '_>, ModelError>;
}

/// Kind of a workload filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Anything else.
    Other,
}

/// One entry of `list_files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path inside the container.
    pub path: String,
    /// Base name.
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
    /// Size in bytes.
    pub size: u64,
}

/// Options for [`PebbleClient::exec`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOptions {
    /// Extra environment.
    pub environment: BTreeMap<String, String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Timeout in seconds.
    pub timeout: Option<f64>,
    /// User name.
    pub user: Option<String>,
    /// Group name.
    pub group: Option<String>,
    /// Standard input.
    pub stdin: Option<String>,
}

/// A started mocked process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecProcess {
    command: Vec<String>,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl ExecProcess {
    pub(crate) fn new(command: Vec<String>, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            command,
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Waits for the process and returns its standard output and error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the process exited non-zero.
    pub fn wait_output(self) -> Result<(String, String), ExecError> {
        if self.exit_code == 0 {
            Ok((self.stdout, self.stderr))
        } else {
            Err(ExecError {
                command: self.command,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }

    /// Waits for the process, discarding output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the process exited non-zero.
    pub fn wait(self) -> Result<(), ExecError> {
        self.wait_output().map(|_| ())
    }
}

/// The Pebble API of one workload container.
///
/// Every call other than [`can_connect`](Self::can_connect) fails with
/// [`ModelError::Connection`] when the container is not reachable.
pub trait PebbleClient {
    /// Whether Pebble answers.
    fn can_connect(&self) -> bool;

    /// The merged plan.
    ///
    /// # Errors
    ///
    /// Unreachable container.
    fn get_plan(&self) -> Result<Plan, ModelError>;

    /// Adds a layer under `label`; with `combine`, merges into an existing
    /// layer of that label.
    ///
    /// # Errors
    ///
    /// Unreachable container, or `label` exists and `combine` is false.
    fn add_layer(&mut self, label: &str, layer: Layer, combine: bool) -> Result<(), ModelError>;

    /// Services in the plan; all of them when `names` is empty.
    ///
    /// # Errors
    ///
    /// Unreachable container.
    fn get_services(&self, names: &[&str]) -> Result<Vec<ServiceInfo>, ModelError>;

    /// Starts services.
    ///
    /// # Errors
    ///
    /// Unreachable container or a service missing from the plan.
    fn start_services(&mut self, names: &[&str]) -> Result<(), ModelError>;

    /// Stops services.
    ///
    /// # Errors
    ///
    /// Unreachable container or a service missing from the plan.
    fn stop_services(&mut self, names: &[&str]) -> Result<(), ModelError>;

    /// Restarts services.
    ///
    /// # Errors
    ///
    /// Unreachable container or a service missing from the plan.
    fn restart_services(&mut self, names: &[&str]) -> Result<(), ModelError>;

    /// Starts every service with `startup: enabled`.
    ///
    /// # Errors
    ///
    /// Unreachable container.
    fn replan_services(&mut self) -> Result<(), ModelError>;

    /// Check runtime information; all of it when `names` is empty.
    ///
    /// # Errors
    ///
    /// Unreachable container.
    fn get_checks(&self, names: &[&str]) -> Result<Vec<CheckInfo>, ModelError>;

    /// All notices.
    ///
    /// # Errors
    ///
    /// Unreachable container.
    fn get_notices(&self) -> Result<Vec<Notice>, ModelError>;

    /// One notice.
    ///
    /// # Errors
    ///
    /// Unreachable container or unknown notice.
    fn get_notice(&self, id: NoticeId) -> Result<Notice, ModelError>;

    /// Writes a file.
    ///
    /// # Errors
    ///
    /// Unreachable container, bad path, or I/O failure.
    fn push(&mut self, path: &str, content: &[u8], make_dirs: bool) -> Result<(), ModelError>;

    /// Reads a file.
    ///
    /// # Errors
    ///
    /// Unreachable container, bad path, or I/O failure.
    fn pull(&self, path: &str) -> Result<Vec<u8>, ModelError>;

    /// Lists a directory, or describes a single file.
    ///
    /// # Errors
    ///
    /// Unreachable container, bad path, or I/O failure.
    fn list_files(&self, path: &str) -> Result<Vec<FileInfo>, ModelError>;

    /// Creates a directory.
    ///
    /// # Errors
    ///
    /// Unreachable container, bad path, or I/O failure.
    fn make_dir(&mut self, path: &str, make_parents: bool) -> Result<(), ModelError>;

    /// Removes a file or directory.
    ///
    /// # Errors
    ///
    /// Unreachable container, bad path, or I/O failure.
    fn remove_path(&mut self, path: &str, recursive: bool) -> Result<(), ModelError>;

    /// Whether a path exists.
    ///
    /// # Errors
    ///
    /// Unreachable container or bad path.
    fn exists(&self, path: &str) -> Result<bool, ModelError>;

    /// Runs a command against the registered exec mocks.
    ///
    /// # Errors
    ///
    /// Unreachable container, empty command, or no mock matches.
    fn exec(&mut self, command: &[&str], options: ExecOptions) -> Result<ExecProcess, ModelError>;
}
