//! Pebble API over a container in the working state.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::PathBuf;

use scenario_state::{
    CheckInfo, Container, Layer, Notice, NoticeId, Plan, ServiceInfo, ServiceStatus, Startup,
};
use tracing::debug;

use crate::backend::{ExecOptions, ExecProcess, FileInfo, FileType, PebbleClient};
use crate::error::ModelError;
use crate::recorder::{ExecArgs, Recorder};
use crate::transport::fs::{resolve, FsArena};

/// [`PebbleClient`] for one container of the working state.
///
/// Files live under the Context's container root, or under a mount source
/// when the path falls inside a mount location.
pub struct MockPebble<'a> {
    container: &'a mut Container,
    fs: &'a FsArena,
    recorder: &'a RefCell<Recorder>,
}

impl<'a> MockPebble<'a> {
    pub(crate) fn new(
        container: &'a mut Container,
        fs: &'a FsArena,
        recorder: &'a RefCell<Recorder>,
    ) -> Self {
        Self {
            container,
            fs,
            recorder,
        }
    }

    fn connected(&self) -> Result<(), ModelError> {
        if self.container.can_connect {
            Ok(())
        } else {
            Err(ModelError::Connection(self.container.name.clone()))
        }
    }

    fn host(&self, path: &str) -> Result<PathBuf, ModelError> {
        self.connected()?;
        let root = self
            .fs
            .container_root(&self.container.name)
            .map_err(io_error(&self.container.name))?;
        resolve(&*self.container, &root, path)
    }

    fn set_status(&mut self, names: &[&str], status: ServiceStatus) -> Result<(), ModelError> {
        self.connected()?;
        let plan = self.container.plan();
        if let Some(missing) = names.iter().find(|n| !plan.services.contains_key(**n)) {
            return Err(ModelError::invalid(format!(
                "{}: service {missing} is not in the plan",
                self.container.name
            )));
        }
        for name in names {
            self.container
                .service_statuses
                .insert((*name).to_string(), status);
        }
        Ok(())
    }
}

fn io_error(path: &str) -> impl FnOnce(io::Error) -> ModelError + '_ {
    move |source| ModelError::Io {
        path: path.to_string(),
        source,
    }
}

fn file_info(path: String, meta: &fs::Metadata) -> FileInfo {
    let file_type = if meta.is_dir() {
        FileType::Directory
    } else if meta.is_file() {
        FileType::File
    } else if meta.file_type().is_symlink() {
        FileType::Symlink
    } else {
        FileType::Other
    };
    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    FileInfo {
        path,
        name,
        file_type,
        size: meta.len(),
    }
}

impl PebbleClient for MockPebble<'_> {
    fn can_connect(&self) -> bool {
        self.container.can_connect
    }

    fn get_plan(&self) -> Result<Plan, ModelError> {
        self.connected()?;
        Ok(self.container.plan())
    }

    fn add_layer(&mut self, label: &str, layer: Layer, combine: bool) -> Result<(), ModelError> {
        self.connected()?;
        debug!(container = %self.container.name, label, combine, "add layer");
        match self.container.layers.iter_mut().find(|(l, _)| l == label) {
            Some((_, existing)) if combine => existing.combine(&layer),
            Some(_) => {
                return Err(ModelError::invalid(format!(
                    "{}: layer {label} already exists",
                    self.container.name
                )))
            }
            None => self.container.layers.push((label.to_string(), layer)),
        }
        Ok(())
    }

    fn get_services(&self, names: &[&str]) -> Result<Vec<ServiceInfo>, ModelError> {
        self.connected()?;
        Ok(self
            .container
            .services()
            .into_iter()
            .filter(|s| names.is_empty() || names.contains(&s.name.as_str()))
            .collect())
    }

    fn start_services(&mut self, names: &[&str]) -> Result<(), ModelError> {
        self.set_status(names, ServiceStatus::Active)
    }

    fn stop_services(&mut self, names: &[&str]) -> Result<(), ModelError> {
        self.set_status(names, ServiceStatus::Inactive)
    }

    fn restart_services(&mut self, names: &[&str]) -> Result<(), ModelError> {
        self.set_status(names, ServiceStatus::Active)
    }

    fn replan_services(&mut self) -> Result<(), ModelError> {
        self.connected()?;
        for (name, service) in self.container.plan().services {
            if service.startup == Startup::Enabled {
                self.container
                    .service_statuses
                    .insert(name, ServiceStatus::Active);
            }
        }
        Ok(())
    }

    fn get_checks(&self, names: &[&str]) -> Result<Vec<CheckInfo>, ModelError> {
        self.connected()?;
        Ok(self
            .container
            .plan()
            .checks
            .into_iter()
            .filter(|(name, _)| names.is_empty() || names.contains(&name.as_str()))
            .map(|(name, check)| {
                self.container
                    .get_check_info(&name)
                    .cloned()
                    .unwrap_or_else(|_| CheckInfo {
                        level: check.level,
                        threshold: check.threshold.unwrap_or(3),
                        ..CheckInfo::new(name)
                    })
            })
            .collect())
    }

    fn get_notices(&self) -> Result<Vec<Notice>, ModelError> {
        self.connected()?;
        Ok(self.container.notices.clone())
    }

    fn get_notice(&self, id: NoticeId) -> Result<Notice, ModelError> {
        self.connected()?;
        Ok(self.container.get_notice(id)?.clone())
    }

    fn push(&mut self, path: &str, content: &[u8], make_dirs: bool) -> Result<(), ModelError> {
        let host = self.host(path)?;
        debug!(container = %self.container.name, path, bytes = content.len(), "push");
        if make_dirs {
            if let Some(parent) = host.parent() {
                fs::create_dir_all(parent).map_err(io_error(path))?;
            }
        }
        fs::write(&host, content).map_err(io_error(path))
    }

    fn pull(&self, path: &str) -> Result<Vec<u8>, ModelError> {
        let host = self.host(path)?;
        fs::read(&host).map_err(io_error(path))
    }

    fn list_files(&self, path: &str) -> Result<Vec<FileInfo>, ModelError> {
        let host = self.host(path)?;
        let meta = fs::symlink_metadata(&host).map_err(io_error(path))?;
        if !meta.is_dir() {
            return Ok(vec![file_info(path.to_string(), &meta)]);
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&host).map_err(io_error(path))? {
            let entry = entry.map_err(io_error(path))?;
            let meta = entry.metadata().map_err(io_error(path))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(file_info(
                format!("{}/{name}", path.trim_end_matches('/')),
                &meta,
            ));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn make_dir(&mut self, path: &str, make_parents: bool) -> Result<(), ModelError> {
        let host = self.host(path)?;
        let created = if make_parents {
            fs::create_dir_all(&host)
        } else {
            fs::create_dir(&host)
        };
        created.map_err(io_error(path))
    }

    fn remove_path(&mut self, path: &str, recursive: bool) -> Result<(), ModelError> {
        let host = self.host(path)?;
        let meta = fs::symlink_metadata(&host).map_err(io_error(path))?;
        let removed = if !meta.is_dir() {
            fs::remove_file(&host)
        } else if recursive {
            fs::remove_dir_all(&host)
        } else {
            fs::remove_dir(&host)
        };
        removed.map_err(io_error(path))
    }

    fn exists(&self, path: &str) -> Result<bool, ModelError> {
        Ok(self.host(path)?.exists())
    }

    fn exec(&mut self, command: &[&str], options: ExecOptions) -> Result<ExecProcess, ModelError> {
        self.connected()?;
        if command.is_empty() {
            return Err(ModelError::invalid("exec needs a command"));
        }
        let argv: Vec<String> = command.iter().map(|s| (*s).to_string()).collect();
        debug!(container = %self.container.name, command = ?argv, "exec");
        self.recorder
            .borrow_mut()
            .exec_history
            .entry(self.container.name.clone())
            .or_default()
            .push(ExecArgs {
                command: argv.clone(),
                environment: options.environment,
                working_dir: options.working_dir,
                timeout: options.timeout,
                user: options.user,
                group: options.group,
                stdin: options.stdin,
            });
        let Some(mock) = self.container.find_exec(&argv) else {
            return Err(ModelError::ExecMockMissing {
                container: self.container.name.clone(),
                command: argv,
            });
        };
        Ok(ExecProcess::new(
            argv,
            mock.return_code,
            mock.stdout.clone(),
            mock.stderr.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scenario_state::{Exec, Mount, Service};
    use std::collections::BTreeMap;

    fn layer(startup: Startup) -> Layer {
        Layer {
            services: BTreeMap::from([(
                "web".to_string(),
                Service {
                    command: Some("/bin/web".into()),
                    startup,
                    ..Service::default()
                },
            )]),
            ..Layer::default()
        }
    }

    #[test]
    fn longest_exec_prefix_wins() {
        let mut container = Container::new("workload")
            .with_exec(Exec::new(["ls"]).with_stdout("short"))
            .with_exec(Exec::new(["ls", "-ll"]).with_stdout("long"));
        let fs = FsArena::default();
        let recorder = RefCell::default();
        let mut pebble = MockPebble::new(&mut container, &fs, &recorder);
        let process = pebble.exec(&["ls", "-ll", "extra"], ExecOptions::default()).unwrap();
        assert_eq!(process.wait_output().unwrap().0, "long");
        let err = pebble.exec(&["cat"], ExecOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecMockMiss);
        assert_eq!(recorder.borrow().exec_history["workload"].len(), 2);
    }

    #[test]
    fn non_zero_exit_is_an_exec_error() {
        let mut container =
            Container::new("workload").with_exec(Exec::new(["false"]).with_return_code(1));
        let fs = FsArena::default();
        let recorder = RefCell::default();
        let mut pebble = MockPebble::new(&mut container, &fs, &recorder);
        let err = pebble
            .exec(&["false"], ExecOptions::default())
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.exit_code, 1);
    }

    #[test]
    fn unreachable_container_refuses_calls() {
        let mut container = Container::new("workload").with_can_connect(false);
        let fs = FsArena::default();
        let recorder = RefCell::default();
        let mut pebble = MockPebble::new(&mut container, &fs, &recorder);
        assert!(!pebble.can_connect());
        assert_eq!(pebble.get_plan().unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(
            pebble.push("/x", b"y", false).unwrap_err().kind(),
            ErrorKind::Connection
        );
    }

    #[test]
    fn layers_and_replan() {
        let mut container = Container::new("workload");
        let fs = FsArena::default();
        let recorder = RefCell::default();
        let mut pebble = MockPebble::new(&mut container, &fs, &recorder);
        pebble.add_layer("base", layer(Startup::Disabled), false).unwrap();
        assert!(pebble.add_layer("base", layer(Startup::Enabled), false).is_err());
        pebble.add_layer("base", layer(Startup::Enabled), true).unwrap();
        pebble.replan_services().unwrap();
        let services = pebble.get_services(&[]).unwrap();
        assert_eq!(services[0].current, ServiceStatus::Active);
        assert!(pebble.start_services(&["db"]).is_err());
        assert_eq!(container.layers.len(), 1);
    }

    #[test]
    fn files_round_trip_through_mounts() {
        let source = tempfile::tempdir().unwrap();
        let mut container = Container::new("workload").with_mount(
            "cfg",
            Mount {
                location: "/etc/app".into(),
                source: source.path().to_path_buf(),
            },
        );
        let fs = FsArena::default();
        let recorder = RefCell::default();
        let mut pebble = MockPebble::new(&mut container, &fs, &recorder);
        pebble.push("/etc/app/conf.d/a.toml", b"x = 1", true).unwrap();
        assert!(source.path().join("conf.d/a.toml").is_file());
        assert_eq!(pebble.pull("/etc/app/conf.d/a.toml").unwrap(), b"x = 1");
        pebble.push("/var/lib/state", b"s", true).unwrap();
        let listed = pebble.list_files("/var/lib").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "/var/lib/state");
        pebble.remove_path("/var/lib", true).unwrap();
        assert!(!pebble.exists("/var/lib").unwrap());
    }
}
