use crate::backend::{RuntimeClient, RuntimeSettings, Volume, VolumeCreateOptions};
use crate::context::OperationContext;
use crate::RuntimeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Client that drives a Docker-compatible CLI (`docker`, `podman`).
#[derive(Debug, Clone)]
pub struct DockerCliClient {
    binary: String,
    host: Option<String>,
    poll_interval: Duration,
}

impl Default for DockerCliClient {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
            host: None,
            poll_interval: POLL_INTERVAL,
        }
    }
}

struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedVolume {
    name: String,
    driver: String,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<InspectedVolume> for Volume {
    fn from(v: InspectedVolume) -> Self {
        Volume {
            name: v.name,
            driver: v.driver,
            mountpoint: v.mountpoint.filter(|m| !m.is_empty()),
            labels: v.labels.unwrap_or_default(),
            created_at: v.created_at,
        }
    }
}

fn is_no_such_volume(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such volume") || lower.contains("no such object")
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut s) = source {
            let _ = s.read_to_string(&mut buf);
        }
        buf
    })
}

impl DockerCliClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let mut client = Self::new(&settings.binary);
        client.host.clone_from(&settings.host);
        client
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(&self, args: &[String]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(host) = &self.host {
            full.push("--host".to_owned());
            full.push(host.clone());
        }
        full.extend(args.iter().cloned());
        full
    }

    /// Run the CLI, polling the child so cancellation and deadlines from `ctx`
    /// kill it instead of waiting for the daemon.
    fn run(&self, ctx: &OperationContext, args: &[String]) -> Result<CommandOutput, RuntimeError> {
        ctx.check()?;
        let full = self.build_args(args);
        debug!("running {} {}", self.binary, full.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::BackendUnavailable(self.binary.clone())
                } else {
                    RuntimeError::Io(e)
                }
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Err(e) = ctx.check() {
                warn!("{} {} interrupted: {e}", self.binary, full.join(" "));
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
            thread::sleep(self.poll_interval);
        };

        let stdout = stdout
            .join()
            .map_err(|_| RuntimeError::ExecFailed("stdout reader panicked".to_owned()))?;
        let stderr = stderr
            .join()
            .map_err(|_| RuntimeError::ExecFailed("stderr reader panicked".to_owned()))?;

        Ok(CommandOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn failure(&self, output: &CommandOutput) -> RuntimeError {
        RuntimeError::CommandFailed {
            program: self.binary.clone(),
            status: output
                .status
                .code()
                .map_or_else(|| "signal".to_owned(), |c| c.to_string()),
            stderr: output.stderr.trim().to_owned(),
        }
    }
}

pub(crate) fn create_args(options: &VolumeCreateOptions) -> Vec<String> {
    let mut args = vec!["volume".to_owned(), "create".to_owned()];
    if let Some(driver) = &options.driver {
        args.push("--driver".to_owned());
        args.push(driver.clone());
    }
    for (k, v) in &options.labels {
        args.push("--label".to_owned());
        args.push(format!("{k}={v}"));
    }
    args.push("--".to_owned());
    args.push(options.name.clone());
    args
}

impl RuntimeClient for DockerCliClient {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn available(&self) -> bool {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(&["version".to_owned()]))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd.status().map(|s| s.success()).unwrap_or(false)
    }

    fn volume_create(
        &self,
        ctx: &OperationContext,
        options: &VolumeCreateOptions,
    ) -> Result<Volume, RuntimeError> {
        let output = self.run(ctx, &create_args(options))?;
        if !output.status.success() {
            return Err(self.failure(&output));
        }
        let created = output.stdout.trim();
        if created != options.name {
            return Err(RuntimeError::InvalidOutput(format!(
                "expected volume '{}', engine reported '{created}'",
                options.name
            )));
        }
        Ok(Volume {
            name: created.to_owned(),
            driver: options.driver.clone().unwrap_or_else(|| "local".to_owned()),
            mountpoint: None,
            labels: options.labels.clone(),
            created_at: None,
        })
    }

    fn volume_inspect(&self, ctx: &OperationContext, name: &str) -> Result<Volume, RuntimeError> {
        let args = [
            "volume".to_owned(),
            "inspect".to_owned(),
            "--format".to_owned(),
            "{{json .}}".to_owned(),
            "--".to_owned(),
            name.to_owned(),
        ];
        let output = self.run(ctx, &args)?;
        if !output.status.success() {
            if is_no_such_volume(&output.stderr) {
                return Err(RuntimeError::VolumeNotFound(name.to_owned()));
            }
            return Err(self.failure(&output));
        }
        let inspected: InspectedVolume = serde_json::from_str(output.stdout.trim())
            .map_err(|e| RuntimeError::InvalidOutput(format!("volume inspect: {e}")))?;
        Ok(inspected.into())
    }

    fn volume_remove(
        &self,
        ctx: &OperationContext,
        name: &str,
        force: bool,
    ) -> Result<(), RuntimeError> {
        let mut args = vec!["volume".to_owned(), "rm".to_owned()];
        if force {
            args.push("--force".to_owned());
        }
        args.push("--".to_owned());
        args.push(name.to_owned());
        let output = self.run(ctx, &args)?;
        if output.status.success() {
            return Ok(());
        }
        if is_no_such_volume(&output.stderr) {
            return Err(RuntimeError::VolumeNotFound(name.to_owned()));
        }
        Err(self.failure(&output))
    }
}
