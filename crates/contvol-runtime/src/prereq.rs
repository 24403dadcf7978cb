use std::fmt;
use std::process::{Command, Stdio};

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn daemon_reachable(binary: &str, host: Option<&str>) -> bool {
    let mut cmd = Command::new(binary);
    if let Some(h) = host {
        cmd.args(["--host", h]);
    }
    cmd.args(["info", "--format", "{{.ServerVersion}}"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check prerequisites for the CLI-driven runtime client.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_runtime_prereqs(binary: &str, host: Option<&str>) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(binary) {
        missing.push(MissingPrereq {
            name: binary.to_owned(),
            purpose: "container engine CLI for volume management",
            install_hint: "install Docker Engine or Podman, or set runtime.binary",
        });
    } else if !daemon_reachable(binary, host) {
        missing.push(MissingPrereq {
            name: format!("{binary} daemon"),
            purpose: "engine API that creates and removes volumes",
            install_hint: "start the daemon (systemctl start docker) or set runtime.host",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\ncontvol needs a reachable container engine to manage volumes.");
    msg
}
