use super::{EXIT_FAILURE, EXIT_SUCCESS};
use contvol_core::{ProviderConfig, StoreLock};
use contvol_store::{StateLayout, StateStore};
use std::path::Path;

pub fn run(store_path: &Path, config: &ProviderConfig, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    checks.push(Check::pass(
        "config",
        &format!(
            "Configuration valid (backend {}, {} mode)",
            config.runtime.backend, config.lifecycle.mode
        ),
    ));
    check_runtime(config, &mut checks, &mut all_pass);

    let layout = StateLayout::new(store_path);
    if layout.state_dir().exists() {
        checks.push(Check::pass("state_exists", "State directory exists"));
        check_state(&layout, &mut checks, &mut all_pass);
    } else {
        checks.push(Check::info(
            "state_exists",
            "State not initialized (will be created on first apply)",
        ));
    }

    print_results(&checks, all_pass, json_output)
}

fn check_runtime(config: &ProviderConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if config.runtime.backend != "docker" {
        checks.push(Check::info(
            "runtime_prereqs",
            &format!("Backend '{}' needs no host runtime", config.runtime.backend),
        ));
        return;
    }
    let missing = contvol_runtime::check_runtime_prereqs(
        &config.runtime.binary,
        config.runtime.host.as_deref(),
    );
    if missing.is_empty() {
        checks.push(Check::pass(
            "runtime_prereqs",
            &format!("Container engine '{}' is reachable", config.runtime.binary),
        ));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "runtime_prereqs",
            &contvol_runtime::format_missing(&missing),
        ));
    }
}

fn check_state(layout: &StateLayout, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match layout.verify_version() {
        Ok(()) => checks.push(Check::pass("state_version", "State format version valid")),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "state_version",
                &format!("State version check failed: {e}"),
            ));
        }
    }

    let store = StateStore::new(layout.clone());
    match store.list_with_errors() {
        Ok(entries) => {
            let corrupted: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.as_ref().err().map(|(name, _)| name.as_str()))
                .collect();
            if corrupted.is_empty() {
                checks.push(Check::pass(
                    "state_integrity",
                    &format!("State integrity OK ({} records checked)", entries.len()),
                ));
            } else {
                *all_pass = false;
                checks.push(Check::fail(
                    "state_integrity",
                    &format!(
                        "{} of {} records unreadable: {}",
                        corrupted.len(),
                        entries.len(),
                        corrupted.join(", ")
                    ),
                ));
            }
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "state_integrity",
                &format!("Integrity check failed: {e}"),
            ));
        }
    }

    match StoreLock::try_acquire(&layout.lock_file()) {
        Ok(Some(_)) => checks.push(Check::pass("state_lock", "State lock is free")),
        Ok(None) => checks.push(Check::warn(
            "state_lock",
            "State lock is held by another process",
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "state_lock",
                &format!("Cannot check state lock: {e}"),
            ));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("contvol doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
