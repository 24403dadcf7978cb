pub mod apply;
pub mod completions;
pub mod destroy;
pub mod doctor;
pub mod id;
pub mod import;
pub mod list;
pub mod plan;
pub mod refresh;
pub mod schema;
pub mod show;

use contvol_store::StateRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_RUNTIME_ERROR: u8 = 4;

/// Map an error message to the process exit code by its prefix.
pub fn exit_code_for(msg: &str) -> u8 {
    const CONFIG: &[&str] = &[
        "configuration error:",
        "invalid configuration:",
        "provider not configured",
        "invalid provider data",
        "failed to compute volume id",
    ];
    const STORE: &[&str] = &["store error:", "store lock:"];
    const RUNTIME: &[&str] = &[
        "failed to create volume",
        "failed to inspect volume",
        "failed to remove volume",
        "runtime error:",
    ];

    if CONFIG.iter().any(|p| msg.starts_with(p)) {
        EXIT_CONFIG_ERROR
    } else if STORE.iter().any(|p| msg.starts_with(p)) {
        EXIT_STORE_ERROR
    } else if RUNTIME.iter().any(|p| msg.starts_with(p)) {
        EXIT_RUNTIME_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Run `op` under a spinner unless JSON output was requested.
pub fn with_spinner<T>(
    json: bool,
    running: &str,
    done: &str,
    failed: &str,
    op: impl FnOnce() -> Result<T, String>,
) -> Result<T, String> {
    let pb = if json { None } else { Some(spinner(running)) };
    let result = op();
    if let Some(ref pb) = pb {
        match &result {
            Ok(_) => spin_ok(pb, done),
            Err(_) => spin_fail(pb, failed),
        }
    }
    result
}

pub fn colorize_action(action: &str) -> String {
    use console::Style;
    match action {
        "create" | "created" | "imported" => Style::new().green().apply_to(action).to_string(),
        "update" | "updated" | "refreshed" => Style::new().yellow().apply_to(action).to_string(),
        "destroy" | "destroyed" | "gone" => Style::new().red().apply_to(action).to_string(),
        "no-op" => Style::new().dim().apply_to(action).to_string(),
        other => other.to_owned(),
    }
}

/// `(name, seed, id)` of a record for display; unknown values render as `-`.
pub fn record_fields(record: &StateRecord) -> (String, String, String) {
    let model = record.model().unwrap_or_default();
    let dash = || "-".to_owned();
    (
        model.name.unwrap_or_else(dash),
        model
            .inventory
            .map_or_else(dash, |inventory| inventory.seed),
        model.id.map_or_else(dash, contvol_schema::VolumeId::into_inner),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contvol_schema::{Document, VolumeResourceModel};

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn exit_codes_follow_error_prefix() {
        assert_eq!(exit_code_for("configuration error: HOME not set"), EXIT_CONFIG_ERROR);
        assert_eq!(
            exit_code_for("invalid configuration: attribute 'name' must not be empty"),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            exit_code_for("failed to compute volume id: seed contains whitespace"),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(exit_code_for("store error: integrity failure"), EXIT_STORE_ERROR);
        assert_eq!(exit_code_for("store lock: busy"), EXIT_STORE_ERROR);
        assert_eq!(
            exit_code_for("failed to create volume: runtime execution failed: boom"),
            EXIT_RUNTIME_ERROR
        );
        assert_eq!(exit_code_for("runtime error: unknown backend"), EXIT_RUNTIME_ERROR);
        assert_eq!(exit_code_for("no resource recorded at 'a'"), EXIT_FAILURE);
    }

    #[test]
    fn colorize_action_keeps_text() {
        for action in ["create", "update", "no-op", "destroyed", "other"] {
            assert!(colorize_action(action).contains(action));
        }
    }

    #[test]
    fn with_spinner_passes_result_through() {
        assert_eq!(with_spinner(true, "a", "b", "c", || Ok::<_, String>(7)), Ok(7));
        assert_eq!(
            with_spinner(true, "a", "b", "c", || Err::<u8, _>("x".to_owned())),
            Err("x".to_owned())
        );
    }

    #[test]
    fn record_fields_render_missing_as_dash() {
        let imported = Document::from_model(&VolumeResourceModel::default().with_id("v-1")).unwrap();
        let record = StateRecord::new("vol.a", "imagetest_container_volume", imported);
        assert_eq!(
            record_fields(&record),
            ("-".to_owned(), "-".to_owned(), "v-1".to_owned())
        );
    }
}
