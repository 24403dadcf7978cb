use super::{colorize_action, json_pretty, EXIT_SUCCESS};
use contvol_core::{desired_config, Engine, PlanAction};

pub fn run(engine: &Engine, address: &str, name: &str, seed: &str, json: bool) -> Result<u8, String> {
    let config = desired_config(name, seed).map_err(|e| e.to_string())?;
    let action = engine.plan(address, &config).map_err(|e| e.to_string())?;

    // Only a create computes a fresh id; updates keep whatever is recorded.
    let id = match action {
        PlanAction::Create => Some(
            engine
                .volume_id(name, seed)
                .map_err(|e| e.to_string())?
                .into_inner(),
        ),
        PlanAction::Update | PlanAction::NoOp => engine
            .show(address)
            .ok()
            .and_then(|r| r.volume_id())
            .map(contvol_schema::VolumeId::into_inner),
    };

    if json {
        let payload = serde_json::json!({
            "address": address,
            "action": action,
            "id": id,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{address}: {} ({})",
            colorize_action(&action.to_string()),
            id.as_deref().unwrap_or("id unknown")
        );
    }
    Ok(EXIT_SUCCESS)
}
