use super::{colorize_action, json_pretty, record_fields, with_spinner, EXIT_SUCCESS};
use contvol_core::{Engine, LifecycleMode};
use contvol_runtime::OperationContext;

pub fn run(engine: &Engine, ctx: &OperationContext, address: &str, json: bool) -> Result<u8, String> {
    let dropped = with_spinner(
        json,
        &format!("destroying {address}..."),
        "destroyed",
        "destroy failed",
        || engine.destroy(ctx, address).map_err(|e| e.to_string()),
    )?;
    let volume_removed = engine.provider().mode() == LifecycleMode::Reconcile;

    if json {
        let payload = serde_json::json!({
            "address": address,
            "volume_removed": volume_removed,
            "record": dropped,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let (_, _, id) = record_fields(&dropped);
        println!("{} {address}", colorize_action("destroyed"));
        if !volume_removed {
            println!("volume {id} left in the container runtime");
        }
    }
    Ok(EXIT_SUCCESS)
}
