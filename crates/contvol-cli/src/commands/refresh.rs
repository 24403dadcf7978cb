use super::{colorize_action, json_pretty, with_spinner, EXIT_SUCCESS};
use contvol_core::Engine;
use contvol_runtime::OperationContext;

pub fn run(engine: &Engine, ctx: &OperationContext, address: &str, json: bool) -> Result<u8, String> {
    let refreshed = with_spinner(
        json,
        &format!("refreshing {address}..."),
        "refreshed",
        "refresh failed",
        || engine.refresh(ctx, address).map_err(|e| e.to_string()),
    )?;

    if json {
        let payload = serde_json::json!({
            "address": address,
            "present": refreshed.is_some(),
            "record": refreshed,
        });
        println!("{}", json_pretty(&payload)?);
    } else if refreshed.is_some() {
        println!("{} {address}", colorize_action("refreshed"));
    } else {
        println!(
            "{} {address}: volume no longer exists, record dropped",
            colorize_action("gone")
        );
    }
    Ok(EXIT_SUCCESS)
}
