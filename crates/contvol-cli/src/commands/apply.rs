use super::{colorize_action, json_pretty, record_fields, with_spinner, EXIT_SUCCESS};
use contvol_core::{desired_config, Engine, PlanAction};
use contvol_runtime::OperationContext;

pub fn run(
    engine: &Engine,
    ctx: &OperationContext,
    address: &str,
    name: &str,
    seed: &str,
    json: bool,
) -> Result<u8, String> {
    let config = desired_config(name, seed).map_err(|e| e.to_string())?;
    let result = with_spinner(
        json,
        &format!("applying {address}..."),
        "applied",
        "apply failed",
        || engine.apply(ctx, address, &config).map_err(|e| e.to_string()),
    )?;

    if json {
        println!("{}", json_pretty(&result)?);
    } else {
        let (_, _, id) = record_fields(&result.record);
        let verb = match result.action {
            PlanAction::Create => "created",
            PlanAction::Update => "updated",
            PlanAction::NoOp => "no-op",
        };
        println!("{} {address}", colorize_action(verb));
        println!("id: {id}");
    }
    Ok(EXIT_SUCCESS)
}
