use super::{colorize_action, json_pretty, EXIT_SUCCESS};
use contvol_core::Engine;
use contvol_runtime::OperationContext;

pub fn run(
    engine: &Engine,
    ctx: &OperationContext,
    address: &str,
    id: &str,
    json: bool,
) -> Result<u8, String> {
    let record = engine.import(ctx, address, id).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!("{} {id} as {address}", colorize_action("imported"));
    }
    Ok(EXIT_SUCCESS)
}
