use super::{json_pretty, EXIT_SUCCESS};
use contvol_core::Engine;

pub fn run(engine: &Engine, name: &str, seed: &str, json: bool) -> Result<u8, String> {
    let id = engine.volume_id(name, seed).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({
            "name": name,
            "seed": seed,
            "id": id,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{id}");
    }
    Ok(EXIT_SUCCESS)
}
