use super::{json_pretty, record_fields, EXIT_SUCCESS};
use contvol_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let records = engine.list().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&records)?);
    } else if records.is_empty() {
        println!("no volumes recorded");
    } else {
        println!("{:<40} {:<16} ID", "ADDRESS", "NAME");
        for record in &records {
            let (name, _, id) = record_fields(record);
            println!("{:<40} {:<16} {id}", record.address, name);
        }
    }
    Ok(EXIT_SUCCESS)
}
