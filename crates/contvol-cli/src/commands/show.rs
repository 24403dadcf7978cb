use super::{json_pretty, record_fields, EXIT_SUCCESS};
use contvol_core::Engine;

pub fn run(engine: &Engine, address: &str, json: bool) -> Result<u8, String> {
    let record = engine.show(address).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        let (name, seed, id) = record_fields(&record);
        println!("address:     {}", record.address);
        println!("type:        {}", record.resource_type);
        println!("id:          {id}");
        println!("name:        {name}");
        println!("seed:        {seed}");
        println!("created_at:  {}", record.created_at);
        println!("updated_at:  {}", record.updated_at);
    }
    Ok(EXIT_SUCCESS)
}
