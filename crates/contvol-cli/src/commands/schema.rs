use super::{json_pretty, EXIT_SUCCESS};
use contvol_core::ContainerVolumeResource;
use contvol_schema::{Attribute, AttributeKind};
use std::collections::BTreeMap;

pub fn run(resource_type: &str, json: bool) -> Result<u8, String> {
    let schema = ContainerVolumeResource::schema();
    if json {
        let payload = serde_json::json!({
            "type": resource_type,
            "schema": schema,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{resource_type}: {}\n", schema.description);
        print_attributes(&schema.attributes, "");
    }
    Ok(EXIT_SUCCESS)
}

fn print_attributes(attributes: &BTreeMap<String, Attribute>, prefix: &str) {
    for (name, attr) in attributes {
        let path = format!("{prefix}{name}");
        let mode = match (attr.required, attr.computed) {
            (true, _) => "required",
            (false, true) => "computed",
            (false, false) => "optional",
        };
        println!(
            "  {path:<18} {mode:<9} {}",
            attr.description.as_deref().unwrap_or("")
        );
        if let AttributeKind::SingleNested { attributes } = &attr.kind {
            print_attributes(attributes, &format!("{path}."));
        }
    }
}
