use super::{json_pretty, EXIT_SUCCESS};
use console::style;
use rapidos_schema::ManifestRegistry;
use serde::Serialize;

#[derive(Serialize)]
struct ManifestSummary<'a> {
    name: &'a str,
    description: &'a str,
    builder: &'static str,
    network: bool,
    cpus: u8,
    memory: &'a str,
}

pub fn run(json: bool) -> Result<u8, String> {
    let registry = ManifestRegistry::with_builtin().map_err(|e| format!("manifest error: {e}"))?;

    if json {
        let summaries: Vec<_> = registry
            .iter()
            .map(|m| ManifestSummary {
                name: &m.name,
                description: &m.description,
                builder: m.builder.as_str(),
                network: m.resources.network,
                cpus: m.resources.cpus,
                memory: &m.resources.memory,
            })
            .collect();
        println!("{}", json_pretty(&summaries)?);
    } else {
        println!("Available manifests:");
        for m in registry.iter() {
            println!("  {}\n\t{}", style(&m.name).bold(), m.description);
        }
    }
    Ok(EXIT_SUCCESS)
}
