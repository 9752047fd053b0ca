use std::path::Path;

use spdt_derivation::process_forecast;

use super::Workspace;

pub fn intervals(config_path: &Path) -> anyhow::Result<()> {
    let ws = Workspace::load(config_path)?;
    let forecast = ws.forecast()?;
    let intervals = process_forecast(&ws.samples(&forecast), ws.config.forecast.granularity)?;
    println!("{}", serde_json::to_string_pretty(&intervals)?);
    Ok(())
}
