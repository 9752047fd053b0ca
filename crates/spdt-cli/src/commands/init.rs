use std::path::Path;

use spdt_core::SpdtConfig;

pub fn init(app: &str, service: &str, dir: &Path) -> anyhow::Result<()> {
    let output = dir.join("spdt.toml");
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    let config = SpdtConfig::scaffold(app, service);
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
