use anyhow::{Context, Result};
use shopdesk_core::ClientConfig;

pub fn show(config: &ClientConfig) -> Result<()> {
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
