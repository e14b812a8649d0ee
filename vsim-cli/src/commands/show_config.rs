use crate::config::SimConfig;
use anyhow::Result;

/// Print the effective configuration, defaults filled in
pub fn show_config(config: &SimConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
