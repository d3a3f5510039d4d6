use crate::{
    config::{self, Config},
    errors::Result,
};

pub async fn execute() -> Result<()> {
    let path = config::config_path()?;
    if path.exists() {
        println!("Config already present at {}", path.display());
        return Ok(());
    }

    config::save(&Config::default())?;
    println!("Wrote config template to {}", path.display());
    println!("Edit `configuration_url` to point at your configuration page.");
    Ok(())
}
