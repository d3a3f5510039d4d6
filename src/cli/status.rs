use std::path::Path;

use tokio::net::UnixStream;

use crate::{config, errors::Result};

pub async fn execute() -> Result<()> {
    let config = config::load()?;

    let config_path = config::config_path()?;
    if Path::new(&config_path).exists() {
        println!("✅ Config file present ({})", config_path.display());
    } else {
        println!("⚠️ Config file missing, using defaults (run `locbridge init`)");
    }

    println!("✅ Configuration page URL: {}", config.configuration_url);

    if UnixStream::connect(&config.socket_path).await.is_ok() {
        println!("✅ Host runtime socket reachable");
    } else {
        println!("⚠️ Host runtime socket unreachable ({})", config.socket_path);
    }

    Ok(())
}
