use tracing::info;

use super::RunArgs;
use crate::{bridge::LocationBridge, config, errors::Result, host::socket::SocketHost};

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut config = config::load()?;
    if let Some(socket_path) = args.socket_path {
        config.socket_path = socket_path;
    }
    if let Some(configuration_url) = args.configuration_url {
        config.configuration_url = configuration_url;
    }

    let (host, events) = SocketHost::connect(&config.socket_path).await?;
    info!(socket = %config.socket_path, "connected to host runtime");

    let bridge = LocationBridge::new(host, &config);
    tokio::select! {
        result = bridge.run(events) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            Ok(())
        }
    }
}
