use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    errors::Result,
    host::{Host, HostEvent},
    models::message::{self, Coordinates, OutboundMessage, PositionOutcome},
};

/// Forwards the phone's position to the device and relays configuration page
/// results back. Stateless across events: each flow is handled from a clean
/// slate, one at a time, and nothing is retained between invocations.
pub struct LocationBridge<H: Host> {
    host: H,
    configuration_url: String,
}

impl<H: Host> LocationBridge<H> {
    pub fn new(host: H, config: &Config) -> Self {
        Self {
            host,
            configuration_url: config.configuration_url.clone(),
        }
    }

    /// Requests one position fix, then serves host events until the stream
    /// ends. Handler failures are logged and the loop keeps going; transport
    /// breakdowns end the run.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HostEvent>) -> Result<()> {
        self.on_ready().await?;
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle(event).await {
                if err.is_transport() {
                    return Err(err);
                }
                error!(error = %err, "event handler failed");
            }
        }
        info!("host event stream ended");
        Ok(())
    }

    async fn on_ready(&mut self) -> Result<()> {
        info!("requesting current position");
        match self.host.request_current_position().await? {
            PositionOutcome::Fix(coordinates) => self.send_location(&coordinates).await,
            PositionOutcome::Unavailable { code } => {
                error!(code, "position request failed");
                Ok(())
            }
        }
    }

    async fn handle(&mut self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::ShowConfiguration => {
                info!(url = %self.configuration_url, "opening configuration page");
                self.host.open_configuration(&self.configuration_url).await
            }
            HostEvent::ConfigurationClosed { response } => {
                self.on_configuration_closed(response.as_deref()).await
            }
            HostEvent::MessageReceived { payload } => {
                let payload = serde_json::Value::Object(payload);
                info!(payload = %payload, "received message from device");
                Ok(())
            }
        }
    }

    async fn send_location(&mut self, coordinates: &Coordinates) -> Result<()> {
        info!(
            latitude = coordinates.latitude,
            longitude = coordinates.longitude,
            "got position fix"
        );
        self.submit(OutboundMessage::location(coordinates)).await
    }

    async fn on_configuration_closed(&mut self, response: Option<&str>) -> Result<()> {
        let Some(response) = response.filter(|text| !text.is_empty()) else {
            info!("configuration cancelled");
            return Ok(());
        };

        let options = message::parse_configuration_response(response)?;
        info!(?options, "forwarding configuration options");
        self.submit(OutboundMessage::options(options)).await
    }

    /// One submission, one logged outcome. A failed delivery is dropped, not
    /// retried.
    async fn submit(&mut self, message: OutboundMessage) -> Result<()> {
        let result = self.host.send_message(&message).await?;
        if result.delivered {
            info!(transaction_id = result.transaction_id, "delivered message");
        } else {
            warn!(
                transaction_id = result.transaction_id,
                "failed to deliver message"
            );
        }
        Ok(())
    }
}
