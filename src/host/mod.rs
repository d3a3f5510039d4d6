pub mod socket;

use serde_json::{Map, Value};

use crate::{
    errors::Result,
    models::message::{DeliveryResult, OutboundMessage, PositionOutcome},
};

/// The host runtime APIs this bridge consumes. Domain outcomes (no fix,
/// failed delivery) are carried in the success values so exactly one outcome
/// is observed per request; `Err` means the transport to the host broke.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// One-shot geolocation fetch, not a continuous watch.
    async fn request_current_position(&mut self) -> Result<PositionOutcome>;

    /// Submits an outbound message and waits for its delivery result.
    async fn send_message(&mut self, message: &OutboundMessage) -> Result<DeliveryResult>;

    /// Asks the host to present a webview at the given URL. Fire-and-forget:
    /// the host reports the outcome later as a `ConfigurationClosed` event.
    async fn open_configuration(&mut self, url: &str) -> Result<()>;
}

/// Unsolicited events pushed by the host runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The user asked to open the settings page.
    ShowConfiguration,
    /// The settings webview was dismissed. `response` is absent or empty when
    /// the user cancelled without saving.
    ConfigurationClosed { response: Option<String> },
    /// Inbound message from the device firmware.
    MessageReceived { payload: Map<String, Value> },
}
