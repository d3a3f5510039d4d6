use std::{collections::HashMap, path::Path, sync::Arc};

use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{
    net::UnixStream,
    sync::{Mutex, mpsc, oneshot},
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::{
    errors::{AppError, Result},
    host::{Host, HostEvent},
    models::message::{Coordinates, DeliveryResult, OutboundMessage, PositionOutcome},
};

type HostFrames = Framed<UnixStream, LengthDelimitedCodec>;
type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>;

/// Commands this bridge sends to the host runtime. Request-scoped commands
/// carry a request id the host echoes back in its reply frame.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Command {
    RequestPosition {
        request_id: String,
    },
    SendMessage {
        request_id: String,
        payload: OutboundMessage,
    },
    OpenConfiguration {
        url: String,
    },
}

/// Frames the host runtime sends back: replies to in-flight requests plus
/// unsolicited events.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Frame {
    Position {
        request_id: String,
        latitude: f64,
        longitude: f64,
    },
    PositionError {
        request_id: String,
        code: u16,
    },
    Delivery {
        request_id: String,
        transaction_id: i64,
        delivered: bool,
    },
    ShowConfiguration,
    ConfigurationClosed {
        response: Option<String>,
    },
    MessageReceived {
        payload: Map<String, Value>,
    },
}

#[derive(Debug)]
enum Reply {
    Position(PositionOutcome),
    Delivery(DeliveryResult),
}

/// `Host` implementation speaking length-delimited JSON frames over the host
/// runtime's Unix socket. A reader task routes reply frames to their pending
/// request and forwards unsolicited frames to the event channel; at most one
/// reply is accepted per request id.
pub struct SocketHost {
    sink: SplitSink<HostFrames, Bytes>,
    pending: PendingReplies,
}

impl SocketHost {
    pub async fn connect(
        path: impl AsRef<Path>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HostEvent>)> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|_| AppError::HostUnavailable)?;
        let (sink, source) = Framed::new(stream, LengthDelimitedCodec::new()).split();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        // Unbounded: the reader task must never stall reply routing behind
        // events the bridge has not drained yet.
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(source, Arc::clone(&pending), events_tx));
        Ok((Self { sink, pending }, events_rx))
    }

    async fn call(&mut self, build: impl FnOnce(String) -> Command) -> Result<Reply> {
        let request_id = Ulid::new().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(request_id.clone(), reply_tx);

        if let Err(err) = self.submit(&build(request_id.clone())).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        reply_rx.await.map_err(|_| AppError::HostClosed)
    }

    async fn submit(&mut self, command: &Command) -> Result<()> {
        let bytes = serde_json::to_vec(command)?;
        self.sink
            .send(Bytes::from(bytes))
            .await
            .map_err(|_| AppError::HostClosed)
    }
}

impl Host for SocketHost {
    async fn request_current_position(&mut self) -> Result<PositionOutcome> {
        match self
            .call(|request_id| Command::RequestPosition { request_id })
            .await?
        {
            Reply::Position(outcome) => Ok(outcome),
            Reply::Delivery(_) => Err(AppError::HostFrame(
                "delivery reply to a position request".to_string(),
            )),
        }
    }

    async fn send_message(&mut self, message: &OutboundMessage) -> Result<DeliveryResult> {
        let payload = message.clone();
        match self
            .call(|request_id| Command::SendMessage {
                request_id,
                payload,
            })
            .await?
        {
            Reply::Delivery(result) => Ok(result),
            Reply::Position(_) => Err(AppError::HostFrame(
                "position reply to a message submission".to_string(),
            )),
        }
    }

    async fn open_configuration(&mut self, url: &str) -> Result<()> {
        self.submit(&Command::OpenConfiguration {
            url: url.to_string(),
        })
        .await
    }
}

async fn read_loop(
    mut source: SplitStream<HostFrames>,
    pending: PendingReplies,
    events: mpsc::UnboundedSender<HostEvent>,
) {
    while let Some(frame) = source.next().await {
        let bytes = match frame {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "host stream error");
                break;
            }
        };
        let frame: Frame = match serde_json::from_slice(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping malformed host frame");
                continue;
            }
        };

        match frame {
            Frame::Position {
                request_id,
                latitude,
                longitude,
            } => {
                let outcome = PositionOutcome::Fix(Coordinates {
                    latitude,
                    longitude,
                });
                resolve(&pending, &request_id, Reply::Position(outcome)).await;
            }
            Frame::PositionError { request_id, code } => {
                resolve(
                    &pending,
                    &request_id,
                    Reply::Position(PositionOutcome::Unavailable { code }),
                )
                .await;
            }
            Frame::Delivery {
                request_id,
                transaction_id,
                delivered,
            } => {
                let result = DeliveryResult {
                    transaction_id,
                    delivered,
                };
                resolve(&pending, &request_id, Reply::Delivery(result)).await;
            }
            Frame::ShowConfiguration => forward(&events, HostEvent::ShowConfiguration),
            Frame::ConfigurationClosed { response } => {
                forward(&events, HostEvent::ConfigurationClosed { response });
            }
            Frame::MessageReceived { payload } => {
                forward(&events, HostEvent::MessageReceived { payload });
            }
        }
    }

    // Dropping the senders wakes every in-flight caller with `HostClosed`.
    pending.lock().await.clear();
}

async fn resolve(pending: &PendingReplies, request_id: &str, reply: Reply) {
    let Some(sender) = pending.lock().await.remove(request_id) else {
        debug!(request_id, "reply for unknown request id");
        return;
    };
    let _ = sender.send(reply);
}

fn forward(events: &mpsc::UnboundedSender<HostEvent>, event: HostEvent) {
    if events.send(event).is_err() {
        debug!("event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::UnixListener;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    use super::*;

    async fn pair() -> (
        SocketHost,
        mpsc::UnboundedReceiver<HostEvent>,
        Framed<UnixStream, LengthDelimitedCodec>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let (connected, accepted) = tokio::join!(SocketHost::connect(&path), listener.accept());
        let (host, events) = connected.unwrap();
        let (stream, _) = accepted.unwrap();
        (host, events, Framed::new(stream, LengthDelimitedCodec::new()))
    }

    async fn read_command(server: &mut Framed<UnixStream, LengthDelimitedCodec>) -> Value {
        let bytes = server.next().await.unwrap().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn write_frame(server: &mut Framed<UnixStream, LengthDelimitedCodec>, frame: Value) {
        let bytes = serde_json::to_vec(&frame).unwrap();
        server.send(Bytes::from(bytes)).await.unwrap();
    }

    #[tokio::test]
    async fn position_request_round_trips() {
        let (mut host, _events, mut server) = pair().await;

        let script = async {
            let command = read_command(&mut server).await;
            assert_eq!(command["kind"], "request_position");
            let request_id = command["request_id"].clone();
            write_frame(
                &mut server,
                json!({
                    "kind": "position",
                    "request_id": request_id,
                    "latitude": 40.67,
                    "longitude": -73.94,
                }),
            )
            .await;
        };

        let (outcome, ()) = tokio::join!(host.request_current_position(), script);
        assert_eq!(
            outcome.unwrap(),
            PositionOutcome::Fix(Coordinates {
                latitude: 40.67,
                longitude: -73.94,
            })
        );
    }

    #[tokio::test]
    async fn position_failure_carries_the_host_code() {
        let (mut host, _events, mut server) = pair().await;

        let script = async {
            let command = read_command(&mut server).await;
            let request_id = command["request_id"].clone();
            write_frame(
                &mut server,
                json!({
                    "kind": "position_error",
                    "request_id": request_id,
                    "code": 2,
                }),
            )
            .await;
        };

        let (outcome, ()) = tokio::join!(host.request_current_position(), script);
        assert_eq!(outcome.unwrap(), PositionOutcome::Unavailable { code: 2 });
    }

    #[tokio::test]
    async fn replies_for_unknown_request_ids_are_ignored() {
        let (mut host, _events, mut server) = pair().await;

        let script = async {
            let command = read_command(&mut server).await;
            let request_id = command["request_id"].clone();
            write_frame(
                &mut server,
                json!({
                    "kind": "delivery",
                    "request_id": "not-an-issued-id",
                    "transaction_id": 9,
                    "delivered": true,
                }),
            )
            .await;
            write_frame(
                &mut server,
                json!({
                    "kind": "delivery",
                    "request_id": request_id,
                    "transaction_id": 42,
                    "delivered": false,
                }),
            )
            .await;
        };

        let message = OutboundMessage::location(&Coordinates {
            latitude: 1.0,
            longitude: 2.0,
        });
        let (result, ()) = tokio::join!(host.send_message(&message), script);
        assert_eq!(
            result.unwrap(),
            DeliveryResult {
                transaction_id: 42,
                delivered: false,
            }
        );
    }

    #[tokio::test]
    async fn unsolicited_frames_become_events() {
        let (_host, mut events, mut server) = pair().await;

        write_frame(&mut server, json!({"kind": "show_configuration"})).await;
        write_frame(
            &mut server,
            json!({"kind": "configuration_closed", "response": null}),
        )
        .await;

        assert_eq!(events.recv().await.unwrap(), HostEvent::ShowConfiguration);
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::ConfigurationClosed { response: None }
        );
    }

    #[tokio::test]
    async fn a_reply_behind_undrained_events_still_resolves() {
        let (mut host, mut events, mut server) = pair().await;

        let script = async {
            let command = read_command(&mut server).await;
            let request_id = command["request_id"].clone();
            for _ in 0..32 {
                write_frame(&mut server, json!({"kind": "show_configuration"})).await;
            }
            write_frame(
                &mut server,
                json!({
                    "kind": "position",
                    "request_id": request_id,
                    "latitude": 1.5,
                    "longitude": -2.5,
                }),
            )
            .await;
        };

        // Nothing drains the event channel while the request is in flight.
        let (outcome, ()) = tokio::join!(host.request_current_position(), script);
        assert_eq!(
            outcome.unwrap(),
            PositionOutcome::Fix(Coordinates {
                latitude: 1.5,
                longitude: -2.5,
            })
        );

        for _ in 0..32 {
            assert_eq!(events.recv().await.unwrap(), HostEvent::ShowConfiguration);
        }
    }

    #[tokio::test]
    async fn host_disconnect_fails_the_in_flight_request() {
        let (mut host, _events, mut server) = pair().await;

        let script = async {
            let _ = read_command(&mut server).await;
            drop(server);
        };

        let (outcome, ()) = tokio::join!(host.request_current_position(), script);
        assert!(matches!(outcome.unwrap_err(), AppError::HostClosed));
    }

    #[tokio::test]
    async fn open_configuration_sends_the_url() {
        let (mut host, _events, mut server) = pair().await;

        host.open_configuration("http://10.0.0.5/settings")
            .await
            .unwrap();

        let command = read_command(&mut server).await;
        assert_eq!(command["kind"], "open_configuration");
        assert_eq!(command["url"], "http://10.0.0.5/settings");
    }
}
