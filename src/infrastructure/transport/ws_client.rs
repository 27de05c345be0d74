//! WebSocket client for the CSMS connection
//!
//! [`WsCsmsClient`] implements [`CsmsPort`]: every outbound Call is
//! registered under its message id and resolved when the matching
//! CALLRESULT or CALLERROR arrives. [`run_session`] pumps the socket,
//! feeding responses back to the client and dispatching inbound Calls to
//! the charge point, each in its own task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::application::ports::{CsmsPort, InboundPort};
use crate::support::errors::{CallError, InfraError};
use crate::support::ocpp_frame::OcppFrame;
use crate::support::shutdown::ShutdownSignal;

/// OCPP 2.0.1 WebSocket subprotocol
pub const OCPP_SUBPROTOCOL: &str = "ocpp2.0.1";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound Call waiting for its answer.
struct PendingRequest {
    action: &'static str,
    response_sender: oneshot::Sender<Result<Value, CallError>>,
}

pub struct WsCsmsClient {
    outbound: mpsc::UnboundedSender<String>,
    pending_requests: DashMap<String, PendingRequest>,
    request_timeout: Duration,
}

impl WsCsmsClient {
    /// Client plus the receiving end of its outgoing frame queue, which
    /// [`run_session`] drains into the socket.
    pub fn new(request_timeout: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            outbound: tx,
            pending_requests: DashMap::new(),
            request_timeout,
        });
        (client, rx)
    }

    fn send_frame(&self, frame: &OcppFrame) -> Result<(), CallError> {
        self.outbound
            .send(frame.serialize())
            .map_err(|_| CallError::Transport("connection closed".to_string()))
    }

    /// Resolve a pending request with a CALLRESULT payload.
    pub fn handle_response(&self, unique_id: &str, payload: Value) {
        if let Some((_, pending)) = self.pending_requests.remove(unique_id) {
            debug!(action = pending.action, unique_id, "Response received");
            let _ = pending.response_sender.send(Ok(payload));
        } else {
            warn!(unique_id, "Response for unknown request");
        }
    }

    /// Resolve a pending request with a CALLERROR.
    pub fn handle_error(&self, unique_id: &str, error_code: &str, error_description: &str) {
        if let Some((_, pending)) = self.pending_requests.remove(unique_id) {
            warn!(
                action = pending.action,
                unique_id,
                error_code,
                error_description,
                "CSMS answered with CALLERROR"
            );
            let _ = pending.response_sender.send(Err(CallError::Rejected {
                action: pending.action.to_string(),
                code: error_code.to_string(),
                description: error_description.to_string(),
            }));
        } else {
            warn!(unique_id, error_code, "CALLERROR for unknown request");
        }
    }

    /// Fail every outstanding request, e.g. when the socket is gone.
    pub fn fail_pending(&self, reason: &str) {
        let ids: Vec<String> = self
            .pending_requests
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            if let Some((_, pending)) = self.pending_requests.remove(&id) {
                let _ = pending
                    .response_sender
                    .send(Err(CallError::Transport(reason.to_string())));
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_requests.len()
    }
}

#[async_trait]
impl CsmsPort for WsCsmsClient {
    async fn call(&self, action: &'static str, payload: Value) -> Result<Value, CallError> {
        let frame = OcppFrame::call(action, payload);
        let unique_id = frame.unique_id().to_string();

        let (tx, rx) = oneshot::channel();
        self.pending_requests.insert(
            unique_id.clone(),
            PendingRequest {
                action,
                response_sender: tx,
            },
        );

        if let Err(e) = self.send_frame(&frame) {
            self.pending_requests.remove(&unique_id);
            return Err(e);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending_requests.remove(&unique_id);
                Err(CallError::Transport("response channel closed".to_string()))
            }
            Err(_) => {
                self.pending_requests.remove(&unique_id);
                warn!(action, unique_id = %unique_id, "Request timed out");
                Err(CallError::Timeout(action.to_string()))
            }
        }
    }
}

/// Open the WebSocket to `url`, offering the OCPP 2.0.1 subprotocol.
pub async fn connect(url: &str) -> Result<WsStream, InfraError> {
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(OCPP_SUBPROTOCOL),
    );

    let (ws_stream, response) = tokio_tungstenite::connect_async(request).await?;
    let accepted = response
        .headers()
        .get("Sec-WebSocket-Protocol")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accepted != OCPP_SUBPROTOCOL {
        warn!(accepted, "CSMS did not confirm the {} subprotocol", OCPP_SUBPROTOCOL);
    }
    info!(url, "Connected to CSMS");
    Ok(ws_stream)
}

/// Pump the socket until it closes or `shutdown` fires. Outstanding
/// requests are failed on the way out; there is no reconnect.
pub async fn run_session(
    ws_stream: WsStream,
    client: Arc<WsCsmsClient>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: Arc<dyn InboundPort>,
    shutdown: ShutdownSignal,
) -> Result<(), InfraError> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let result = loop {
        tokio::select! {
            Some(text) = outbound.recv() => {
                debug!("-> {}", text);
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    error!(error = %e, "Send error");
                    break Err(InfraError::WebSocket(e));
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("<- {}", text);
                        handle_text(&text, &client, &inbound);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Close frame received");
                        break Ok(());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(len = data.len(), "Binary message received, ignoring");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break Err(InfraError::WebSocket(e));
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break Ok(());
                    }
                }
            }
            _ = shutdown.wait() => {
                info!("Closing CSMS connection on shutdown");
                let _ = ws_sender.send(Message::Close(None)).await;
                break Ok(());
            }
        }
    };

    client.fail_pending("connection closed");
    result
}

/// Route one text frame. Calls are answered from a spawned task so a slow
/// handler never blocks the read loop.
fn handle_text(text: &str, client: &Arc<WsCsmsClient>, inbound: &Arc<dyn InboundPort>) {
    let frame = match OcppFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame");
            return;
        }
    };

    match frame {
        OcppFrame::Call {
            unique_id,
            action,
            payload,
        } => {
            let client = client.clone();
            let inbound = inbound.clone();
            tokio::spawn(async move {
                let reply = match inbound.handle_call(&action, payload).await {
                    Ok(response) => OcppFrame::result(unique_id, response),
                    Err(e) => {
                        warn!(action = action.as_str(), error = %e, "Answering with CALLERROR");
                        OcppFrame::error(unique_id, e.code(), e.to_string())
                    }
                };
                if let Err(e) = client.send_frame(&reply) {
                    error!(action = action.as_str(), error = %e, "Failed to send reply");
                }
            });
        }
        OcppFrame::CallResult { unique_id, payload } => {
            client.handle_response(&unique_id, payload);
        }
        OcppFrame::CallError {
            unique_id,
            error_code,
            error_description,
            ..
        } => {
            client.handle_error(&unique_id, &error_code, &error_description);
        }
    }
}
