//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    future,
    stream::{BoxStream, SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::ws::protocol::ServerMsg;

/// Outbound messages buffered per connection; a client that falls further behind is dropped
const OUTBOX_CAPACITY: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    debug!("New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbox, outbox_rx) = mpsc::channel::<ServerMsg>(OUTBOX_CAPACITY);

    // Writer task: outbox -> WebSocket
    let writer = tokio::spawn(write_outbox(ws_sink, outbox_rx));

    // Reader: WebSocket -> coordinator, until the peer leaves or is refused
    state
        .coordinator
        .serve_session(text_frames(ws_stream), outbox)
        .await;

    // Writer drains whatever is queued (e.g. an error reply), then closes
    if let Err(e) = writer.await {
        error!(error = %e, "WebSocket writer task failed");
    }

    info!("WebSocket connection closed");
}

/// Forward queued messages until every sender is gone, then close the socket
async fn write_outbox(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = outbox_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(error = %e, "WebSocket send failed");
            return;
        }
    }
    let _ = ws_sink.send(Message::Close(None)).await;
}

/// Inbound text frames; ends on close or socket error
fn text_frames(ws_stream: SplitStream<WebSocket>) -> BoxStream<'static, String> {
    ws_stream
        .take_while(|frame| {
            let open = match frame {
                Ok(Message::Close(_)) => {
                    info!("Client initiated close");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    false
                }
                Ok(_) => true,
            };
            future::ready(open)
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(text),
                Ok(Message::Binary(_)) => {
                    warn!("Received binary message, ignoring");
                    None
                }
                _ => None,
            })
        })
        .boxed()
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
