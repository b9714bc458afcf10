use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};

use crate::{
    hub::Hub,
    messages::{self, ServerMessage},
};

pub async fn upgrade(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(socket, hub))
}

async fn serve_viewer(mut socket: WebSocket, hub: Arc<Hub>) {
    let (id, mut outbound) = hub.register().await;
    tracing::info!("Viewer {} connected. Total viewers: {}", id, hub.viewer_count().await);
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => {
                    // Unregistered by shutdown
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => {
                let response = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let current = hub.current();
                        messages::reply(text.as_str(), &current).to_text()
                    }
                    Some(Ok(Message::Binary(_))) => {
                        ServerMessage::Error { message: "Invalid JSON" }.to_text()
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Viewer {} socket error: {}", id, e);
                        break;
                    }
                };
                match response {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to reply to viewer {}: {:?}", id, e),
                }
            }
        }
    }
    hub.unregister(id).await;
    tracing::info!("Viewer {} disconnected. Total viewers: {}", id, hub.viewer_count().await);
}
