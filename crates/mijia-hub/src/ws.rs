//! WebSocket client sessions.
//!
//! A session moves through connect, catch-up, the read loop, and removal.
//! On connect the new session alone receives the current settings snapshot
//! and then the device snapshot; after that it only sees broadcasts and its
//! own command handling. A session failing in any way removes that session
//! and nothing else.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::protocol::Message;
use crate::state::AppState;

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one client session to completion.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = state.hub.register();
    info!("new client {session_id}");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the catch-up send so nothing published in between
    // is missed.
    let mut rx = state.hub.subscribe();

    // Catch-up: settings first, then sensors, to this session only. There
    // is no replay of historical readings.
    let snapshots = [
        state.settings_snapshot().await,
        state.sensors_snapshot().await,
    ];
    for message in snapshots {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize snapshot: {e}");
                continue;
            }
        };
        if sender.send(WsMessage::Text(json.into())).await.is_err() {
            info!("client {session_id} disconnected during catch-up");
            state.hub.remove(session_id);
            return;
        }
    }
    debug!("sent catch-up snapshots to client {session_id}");

    // Forward broadcasts until the client goes away or falls too far behind.
    let mut send_task = tokio::spawn(async move {
        while let Ok(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("failed to serialize broadcast: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle inbound commands.
    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(WsMessage::Text(text)) => {
                    handle_command(&recv_state, session_id, &text).await;
                }
                Ok(WsMessage::Close(_)) => {
                    info!("client {session_id} closed the connection");
                    break;
                }
                Ok(_) => {
                    // Pings are answered by axum; other frames are ignored.
                }
                Err(e) => {
                    warn!("client {session_id} receive error: {e}");
                    break;
                }
            }
        }
    });

    // Whichever task finishes first tears the session down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.remove(session_id);
    info!("client {session_id} removed");
}

/// Decode and dispatch one inbound message.
///
/// A message that does not decode is logged and discarded; the session
/// stays up.
async fn handle_command(state: &AppState, session_id: u64, text: &str) {
    let message: Message = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("failed to decode message from client {session_id}: {e}");
            return;
        }
    };

    match message {
        Message::Settings(new_settings) => {
            info!("client {session_id} updated the settings");
            *state.settings.write().await = new_settings;
            // Persistence stays with the scheduler; this only updates the
            // in-memory value and tells everyone.
            state.broadcast_settings().await;
        }
        Message::Sensors(new_devices) => {
            info!("client {session_id} updated the sensors");
            *state.devices.write().await = new_devices;
            state.broadcast_sensors().await;
        }
        Message::SingleSensor(patch) => {
            let mut devices = state.devices.write().await;
            match devices.get_mut(&patch.index) {
                Some(device) => {
                    device.sensor_name = patch.sensor.sensor_name;
                    device.active = patch.sensor.active;
                    debug!("client {session_id} updated sensor {}", patch.index);
                }
                None => {
                    warn!(
                        "client {session_id} updated unknown sensor {}",
                        patch.index
                    );
                }
            }
            // No broadcast for single-sensor updates; other clients pick
            // the change up with the next cycle's snapshot.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mijia_core::{DeviceMap, DeviceRecord, Settings};

    fn state_with_device(addr: &str) -> Arc<AppState> {
        let mut devices = DeviceMap::new();
        devices.insert(
            addr.to_string(),
            DeviceRecord::discovered(addr, "LYWSD03MMC", "Sensor 01"),
        );
        AppState::new(Config::default(), Settings::default(), devices)
    }

    #[tokio::test]
    async fn test_settings_command_replaces_and_broadcasts() {
        let state = state_with_device("A4:C1:38:00:00:01");
        let mut rx = state.hub.subscribe();

        let mut new_settings = Settings::default();
        new_settings.max_attempts = 9;
        let text = serde_json::to_string(&Message::Settings(new_settings)).unwrap();

        handle_command(&state, 0, &text).await;

        assert_eq!(state.settings.read().await.max_attempts, 9);
        match rx.recv().await.unwrap() {
            Message::Settings(settings) => assert_eq!(settings.max_attempts, 9),
            other => panic!("unexpected broadcast {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sensors_command_replaces_and_broadcasts() {
        let state = state_with_device("A4:C1:38:00:00:01");
        let mut rx = state.hub.subscribe();

        let text = serde_json::to_string(&Message::Sensors(DeviceMap::new())).unwrap();
        handle_command(&state, 0, &text).await;

        assert!(state.devices.read().await.is_empty());
        assert!(matches!(rx.recv().await.unwrap(), Message::Sensors(_)));
    }

    #[tokio::test]
    async fn test_single_sensor_patches_without_broadcast() {
        let addr = "A4:C1:38:00:00:01";
        let state = state_with_device(addr);
        let mut rx = state.hub.subscribe();

        let text = format!(
            r#"{{"cmd":"single_sensor","data":{{"index":"{addr}","sensor":{{"sensor_name":"Bedroom","active":false}}}}}}"#
        );
        handle_command(&state, 0, &text).await;

        let devices = state.devices.read().await;
        assert_eq!(devices[addr].sensor_name, "Bedroom");
        assert!(!devices[addr].active);
        // Only those two fields changed.
        assert_eq!(devices[addr].addr, addr);
        assert!(devices[addr].last_reading.is_none());

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_single_sensor_for_unknown_address_is_ignored() {
        let state = state_with_device("A4:C1:38:00:00:01");

        let text = r#"{"cmd":"single_sensor","data":{"index":"FF:FF:FF:FF:FF:FF","sensor":{"sensor_name":"X","active":true}}}"#;
        handle_command(&state, 0, text).await;

        assert_eq!(state.devices.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_message_changes_nothing() {
        let state = state_with_device("A4:C1:38:00:00:01");
        let mut rx = state.hub.subscribe();

        handle_command(&state, 0, "{{ not json").await;
        handle_command(&state, 0, r#"{"cmd":"reboot","data":null}"#).await;

        assert_eq!(state.devices.read().await.len(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
