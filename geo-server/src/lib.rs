use std::sync::Arc;

use serde::Deserialize;
use warp::Filter;

use crate::hub::{RoomHub, now_ms};
use crate::signing::JoinSigner;
use crate::websocket::{ConnectionManager, JoinParams};
use geo_core::RoomSettings;

pub mod config;
pub mod hub;
pub mod signing;
pub mod websocket;

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    host_user_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    rounds_total: Option<u32>,
    round_seconds: Option<u32>,
    reveal_seconds: Option<u32>,
}

pub fn create_routes(
    hub: Arc<RoomHub>,
    connection_manager: Arc<ConnectionManager>,
    signer: Arc<JoinSigner>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let hub_filter = warp::any().map({
        let hub = hub.clone();
        move || hub.clone()
    });

    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let signer_filter = warp::any().map({
        let signer = signer.clone();
        move || signer.clone()
    });

    // WebSocket endpoint, query-authenticated
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<JoinParams>())
        .and(hub_filter.clone())
        .and(connection_manager_filter.clone())
        .and(signer_filter.clone())
        .map(
            |ws: warp::ws::Ws, params: JoinParams, hub, conn_mgr, signer| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, params, hub, conn_mgr, signer)
                })
            },
        );

    let create_room = warp::path!("api" / "create_room")
        .and(warp::post())
        .and(warp::body::json())
        .and(hub_filter.clone())
        .and(signer_filter.clone())
        .and_then(handle_create_room);

    let health = warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "ok": true,
            "ts": now_ms(),
        }))
    });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    ws_route
        .or(create_room)
        .or(health)
        .with(cors)
        .with(warp::log("geo_arena"))
}

async fn handle_create_room(
    request: CreateRoomRequest,
    hub: Arc<RoomHub>,
    signer: Arc<JoinSigner>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let host_user_id = request.host_user_id.trim();
    if host_user_id.is_empty() {
        return Ok(warp::reply::json(&serde_json::json!({
            "ok": false,
            "error": "host_user_id is required"
        })));
    }

    let defaults = hub.defaults();
    let settings = RoomSettings::clamped(
        request.rounds_total.unwrap_or(defaults.rounds_total),
        request.round_seconds.unwrap_or(defaults.round_seconds),
        request.reveal_seconds.unwrap_or(defaults.reveal_seconds),
        &request.region,
        &request.country,
        defaults,
    );

    let handle = hub.create_room(host_user_id, request.name.trim(), settings);
    let join_url = join_url(&hub, &signer, &handle.code, host_user_id, request.name.trim());

    Ok(warp::reply::json(&serde_json::json!({
        "ok": true,
        "code": &handle.code,
        "join_url": join_url,
    })))
}

fn join_url(
    hub: &RoomHub,
    signer: &JoinSigner,
    code: &str,
    user_id: &str,
    name: &str,
) -> String {
    let mut params: Vec<(&str, &str)> = vec![("room", code), ("user", user_id)];
    let sig = signer.sign(code, user_id);
    if let Some(sig) = sig.as_deref() {
        params.push(("sig", sig));
    }
    if !name.is_empty() {
        params.push(("name", name));
    }
    let query = serde_urlencoded::to_string(&params).unwrap_or_default();
    format!("{}/ws?{}", hub.public_url(), query)
}
