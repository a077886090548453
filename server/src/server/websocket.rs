//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! WebSocket endpoint

use crate::context::{Phase, ServerContext};
use crate::server::open_connection;
use crate::transport::{self, TransportKind};
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[derive(Clone)]
struct WebsocketState {
    context: ServerContext,
    max_connections: usize,
}

pub fn router(context: ServerContext, max_connections: usize) -> Router {
    Router::new()
        .route("/websocket", get(handler))
        .with_state(WebsocketState {
            context,
            max_connections,
        })
}

async fn handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<WebsocketState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (reader, writer) = transport::websocket::split(socket);
        open_connection(
            &state.context,
            TransportKind::WebSocket,
            addr,
            state.max_connections,
            Box::new(reader),
            Box::new(writer),
        )
        .await;
    })
}

/// Serve the websocket endpoint until the server stops accepting
pub async fn serve(listener: TcpListener, context: ServerContext, max_connections: usize) {
    let phase = context.subscribe_phase();
    let app = router(context, max_connections);
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(not_accepting(phase))
    .await
    {
        tracing::error!("WebSocket server failed: {}", e);
    }
}

async fn not_accepting(mut phase: tokio::sync::watch::Receiver<Phase>) {
    let _ = phase.wait_for(|phase| *phase != Phase::Running).await;
}
