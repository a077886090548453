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


//! Listeners and the shutdown sequence
//!
//! Both transports feed [`open_connection`], which applies the listener's
//! capacity limit and starts a [`ConnectionSession`] on the shared tracker.

pub mod telnet;
pub mod websocket;

use crate::context::{Phase, ServerContext};
use crate::registry::to_crlf;
use crate::session::ConnectionSession;
use crate::transport::{TransportKind, TransportReader, TransportWriter};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How long a listener may take to stop before it is aborted
const LISTENER_GRACE: Duration = Duration::from_millis(500);

/// Register an accepted connection and serve it, or refuse it when the
/// listener is at capacity. `max_connections` of zero means unlimited.
pub async fn open_connection(
    context: &ServerContext,
    kind: TransportKind,
    addr: SocketAddr,
    max_connections: usize,
    reader: Box<dyn TransportReader>,
    mut writer: Box<dyn TransportWriter>,
) {
    if context.phase() != Phase::Running {
        let _ = writer.close().await;
        return;
    }

    let active = context.registry.active_count().await;
    if max_connections > 0 && active >= max_connections {
        tracing::warn!(%addr, %kind, active, max_connections, "Refusing connection, server is full");
        let notice = context.config.messages.server_full(active);
        let notice = match kind {
            TransportKind::Telnet => to_crlf(&notice),
            TransportKind::WebSocket => notice,
        };
        if let Err(e) = writer.write(notice.as_bytes()).await {
            tracing::debug!(%addr, "Capacity notice failed: {}", e);
        }
        let _ = writer.close().await;
        return;
    }

    let handle = context.registry.add(kind, addr, writer).await;
    match ConnectionSession::new(context.clone(), handle.clone(), reader) {
        Ok(session) => {
            context.tracker.spawn(session.run());
        }
        Err(e) => {
            tracing::error!(connection_id = %handle.id(), "Unable to build handler chain: {}", e);
            handle.close();
            context.registry.remove(handle.id()).await;
        }
    }
}

struct Listener {
    kind: TransportKind,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Listener {
    async fn stop(mut self) {
        if tokio::time::timeout(LISTENER_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
            let _ = self.task.await;
        }
        tracing::info!(kind = %self.kind, addr = %self.addr, "Listener closed");
    }
}

/// The running server: its listeners and shared context
pub struct Server {
    context: ServerContext,
    listeners: Vec<Listener>,
}

impl Server {
    pub fn new(context: ServerContext) -> Self {
        Self {
            context,
            listeners: Vec::new(),
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Bind a telnet listener and start accepting. Returns the bound address.
    pub async fn listen_telnet(
        &mut self,
        addr: SocketAddr,
        max_connections: usize,
    ) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, max_connections, "Telnet server listening");
        let task = tokio::spawn(telnet::accept_loop(
            listener,
            self.context.clone(),
            max_connections,
        ));
        self.listeners.push(Listener {
            kind: TransportKind::Telnet,
            addr: local,
            task,
        });
        Ok(local)
    }

    /// Bind the websocket endpoint and start serving. Returns the bound address.
    pub async fn listen_websocket(
        &mut self,
        addr: SocketAddr,
        max_connections: usize,
    ) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, max_connections, "WebSocket server listening");
        let task = tokio::spawn(websocket::serve(
            listener,
            self.context.clone(),
            max_connections,
        ));
        self.listeners.push(Listener {
            kind: TransportKind::WebSocket,
            addr: local,
            task,
        });
        Ok(local)
    }

    /// Wait for a termination signal or an administrator's shutdown request
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = termination() => {}
            _ = self.context.shutdown_signal().triggered() => {
                tracing::info!("Shutdown requested");
            }
        }
    }

    /// Stop accepting, say farewell, close listeners and transports, stop
    /// the world workers and wait for every worker to finish.
    pub async fn shutdown(self) {
        let Server { context, listeners } = self;
        tracing::info!("Shutting down");

        context.set_phase(Phase::NotAccepting);

        let notified = context
            .registry
            .broadcast(&context.config.messages.farewell, &[])
            .await;
        tracing::debug!(notified, "Farewell sent");

        for listener in listeners {
            listener.stop().await;
        }

        context.set_phase(Phase::Closed);
        context.registry.close_all().await;

        context.world.shutdown().await;

        context.tracker.close();
        context.tracker.wait().await;

        let stats = context.registry.stats();
        tracing::info!(
            total_connections = stats.total_connections,
            total_disconnections = stats.total_disconnections,
            active = stats.active(),
            "Shutdown complete"
        );
    }
}

#[cfg(unix)]
async fn termination() {
    use tokio::signal::unix::{SignalKind, signal};
    match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(mut sigint), Ok(mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => tracing::info!("SIGINT received - initiating graceful shutdown"),
                _ = sigterm.recv() => tracing::info!("SIGTERM received - initiating graceful shutdown"),
            }
        }
        _ => {
            tracing::warn!("Unable to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn termination() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Ctrl+C received - initiating graceful shutdown");
}
