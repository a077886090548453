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


//! Telnet accept loop

use crate::context::{Phase, ServerContext};
use crate::server::open_connection;
use crate::transport::{self, TransportKind};
use tokio::net::TcpListener;

/// Accept connections until the server stops accepting
pub async fn accept_loop(listener: TcpListener, context: ServerContext, max_connections: usize) {
    let mut phase = context.subscribe_phase();
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = phase.wait_for(|phase| *phase != Phase::Running) => break,
        };
        match accepted {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%addr, "Unable to set TCP_NODELAY: {}", e);
                }
                let (reader, writer) = transport::telnet::split(stream);
                open_connection(
                    &context,
                    TransportKind::Telnet,
                    addr,
                    max_connections,
                    Box::new(reader),
                    Box::new(writer),
                )
                .await;
            }
            Err(e) => tracing::warn!("Telnet accept failed: {}", e),
        }
    }
}
