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


use clap::Parser;
use emberhold_server::config::{Arguments, Configuration};
use emberhold_server::{BasicRules, Server, ServerContext};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    let config = match Configuration::load(&arguments.config_file) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration load error: {}", err);
            std::process::exit(1);
        }
    };

    debug!("Configuration loaded: {:?}", config);
    info!("Starting Emberhold Server...");

    let context = ServerContext::new(config, Arc::new(BasicRules));

    if let Err(err) = context.store.init().await {
        error!("Unable to prepare user data directory {}: {}", context.store.root().display(), err);
        std::process::exit(1);
    }
    if let Err(err) = context.start() {
        error!("Unable to start world workers: {}", err);
        std::process::exit(1);
    }

    let mut server = Server::new(context.clone());

    if arguments.telnet {
        for listener in &context.config.telnet.listeners {
            if let Err(err) = server
                .listen_telnet(listener.addr.to_addr(), listener.max_connections)
                .await
            {
                error!("Unable to bind telnet port {}: {}", *listener.addr, err);
                std::process::exit(1);
            }
        }
    }

    if arguments.websocket {
        let websocket = &context.config.websocket;
        if let Err(err) = server
            .listen_websocket(websocket.addr.to_addr(), websocket.max_connections)
            .await
        {
            error!("Unable to bind websocket port {}: {}", *websocket.addr, err);
            std::process::exit(1);
        }
    }

    server.wait_for_shutdown().await;
    server.shutdown().await;
}
