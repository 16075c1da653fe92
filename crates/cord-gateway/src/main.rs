//! Cord gateway client entry point
//!
//! Run with:
//! ```bash
//! BOT_TOKEN=... cargo run -p cord-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use cord_common::{try_init_tracing_with_config, AppError, AppResult, ClientConfig, TracingConfig};
use cord_gateway::protocol::HelloPayload;
use cord_gateway::{GatewayClient, GatewayError, HookName, HookPayload, LoopExit, ShardHandle};
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Client stopped");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> AppResult<()> {
    let config = ClientConfig::from_env()?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        encoding = config.gateway.encoding.as_str(),
        compression = config.gateway.compression.as_str(),
        shards = config.shards.count,
        "Configuration loaded"
    );

    let client = GatewayClient::new(config);
    register_hooks(&client);

    let shards = client.connect_all().await.map_err(AppError::connection)?;

    let cancellers: Vec<_> = shards.iter().map(ShardHandle::canceller).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, closing shards");
            for canceller in &cancellers {
                canceller.cancel();
            }
        }
    });

    let heartbeats: Vec<_> = shards.iter().map(spawn_heartbeat).collect();

    let mut failure = None;
    for shard in shards {
        let shard_id = shard.conn().shard_id();
        match shard.join().await {
            Ok(exit) => report_exit(shard_id, exit),
            Err(e) => {
                error!(shard_id, error = %e, "Shard failed");
                failure.get_or_insert(e);
            }
        }
    }
    for heartbeat in heartbeats {
        heartbeat.abort();
    }

    let stats = client.cache().stats();
    info!(
        users = stats.users,
        messages = stats.messages,
        guilds = stats.guilds,
        "Cache at shutdown"
    );

    match failure {
        Some(e) => Err(into_app_error(e)),
        None => Ok(()),
    }
}

fn register_hooks(client: &GatewayClient) {
    client.on(HookName::Ready, |_| async {
        info!("Gateway session ready");
        Ok(())
    });

    client.on(HookName::GuildCreate, |payload| async move {
        if let HookPayload::Guild(guild) = payload {
            info!(guild_id = %guild["id"], "Joined guild");
        }
        Ok(())
    });

    client.on(HookName::Message, |payload| async move {
        if let HookPayload::Message(message) = payload {
            info!(
                channel_id = %message.channel_id,
                author = %message.author.tag(),
                content = message.preview(80),
                "Message received"
            );
        }
        Ok(())
    });
}

/// Keep the session alive at the gateway's default cadence
fn spawn_heartbeat(shard: &ShardHandle) -> tokio::task::JoinHandle<()> {
    let outbound = shard.outbound();
    let session = std::sync::Arc::clone(shard.session());
    let period = Duration::from_millis(HelloPayload::default().heartbeat_interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if outbound.send(session.heartbeat()).await.is_err() {
                break;
            }
        }
    })
}

fn report_exit(shard_id: u32, exit: LoopExit) {
    match exit.close_code() {
        Some(code) if !code.should_reconnect() => {
            warn!(shard_id, code = %code, "Gateway refused the connection");
        }
        _ => info!(shard_id, exit = ?exit, "Shard closed"),
    }
}

fn into_app_error(err: GatewayError) -> AppError {
    if err.is_invalid_session() {
        AppError::SessionRejected(err.to_string())
    } else {
        AppError::connection(err)
    }
}
