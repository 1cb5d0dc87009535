use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use entity_bridge::config::BridgeConfig;
use entity_bridge::entity::{Pose, VirtualEntity};
use entity_bridge::facade::{Particle, VersionFacade};
use entity_bridge::metrics::{self, Metrics};
use entity_bridge::net::connection::{self, ConnectionManager};
use entity_bridge::protocol::{Hand, UseEntity, UseEntityAction};

/// Version assumed when HOST_VERSION is unset
const DEMO_HOST_VERSION: &str = "1.21.4-R0.1-SNAPSHOT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = BridgeConfig::load_or_default();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Entity Bridge v{}", env!("CARGO_PKG_VERSION"));

    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    let host_version = config.host_version.clone().unwrap_or_else(|| {
        warn!("HOST_VERSION not set, assuming {}", DEMO_HOST_VERSION);
        DEMO_HOST_VERSION.to_string()
    });

    let metrics = Arc::new(Metrics::new());

    // Fail fast: nothing starts on an unsupported host
    let facade = VersionFacade::from_host_version(&host_version, &config, metrics.clone())
        .context("Cannot start entity bridge")?;
    info!(
        "Particles: {}",
        serde_json::to_string(facade.particles()).unwrap_or_default()
    );

    #[cfg(feature = "metrics_endpoint")]
    {
        let metrics_clone = metrics.clone();
        let metrics_port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Simulated host: one player connection with the host's own packet handler
    let connections = ConnectionManager::new();
    let (pipeline, mut host_frames) = connection::host_pipeline();
    let parts = connection::open(Uuid::new_v4(), pipeline);
    let player = parts.handle.clone();
    let mut outbound = parts.outbound;
    parts.event_loop.spawn();
    connections.insert(player.clone());

    tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            info!("-> {} packet {:#04x} ({} bytes)", packet.kind(), packet.id(), packet.body().len());
        }
    });
    tokio::spawn(async move {
        while let Some(frame) = host_frames.recv().await {
            info!("Host handled inbound packet {:#04x}", frame.packet_id);
        }
    });

    // Game logic: a scoreboard label and a shopkeeper NPC
    let mut label = facade.new_text_label_entity("Wave 1");
    let npc = facade.new_humanoid_entity();
    let spawn = Pose::new(0.5, 65.0, 0.5).with_rotation(180.0, 0.0);

    let online = connections.online();
    facade.broadcast(&label.spawn_packets_for(&spawn.offset(0.0, 2.5, 0.0))?, &online);
    facade.broadcast(&npc.spawn_packets_for(&spawn)?, &online);
    info!(
        "Spawned label {} and npc {} ({} effect)",
        label.entity_id(),
        npc.entity_id(),
        facade.particle(Particle::Villager)
    );

    let npc_id = npc.entity_id();
    facade.inject_callbacks(
        &player,
        move |who, id| {
            if id == npc_id {
                info!("Player {} hit the shopkeeper", who);
            }
        },
        move |who, id| {
            if id == npc_id {
                info!("Player {} opened the shop", who);
            }
        },
    );

    // Simulated client clicks
    let builder = facade.builder();
    for action in [UseEntityAction::Attack, UseEntityAction::Interact { hand: Hand::Main }] {
        player.fire_inbound(builder.encode_use_entity(&UseEntity {
            target: npc_id,
            action,
            sneaking: false,
        }));
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut wave = 1u32;

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutdown signal received");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                wave += 1;
                facade.broadcast(&label.rename_packets(format!("Wave {}", wave))?, &connections.online());
                facade.broadcast(&npc.rotate_head_packets(wave as f32 * 45.0), &connections.online());
            }
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    // Cleanup
    facade.broadcast(&facade.destroy_packets_for(&[&label, &npc]), &connections.online());
    facade.release_connection(&player);
    player.close();
    connections.cleanup_closed();
    info!("{}", metrics.to_json());
    info!("Entity bridge stopped");

    Ok(())
}
