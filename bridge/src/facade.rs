//! Version facade: the one entry point game logic talks to
//!
//! Resolved once at startup from the host's version string. Everything it
//! hands out (entities, interceptors, packet groups) is built for that one
//! revision, so call sites never branch on version.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::entity::identity::EntityIdentity;
use crate::entity::virtual_entity::{HumanoidEntity, TextLabelEntity, VirtualEntity};
use crate::metrics::Metrics;
use crate::net::connection::{ConnectionHandle, PlayerId};
use crate::net::injector::{InterceptorHandle, PipelineInjector};
use crate::net::interceptor::{CallbackListener, InboundInterceptor, PacketListener};
use crate::net::packet::{PacketGroup, PacketSink};
use crate::protocol::layout::ParticleNames;
use crate::protocol::{PacketBuilder, ProtocolVersion};

/// Startup failures resolving the host version
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Host version '{0}' is not supported (supported: {supported})", supported = supported_revisions())]
    Unsupported(String),
    #[error("Cannot read a Minecraft version from '{0}'")]
    Unrecognized(String),
}

fn supported_revisions() -> String {
    ProtocolVersion::ALL
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cosmetic particle effects used around virtual entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Particle {
    Spawn,
    Monster,
    Villager,
    Border,
}

/// Resolve a host version string to a supported revision.
///
/// Accepts `1.21.4-R0.1-SNAPSHOT`, banners containing `(MC: 1.21.4)`, bare
/// `1.21.4`, and revision tags like `v1_21_R3`.
pub fn detect_version(reported: &str) -> Result<ProtocolVersion, VersionError> {
    let reported = reported.trim();

    if let Some(start) = reported.find("(MC: ") {
        let rest = &reported[start + "(MC: ".len()..];
        let game = rest.split(')').next().unwrap_or_default().trim();
        return lookup_game_version(reported, game);
    }

    if (reported.starts_with('v') || reported.starts_with('V')) && reported.contains("_R") {
        return ProtocolVersion::from_revision(reported)
            .ok_or_else(|| VersionError::Unsupported(reported.to_string()));
    }

    let game = reported.split('-').next().unwrap_or_default();
    lookup_game_version(reported, game)
}

fn lookup_game_version(reported: &str, game: &str) -> Result<ProtocolVersion, VersionError> {
    let well_formed = game.split('.').count() >= 2
        && game
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(VersionError::Unrecognized(reported.to_string()));
    }

    debug!("Host reports Minecraft {}", game);
    ProtocolVersion::from_game_version(game).ok_or_else(|| VersionError::Unsupported(game.to_string()))
}

/// Version-dispatching entry point for virtual entities and interception
pub struct VersionFacade {
    version: ProtocolVersion,
    builder: PacketBuilder,
    injector: PipelineInjector,
    metrics: Arc<Metrics>,
}

impl VersionFacade {
    pub fn new(version: ProtocolVersion, metrics: Arc<Metrics>) -> Self {
        Self::with_config(version, &BridgeConfig::default(), metrics)
    }

    pub fn with_config(version: ProtocolVersion, config: &BridgeConfig, metrics: Arc<Metrics>) -> Self {
        info!("Entity bridge ready for {}", version);
        Self {
            version,
            builder: PacketBuilder::new(version.layout()),
            injector: PipelineInjector::new(&config.interceptor_name, &config.pipeline_anchor, metrics.clone()),
            metrics,
        }
    }

    /// Detect the revision from the host's version string, failing fast when
    /// it is not one this crate was built for
    pub fn from_host_version(
        reported: &str,
        config: &BridgeConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, VersionError> {
        let version = detect_version(reported)?;
        Ok(Self::with_config(version, config, metrics))
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn builder(&self) -> PacketBuilder {
        self.builder
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn injector(&self) -> &PipelineInjector {
        &self.injector
    }

    pub fn new_text_label_entity(&self, text: impl Into<String>) -> TextLabelEntity {
        TextLabelEntity::new(self.builder, self.metrics.clone(), text)
    }

    pub fn new_humanoid_entity(&self) -> HumanoidEntity {
        HumanoidEntity::new(self.builder, self.metrics.clone())
    }

    /// Start reporting the player's entity clicks to `listener`.
    ///
    /// Takes effect asynchronously on the connection's event loop.
    pub fn inject_interceptor(
        &self,
        connection: &ConnectionHandle,
        listener: Arc<dyn PacketListener>,
    ) -> Option<InterceptorHandle> {
        let interceptor = InboundInterceptor::new(
            connection.player_id(),
            self.builder,
            listener,
            self.metrics.clone(),
        );
        self.injector.inject(connection, Box::new(interceptor))
    }

    /// [`inject_interceptor`](Self::inject_interceptor) with plain closures
    pub fn inject_callbacks<A, I>(
        &self,
        connection: &ConnectionHandle,
        on_attack: A,
        on_interact_main: I,
    ) -> Option<InterceptorHandle>
    where
        A: Fn(PlayerId, i32) + Send + Sync + 'static,
        I: Fn(PlayerId, i32) + Send + Sync + 'static,
    {
        let listener = Arc::new(CallbackListener::new(on_attack, on_interact_main));
        self.inject_interceptor(connection, listener)
    }

    pub fn uninject_interceptor(&self, connection: &ConnectionHandle) -> bool {
        self.injector.uninject(connection)
    }

    /// Forget everything kept for a player who is leaving
    pub fn release_connection(&self, connection: &ConnectionHandle) {
        self.injector.detach(connection);
    }

    /// Destroy several entities in as few packets as the revision allows
    pub fn destroy_packets_for(&self, entities: &[&dyn VirtualEntity]) -> PacketGroup {
        let identities: Vec<EntityIdentity> = entities.iter().map(|e| *e.identity()).collect();
        let group = self.builder.build_destroy_batch(&identities);
        Metrics::add(&self.metrics.packets_built, group.len());
        group
    }

    /// Send a group to one player, counting what was delivered
    pub fn send(&self, group: &PacketGroup, connection: &ConnectionHandle) {
        if connection.is_open() {
            group.send_to(connection);
            Metrics::add(&self.metrics.packets_sent, group.len());
        } else {
            Metrics::add(&self.metrics.sends_dropped, group.len());
        }
    }

    /// Send a group to every connection in `connections`
    pub fn broadcast<'a, I>(&self, group: &PacketGroup, connections: I)
    where
        I: IntoIterator<Item = &'a ConnectionHandle>,
    {
        for connection in connections {
            self.send(group, connection);
        }
    }

    pub fn particles(&self) -> &'static ParticleNames {
        &self.version.layout().particles
    }

    /// Host particle name for an effect
    pub fn particle(&self, particle: Particle) -> &'static str {
        let names = self.particles();
        match particle {
            Particle::Spawn => names.spawn,
            Particle::Monster => names.monster,
            Particle::Villager => names.villager,
            Particle::Border => names.border,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::pose::Pose;
    use crate::net::connection::{host_pipeline, open};
    use crate::net::packet::PacketKind;
    use crate::net::pipeline::HOST_PACKET_HANDLER;
    use crate::protocol::{UseEntity, UseEntityAction};
    use parking_lot::Mutex;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    #[test]
    fn test_detect_bukkit_version() {
        assert_eq!(detect_version("1.21.4-R0.1-SNAPSHOT"), Ok(ProtocolVersion::V1_21R3));
        assert_eq!(detect_version("1.16.5-R0.1-SNAPSHOT"), Ok(ProtocolVersion::V1_16R3));
        assert_eq!(detect_version("1.17"), Ok(ProtocolVersion::V1_17R1));
    }

    #[test]
    fn test_detect_server_banner() {
        assert_eq!(
            detect_version("git-Paper-496 (MC: 1.20.4)"),
            Ok(ProtocolVersion::V1_20R3)
        );
    }

    #[test]
    fn test_detect_revision_tag() {
        assert_eq!(detect_version("v1_21_R2"), Ok(ProtocolVersion::V1_21R2));
        assert_eq!(
            detect_version("v1_8_R3"),
            Err(VersionError::Unsupported("v1_8_R3".to_string()))
        );
    }

    #[test]
    fn test_unknown_version_fails_fast() {
        assert_eq!(
            detect_version("1.12.2-R0.1-SNAPSHOT"),
            Err(VersionError::Unsupported("1.12.2".to_string()))
        );
        assert!(matches!(detect_version("banana"), Err(VersionError::Unrecognized(_))));
        assert!(matches!(detect_version(""), Err(VersionError::Unrecognized(_))));

        let result = VersionFacade::from_host_version(
            "1.19.2-R0.1-SNAPSHOT",
            &BridgeConfig::default(),
            Arc::new(Metrics::new()),
        );
        let message = result.err().unwrap().to_string();
        assert!(message.contains("1.19.2"));
        assert!(message.contains("v1_21_R3"));
    }

    #[test]
    fn test_particle_names() {
        let facade = VersionFacade::new(ProtocolVersion::V1_20R3, Arc::new(Metrics::new()));
        assert_eq!(facade.particle(Particle::Spawn), "FLAME");
        assert_eq!(facade.particle(Particle::Monster), "SOUL_FIRE_FLAME");
        assert_eq!(facade.particle(Particle::Villager), "COMPOSTER");
        assert_eq!(facade.particle(Particle::Border), "REDSTONE");
    }

    #[test]
    fn test_batch_destroy_per_revision() {
        let modern = VersionFacade::new(ProtocolVersion::V1_21R3, Arc::new(Metrics::new()));
        let a = modern.new_text_label_entity("a");
        let b = modern.new_humanoid_entity();
        let group = modern.destroy_packets_for(&[&a, &b]);
        assert_eq!(group.len(), 1);
        assert_eq!(group.packets()[0].kind(), PacketKind::Destroy);

        let legacy = VersionFacade::new(ProtocolVersion::V1_17R1, Arc::new(Metrics::new()));
        let a = legacy.new_text_label_entity("a");
        let b = legacy.new_humanoid_entity();
        assert_eq!(legacy.destroy_packets_for(&[&a, &b]).len(), 2);
        assert!(legacy.destroy_packets_for(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_send_counts_delivered_and_dropped() {
        let facade = VersionFacade::new(ProtocolVersion::V1_21R3, Arc::new(Metrics::new()));
        let (pipeline, _host_rx) = host_pipeline();
        let mut parts = open(Uuid::new_v4(), pipeline);
        let (closed_pipeline, _) = host_pipeline();
        let closed = open(Uuid::new_v4(), closed_pipeline).handle;
        closed.close();

        let label = facade.new_text_label_entity("hello");
        let group = label.spawn_packets_for(&Pose::new(0.0, 80.0, 0.0)).unwrap();
        facade.broadcast(&group, [&parts.handle, &closed]);

        assert_eq!(parts.outbound.recv().await.unwrap().kind(), PacketKind::Spawn);
        assert_eq!(parts.outbound.recv().await.unwrap().kind(), PacketKind::Metadata);
        assert_eq!(facade.metrics().packets_sent.load(Ordering::Relaxed), 2);
        assert_eq!(facade.metrics().sends_dropped.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_interceptor_end_to_end() {
        let facade = VersionFacade::new(ProtocolVersion::V1_21R3, Arc::new(Metrics::new()));
        let (pipeline, mut host_rx) = host_pipeline();
        let parts = open(Uuid::new_v4(), pipeline);
        let conn = parts.handle.clone();
        parts.event_loop.spawn();

        let npc = facade.new_humanoid_entity();
        let attacks = Arc::new(Mutex::new(Vec::new()));
        let sink = attacks.clone();
        facade.inject_callbacks(&conn, move |player, id| sink.lock().push((player, id)), |_, _| {});

        let frame = facade.builder().encode_use_entity(&UseEntity {
            target: npc.entity_id(),
            action: UseEntityAction::Attack,
            sneaking: false,
        });
        conn.fire_inbound(frame.clone());

        // The host still sees the click
        assert_eq!(host_rx.recv().await.unwrap(), frame);
        assert_eq!(*attacks.lock(), vec![(conn.player_id(), npc.entity_id())]);

        facade.uninject_interceptor(&conn);
        let names = conn
            .with_pipeline(|p| p.names().into_iter().map(String::from).collect::<Vec<_>>())
            .await
            .unwrap();
        assert_eq!(names, vec![HOST_PACKET_HANDLER.to_string()]);
    }

    #[tokio::test]
    async fn test_panicking_callback_keeps_host_pipeline() {
        let facade = VersionFacade::new(ProtocolVersion::V1_21R3, Arc::new(Metrics::new()));
        let (pipeline, mut host_rx) = host_pipeline();
        let parts = open(Uuid::new_v4(), pipeline);
        let conn = parts.handle.clone();
        let event_loop = parts.event_loop.spawn();

        facade.inject_callbacks(&conn, |_, _| panic!("shop closed"), |_, _| {});

        let click = facade.builder().encode_use_entity(&UseEntity {
            target: 1_000_000_001,
            action: UseEntityAction::Attack,
            sneaking: false,
        });
        let chat = crate::net::pipeline::Frame::new(0x07, bytes::Bytes::from_static(b"hi"));
        conn.fire_inbound(click.clone());
        conn.fire_inbound(chat.clone());

        assert_eq!(host_rx.recv().await.unwrap(), click);
        assert_eq!(host_rx.recv().await.unwrap(), chat);
        assert!(!event_loop.is_finished());
        assert_eq!(facade.metrics().listener_failures.load(Ordering::Relaxed), 1);
    }
}
