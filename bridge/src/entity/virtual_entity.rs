//! Client-only entities: floating text labels and look-alike NPCs
//!
//! A virtual entity holds no connection. It is an identity plus whatever it
//! needs to describe itself, and every operation returns a fresh
//! [`PacketGroup`] for the caller to send or broadcast.

use std::sync::Arc;

use tracing::error;

use crate::entity::identity::EntityIdentity;
use crate::entity::metadata::{custom_name_entries, text_label_entries, MetadataEntry};
use crate::entity::pose::Pose;
use crate::metrics::Metrics;
use crate::net::packet::{Packet, PacketGroup};
use crate::protocol::layout::EntityType;
use crate::protocol::{PacketBuilder, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    TextLabel,
    Humanoid,
}

/// A client-side entity with no simulated counterpart on the host
pub trait VirtualEntity: Send + Sync {
    fn identity(&self) -> &EntityIdentity;

    fn kind(&self) -> EntityKind;

    /// Numeric id clients will report back in use-entity packets
    fn entity_id(&self) -> i32 {
        self.identity().numeric_id()
    }

    /// Packets that make the entity appear at `pose`.
    ///
    /// On error nothing usable is returned and nothing should be sent.
    fn spawn_packets_for(&self, pose: &Pose) -> Result<PacketGroup, ProtocolError>;

    fn destroy_packets_for(&self) -> PacketGroup;

    /// Relocate the entity. There is no teleport in the packet set, so this
    /// despawns and spawns again at the new pose.
    fn move_or_rotate_packets_for(&self, pose: &Pose) -> Result<PacketGroup, ProtocolError> {
        let spawn = self.spawn_packets_for(pose)?;
        Ok(self.destroy_packets_for().then(spawn))
    }
}

/// Machinery shared by every variant: identity, type and the revision's builder
struct EntityCore {
    identity: EntityIdentity,
    entity_type: EntityType,
    builder: PacketBuilder,
    metrics: Arc<Metrics>,
}

impl EntityCore {
    fn new(entity_type: EntityType, builder: PacketBuilder, metrics: Arc<Metrics>) -> Self {
        Metrics::incr(&metrics.entities_allocated);
        Self {
            identity: EntityIdentity::allocate(),
            entity_type,
            builder,
            metrics,
        }
    }

    fn spawn(&self, pose: &Pose) -> Packet {
        Metrics::incr(&self.metrics.packets_built);
        self.builder.build_spawn(&self.identity, self.entity_type, pose)
    }

    fn metadata(&self, entries: &[MetadataEntry]) -> Result<Packet, ProtocolError> {
        match self.builder.build_metadata_update(&self.identity, entries) {
            Ok(packet) => {
                Metrics::incr(&self.metrics.packets_built);
                Ok(packet)
            }
            Err(e) => {
                Metrics::incr(&self.metrics.build_failures);
                error!(
                    entity_id = self.identity.numeric_id(),
                    revision = self.builder.layout().revision,
                    "Metadata build failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn head_rotation(&self, yaw: f32) -> Packet {
        Metrics::incr(&self.metrics.packets_built);
        self.builder.build_head_rotation(&self.identity, yaw)
    }

    fn destroy(&self) -> PacketGroup {
        Metrics::incr(&self.metrics.packets_built);
        PacketGroup::single(self.builder.build_destroy(&self.identity))
    }
}

/// Floating text: an invisible marker armor stand showing its custom name
pub struct TextLabelEntity {
    core: EntityCore,
    text: String,
}

impl TextLabelEntity {
    pub fn new(builder: PacketBuilder, metrics: Arc<Metrics>, text: impl Into<String>) -> Self {
        let entity_type = builder.layout().armor_stand;
        Self {
            core: EntityCore::new(entity_type, builder, metrics),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Change the label and return the metadata update showing the new text
    pub fn rename_packets(&mut self, text: impl Into<String>) -> Result<PacketGroup, ProtocolError> {
        let text = text.into();
        let layout = self.core.builder.layout();
        let packet = self.core.metadata(&custom_name_entries(layout, Some(&text)))?;
        self.text = text;
        Ok(PacketGroup::single(packet))
    }
}

impl VirtualEntity for TextLabelEntity {
    fn identity(&self) -> &EntityIdentity {
        &self.core.identity
    }

    fn kind(&self) -> EntityKind {
        EntityKind::TextLabel
    }

    fn spawn_packets_for(&self, pose: &Pose) -> Result<PacketGroup, ProtocolError> {
        let entries = text_label_entries(self.core.builder.layout(), &self.text);
        let metadata = self.core.metadata(&entries)?;
        Ok(PacketGroup::of([self.core.spawn(pose), metadata]))
    }

    fn destroy_packets_for(&self) -> PacketGroup {
        self.core.destroy()
    }
}

/// Villager stand-in for an NPC. Clients only see the model, it never acts.
pub struct HumanoidEntity {
    core: EntityCore,
}

impl HumanoidEntity {
    pub fn new(builder: PacketBuilder, metrics: Arc<Metrics>) -> Self {
        let entity_type = builder.layout().villager;
        Self {
            core: EntityCore::new(entity_type, builder, metrics),
        }
    }

    /// Turn the head without respawning
    pub fn rotate_head_packets(&self, yaw: f32) -> PacketGroup {
        PacketGroup::single(self.core.head_rotation(yaw))
    }
}

impl VirtualEntity for HumanoidEntity {
    fn identity(&self) -> &EntityIdentity {
        &self.core.identity
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Humanoid
    }

    fn spawn_packets_for(&self, pose: &Pose) -> Result<PacketGroup, ProtocolError> {
        // Mobs spawn looking along the body; head pitch follows the pose pitch
        // and a head rotation packet sets where the head faces.
        let spawn_pose = pose.with_head_pitch(pose.pitch);
        Ok(PacketGroup::of([
            self.core.spawn(&spawn_pose),
            self.core.head_rotation(pose.yaw),
        ]))
    }

    fn destroy_packets_for(&self) -> PacketGroup {
        self.core.destroy()
    }
}
