//! Versioned field-layout tables
//!
//! Everything that differs between host revisions lives in one
//! [`ProtocolLayout`] value per revision. Builders and decoders are shared
//! code driven by these tables; supporting a new revision means adding a
//! table, not new encoding logic.

/// Order of the two rotation bytes in a spawn packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOrder {
    YawPitch,
    PitchYaw,
}

/// Field layout of one spawn packet flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnLayout {
    pub packet_id: i32,
    pub rotation: RotationOrder,
    /// Head angle byte after the rotation pair
    pub head_angle: bool,
    /// 32-bit object data integer before the velocity
    pub object_data: bool,
}

/// How the revision removes entities from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyMode {
    /// varint count followed by that many varint ids
    Batch { packet_id: i32 },
    /// exactly one varint id per packet
    Single { packet_id: i32 },
}

/// Wire format of a chat text component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// JSON string (`{"text":"..."}`) with a varint length prefix
    Json,
    /// Nameless network NBT: a root string tag
    Nbt,
}

/// Entity type id plus whether the revision spawns it with the living packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    pub id: i32,
    pub living: bool,
}

/// Metadata serializer ids. `None` means the revision has no such serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerIds {
    pub byte: i32,
    pub var_int: i32,
    pub var_long: Option<i32>,
    pub float: i32,
    pub string: i32,
    pub text: i32,
    pub optional_text: i32,
    pub boolean: i32,
}

/// Metadata indices used by the virtual entity variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataIndices {
    pub entity_flags: u8,
    pub custom_name: u8,
    pub custom_name_visible: u8,
    pub no_gravity: u8,
    pub armor_stand_flags: u8,
}

/// Bit flags carried by the metadata indices above
pub mod flags {
    /// Entity flags: invisible
    pub const INVISIBLE: u8 = 0x20;
    /// Armor stand flags: small
    pub const ARMOR_STAND_SMALL: u8 = 0x01;
    /// Armor stand flags: marker (no hitbox)
    pub const ARMOR_STAND_MARKER: u8 = 0x10;
}

/// Serverbound use-entity layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseEntityLayout {
    pub packet_id: i32,
    /// Trailing sneaking flag after the action fields
    pub sneaking: bool,
}

/// Particle names for the cosmetic lookups above the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ParticleNames {
    pub spawn: &'static str,
    pub monster: &'static str,
    pub villager: &'static str,
    pub border: &'static str,
}

/// Complete table for one supported host revision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolLayout {
    /// Revision tag, e.g. `v1_21_R3`
    pub revision: &'static str,
    /// Game versions this table was built for
    pub game_versions: &'static [&'static str],
    pub spawn_living: SpawnLayout,
    pub spawn_object: SpawnLayout,
    pub destroy: DestroyMode,
    pub head_rotation_id: i32,
    pub metadata_id: i32,
    pub use_entity: UseEntityLayout,
    pub text_format: TextFormat,
    pub serializers: SerializerIds,
    pub indices: MetadataIndices,
    pub armor_stand: EntityType,
    pub villager: EntityType,
    pub particles: ParticleNames,
}

impl ProtocolLayout {
    /// Spawn layout for an entity type
    pub fn spawn_layout(&self, entity_type: EntityType) -> &SpawnLayout {
        if entity_type.living {
            &self.spawn_living
        } else {
            &self.spawn_object
        }
    }

    /// True when a single packet can remove many entities
    pub fn supports_batch_destroy(&self) -> bool {
        matches!(self.destroy, DestroyMode::Batch { .. })
    }
}
