//! Minecraft 1.17 (protocol 755)
//!
//! The only revision whose destroy packet carries a single entity id.

use crate::protocol::layout::*;

pub const LAYOUT: ProtocolLayout = ProtocolLayout {
    revision: "v1_17_R1",
    game_versions: &["1.17"],
    spawn_living: SpawnLayout {
        packet_id: 0x02,
        rotation: RotationOrder::YawPitch,
        head_angle: true,
        object_data: false,
    },
    spawn_object: SpawnLayout {
        packet_id: 0x00,
        rotation: RotationOrder::PitchYaw,
        head_angle: false,
        object_data: true,
    },
    destroy: DestroyMode::Single { packet_id: 0x3A },
    head_rotation_id: 0x3E,
    metadata_id: 0x4D,
    use_entity: UseEntityLayout {
        packet_id: 0x0D,
        sneaking: true,
    },
    text_format: TextFormat::Json,
    serializers: SerializerIds {
        byte: 0,
        var_int: 1,
        var_long: None,
        float: 2,
        string: 3,
        text: 4,
        optional_text: 5,
        boolean: 7,
    },
    indices: MetadataIndices {
        entity_flags: 0,
        custom_name: 2,
        custom_name_visible: 3,
        no_gravity: 5,
        armor_stand_flags: 15,
    },
    armor_stand: EntityType { id: 1, living: true },
    villager: EntityType { id: 98, living: true },
    particles: ParticleNames {
        spawn: "FLAME",
        monster: "SOUL_FIRE_FLAME",
        villager: "COMPOSTER",
        border: "REDSTONE",
    },
};
