//! Minecraft 1.16.4 - 1.16.5 (protocol 754)

use crate::protocol::layout::*;

pub const LAYOUT: ProtocolLayout = ProtocolLayout {
    revision: "v1_16_R3",
    game_versions: &["1.16.4", "1.16.5"],
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
    destroy: DestroyMode::Batch { packet_id: 0x36 },
    head_rotation_id: 0x3A,
    metadata_id: 0x44,
    use_entity: UseEntityLayout {
        packet_id: 0x0E,
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
        armor_stand_flags: 14,
    },
    armor_stand: EntityType { id: 1, living: true },
    villager: EntityType { id: 93, living: true },
    particles: ParticleNames {
        spawn: "FLAME",
        monster: "SOUL_FIRE_FLAME",
        villager: "COMPOSTER",
        border: "REDSTONE",
    },
};
