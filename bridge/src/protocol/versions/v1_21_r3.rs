//! Minecraft 1.21.4 (protocol 769)

use crate::protocol::layout::*;

// Living and object entities share one spawn packet from 1.19 on.
const SPAWN: SpawnLayout = SpawnLayout {
    packet_id: 0x01,
    rotation: RotationOrder::PitchYaw,
    head_angle: true,
    object_data: true,
};

pub const LAYOUT: ProtocolLayout = ProtocolLayout {
    revision: "v1_21_R3",
    game_versions: &["1.21.4"],
    spawn_living: SPAWN,
    spawn_object: SPAWN,
    destroy: DestroyMode::Batch { packet_id: 0x47 },
    head_rotation_id: 0x4D,
    metadata_id: 0x5D,
    use_entity: UseEntityLayout {
        packet_id: 0x18,
        sneaking: true,
    },
    text_format: TextFormat::Nbt,
    serializers: SerializerIds {
        byte: 0,
        var_int: 1,
        var_long: Some(2),
        float: 3,
        string: 4,
        text: 5,
        optional_text: 6,
        boolean: 8,
    },
    indices: MetadataIndices {
        entity_flags: 0,
        custom_name: 2,
        custom_name_visible: 3,
        no_gravity: 5,
        armor_stand_flags: 15,
    },
    armor_stand: EntityType { id: 5, living: false },
    villager: EntityType { id: 135, living: false },
    particles: ParticleNames {
        spawn: "FLAME",
        monster: "SOUL_FIRE_FLAME",
        villager: "COMPOSTER",
        border: "REDSTONE",
    },
};
