//! Packet builders and decoders driven by a revision's layout table
//!
//! Builders are pure: identity + pose + type in, immutable [`Packet`] out.
//! Each call owns a fresh [`PacketWriter`], so builds may run concurrently.
//! Decoders read the same field order back; the inbound interceptor uses
//! `decode_use_entity`, and `decode_spawn` exists for diagnostics and tests.

use crate::entity::identity::EntityIdentity;
use crate::entity::metadata::MetadataEntry;
use crate::entity::pose::Pose;
use crate::net::codec::{PacketReader, PacketWriter};
use crate::net::packet::{Packet, PacketGroup, PacketKind};
use crate::net::pipeline::Frame;
use crate::protocol::layout::{DestroyMode, EntityType, ProtocolLayout, RotationOrder, SpawnLayout};
use crate::protocol::ProtocolError;
use uuid::Uuid;

const ACTION_INTERACT: i32 = 0;
const ACTION_ATTACK: i32 = 1;
const ACTION_INTERACT_AT: i32 = 2;

const HAND_MAIN: i32 = 0;
const HAND_OFF: i32 = 1;

/// Hand used for an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Main,
    Off,
}

impl Hand {
    fn from_wire(value: i32) -> Result<Self, ProtocolError> {
        match value {
            HAND_MAIN => Ok(Hand::Main),
            HAND_OFF => Ok(Hand::Off),
            other => Err(ProtocolError::UnknownHand(other)),
        }
    }

    fn to_wire(self) -> i32 {
        match self {
            Hand::Main => HAND_MAIN,
            Hand::Off => HAND_OFF,
        }
    }
}

/// Action carried by a use-entity packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UseEntityAction {
    Attack,
    Interact { hand: Hand },
    InteractAt { target: [f32; 3], hand: Hand },
}

/// Decoded serverbound use-entity packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UseEntity {
    pub target: i32,
    pub action: UseEntityAction,
    pub sneaking: bool,
}

/// Fields of a decoded spawn packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnFields {
    pub identity: EntityIdentity,
    pub entity_type_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub head_pitch: Option<f32>,
    pub object_data: Option<i32>,
    pub velocity: [i16; 3],
}

/// Builds and decodes packets for one revision
#[derive(Debug, Clone, Copy)]
pub struct PacketBuilder {
    layout: &'static ProtocolLayout,
}

impl PacketBuilder {
    pub fn new(layout: &'static ProtocolLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &'static ProtocolLayout {
        self.layout
    }

    /// Spawn packet with zero object data
    pub fn build_spawn(&self, identity: &EntityIdentity, entity_type: EntityType, pose: &Pose) -> Packet {
        self.build_spawn_with_data(identity, entity_type, pose, 0)
    }

    pub fn build_spawn_with_data(
        &self,
        identity: &EntityIdentity,
        entity_type: EntityType,
        pose: &Pose,
        object_data: i32,
    ) -> Packet {
        let spawn = self.layout.spawn_layout(entity_type);
        let mut writer = PacketWriter::with_capacity(64);

        // Entity info
        writer
            .write_var_int(identity.numeric_id())
            .write_uuid(identity.uuid().as_u128())
            .write_var_int(entity_type.id);

        // Position
        writer
            .write_double(pose.x)
            .write_double(pose.y)
            .write_double(pose.z);

        // Rotation
        match spawn.rotation {
            RotationOrder::YawPitch => writer.write_angle_byte(pose.yaw).write_angle_byte(pose.pitch),
            RotationOrder::PitchYaw => writer.write_angle_byte(pose.pitch).write_angle_byte(pose.yaw),
        };
        if spawn.head_angle {
            writer.write_angle_byte(pose.head_pitch);
        }
        if spawn.object_data {
            writer.write_int(object_data);
        }

        // Velocity: virtual entities never move server-side
        writer.write_short(0).write_short(0).write_short(0);

        Packet::new(PacketKind::Spawn, spawn.packet_id, writer.finish())
    }

    /// Destroy packet for one entity, in whichever form the revision uses
    pub fn build_destroy(&self, identity: &EntityIdentity) -> Packet {
        let mut writer = PacketWriter::with_capacity(8);
        let packet_id = match self.layout.destroy {
            DestroyMode::Batch { packet_id } => {
                writer.write_var_int(1);
                packet_id
            }
            DestroyMode::Single { packet_id } => packet_id,
        };
        writer.write_var_int(identity.numeric_id());
        Packet::new(PacketKind::Destroy, packet_id, writer.finish())
    }

    /// Destroy many entities: one packet when batching is supported, else one per entity
    pub fn build_destroy_batch(&self, identities: &[EntityIdentity]) -> PacketGroup {
        match self.layout.destroy {
            DestroyMode::Batch { packet_id } => {
                if identities.is_empty() {
                    return PacketGroup::empty();
                }
                let mut writer = PacketWriter::with_capacity(5 * (identities.len() + 1));
                writer.write_var_int(identities.len() as i32);
                for identity in identities {
                    writer.write_var_int(identity.numeric_id());
                }
                PacketGroup::single(Packet::new(PacketKind::Destroy, packet_id, writer.finish()))
            }
            DestroyMode::Single { .. } => {
                PacketGroup::of(identities.iter().map(|identity| self.build_destroy(identity)))
            }
        }
    }

    pub fn build_head_rotation(&self, identity: &EntityIdentity, yaw: f32) -> Packet {
        let mut writer = PacketWriter::with_capacity(6);
        writer
            .write_var_int(identity.numeric_id())
            .write_angle_byte(yaw);
        Packet::new(PacketKind::HeadRotation, self.layout.head_rotation_id, writer.finish())
    }

    /// Metadata update: entity id, entries, terminator.
    ///
    /// Fails without producing a packet if an entry has no serializer in this revision.
    pub fn build_metadata_update(
        &self,
        identity: &EntityIdentity,
        entries: &[MetadataEntry],
    ) -> Result<Packet, ProtocolError> {
        let mut writer = PacketWriter::with_capacity(32);
        writer.write_var_int(identity.numeric_id());
        for entry in entries {
            entry.write(&mut writer, self.layout)?;
        }
        writer.write_metadata_end();
        Ok(Packet::new(PacketKind::Metadata, self.layout.metadata_id, writer.finish()))
    }

    /// Decode a spawn packet built for this revision
    pub fn decode_spawn(&self, packet: &Packet) -> Result<SpawnFields, ProtocolError> {
        let spawn = self.spawn_layout_for_id(packet.id())?;
        let mut reader = PacketReader::new(packet.body());

        let numeric_id = reader.read_var_int()?;
        let uuid = Uuid::from_u128(reader.read_uuid()?);
        let entity_type_id = reader.read_var_int()?;
        let x = reader.read_double()?;
        let y = reader.read_double()?;
        let z = reader.read_double()?;
        let (yaw, pitch) = match spawn.rotation {
            RotationOrder::YawPitch => {
                let yaw = reader.read_angle()?;
                (yaw, reader.read_angle()?)
            }
            RotationOrder::PitchYaw => {
                let pitch = reader.read_angle()?;
                (reader.read_angle()?, pitch)
            }
        };
        let head_pitch = if spawn.head_angle {
            Some(reader.read_angle()?)
        } else {
            None
        };
        let object_data = if spawn.object_data {
            Some(reader.read_int()?)
        } else {
            None
        };
        let velocity = [reader.read_short()?, reader.read_short()?, reader.read_short()?];
        reader.finish()?;

        Ok(SpawnFields {
            identity: EntityIdentity::from_parts(numeric_id, uuid),
            entity_type_id,
            x,
            y,
            z,
            yaw,
            pitch,
            head_pitch,
            object_data,
            velocity,
        })
    }

    fn spawn_layout_for_id(&self, packet_id: i32) -> Result<&'static SpawnLayout, ProtocolError> {
        let layout = self.layout;
        if packet_id == layout.spawn_living.packet_id {
            Ok(&layout.spawn_living)
        } else if packet_id == layout.spawn_object.packet_id {
            Ok(&layout.spawn_object)
        } else {
            Err(ProtocolError::UnexpectedPacket {
                expected: layout.spawn_object.packet_id,
                found: packet_id,
            })
        }
    }

    /// True if the frame is this revision's use-entity packet
    pub fn is_use_entity(&self, frame: &Frame) -> bool {
        frame.packet_id == self.layout.use_entity.packet_id
    }

    /// Decode a serverbound use-entity frame
    pub fn decode_use_entity(&self, frame: &Frame) -> Result<UseEntity, ProtocolError> {
        let expected = self.layout.use_entity.packet_id;
        if frame.packet_id != expected {
            return Err(ProtocolError::UnexpectedPacket {
                expected,
                found: frame.packet_id,
            });
        }

        let mut reader = PacketReader::new(&frame.body);
        let target = reader.read_var_int()?;
        let action = match reader.read_var_int()? {
            ACTION_ATTACK => UseEntityAction::Attack,
            ACTION_INTERACT => UseEntityAction::Interact {
                hand: Hand::from_wire(reader.read_var_int()?)?,
            },
            ACTION_INTERACT_AT => {
                let target = [reader.read_float()?, reader.read_float()?, reader.read_float()?];
                UseEntityAction::InteractAt {
                    target,
                    hand: Hand::from_wire(reader.read_var_int()?)?,
                }
            }
            other => return Err(ProtocolError::UnknownAction(other)),
        };
        let sneaking = if self.layout.use_entity.sneaking {
            reader.read_bool()?
        } else {
            false
        };

        Ok(UseEntity {
            target,
            action,
            sneaking,
        })
    }

    /// Encode a use-entity frame the way a client would send it
    pub fn encode_use_entity(&self, use_entity: &UseEntity) -> Frame {
        let mut writer = PacketWriter::with_capacity(24);
        writer.write_var_int(use_entity.target);
        match use_entity.action {
            UseEntityAction::Attack => {
                writer.write_var_int(ACTION_ATTACK);
            }
            UseEntityAction::Interact { hand } => {
                writer.write_var_int(ACTION_INTERACT).write_var_int(hand.to_wire());
            }
            UseEntityAction::InteractAt { target, hand } => {
                writer
                    .write_var_int(ACTION_INTERACT_AT)
                    .write_float(target[0])
                    .write_float(target[1])
                    .write_float(target[2])
                    .write_var_int(hand.to_wire());
            }
        }
        if self.layout.use_entity.sneaking {
            writer.write_bool(use_entity.sneaking);
        }
        Frame::new(self.layout.use_entity.packet_id, writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::entity::metadata::MetadataValue;
    use crate::net::codec::angle_to_byte;
    use crate::protocol::versions::ProtocolVersion;

    fn builder(version: ProtocolVersion) -> PacketBuilder {
        PacketBuilder::new(version.layout())
    }

    #[test]
    fn test_spawn_example_yaw_90() {
        let builder = builder(ProtocolVersion::V1_21R3);
        let identity = EntityIdentity::allocate();
        let pose = Pose::new(0.0, 64.0, 0.0).with_rotation(90.0, 0.0);

        let packet = builder.build_spawn(&identity, builder.layout().villager, &pose);

        // id varint + uuid + type varint + 3 doubles
        let rotation_offset = crate::net::codec::var_int_len(identity.numeric_id())
            + 16
            + crate::net::codec::var_int_len(builder.layout().villager.id)
            + 24;
        let body = packet.body();
        // 1.21 writes pitch then yaw
        assert_eq!(body[rotation_offset], 0);
        assert_eq!(body[rotation_offset + 1], 64);

        let fields = builder.decode_spawn(&packet).unwrap();
        assert_eq!(angle_to_byte(fields.yaw), 64);
        assert_eq!(angle_to_byte(fields.pitch), 0);
    }

    #[test]
    fn test_spawn_round_trip_every_revision() {
        for version in ProtocolVersion::ALL {
            let builder = builder(version);
            let layout = builder.layout();
            for entity_type in [layout.armor_stand, layout.villager] {
                let identity = EntityIdentity::allocate();
                let pose = Pose::new(-12.25, 70.5, 3.0e6)
                    .with_rotation(-135.0, 22.5)
                    .with_head_pitch(10.0);

                let packet = builder.build_spawn(&identity, entity_type, &pose);
                assert_eq!(packet.kind(), PacketKind::Spawn);

                let fields = builder.decode_spawn(&packet).unwrap();
                assert_eq!(fields.identity, identity, "{}", version);
                assert_eq!(fields.entity_type_id, entity_type.id);
                assert_eq!((fields.x, fields.y, fields.z), (pose.x, pose.y, pose.z));
                assert_eq!(angle_to_byte(fields.yaw), angle_to_byte(pose.yaw));
                assert_eq!(angle_to_byte(fields.pitch), angle_to_byte(pose.pitch));
                assert_eq!(fields.velocity, [0, 0, 0]);

                let spawn = layout.spawn_layout(entity_type);
                assert_eq!(fields.head_pitch.is_some(), spawn.head_angle);
                assert_eq!(fields.object_data, spawn.object_data.then_some(0));
            }
        }
    }

    #[test]
    fn test_legacy_living_spawn_writes_yaw_first() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let identity = EntityIdentity::from_parts(5, Uuid::nil());
        let pose = Pose::new(0.0, 0.0, 0.0).with_rotation(90.0, 180.0);

        let packet = builder.build_spawn(&identity, builder.layout().villager, &pose);
        assert_eq!(packet.id(), 0x02);

        // 1 (id) + 16 (uuid) + 1 (type 93) + 24 (position)
        let body = packet.body();
        assert_eq!(&body[42..45], &[64, 128, 0]);
        // velocity only, no object data
        assert_eq!(body.len(), 45 + 6);
    }

    #[test]
    fn test_object_spawn_carries_object_data() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let identity = EntityIdentity::from_parts(5, Uuid::nil());
        let object_type = EntityType { id: 2, living: false };

        let packet = builder.build_spawn_with_data(&identity, object_type, &Pose::default(), 77);
        assert_eq!(packet.id(), 0x00);
        assert_eq!(builder.decode_spawn(&packet).unwrap().object_data, Some(77));
    }

    #[test]
    fn test_destroy_batch_form() {
        let builder = builder(ProtocolVersion::V1_21R3);
        let identity = EntityIdentity::from_parts(300, Uuid::nil());

        let packet = builder.build_destroy(&identity);
        assert_eq!(packet.id(), 0x47);
        assert_eq!(packet.body().as_ref(), &[1, 0xAC, 0x02]);
    }

    #[test]
    fn test_destroy_single_form() {
        let builder = builder(ProtocolVersion::V1_17R1);
        let identity = EntityIdentity::from_parts(300, Uuid::nil());

        let packet = builder.build_destroy(&identity);
        assert_eq!(packet.id(), 0x3A);
        assert_eq!(packet.body().as_ref(), &[0xAC, 0x02]);
    }

    #[test]
    fn test_destroy_many_picks_cheapest_form() {
        let ids = [
            EntityIdentity::from_parts(1, Uuid::nil()),
            EntityIdentity::from_parts(2, Uuid::nil()),
            EntityIdentity::from_parts(3, Uuid::nil()),
        ];

        let batched = builder(ProtocolVersion::V1_20R3).build_destroy_batch(&ids);
        assert_eq!(batched.len(), 1);
        assert_eq!(batched.packets()[0].body().as_ref(), &[3, 1, 2, 3]);

        let single = builder(ProtocolVersion::V1_17R1).build_destroy_batch(&ids);
        assert_eq!(single.len(), 3);

        assert!(builder(ProtocolVersion::V1_20R3).build_destroy_batch(&[]).is_empty());
    }

    #[test]
    fn test_head_rotation() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let identity = EntityIdentity::from_parts(7, Uuid::nil());

        let packet = builder.build_head_rotation(&identity, 270.0);
        assert_eq!(packet.kind(), PacketKind::HeadRotation);
        assert_eq!(packet.id(), 0x3A);
        assert_eq!(packet.body().as_ref(), &[7, 192]);
    }

    #[test]
    fn test_metadata_update_terminated() {
        let builder = builder(ProtocolVersion::V1_21R3);
        let identity = EntityIdentity::from_parts(7, Uuid::nil());
        let entries = [
            MetadataEntry::new(0, MetadataValue::Byte(0x20)),
            MetadataEntry::new(3, MetadataValue::Boolean(true)),
        ];

        let packet = builder.build_metadata_update(&identity, &entries).unwrap();
        assert_eq!(packet.id(), 0x5D);
        assert_eq!(packet.body().as_ref(), &[7, 0, 0, 0x20, 3, 8, 1, 0xFF]);
    }

    #[test]
    fn test_metadata_update_mismatch_produces_nothing() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let identity = EntityIdentity::from_parts(7, Uuid::nil());
        let entries = [MetadataEntry::new(8, MetadataValue::VarLong(1))];

        let result = builder.build_metadata_update(&identity, &entries);
        assert!(matches!(result, Err(ProtocolError::Mismatch { .. })));
    }

    #[test]
    fn test_use_entity_round_trip() {
        let builder = builder(ProtocolVersion::V1_20R3);
        for action in [
            UseEntityAction::Attack,
            UseEntityAction::Interact { hand: Hand::Off },
            UseEntityAction::InteractAt {
                target: [0.5, 1.25, -0.5],
                hand: Hand::Main,
            },
        ] {
            let use_entity = UseEntity {
                target: 1_000_000_123,
                action,
                sneaking: true,
            };
            let frame = builder.encode_use_entity(&use_entity);
            assert!(builder.is_use_entity(&frame));
            assert_eq!(builder.decode_use_entity(&frame).unwrap(), use_entity);
        }
    }

    #[test]
    fn test_use_entity_rejects_unknown_action() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let mut writer = PacketWriter::new();
        writer.write_var_int(10).write_var_int(9);
        let frame = Frame::new(0x0E, writer.finish());

        assert_eq!(
            builder.decode_use_entity(&frame),
            Err(ProtocolError::UnknownAction(9))
        );
    }

    #[test]
    fn test_use_entity_truncated() {
        let builder = builder(ProtocolVersion::V1_16R3);
        let frame = Frame::new(0x0E, Bytes::from_static(&[10]));

        assert!(matches!(
            builder.decode_use_entity(&frame),
            Err(ProtocolError::Decode(_))
        ));
    }
}
