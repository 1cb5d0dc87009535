//! Virtual entity data: identities, poses, metadata and the entity variants

pub mod identity;
pub mod metadata;
pub mod pose;
pub mod virtual_entity;

pub use identity::EntityIdentity;
pub use metadata::{MetadataEntry, MetadataValue};
pub use pose::Pose;
pub use virtual_entity::{EntityKind, HumanoidEntity, TextLabelEntity, VirtualEntity};
