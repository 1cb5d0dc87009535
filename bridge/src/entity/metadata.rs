//! Typed entity metadata entries

use crate::net::codec::PacketWriter;
use crate::protocol::layout::{flags, ProtocolLayout, TextFormat};
use crate::protocol::ProtocolError;

/// NBT tag id of a string tag
const NBT_TAG_STRING: u8 = 0x08;

/// Value of one metadata entry
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(u8),
    VarInt(i32),
    VarLong(i64),
    Float(f32),
    String(String),
    /// Chat text component built from plain text
    Text(String),
    OptionalText(Option<String>),
    Boolean(bool),
}

impl MetadataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Byte(_) => "byte",
            MetadataValue::VarInt(_) => "varint",
            MetadataValue::VarLong(_) => "varlong",
            MetadataValue::Float(_) => "float",
            MetadataValue::String(_) => "string",
            MetadataValue::Text(_) => "text",
            MetadataValue::OptionalText(_) => "optional text",
            MetadataValue::Boolean(_) => "boolean",
        }
    }

    /// Serializer id for this value in the given revision
    pub fn serializer_id(&self, layout: &ProtocolLayout) -> Result<i32, ProtocolError> {
        let ids = &layout.serializers;
        let id = match self {
            MetadataValue::Byte(_) => Some(ids.byte),
            MetadataValue::VarInt(_) => Some(ids.var_int),
            MetadataValue::VarLong(_) => ids.var_long,
            MetadataValue::Float(_) => Some(ids.float),
            MetadataValue::String(_) => Some(ids.string),
            MetadataValue::Text(_) => Some(ids.text),
            MetadataValue::OptionalText(_) => Some(ids.optional_text),
            MetadataValue::Boolean(_) => Some(ids.boolean),
        };
        id.ok_or_else(|| ProtocolError::Mismatch {
            operation: "metadata",
            detail: format!(
                "{} has no {} serializer",
                layout.revision,
                self.type_name()
            ),
        })
    }

    fn write_payload(&self, writer: &mut PacketWriter, format: TextFormat) {
        match self {
            MetadataValue::Byte(v) => {
                writer.write_byte(*v);
            }
            MetadataValue::VarInt(v) => {
                writer.write_var_int(*v);
            }
            MetadataValue::VarLong(v) => {
                writer.write_var_long(*v);
            }
            MetadataValue::Float(v) => {
                writer.write_float(*v);
            }
            MetadataValue::String(v) => {
                writer.write_string(v);
            }
            MetadataValue::Text(text) => write_text(writer, text, format),
            MetadataValue::OptionalText(text) => {
                writer.write_bool(text.is_some());
                if let Some(text) = text {
                    write_text(writer, text, format);
                }
            }
            MetadataValue::Boolean(v) => {
                writer.write_bool(*v);
            }
        }
    }
}

/// Write a plain-text chat component in the revision's text format
pub fn write_text(writer: &mut PacketWriter, text: &str, format: TextFormat) {
    match format {
        TextFormat::Json => {
            let json = serde_json::json!({ "text": text }).to_string();
            writer.write_string(&json);
        }
        TextFormat::Nbt => {
            let encoded = modified_utf8(text);
            writer.write_byte(NBT_TAG_STRING);
            writer.write_unsigned_short(encoded.len() as u16);
            writer.write_bytes(&encoded);
        }
    }
}

/// Encode `text` the way NBT string tags expect: UTF-16 code units written as
/// 1-3 byte sequences, so NUL becomes `C0 80` and characters outside the BMP
/// become two 3-byte surrogates. Stops at the last whole character that fits
/// in `u16::MAX` bytes.
fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut units = [0u16; 2];

    for ch in text.chars() {
        let start = out.len();
        for &unit in ch.encode_utf16(&mut units).iter() {
            match unit {
                0x0001..=0x007F => out.push(unit as u8),
                0x0000 | 0x0080..=0x07FF => {
                    out.push(0xC0 | (unit >> 6) as u8);
                    out.push(0x80 | (unit & 0x3F) as u8);
                }
                _ => {
                    out.push(0xE0 | (unit >> 12) as u8);
                    out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                    out.push(0x80 | (unit & 0x3F) as u8);
                }
            }
        }
        if out.len() > u16::MAX as usize {
            out.truncate(start);
            break;
        }
    }
    out
}

/// One `(index, value)` metadata entry
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub index: u8,
    pub value: MetadataValue,
}

impl MetadataEntry {
    pub fn new(index: u8, value: MetadataValue) -> Self {
        Self { index, value }
    }

    /// Encode index, serializer id and payload
    pub fn write(&self, writer: &mut PacketWriter, layout: &ProtocolLayout) -> Result<(), ProtocolError> {
        let type_id = self.value.serializer_id(layout)?;
        writer.write_metadata_header(self.index, type_id);
        self.value.write_payload(writer, layout.text_format);
        Ok(())
    }
}

/// Custom name plus its visibility flag
pub fn custom_name_entries(layout: &ProtocolLayout, name: Option<&str>) -> [MetadataEntry; 2] {
    let indices = &layout.indices;
    [
        MetadataEntry::new(
            indices.custom_name,
            MetadataValue::OptionalText(name.map(str::to_string)),
        ),
        MetadataEntry::new(indices.custom_name_visible, MetadataValue::Boolean(name.is_some())),
    ]
}

/// Everything that turns an armor stand into a floating label: invisible,
/// small, marker hitbox, no gravity, name shown
pub fn text_label_entries(layout: &ProtocolLayout, text: &str) -> Vec<MetadataEntry> {
    let indices = &layout.indices;
    let mut entries = Vec::with_capacity(5);
    entries.push(MetadataEntry::new(indices.entity_flags, MetadataValue::Byte(flags::INVISIBLE)));
    entries.extend(custom_name_entries(layout, Some(text)));
    entries.push(MetadataEntry::new(indices.no_gravity, MetadataValue::Boolean(true)));
    entries.push(MetadataEntry::new(
        indices.armor_stand_flags,
        MetadataValue::Byte(flags::ARMOR_STAND_SMALL | flags::ARMOR_STAND_MARKER),
    ));
    entries
}
