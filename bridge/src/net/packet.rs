//! Built packets and ordered packet groups

use bytes::Bytes;
use smallvec::SmallVec;
use std::fmt;

use crate::net::codec::PacketWriter;

/// What a clientbound packet does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Spawn,
    Destroy,
    HeadRotation,
    Metadata,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Spawn => "spawn",
            PacketKind::Destroy => "destroy",
            PacketKind::HeadRotation => "head_rotation",
            PacketKind::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// One encoded, immutable packet: type tag, host packet id and body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    id: i32,
    body: Bytes,
}

impl Packet {
    pub(crate) fn new(kind: PacketKind, id: i32, body: Bytes) -> Self {
        Self { kind, id, body }
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Host packet id
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Body without the packet id
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Packet id varint followed by the body, as it goes on the wire
    pub fn to_frame_bytes(&self) -> Bytes {
        let mut writer = PacketWriter::with_capacity(self.body.len() + 5);
        writer.write_var_int(self.id).write_bytes(&self.body);
        writer.finish()
    }
}

/// Recipient of packets: a player's live connection
///
/// `send_packet` must only enqueue and return; it never blocks on I/O.
pub trait PacketSink {
    /// False once the connection is closing or closed
    fn is_open(&self) -> bool;

    fn send_packet(&self, packet: Packet);
}

/// Ordered bundle of packets delivered as one logical operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketGroup {
    packets: SmallVec<[Packet; 4]>,
}

impl PacketGroup {
    pub fn of(packets: impl IntoIterator<Item = Packet>) -> Self {
        Self {
            packets: packets.into_iter().collect(),
        }
    }

    pub fn single(packet: Packet) -> Self {
        Self::of([packet])
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// This group followed by `other`
    pub fn then(mut self, other: PacketGroup) -> Self {
        self.packets.extend(other.packets);
        self
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Deliver every packet, in construction order, to one recipient.
    ///
    /// A closed recipient is skipped silently: disconnect races are expected.
    pub fn send_to<S: PacketSink + ?Sized>(&self, recipient: &S) {
        if !recipient.is_open() {
            return;
        }
        for packet in &self.packets {
            recipient.send_packet(packet.clone());
        }
    }

    pub fn broadcast_to<'a, S, I>(&self, recipients: I)
    where
        S: PacketSink + ?Sized + 'a,
        I: IntoIterator<Item = &'a S>,
    {
        for recipient in recipients {
            self.send_to(recipient);
        }
    }

    /// Broadcast to the recipients matching `filter` (e.g. players in one world)
    pub fn broadcast_where<'a, S, I, F>(&self, recipients: I, mut filter: F)
    where
        S: PacketSink + ?Sized + 'a,
        I: IntoIterator<Item = &'a S>,
        F: FnMut(&S) -> bool,
    {
        for recipient in recipients {
            if filter(recipient) {
                self.send_to(recipient);
            }
        }
    }
}

impl<'a> IntoIterator for &'a PacketGroup {
    type Item = &'a Packet;
    type IntoIter = std::slice::Iter<'a, Packet>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}
