use crate::config::Addr;

/// Physical-layer operation carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Read,
    Write,
    Erase,
    Data,
}

/// Decomposed position of a byte address in the device hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalLocation {
    pub package: usize,
    pub die: usize,
    pub plane: usize,
    pub block: usize,
    pub page: usize,
    pub word: usize,
}

/// Physical-layer descriptor handed to the controller. Owned by the controller
/// once issued.
#[derive(Debug, Clone)]
pub struct ChannelPacket {
    pub op: PacketType,
    pub address: Addr,
    pub size: usize,
    pub location: PhysicalLocation,
    pub payload: Option<u64>,
}
