use crate::config::{Addr, BlockId};

/// Payload returned for a read of a virtual address nobody ever wrote.
pub const NO_DATA: u64 = 0xdead_beef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    DataRead,
    DataWrite,
    BlockErase,
    /// Outbound only, travels through the controller's read-return path.
    ReturnData,
}

/// Unit of work accepted by the FTL. `addr` is a virtual address, except for
/// `BlockErase` where it is the block id to erase.
#[derive(Debug, Clone)]
pub struct FlashTransaction {
    pub kind: TransactionKind,
    pub addr: Addr,
    pub data: Option<u64>,
}

impl FlashTransaction {
    pub fn new(kind: TransactionKind, addr: Addr, data: Option<u64>) -> Self {
        FlashTransaction { kind, addr, data }
    }

    pub fn read(addr: Addr) -> Self {
        Self::new(TransactionKind::DataRead, addr, None)
    }

    pub fn write(addr: Addr, data: Option<u64>) -> Self {
        Self::new(TransactionKind::DataWrite, addr, data)
    }

    pub fn erase(block: BlockId) -> Self {
        Self::new(TransactionKind::BlockErase, block, None)
    }

    pub fn no_data(addr: Addr) -> Self {
        Self::new(TransactionKind::ReturnData, addr, Some(NO_DATA))
    }
}
