use thiserror::Error;

use crate::config::Addr;
use crate::transaction::TransactionKind;

pub type Result<T> = std::result::Result<T, FtlError>;

/// Fatal simulation faults. None of these are retried internally; the caller
/// driving the simulation decides whether to abort.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FtlError {
    #[error("address {addr:#x} outside the {total} byte address space")]
    OutOfRange { addr: Addr, total: usize },

    #[error("bad flash geometry: {0}")]
    Config(&'static str),

    #[error("no free page left for a write, garbage collection fell behind")]
    AllocationExhausted,

    #[error("used clean slot at {addr:#x} has no owner in the address map")]
    ReverseLookupMiss { addr: Addr },

    #[error("transaction kind {0:?} cannot be serviced from the queue")]
    UnexpectedTransaction(TransactionKind),
}
