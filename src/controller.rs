#[cfg(test)]
use std::println as trace;

#[cfg(not(test))]
use log::*;

use crate::packet::ChannelPacket;
use crate::transaction::FlashTransaction;

/// Downstream packet consumer. The FTL only ever calls into it; the controller
/// never mutates FTL state.
pub trait Controller {
    fn add_packet(&mut self, packet: ChannelPacket);
    fn return_read_data(&mut self, trans: FlashTransaction);
}

/// Records everything it is handed. Stands in for the real channel controller
/// in the driver binary and in tests.
#[derive(Default)]
pub struct SinkController {
    pub packets: Vec<ChannelPacket>,
    pub read_returns: Vec<FlashTransaction>,
}

impl Controller for SinkController {
    fn add_packet(&mut self, packet: ChannelPacket) {
        trace!(
            "packet {:?} addr {:#x} size {} at {:?}",
            packet.op, packet.address, packet.size, packet.location
        );
        self.packets.push(packet);
    }

    fn return_read_data(&mut self, trans: FlashTransaction) {
        trace!("read return for {:#x}", trans.addr);
        self.read_returns.push(trans);
    }
}
