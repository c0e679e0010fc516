#[cfg(test)]
use std::{println as warn, println as error};

#[cfg(not(test))]
use log::*;

use crate::config::{Addr, DeviceType, FlashConfig};
use crate::error::{FtlError, Result};
use crate::packet::{ChannelPacket, PacketType, PhysicalLocation};

/// Maps physical byte addresses onto the package/die/plane/block/page/word
/// hierarchy. All field widths are derived once from the geometry and cached.
pub struct AddressCodec {
    device_type: DeviceType,

    word_size: usize,
    page_size: usize,
    block_size: usize,
    read_size: usize,
    write_size: usize,
    total_bytes: usize,

    // byte-offset shifts per granularity
    word_offset: u32,
    page_offset: u32,

    // field widths, low to high
    word_bits: u32,
    page_bits: u32,
    block_bits: u32,
    plane_bits: u32,
    die_bits: u32,
    package_bits: u32,
}

fn bit_width(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        count.next_power_of_two().trailing_zeros()
    }
}

fn low_bits(value: usize, bits: u32) -> usize {
    value & ((1usize << bits) - 1)
}

impl AddressCodec {
    /// Expects a validated config: power-of-two counts and consistent sizes.
    pub fn new(config: &FlashConfig) -> Self {
        AddressCodec {
            device_type: config.device_type,
            word_size: config.word_size,
            page_size: config.page_size,
            block_size: config.block_size,
            read_size: config.read_size,
            write_size: config.write_size,
            total_bytes: config.total_bytes(),
            word_offset: config.word_size.trailing_zeros(),
            page_offset: config.page_size.trailing_zeros(),
            word_bits: bit_width(config.words_per_page),
            page_bits: bit_width(config.pages_per_block),
            block_bits: bit_width(config.blocks_per_plane),
            plane_bits: bit_width(config.planes_per_die),
            die_bits: bit_width(config.dies_per_package),
            package_bits: bit_width(config.packages),
        }
    }

    /// Splits a physical byte address into its hierarchy fields.
    pub fn decompose(&self, addr: Addr) -> Result<PhysicalLocation> {
        if addr >= self.total_bytes {
            error!(
                "invalid physical address {:#x}, device holds {} bytes",
                addr, self.total_bytes
            );
            return Err(FtlError::OutOfRange { addr, total: self.total_bytes });
        }

        let mut rest;
        let word;
        if self.device_type.word_granular() {
            rest = addr >> self.word_offset;
            word = low_bits(rest, self.word_bits);
            rest >>= self.word_bits;
        } else {
            word = 0;
            rest = addr >> self.page_offset;
        }

        let page = low_bits(rest, self.page_bits);
        rest >>= self.page_bits;
        let block = low_bits(rest, self.block_bits);
        rest >>= self.block_bits;
        let plane = low_bits(rest, self.plane_bits);
        rest >>= self.plane_bits;
        let die = low_bits(rest, self.die_bits);
        rest >>= self.die_bits;
        let package = low_bits(rest, self.package_bits);

        Ok(PhysicalLocation { package, die, plane, block, page, word })
    }

    /// Inverse of `decompose`.
    pub fn compose(&self, loc: PhysicalLocation) -> Addr {
        let mut addr = loc.package;
        addr = (addr << self.die_bits) | loc.die;
        addr = (addr << self.plane_bits) | loc.plane;
        addr = (addr << self.block_bits) | loc.block;
        addr = (addr << self.page_bits) | loc.page;
        if self.device_type.word_granular() {
            ((addr << self.word_bits) | loc.word) << self.word_offset
        } else {
            addr << self.page_offset
        }
    }

    /// Transfer size implied by device type and operation. Disagreement with
    /// the configured read/write size is a warning, never an error.
    pub fn transfer_size(&self, op: PacketType) -> usize {
        match self.device_type {
            DeviceType::Nand => match op {
                PacketType::Read => {
                    if self.read_size != self.page_size {
                        warn!(
                            "invalid read size of {} for NAND flash, using page read instead",
                            self.read_size
                        );
                    }
                    self.page_size
                }
                PacketType::Write => {
                    if self.write_size != self.page_size {
                        warn!(
                            "invalid write size of {} for NAND flash, using page write instead",
                            self.write_size
                        );
                    }
                    self.page_size
                }
                PacketType::Erase => self.block_size,
                PacketType::Data => self.page_size,
            },
            DeviceType::Nor => match op {
                PacketType::Read => {
                    if self.read_size != self.word_size {
                        warn!(
                            "invalid read size of {} for NOR flash, using word read instead",
                            self.read_size
                        );
                    }
                    self.word_size
                }
                PacketType::Write => {
                    if self.write_size != self.page_size {
                        warn!(
                            "invalid write size of {} for NOR flash, using page write instead",
                            self.write_size
                        );
                    }
                    self.page_size
                }
                PacketType::Erase => self.block_size,
                PacketType::Data => self.page_size,
            },
            DeviceType::Pcm | DeviceType::Memristor => match op {
                PacketType::Read => self.read_size,
                PacketType::Write => self.write_size,
                PacketType::Erase | PacketType::Data => self.page_size,
            },
        }
    }

    /// Builds the physical packet for `op` at byte address `addr`.
    pub fn translate(&self, op: PacketType, addr: Addr, payload: Option<u64>) -> Result<ChannelPacket> {
        let location = self.decompose(addr)?;
        let size = self.transfer_size(op);
        Ok(ChannelPacket { op, address: addr, size, location, payload })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DeviceType;

    fn pcm_config() -> FlashConfig {
        FlashConfig {
            device_type: DeviceType::Pcm,
            packages: 2,
            dies_per_package: 2,
            planes_per_die: 2,
            blocks_per_plane: 4,
            pages_per_block: 4,
            words_per_page: 4,
            word_size: 64,
            page_size: 256,
            block_size: 1024,
            read_size: 64,
            write_size: 64,
            ..FlashConfig::default()
        }
    }

    #[test]
    fn round_trips_every_word_address() {
        let config = pcm_config();
        config.validate().unwrap();
        let codec = AddressCodec::new(&config);
        let mut addr = 0;
        while addr < config.total_bytes() {
            let loc = codec.decompose(addr).unwrap();
            assert_eq!(codec.compose(loc), addr, "round trip broke at {:#x}", addr);
            addr += config.word_size;
        }
    }

    #[test]
    fn decomposes_highest_fields() {
        let config = pcm_config();
        let codec = AddressCodec::new(&config);
        let last = config.total_bytes() - config.word_size;
        let loc = codec.decompose(last).unwrap();
        assert_eq!(loc.package, 1);
        assert_eq!(loc.die, 1);
        assert_eq!(loc.plane, 1);
        assert_eq!(loc.block, 3);
        assert_eq!(loc.page, 3);
        assert_eq!(loc.word, 3);
    }

    #[test]
    fn nand_addresses_at_page_granularity() {
        let config = FlashConfig::default();
        let codec = AddressCodec::new(&config);
        let addr = 3 * config.block_size + 5 * config.page_size;
        let loc = codec.decompose(addr).unwrap();
        assert_eq!(loc.word, 0);
        assert_eq!(loc.page, 5);
        assert_eq!(loc.block, 3);
        assert_eq!(codec.compose(loc), addr);
    }

    #[test]
    fn rejects_out_of_range_address() {
        let config = FlashConfig::default();
        let codec = AddressCodec::new(&config);
        let total = config.total_bytes();
        assert!(matches!(
            codec.decompose(total),
            Err(FtlError::OutOfRange { addr, .. }) if addr == total
        ));
    }

    #[test]
    fn transfer_sizes_follow_the_device_schema() {
        let nand = AddressCodec::new(&FlashConfig::default());
        assert_eq!(nand.transfer_size(PacketType::Read), 4096);
        assert_eq!(nand.transfer_size(PacketType::Write), 4096);
        assert_eq!(nand.transfer_size(PacketType::Erase), 64 * 4096);

        let mut config = pcm_config();
        config.device_type = DeviceType::Nor;
        let nor = AddressCodec::new(&config);
        assert_eq!(nor.transfer_size(PacketType::Read), config.word_size);
        assert_eq!(nor.transfer_size(PacketType::Write), config.page_size);
        assert_eq!(nor.transfer_size(PacketType::Erase), config.block_size);

        let pcm = AddressCodec::new(&pcm_config());
        assert_eq!(pcm.transfer_size(PacketType::Read), 64);
        assert_eq!(pcm.transfer_size(PacketType::Write), 64);
        assert_eq!(pcm.transfer_size(PacketType::Erase), 256);
    }
}
