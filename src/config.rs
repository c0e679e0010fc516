use crate::error::{FtlError, Result};

pub type BaseType = usize;

pub type Addr = BaseType;
pub type PageId = BaseType;
pub type BlockId = BaseType;
pub type WordId = BaseType;
pub type Counter = BaseType;

/// Simulated media family. Decides access granularity and transfer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Nand,
    Nor,
    Pcm,
    Memristor,
}

impl DeviceType {
    /// NAND reads and programs whole pages; everything else addresses words.
    pub fn word_granular(self) -> bool {
        !matches!(self, DeviceType::Nand)
    }
}

/// Static device description handed to the FTL at construction. Never mutated
/// by the core.
#[derive(Debug, Clone)]
pub struct FlashConfig {
    pub device_type: DeviceType,

    pub packages: BaseType,
    pub dies_per_package: BaseType,
    pub planes_per_die: BaseType,
    pub blocks_per_plane: BaseType,
    pub pages_per_block: BaseType,
    pub words_per_page: BaseType,

    // sizes in bytes
    pub word_size: BaseType,
    pub page_size: BaseType,
    pub block_size: BaseType,
    pub read_size: BaseType,
    pub write_size: BaseType,

    // latencies in ticks
    pub lookup_time: Counter,
    pub erase_time: Counter,

    pub gc_threshold: f64,
    /// Overwrites free the old slot in place instead of marking it dirty, and
    /// block erase / GC are disabled. Matches small-access PCM behavior.
    pub immediate_reclaim: bool,
}

impl Default for FlashConfig {
    fn default() -> Self {
        FlashConfig {
            device_type: DeviceType::Nand,
            packages: 1,
            dies_per_package: 2,
            planes_per_die: 4,
            blocks_per_plane: 64,
            pages_per_block: 64,
            words_per_page: 1,
            word_size: 4096,
            page_size: 4096,
            block_size: 64 * 4096,
            read_size: 4096,
            write_size: 4096,
            lookup_time: 50,
            erase_time: 1_000_000, // roughly 1.5 ms of simulated cycles
            gc_threshold: 0.7,
            immediate_reclaim: false,
        }
    }
}

impl FlashConfig {
    pub fn validate(&self) -> Result<()> {
        fn pow2(n: BaseType, what: &'static str) -> Result<()> {
            if n == 0 || !n.is_power_of_two() {
                return Err(FtlError::Config(what));
            }
            Ok(())
        }

        pow2(self.packages, "package count must be a nonzero power of two")?;
        pow2(self.dies_per_package, "die count must be a nonzero power of two")?;
        pow2(self.planes_per_die, "plane count must be a nonzero power of two")?;
        pow2(self.blocks_per_plane, "block count must be a nonzero power of two")?;
        pow2(self.pages_per_block, "page count must be a nonzero power of two")?;
        pow2(self.words_per_page, "word count must be a nonzero power of two")?;
        pow2(self.word_size, "word size must be a nonzero power of two")?;
        pow2(self.page_size, "page size must be a nonzero power of two")?;

        if self.word_size * self.words_per_page != self.page_size {
            return Err(FtlError::Config("page size must cover its words exactly"));
        }
        if self.block_size != self.pages_per_block * self.page_size {
            return Err(FtlError::Config("block size must cover its pages exactly"));
        }
        if self.erase_time == 0 {
            return Err(FtlError::Config("erase latency must be at least one tick"));
        }
        if !(self.gc_threshold > 0.0 && self.gc_threshold < 1.0) {
            return Err(FtlError::Config("gc threshold must fall inside (0, 1)"));
        }
        Ok(())
    }

    pub fn total_blocks(&self) -> BaseType {
        self.packages * self.dies_per_package * self.planes_per_die * self.blocks_per_plane
    }

    pub fn total_bytes(&self) -> BaseType {
        self.total_blocks() * self.block_size
    }

    pub fn plane_bytes(&self) -> BaseType {
        self.blocks_per_plane * self.block_size
    }

    /// Word slots tracked per page: collapses to one for page-granular media.
    pub fn words_tracked(&self) -> BaseType {
        if self.device_type.word_granular() {
            self.words_per_page
        } else {
            1
        }
    }

    /// Addressable allocation slots on the whole device.
    pub fn total_slots(&self) -> BaseType {
        self.total_blocks() * self.pages_per_block * self.words_tracked()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_geometry_validates() {
        FlashConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_power_of_two_pages() {
        let mut config = FlashConfig::default();
        config.pages_per_block = 100;
        assert!(matches!(config.validate(), Err(FtlError::Config(_))));
    }

    #[test]
    fn rejects_block_size_mismatch() {
        let mut config = FlashConfig::default();
        config.block_size = config.page_size;
        assert!(matches!(config.validate(), Err(FtlError::Config(_))));
    }

    #[test]
    fn slot_count_collapses_words_for_nand() {
        let mut config = FlashConfig::default();
        config.words_per_page = 8;
        config.word_size = config.page_size / 8;
        assert_eq!(config.words_tracked(), 1);
        config.device_type = DeviceType::Pcm;
        assert_eq!(config.words_tracked(), 8);
        assert_eq!(config.total_slots(), config.total_blocks() * config.pages_per_block * 8);
    }
}
