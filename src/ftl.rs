#[cfg(test)]
use std::{println as info, println as warn, println as error, println as trace, println as debug};
use std::collections::{HashMap, VecDeque};

#[cfg(not(test))]
use log::*;

use num_integer::Integer;

use crate::address::AddressCodec;
use crate::config::{Addr, BlockId, Counter, FlashConfig, PageId, WordId};
use crate::controller::Controller;
use crate::error::{FtlError, Result};
use crate::packet::PacketType;
use crate::transaction::{FlashTransaction, TransactionKind};

/// The FTL core. Owns the virtual-to-physical map, the occupancy tables, the
/// transaction queue with its lookup pipeline, the erase scheduler and the
/// garbage collector. One `update()` call advances one simulated cycle.
pub struct Ftl<C: Controller> {
    config: FlashConfig,
    codec: AddressCodec,

    address_map: HashMap<Addr, Addr>,
    used: Vec<Vec<Vec<bool>>>,
    dirty: Vec<Vec<Vec<bool>>>,
    used_page_count: Counter,

    // block id -> remaining ticks until the erase completes
    erase_counter: HashMap<BlockId, Counter>,

    transaction_queue: VecDeque<FlashTransaction>,
    current: Option<FlashTransaction>,
    lookup_counter: Counter,

    // write pointer
    channel: usize,
    die: usize,
    plane: usize,

    controller: C,
}

impl<C: Controller> Ftl<C> {
    pub fn new(config: FlashConfig, controller: C) -> Result<Self> {
        config.validate()?;
        let codec = AddressCodec::new(&config);
        let blocks = config.total_blocks();
        let used =
            vec![vec![vec![false; config.words_per_page]; config.pages_per_block]; blocks];
        let dirty = used.clone();

        Ok(Ftl {
            config,
            codec,
            address_map: HashMap::new(),
            used,
            dirty,
            used_page_count: 0,
            erase_counter: HashMap::new(),
            transaction_queue: VecDeque::new(),
            current: None,
            lookup_counter: 0,
            channel: 0,
            die: 0,
            plane: 0,
            controller,
        })
    }

    /// Enqueues a transaction. Never refuses.
    pub fn add_transaction(&mut self, trans: FlashTransaction) -> bool {
        self.transaction_queue.push_back(trans);
        true
    }

    /// Advances one tick: erase countdowns first, then the lookup pipeline,
    /// then (on an idle tick with an empty queue) at most one GC pass.
    pub fn update(&mut self) -> Result<()> {
        self.tick_erases();

        if self.current.is_some() {
            if self.lookup_counter == 0 {
                if let Some(trans) = self.current.take() {
                    self.dispatch(trans)?;
                    self.transaction_queue.pop_front();
                }
            } else {
                self.lookup_counter -= 1;
            }
        } else if let Some(front) = self.transaction_queue.front() {
            self.current = Some(front.clone());
            self.lookup_counter = self.config.lookup_time;
        } else if self.needs_gc() {
            self.run_gc()?;
        }
        Ok(())
    }

    /// Byte offset the write pointer currently points at.
    pub fn get_ptr(&self) -> Addr {
        self.config.plane_bytes()
            * (self.plane
                + self.config.planes_per_die
                    * (self.die + self.config.dies_per_package * self.channel))
    }

    pub fn lookup(&self, vaddr: Addr) -> Option<Addr> {
        self.address_map.get(&vaddr).copied()
    }

    pub fn mapped(&self) -> usize {
        self.address_map.len()
    }

    pub fn used_page_count(&self) -> Counter {
        self.used_page_count
    }

    pub fn occupancy(&self) -> f64 {
        self.used_page_count as f64 / self.config.total_slots() as f64
    }

    pub fn needs_gc(&self) -> bool {
        !self.config.immediate_reclaim && self.occupancy() > self.config.gc_threshold
    }

    pub fn busy(&self) -> bool {
        self.current.is_some()
    }

    /// Nothing queued, nothing in the pipeline, no erase pending.
    pub fn quiescent(&self) -> bool {
        self.transaction_queue.is_empty() && self.current.is_none() && self.erase_counter.is_empty()
    }

    pub fn is_used(&self, block: BlockId, page: PageId, word: WordId) -> bool {
        self.used[block][page][word]
    }

    pub fn is_dirty(&self, block: BlockId, page: PageId, word: WordId) -> bool {
        self.dirty[block][page][word]
    }

    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    fn dispatch(&mut self, trans: FlashTransaction) -> Result<()> {
        match trans.kind {
            TransactionKind::DataRead => self.service_read(trans),
            TransactionKind::DataWrite => self.service_write(trans),
            TransactionKind::BlockErase => self.schedule_erase(trans.addr),
            kind => {
                error!("transaction in the FTL that isn't a read, write or erase");
                Err(FtlError::UnexpectedTransaction(kind))
            }
        }
    }

    fn service_read(&mut self, trans: FlashTransaction) -> Result<()> {
        match self.address_map.get(&trans.addr) {
            None => {
                // defined miss, not an error
                self.controller.return_read_data(FlashTransaction::no_data(trans.addr));
                Ok(())
            }
            Some(&paddr) => {
                let packet = self.codec.translate(PacketType::Read, paddr, None)?;
                self.controller.add_packet(packet);
                Ok(())
            }
        }
    }

    fn service_write(&mut self, trans: FlashTransaction) -> Result<()> {
        let paddr = self.allocate(trans.addr)?;

        let data = self.codec.translate(PacketType::Data, paddr, trans.data)?;
        let command = self.codec.translate(PacketType::Write, paddr, None)?;
        self.controller.add_packet(data);
        self.controller.add_packet(command);

        self.advance_write_pointer();
        Ok(())
    }

    /// Retires any slot the virtual address previously occupied, claims a
    /// fresh one and points the map at it.
    fn allocate(&mut self, vaddr: Addr) -> Result<Addr> {
        if let Some(&old) = self.address_map.get(&vaddr) {
            self.retire_slot(old);
        }
        let paddr = self.claim_free_slot()?;
        trace!("virtual {:#x} now lives at physical {:#x}", vaddr, paddr);
        self.address_map.insert(vaddr, paddr);
        Ok(paddr)
    }

    /// First-fit scan over blocks/pages/words starting at the write pointer,
    /// wrapping to block zero past the tail.
    fn claim_free_slot(&mut self) -> Result<Addr> {
        let start_block = self.get_ptr() / self.config.block_size;
        let total = self.config.total_blocks();
        let words = self.config.words_tracked();

        for block in (start_block..total).chain(0..start_block) {
            if self.erase_counter.contains_key(&block) {
                // off limits until the erase clears its state
                continue;
            }
            for page in 0..self.config.pages_per_block {
                for word in 0..words {
                    if !self.used[block][page][word] {
                        self.used[block][page][word] = true;
                        self.used_page_count += 1;
                        return Ok(self.slot_addr(block, page, word));
                    }
                }
            }
        }

        error!("no free pages? GC needs some work");
        Err(FtlError::AllocationExhausted)
    }

    /// The overwritten slot is never reused directly. It turns dirty and waits
    /// for GC, unless the media reclaims in place.
    fn retire_slot(&mut self, addr: Addr) {
        let (block, page, word) = self.slot_of(addr);
        if !self.used[block][page][word] {
            // an erase cleared the slot while the mapping still pointed at it
            return;
        }
        if self.config.immediate_reclaim {
            self.used[block][page][word] = false;
            self.used_page_count -= 1;
        } else {
            self.dirty[block][page][word] = true;
        }
    }

    fn schedule_erase(&mut self, block: BlockId) -> Result<()> {
        if block >= self.config.total_blocks() {
            return Err(FtlError::OutOfRange { addr: block, total: self.config.total_blocks() });
        }
        if self.config.immediate_reclaim {
            warn!("block erase requested on media that reclaims in place, ignoring");
            return Ok(());
        }
        self.erase_counter.insert(block, self.config.erase_time);
        Ok(())
    }

    /// Runs every tick regardless of pipeline state.
    fn tick_erases(&mut self) {
        let mut finished: Vec<BlockId> = Vec::new();
        for (&block, counter) in self.erase_counter.iter_mut() {
            *counter -= 1;
            if *counter == 0 {
                finished.push(block);
            }
        }
        for block in finished {
            self.erase_counter.remove(&block);
            self.clear_block(block);
        }
    }

    fn clear_block(&mut self, block: BlockId) {
        let words = self.config.words_tracked();
        for page in 0..self.config.pages_per_block {
            for word in 0..words {
                if self.used[block][page][word] {
                    self.used[block][page][word] = false;
                    self.used_page_count -= 1;
                }
                self.dirty[block][page][word] = false;
            }
        }
        debug!("block {} erased", block);
    }

    /// One pass: pick the dirtiest eligible block, relocate its live pages
    /// through the normal queue, then schedule its erase.
    fn run_gc(&mut self) -> Result<()> {
        let victim = match self.victim_block() {
            Some(block) => block,
            None => return Ok(()),
        };

        let words = self.config.words_tracked();
        for page in 0..self.config.pages_per_block {
            for word in 0..words {
                if self.used[victim][page][word] && !self.dirty[victim][page][word] {
                    let paddr = self.slot_addr(victim, page, word);
                    let vaddr = self.owner_of(paddr)?;
                    self.add_transaction(FlashTransaction::read(vaddr));
                    self.add_transaction(FlashTransaction::write(vaddr, None));
                }
            }
        }

        info!("gc relocating block {}", victim);
        self.add_transaction(FlashTransaction::erase(victim));
        Ok(())
    }

    /// Block with the most dirty slots, lowest id on ties. Blocks already
    /// counting down an erase are skipped so the countdown is never re-armed.
    fn victim_block(&self) -> Option<BlockId> {
        let words = self.config.words_tracked();
        let mut victim: Option<(BlockId, Counter)> = None;

        for block in 0..self.config.total_blocks() {
            if self.erase_counter.contains_key(&block) {
                continue;
            }
            let mut count = 0;
            for page in 0..self.config.pages_per_block {
                for word in 0..words {
                    if self.dirty[block][page][word] {
                        count += 1;
                    }
                }
            }
            match victim {
                None => victim = Some((block, count)),
                Some((_, best)) if count > best => victim = Some((block, count)),
                _ => {}
            }
        }
        victim.map(|(block, _)| block)
    }

    /// Reverse lookup of the virtual owner by linear scan of the map.
    // TODO: maintain a physical-to-virtual index next to the map and drop the scan
    fn owner_of(&self, paddr: Addr) -> Result<Addr> {
        self.address_map
            .iter()
            .find(|&(_, &p)| p == paddr)
            .map(|(&v, _)| v)
            .ok_or(FtlError::ReverseLookupMiss { addr: paddr })
    }

    fn advance_write_pointer(&mut self) {
        self.channel = (self.channel + 1) % self.config.packages;
        if self.channel == 0 {
            self.die = (self.die + 1) % self.config.dies_per_package;
            if self.die == 0 {
                self.plane = (self.plane + 1) % self.config.planes_per_die;
            }
        }
    }

    fn slot_addr(&self, block: BlockId, page: PageId, word: WordId) -> Addr {
        block * self.config.block_size + page * self.config.page_size + word * self.config.word_size
    }

    fn slot_of(&self, addr: Addr) -> (BlockId, PageId, WordId) {
        let (block, rest) = addr.div_rem(&self.config.block_size);
        let (page, rest) = rest.div_rem(&self.config.page_size);
        let word = if self.config.device_type.word_granular() {
            rest / self.config.word_size
        } else {
            0
        };
        (block, page, word)
    }
}
