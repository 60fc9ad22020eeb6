use std::fmt;

use rand::Rng;

use crate::{
    cache::{Decomposed, DirectMappedCache, SetAssociativeCache},
    config::SimConfig,
    energy::{EnergyModel, Level},
    error::Result,
    trace::TraceAccess,
    writeback::{DrainCost, WriteBackQueue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    L1Hit,
    L2Hit,
    DramMiss,
}

impl fmt::Display for AccessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessClass::L1Hit => write!(f, "L1 Hit"),
            AccessClass::L2Hit => write!(f, "L2 Hit"),
            AccessClass::DramMiss => write!(f, "DRAM Miss"),
        }
    }
}

/// Counters of one trial. A fresh value is all zeros; nothing is reset in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationState {
    pub accesses: u64,
    pub l1_data_hits: u64,
    pub l1_data_misses: u64,
    pub l1_inst_hits: u64,
    pub l1_inst_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub dram_accesses: u64,

    pub time_ns: f64,
    pub energy_j: f64,
    pub l1_data_energy_j: f64,
    pub l1_inst_energy_j: f64,
    pub l2_energy_j: f64,
    pub dram_energy_j: f64,

    pub l1_busy_ns: f64,
    pub l2_busy_ns: f64,
    pub dram_busy_ns: f64,

    pub writebacks_l2: u64,
    pub writebacks_dram: u64,
    pub writeback_time_ns: f64,
    pub writeback_energy_j: f64,
}

impl SimulationState {
    pub fn l1_hits(&self) -> u64 {
        self.l1_data_hits + self.l1_inst_hits
    }

    pub fn l1_misses(&self) -> u64 {
        self.l1_data_misses + self.l1_inst_misses
    }

    /// Average memory access time, infinite when nothing was accessed.
    pub fn amat_ns(&self) -> f64 {
        average_access_time(self.time_ns, self.accesses as f64)
    }

    pub fn busy_ns(&self, level: Level) -> f64 {
        match level {
            Level::L1 => self.l1_busy_ns,
            Level::L2 => self.l2_busy_ns,
            Level::Dram => self.dram_busy_ns,
        }
    }

    /// Static energy of `level` over the time it was not serving an access.
    pub fn idle_energy_j(&self, model: &EnergyModel, level: Level) -> f64 {
        model.idle_energy_j(level, self.time_ns - self.busy_ns(level))
    }

    fn charge(&mut self, level: Level, time_ns: f64, energy_j: f64) {
        self.time_ns += time_ns;
        self.energy_j += energy_j;
        match level {
            Level::L1 => self.l1_busy_ns += time_ns,
            Level::L2 => {
                self.l2_busy_ns += time_ns;
                self.l2_energy_j += energy_j;
            }
            Level::Dram => {
                self.dram_busy_ns += time_ns;
                self.dram_energy_j += energy_j;
            }
        }
    }

    fn charge_writeback(&mut self, level: Level, cost: DrainCost) {
        if cost.entries == 0 {
            return;
        }
        self.charge(level, cost.time_ns, cost.energy_j);
        self.writeback_time_ns += cost.time_ns;
        self.writeback_energy_j += cost.energy_j;
        match level {
            Level::Dram => self.writebacks_dram += cost.entries,
            _ => self.writebacks_l2 += cost.entries,
        }
    }
}

pub fn average_access_time(total_time_ns: f64, accesses: f64) -> f64 {
    if accesses == 0.0 {
        f64::INFINITY
    } else {
        total_time_ns / accesses
    }
}

/// Split or unified L1, a K-way L2 and an always-miss DRAM, replayed one
/// access at a time. Victim selection draws from `rng`.
#[derive(Debug)]
pub struct Simulator<R> {
    model: EnergyModel,
    l1_data: DirectMappedCache,
    l1_inst: Option<DirectMappedCache>,
    l2: SetAssociativeCache,
    l2_queue: WriteBackQueue,
    dram_queue: WriteBackQueue,
    write_back: bool,
    state: SimulationState,
    rng: R,
}

impl<R: Rng> Simulator<R> {
    pub fn new(config: &SimConfig, associativity: usize, rng: R) -> Result<Self> {
        config.validate()?;
        let l2_sets = config.l2_set_count(associativity)?;
        let l1_inst = config
            .split_l1
            .then(|| DirectMappedCache::new(config.line_size, config.l1_line_count(true)));
        let l2 = SetAssociativeCache::new(config.line_size, l2_sets, associativity);
        log::debug!(
            "L1 {} x {} lines, L2 {} sets x {}-way",
            if l1_inst.is_some() { 2 } else { 1 },
            config.l1_line_count(false),
            l2.geometry().index_count,
            l2.associativity()
        );
        Ok(Self {
            model: EnergyModel::new(config),
            l1_data: DirectMappedCache::new(config.line_size, config.l1_line_count(false)),
            l1_inst,
            l2,
            l2_queue: WriteBackQueue::new(),
            dram_queue: WriteBackQueue::new(),
            write_back: config.write_back,
            state: SimulationState::default(),
            rng,
        })
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn into_state(self) -> SimulationState {
        self.state
    }

    pub fn model(&self) -> &EnergyModel {
        &self.model
    }

    pub fn replay(&mut self, access: &TraceAccess) -> AccessClass {
        self.access(
            access.address,
            access.kind.is_write(),
            access.kind.is_instruction(),
        )
    }

    pub fn access(&mut self, address: u64, is_write: bool, is_instruction: bool) -> AccessClass {
        self.state.accesses += 1;
        let class = self.lookup_and_fill(address, is_write, is_instruction);

        let cost = self.l2_queue.drain_all(
            self.model.latency_ns(Level::L2),
            self.model.active_power_w(Level::L2),
        );
        self.state.charge_writeback(Level::L2, cost);
        let cost = self.dram_queue.drain_all(
            self.model.latency_ns(Level::Dram),
            self.model.active_power_w(Level::Dram),
        );
        self.state.charge_writeback(Level::Dram, cost);
        debug_assert!(self.l2_queue.is_empty() && self.dram_queue.is_empty());

        log::trace!(
            "{} {address:#x} -> {class}",
            if is_write { "W" } else { "R" }
        );
        class
    }

    fn lookup_and_fill(&mut self, address: u64, is_write: bool, is_instruction: bool) -> AccessClass {
        let l1 = match (is_instruction, self.l1_inst.as_mut()) {
            (true, Some(inst)) => inst,
            _ => &mut self.l1_data,
        };
        let geometry = l1.geometry();
        let Decomposed {
            tag,
            index: l1_index,
        } = geometry.decompose(address);

        // The tag check costs one L1 access whether or not it hits.
        let l1_energy = self.model.access_energy_j(Level::L1);
        self.state.charge(Level::L1, self.model.latency_ns(Level::L1), l1_energy);
        if is_instruction {
            self.state.l1_inst_energy_j += l1_energy;
        } else {
            self.state.l1_data_energy_j += l1_energy;
        }

        if l1.lookup(l1_index, tag) {
            if is_instruction {
                self.state.l1_inst_hits += 1;
            } else {
                self.state.l1_data_hits += 1;
            }
            return AccessClass::L1Hit;
        }

        if is_instruction {
            self.state.l1_inst_misses += 1;
        } else {
            self.state.l1_data_misses += 1;
        }
        if let Some(evicted) = l1.install(l1_index, tag) {
            if is_write && self.write_back {
                self.l2_queue
                    .enqueue(geometry.line_address(l1_index, evicted), evicted);
            }
        }

        let l2_geometry = self.l2.geometry();
        let Decomposed {
            tag: l2_tag,
            index: l2_index,
        } = l2_geometry.decompose(address);
        if self.l2.lookup(l2_index, l2_tag) {
            self.state.charge(
                Level::L2,
                self.model.latency_ns(Level::L2),
                self.model.access_energy_j(Level::L2) + self.model.transfer_penalty_j(Level::L2),
            );
            self.state.l2_hits += 1;
            return AccessClass::L2Hit;
        }

        if let Some(victim) = self.l2.install(l2_index, l2_tag, &mut self.rng) {
            if is_write && self.write_back {
                self.dram_queue
                    .enqueue(l2_geometry.line_address(l2_index, victim), victim);
            }
        }
        debug_assert!(self.l2.set(l2_index).resident_tags().count() <= self.l2.associativity());
        self.state.charge(
            Level::L2,
            self.model.latency_ns(Level::L2),
            self.model.l2_miss_energy_j(),
        );
        self.state.charge(
            Level::Dram,
            self.model.latency_ns(Level::Dram),
            self.model.access_energy_j(Level::Dram) + self.model.transfer_penalty_j(Level::Dram),
        );
        self.state.l2_misses += 1;
        self.state.dram_accesses += 1;
        AccessClass::DramMiss
    }
}
