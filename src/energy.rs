use std::fmt;

use crate::config::SimConfig;

const PJ_TO_J: f64 = 1e-12;
const NS_TO_S: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    L1,
    L2,
    Dram,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::L1 => write!(f, "L1"),
            Level::L2 => write!(f, "L2"),
            Level::Dram => write!(f, "DRAM"),
        }
    }
}

/// Fixed per-level latency and power table.
///
/// Latencies are in nanoseconds, powers in watts and energies in joules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    latency_ns: [f64; 3],
    power_rw_w: [f64; 3],
    power_idle_w: [f64; 3],
    l2_transfer_penalty_j: f64,
    dram_transfer_penalty_j: f64,
    dram_miss_l2_penalty: bool,
}

impl EnergyModel {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            latency_ns: [
                config.l1_latency_ns,
                config.l2_latency_ns,
                config.dram_latency_ns,
            ],
            power_rw_w: [
                config.l1_power_rw_w,
                config.l2_power_rw_w,
                config.dram_power_rw_w,
            ],
            power_idle_w: [
                config.l1_power_idle_w,
                config.l2_power_idle_w,
                config.dram_power_idle_w,
            ],
            l2_transfer_penalty_j: config.l2_transfer_penalty_pj * PJ_TO_J,
            dram_transfer_penalty_j: config.dram_transfer_penalty_pj * PJ_TO_J,
            dram_miss_l2_penalty: config.dram_miss_l2_penalty,
        }
    }

    fn slot(level: Level) -> usize {
        match level {
            Level::L1 => 0,
            Level::L2 => 1,
            Level::Dram => 2,
        }
    }

    pub fn latency_ns(&self, level: Level) -> f64 {
        self.latency_ns[Self::slot(level)]
    }

    pub fn active_power_w(&self, level: Level) -> f64 {
        self.power_rw_w[Self::slot(level)]
    }

    pub fn idle_power_w(&self, level: Level) -> f64 {
        self.power_idle_w[Self::slot(level)]
    }

    /// Energy of one active access: active power held for the access latency.
    pub fn access_energy_j(&self, level: Level) -> f64 {
        self.active_power_w(level) * self.latency_ns(level) * NS_TO_S
    }

    /// Energy of one line transfer into `level`, zero for L1.
    pub fn transfer_penalty_j(&self, level: Level) -> f64 {
        match level {
            Level::L1 => 0.0,
            Level::L2 => self.l2_transfer_penalty_j,
            Level::Dram => self.dram_transfer_penalty_j,
        }
    }

    /// L2 part of a DRAM miss: the L2 lookup plus, optionally, the L2 fill transfer.
    pub fn l2_miss_energy_j(&self) -> f64 {
        let penalty = if self.dram_miss_l2_penalty {
            self.l2_transfer_penalty_j
        } else {
            0.0
        };
        self.access_energy_j(Level::L2) + penalty
    }

    /// Static energy drawn while `level` sat idle for `idle_ns`.
    pub fn idle_energy_j(&self, level: Level, idle_ns: f64) -> f64 {
        self.idle_power_w(level) * idle_ns.max(0.0) * NS_TO_S
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-18_f64.max(b.abs() * 1e-9)
    }

    #[test]
    fn default_access_energies() {
        let model = EnergyModel::new(&SimConfig::default());
        assert!(close(model.access_energy_j(Level::L1), 0.5e-9));
        assert!(close(model.access_energy_j(Level::L2), 10e-9));
        assert!(close(model.access_energy_j(Level::Dram), 200e-9));
        assert!(close(model.transfer_penalty_j(Level::L2), 5e-12));
        assert!(close(model.transfer_penalty_j(Level::Dram), 640e-12));
        assert_eq!(model.transfer_penalty_j(Level::L1), 0.0);
    }

    #[test]
    fn l2_miss_penalty_follows_variant_flag() {
        let full = EnergyModel::new(&SimConfig::default());
        assert!(close(full.l2_miss_energy_j(), 10e-9 + 5e-12));

        let cfg = SimConfig {
            dram_miss_l2_penalty: false,
            ..SimConfig::default()
        };
        let lean = EnergyModel::new(&cfg);
        assert!(close(lean.l2_miss_energy_j(), 10e-9));
    }

    #[test]
    fn idle_energy_never_negative() {
        let model = EnergyModel::new(&SimConfig::default());
        assert_eq!(model.idle_energy_j(Level::L2, -3.0), 0.0);
        assert!(close(model.idle_energy_j(Level::Dram, 100.0), 80e-9));
    }
}
