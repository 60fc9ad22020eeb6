use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::SimConfig,
    energy::Level,
    error::Result,
    simulator::{SimulationState, Simulator, average_access_time},
    trace::TraceFile,
};

/// Counters of one replay plus the idle energy derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub state: SimulationState,
    pub idle_energy_j: [f64; 3],
}

/// Arithmetic mean over the trials of one (trace, associativity) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AverageStats {
    pub accesses: f64,
    pub l1_data_hits: f64,
    pub l1_data_misses: f64,
    pub l1_inst_hits: f64,
    pub l1_inst_misses: f64,
    pub l2_hits: f64,
    pub l2_misses: f64,
    pub dram_accesses: f64,
    pub time_ns: f64,
    pub energy_j: f64,
    pub l1_data_energy_j: f64,
    pub l1_inst_energy_j: f64,
    pub l2_energy_j: f64,
    pub dram_energy_j: f64,
    pub writebacks_l2: f64,
    pub writebacks_dram: f64,
    pub writeback_time_ns: f64,
    pub writeback_energy_j: f64,
    pub idle_energy_j: [f64; 3],
}

impl AverageStats {
    pub fn from_trials(trials: &[TrialResult]) -> Self {
        let mut avg = Self::default();
        if trials.is_empty() {
            return avg;
        }
        for trial in trials {
            let s = &trial.state;
            avg.accesses += s.accesses as f64;
            avg.l1_data_hits += s.l1_data_hits as f64;
            avg.l1_data_misses += s.l1_data_misses as f64;
            avg.l1_inst_hits += s.l1_inst_hits as f64;
            avg.l1_inst_misses += s.l1_inst_misses as f64;
            avg.l2_hits += s.l2_hits as f64;
            avg.l2_misses += s.l2_misses as f64;
            avg.dram_accesses += s.dram_accesses as f64;
            avg.time_ns += s.time_ns;
            avg.energy_j += s.energy_j;
            avg.l1_data_energy_j += s.l1_data_energy_j;
            avg.l1_inst_energy_j += s.l1_inst_energy_j;
            avg.l2_energy_j += s.l2_energy_j;
            avg.dram_energy_j += s.dram_energy_j;
            avg.writebacks_l2 += s.writebacks_l2 as f64;
            avg.writebacks_dram += s.writebacks_dram as f64;
            avg.writeback_time_ns += s.writeback_time_ns;
            avg.writeback_energy_j += s.writeback_energy_j;
            for (sum, idle) in avg.idle_energy_j.iter_mut().zip(trial.idle_energy_j) {
                *sum += idle;
            }
        }
        let n = trials.len() as f64;
        for field in [
            &mut avg.accesses,
            &mut avg.l1_data_hits,
            &mut avg.l1_data_misses,
            &mut avg.l1_inst_hits,
            &mut avg.l1_inst_misses,
            &mut avg.l2_hits,
            &mut avg.l2_misses,
            &mut avg.dram_accesses,
            &mut avg.time_ns,
            &mut avg.energy_j,
            &mut avg.l1_data_energy_j,
            &mut avg.l1_inst_energy_j,
            &mut avg.l2_energy_j,
            &mut avg.dram_energy_j,
            &mut avg.writebacks_l2,
            &mut avg.writebacks_dram,
            &mut avg.writeback_time_ns,
            &mut avg.writeback_energy_j,
        ] {
            *field /= n;
        }
        for idle in &mut avg.idle_energy_j {
            *idle /= n;
        }
        avg
    }

    pub fn amat_ns(&self) -> f64 {
        average_access_time(self.time_ns, self.accesses)
    }
}

pub struct ScenarioResult {
    pub trace_name: String,
    pub associativity: usize,
    pub trials: Vec<TrialResult>,
    pub average: AverageStats,
}

pub const LEVELS: [Level; 3] = [Level::L1, Level::L2, Level::Dram];

pub fn trial_rng(seed: Option<u64>, trial: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(trial as u64)),
        None => StdRng::from_entropy(),
    }
}

/// Replays `trace` once against freshly built caches.
pub fn run_trial(
    trace: &TraceFile,
    config: &SimConfig,
    associativity: usize,
    rng: StdRng,
) -> Result<TrialResult> {
    let mut sim = Simulator::new(config, associativity, rng)?;
    for access in &trace.entries {
        let _ = sim.replay(access);
    }
    let idle_energy_j = LEVELS.map(|level| sim.state().idle_energy_j(sim.model(), level));
    Ok(TrialResult {
        state: sim.into_state(),
        idle_energy_j,
    })
}

/// Every trace against every configured associativity, `config.trials` times each.
pub fn run_sweep(traces: &[TraceFile], config: &SimConfig) -> Result<Vec<ScenarioResult>> {
    config.validate()?;
    let mut results = Vec::new();
    for trace in traces {
        for &associativity in &config.associativities {
            log::info!(
                "{}: {associativity}-way L2, {} trials",
                trace.name,
                config.trials
            );
            let trials = (0..config.trials)
                .map(|t| run_trial(trace, config, associativity, trial_rng(config.seed, t)))
                .collect::<Result<Vec<_>>>()?;
            let average = AverageStats::from_trials(&trials);
            log::debug!(
                "{} {associativity}-way: mean AMAT {:.3} ns",
                trace.name,
                average.amat_ns()
            );
            results.push(ScenarioResult {
                trace_name: trace.name.clone(),
                associativity,
                trials,
                average,
            });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{AccessKind, TraceAccess};
    use pretty_assertions::assert_eq;

    fn trace(entries: Vec<(AccessKind, u64)>) -> TraceFile {
        TraceFile {
            name: "synthetic".to_string(),
            entries: entries
                .into_iter()
                .map(|(kind, address)| TraceAccess { kind, address })
                .collect(),
            skipped: 0,
        }
    }

    fn strided(count: u64) -> TraceFile {
        trace(
            (0..count)
                .map(|i| {
                    let kind = match i % 3 {
                        0 => AccessKind::DataRead,
                        1 => AccessKind::DataWrite,
                        _ => AccessKind::InstructionFetch,
                    };
                    (kind, (i * 0x1040) % (1 << 21))
                })
                .collect(),
        )
    }

    #[test]
    fn empty_trace_yields_zero_counters() {
        let config = SimConfig {
            trials: 2,
            seed: Some(1),
            ..SimConfig::default()
        };
        let results = run_sweep(&[trace(vec![])], &config).unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.trials.len(), 2);
            assert_eq!(result.average.accesses, 0.0);
            assert_eq!(result.average.l1_data_hits + result.average.l2_misses, 0.0);
            assert_eq!(result.average.time_ns, 0.0);
            assert_eq!(result.average.energy_j, 0.0);
            assert!(result.average.amat_ns().is_infinite());
            assert!(result.trials[0].state.amat_ns().is_infinite());
        }
    }

    #[test]
    fn seeded_sweeps_are_reproducible() {
        let config = SimConfig {
            associativities: vec![2],
            trials: 3,
            seed: Some(42),
            ..SimConfig::default()
        };
        let traces = [strided(5000)];
        let a = run_sweep(&traces, &config).unwrap();
        let b = run_sweep(&traces, &config).unwrap();
        assert_eq!(a[0].trials, b[0].trials);
        assert_eq!(a[0].average, b[0].average);
    }

    #[test]
    fn average_is_arithmetic_mean() {
        let config = SimConfig::default();
        let t = strided(300);
        let first = run_trial(&t, &config, 4, trial_rng(Some(1), 0)).unwrap();
        let second = run_trial(&t, &config, 4, trial_rng(Some(1), 1)).unwrap();
        let avg = AverageStats::from_trials(&[first.clone(), second.clone()]);
        assert_eq!(avg.accesses, 300.0);
        assert!(
            (avg.time_ns - (first.state.time_ns + second.state.time_ns) / 2.0).abs() < 1e-6
        );
        assert!((avg.amat_ns() - avg.time_ns / 300.0).abs() < 1e-9);
    }

    #[test]
    fn write_back_counts_are_averaged() {
        let config = SimConfig::default();
        // Writes to two lines sharing an L1 slot: every access after the first evicts.
        let t = trace(vec![
            (AccessKind::DataWrite, 0x0),
            (AccessKind::DataWrite, 0x8000),
            (AccessKind::DataWrite, 0x0),
            (AccessKind::DataWrite, 0x8000),
        ]);
        let trials: Vec<_> = (0..3)
            .map(|i| run_trial(&t, &config, 4, trial_rng(Some(9), i)).unwrap())
            .collect();
        let avg = AverageStats::from_trials(&trials);
        assert_eq!(avg.writebacks_l2, 3.0);
        assert_eq!(avg.writebacks_dram, 0.0);
        assert_eq!(avg.dram_accesses, 2.0);
    }

    #[test]
    fn results_follow_trace_then_associativity_order() {
        let config = SimConfig {
            associativities: vec![8, 2],
            trials: 1,
            seed: Some(0),
            ..SimConfig::default()
        };
        let mut other = strided(10);
        other.name = "other".to_string();
        let results = run_sweep(&[strided(10), other], &config).unwrap();
        let order: Vec<(&str, usize)> = results
            .iter()
            .map(|r| (r.trace_name.as_str(), r.associativity))
            .collect();
        assert_eq!(
            order,
            vec![("synthetic", 8), ("synthetic", 2), ("other", 8), ("other", 2)]
        );
    }

    #[test]
    fn idle_energy_uses_time_not_spent_busy() {
        let config = SimConfig::default();
        let t = trace(vec![(AccessKind::DataRead, 0), (AccessKind::DataRead, 0)]);
        let result = run_trial(&t, &config, 4, trial_rng(Some(0), 0)).unwrap();
        // 56 ns elapsed: L1 busy 1 ns, L2 busy 5 ns, DRAM busy 50 ns.
        let [l1, l2, dram] = result.idle_energy_j;
        assert!((l1 - 0.5 * 55.0e-9).abs() < 1e-15);
        assert!((l2 - 0.8 * 51.0e-9).abs() < 1e-15);
        assert!((dram - 0.8 * 6.0e-9).abs() < 1e-15);
    }

    #[test]
    fn invalid_config_fails_before_running() {
        let config = SimConfig {
            associativities: vec![5],
            ..SimConfig::default()
        };
        assert!(run_sweep(&[strided(4)], &config).is_err());
    }
}
