use std::{
    fmt,
    io::{self, Write},
};

use crate::experiments::{AverageStats, LEVELS, ScenarioResult, TrialResult};

/// One-line summary per (trace, associativity) pair.
impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let avg = &self.average;
        let l1_accesses = avg.l1_data_hits + avg.l1_data_misses + avg.l1_inst_hits + avg.l1_inst_misses;
        let l1_hit_rate = ratio(avg.l1_data_hits + avg.l1_inst_hits, l1_accesses);
        let l2_hit_rate = ratio(avg.l2_hits, avg.l2_hits + avg.l2_misses);
        write!(
            f,
            "{:<22} {}-way  L1 hit {:>6.2}%  L2 hit {:>6.2}%  energy {:.6e} J  AMAT {:.4} ns",
            self.trace_name,
            self.associativity,
            l1_hit_rate * 100.0,
            l2_hit_rate * 100.0,
            avg.energy_j,
            avg.amat_ns()
        )
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part / whole }
}

pub fn write_trial(out: &mut impl Write, trial: &TrialResult) -> io::Result<()> {
    let s = &trial.state;
    writeln!(out, "L1 Data Cache Hits: {}, Misses: {}", s.l1_data_hits, s.l1_data_misses)?;
    writeln!(out, "L1 Inst Cache Hits: {}, Misses: {}", s.l1_inst_hits, s.l1_inst_misses)?;
    writeln!(out, "L1 Total Hits: {}, Misses: {}", s.l1_hits(), s.l1_misses())?;
    writeln!(out, "L2 Cache Hits: {}, Misses: {}", s.l2_hits, s.l2_misses)?;
    writeln!(out, "DRAM Accesses: {}", s.dram_accesses)?;
    writeln!(
        out,
        "L1 Data Energy: {} J, L1 Inst Energy: {} J",
        s.l1_data_energy_j, s.l1_inst_energy_j
    )?;
    writeln!(out, "L2 Energy: {} J, DRAM Energy: {} J", s.l2_energy_j, s.dram_energy_j)?;
    writeln!(out, "Total Energy: {} J", s.energy_j)?;
    write_idle(out, "", &trial.idle_energy_j)?;
    writeln!(
        out,
        "Write-backs L2: {}, DRAM: {} ({} ns, {} J)",
        s.writebacks_l2, s.writebacks_dram, s.writeback_time_ns, s.writeback_energy_j
    )?;
    writeln!(out, "Average Memory Access Time: {} ns", s.amat_ns())?;
    writeln!(out, "Total Time: {} ns", s.time_ns)?;
    writeln!(out)
}

fn write_idle(out: &mut impl Write, prefix: &str, idle: &[f64; 3]) -> io::Result<()> {
    let parts: Vec<String> = LEVELS
        .iter()
        .zip(idle)
        .map(|(level, joules)| format!("{level} {joules} J"))
        .collect();
    writeln!(out, "{prefix}Idle Energy: {}", parts.join(", "))
}

pub fn write_average(out: &mut impl Write, result: &ScenarioResult) -> io::Result<()> {
    let avg: &AverageStats = &result.average;
    writeln!(
        out,
        "File: {}, Set Associativity: {}",
        result.trace_name, result.associativity
    )?;
    writeln!(
        out,
        "Average L1 Data Hits: {}, Misses: {}",
        avg.l1_data_hits, avg.l1_data_misses
    )?;
    writeln!(
        out,
        "Average L1 Inst Hits: {}, Misses: {}",
        avg.l1_inst_hits, avg.l1_inst_misses
    )?;
    writeln!(out, "Average L2 Hits: {}, Misses: {}", avg.l2_hits, avg.l2_misses)?;
    writeln!(out, "Average DRAM Accesses: {}", avg.dram_accesses)?;
    writeln!(out, "Average L1 Data Energy: {} J", avg.l1_data_energy_j)?;
    writeln!(out, "Average L1 Inst Energy: {} J", avg.l1_inst_energy_j)?;
    writeln!(out, "Average L2 Energy: {} J", avg.l2_energy_j)?;
    writeln!(out, "Average DRAM Energy: {} J", avg.dram_energy_j)?;
    writeln!(out, "Average Total Energy: {} J", avg.energy_j)?;
    write_idle(out, "Average ", &avg.idle_energy_j)?;
    writeln!(
        out,
        "Average Write-backs L2: {}, DRAM: {} ({} ns, {} J)",
        avg.writebacks_l2, avg.writebacks_dram, avg.writeback_time_ns, avg.writeback_energy_j
    )?;
    writeln!(out, "Average Memory Access Time: {} ns", avg.amat_ns())?;
    writeln!(out, "Average Simulation Time: {} ns", avg.time_ns)?;
    writeln!(out)
}

/// Per-trial blocks (unless `summary_only`) followed by the averages, grouped
/// by trace file the way the sweep produced them.
pub fn write_report(
    out: &mut impl Write,
    results: &[ScenarioResult],
    summary_only: bool,
) -> io::Result<()> {
    let mut current_trace: Option<&str> = None;
    for result in results {
        if current_trace != Some(result.trace_name.as_str()) {
            writeln!(out, "File: {}", result.trace_name)?;
            current_trace = Some(&result.trace_name);
        }
        writeln!(out, "Set Associativity: {}", result.associativity)?;
        if !summary_only {
            for (run, trial) in result.trials.iter().enumerate() {
                writeln!(out, "Run {}", run + 1)?;
                write_trial(out, trial)?;
            }
        }
        write_average(out, result)?;
    }
    Ok(())
}
