use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

const KIB: u64 = 1024;

/// Geometry, timing and power parameters of the two-level hierarchy plus the
/// sweep settings consumed by the experiment driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub line_size: u64,    // in Bytes
    pub l1_data_size: u64, // in Bytes, also the unified L1 size
    pub l1_inst_size: u64, // in Bytes
    pub l2_size: u64,      // in Bytes
    pub dram_size: u64,    // in Bytes, never indexed

    pub l1_latency_ns: f64,
    pub l2_latency_ns: f64,
    pub dram_latency_ns: f64,

    pub l1_power_idle_w: f64,
    pub l1_power_rw_w: f64,
    pub l2_power_idle_w: f64,
    pub l2_power_rw_w: f64,
    pub dram_power_idle_w: f64,
    pub dram_power_rw_w: f64,

    pub l2_transfer_penalty_pj: f64,
    pub dram_transfer_penalty_pj: f64,

    pub associativities: Vec<usize>,
    pub trials: usize,
    /// Separate instruction and data L1 arrays instead of one unified array.
    pub split_l1: bool,
    /// Queue evicted lines of write accesses for the next level.
    pub write_back: bool,
    /// Charge the L2 transfer penalty on a DRAM miss as well as on an L2 hit.
    pub dram_miss_l2_penalty: bool,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            line_size: 64,
            l1_data_size: 32 * KIB,
            l1_inst_size: 32 * KIB,
            l2_size: 256 * KIB,
            dram_size: 8 * KIB * KIB * KIB,
            l1_latency_ns: 0.5,
            l2_latency_ns: 5.0,
            dram_latency_ns: 50.0,
            l1_power_idle_w: 0.5,
            l1_power_rw_w: 1.0,
            l2_power_idle_w: 0.8,
            l2_power_rw_w: 2.0,
            dram_power_idle_w: 0.8,
            dram_power_rw_w: 4.0,
            l2_transfer_penalty_pj: 5.0,
            dram_transfer_penalty_pj: 640.0,
            associativities: vec![2, 4, 8],
            trials: 10,
            split_l1: true,
            write_back: true,
            dram_miss_l2_penalty: true,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| SimError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.line_size == 0 || !self.line_size.is_power_of_two() {
            return Err(SimError::InvalidConfig(format!(
                "line size {} must be a non-zero power of two",
                self.line_size
            )));
        }
        let l1_sizes = if self.split_l1 {
            vec![("L1 data", self.l1_data_size), ("L1 inst", self.l1_inst_size)]
        } else {
            vec![("L1", self.l1_data_size)]
        };
        for (name, size) in l1_sizes {
            if size < self.line_size || size % self.line_size != 0 {
                return Err(SimError::InvalidConfig(format!(
                    "{name} size {size} is not a whole number of {}-byte lines",
                    self.line_size
                )));
            }
        }
        if self.associativities.is_empty() {
            return Err(SimError::InvalidConfig(
                "at least one L2 associativity is required".to_string(),
            ));
        }
        for &ways in &self.associativities {
            self.l2_set_count(ways)?;
        }
        if self.trials == 0 {
            return Err(SimError::InvalidConfig("trial count must be non-zero".to_string()));
        }
        let timings = [
            self.l1_latency_ns,
            self.l2_latency_ns,
            self.dram_latency_ns,
            self.l1_power_idle_w,
            self.l1_power_rw_w,
            self.l2_power_idle_w,
            self.l2_power_rw_w,
            self.dram_power_idle_w,
            self.dram_power_rw_w,
            self.l2_transfer_penalty_pj,
            self.dram_transfer_penalty_pj,
        ];
        if timings.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SimError::InvalidConfig(
                "latencies, powers and penalties must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn l1_line_count(&self, instruction: bool) -> usize {
        let size = if instruction && self.split_l1 {
            self.l1_inst_size
        } else {
            self.l1_data_size
        };
        (size / self.line_size) as usize
    }

    pub fn l2_set_count(&self, ways: usize) -> Result<usize> {
        let set_bytes = (ways as u64).checked_mul(self.line_size).unwrap_or(0);
        if set_bytes == 0 || set_bytes > self.l2_size || self.l2_size % set_bytes != 0 {
            return Err(SimError::InvalidConfig(format!(
                "L2 size {} cannot be divided into {ways}-way sets of {}-byte lines",
                self.l2_size, self.line_size
            )));
        }
        Ok((self.l2_size / set_bytes) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_geometry() {
        let cfg = SimConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.l1_line_count(false), 512);
        assert_eq!(cfg.l1_line_count(true), 512);
        assert_eq!(cfg.l2_set_count(2).unwrap(), 2048);
        assert_eq!(cfg.l2_set_count(4).unwrap(), 1024);
        assert_eq!(cfg.l2_set_count(8).unwrap(), 512);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: SimConfig = toml::from_str(
            r#"
            associativities = [16]
            trials = 3
            split_l1 = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.associativities, vec![16]);
        assert_eq!(cfg.trials, 3);
        assert!(!cfg.split_l1);
        assert_eq!(cfg.line_size, 64);
        assert_eq!(cfg.dram_transfer_penalty_pj, 640.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<SimConfig>("line_sz = 32").is_err());
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let mut cfg = SimConfig::default();
        cfg.line_size = 48;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));

        let mut cfg = SimConfig::default();
        cfg.associativities = vec![3];
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.associativities = vec![0];
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.associativities = vec![usize::MAX];
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));

        let mut cfg = SimConfig::default();
        cfg.trials = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.l2_latency_ns = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unified_l1_ignores_instruction_size() {
        let mut cfg = SimConfig::default();
        cfg.split_l1 = false;
        cfg.l1_inst_size = 0;
        cfg.validate().unwrap();
        assert_eq!(cfg.l1_line_count(true), 512);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let cfg = SimConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/sim.toml")).unwrap();
        assert_eq!(cfg, SimConfig::default());
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        fs::write(&path, "trials = 2\nseed = 7\n").unwrap();
        let cfg = SimConfig::load(&path).unwrap();
        assert_eq!(cfg.trials, 2);
        assert_eq!(cfg.seed, Some(7));

        let missing = SimConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(SimError::Io { .. })));
    }
}
