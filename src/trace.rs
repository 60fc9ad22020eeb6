use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    DataRead,
    DataWrite,
    InstructionFetch,
}

impl AccessKind {
    /// Maps a dinero op code; `None` for records that carry no memory access.
    fn from_op_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AccessKind::DataRead),
            1 => Some(AccessKind::DataWrite),
            2 => Some(AccessKind::InstructionFetch),
            _ => None,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, AccessKind::DataWrite)
    }

    pub fn is_instruction(self) -> bool {
        matches!(self, AccessKind::InstructionFetch)
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::DataRead => write!(f, "R"),
            AccessKind::DataWrite => write!(f, "W"),
            AccessKind::InstructionFetch => write!(f, "I"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceAccess {
    pub kind: AccessKind,
    pub address: u64,
}

#[derive(Debug, Clone)]
pub struct TraceFile {
    pub name: String,
    pub entries: Vec<TraceAccess>,
    pub skipped: usize,
}

// Dinero escape and cache-flush records.
const DIN_ESCAPE: u8 = 3;
const DIN_FLUSH: u8 = 4;

impl TraceFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SimError::io(path, e))?;
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let trace = Self::parse(name, BufReader::new(file)).map_err(|e| match e {
            SimError::Io { source, .. } => SimError::io(path, source),
            other => other,
        })?;
        log::debug!(
            "loaded {} accesses from {} ({} lines skipped)",
            trace.entries.len(),
            path.display(),
            trace.skipped
        );
        Ok(trace)
    }

    pub fn parse(name: impl Into<String>, reader: impl BufRead) -> Result<Self> {
        let name = name.into();
        let mut entries = Vec::new();
        let mut skipped = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| SimError::io(&name, e))?;
            let mut parts = line.split_whitespace();
            let (Some(op), Some(addr)) = (parts.next(), parts.next()) else {
                skipped += 1;
                continue;
            };
            let code: u8 = op
                .parse()
                .map_err(|_| SimError::malformed(idx + 1, format!("invalid op code '{op}'")))?;
            let Some(kind) = AccessKind::from_op_code(code) else {
                if code == DIN_ESCAPE || code == DIN_FLUSH {
                    skipped += 1;
                    continue;
                }
                return Err(SimError::malformed(
                    idx + 1,
                    format!("unknown op code {code}"),
                ));
            };
            let address = parse_address(addr).ok_or_else(|| {
                SimError::malformed(idx + 1, format!("invalid address literal '{addr}'"))
            })?;
            entries.push(TraceAccess { kind, address });
        }
        Ok(Self {
            name,
            entries,
            skipped,
        })
    }
}

/// Hexadecimal, with or without a `0x` prefix.
fn parse_address(token: &str) -> Option<u64> {
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(hex, 16).ok()
}
