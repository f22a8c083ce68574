//! Software breakpoints: source-line resolution, trap patching with
//! original-byte preservation, hit counting and stop decisions.

use crate::access::{ConditionEval, ProcessMemory};
use crate::symbols::{FileEntry, LineEntry};
use smallvec::SmallVec;

/// Trap instruction of the host target.
#[cfg(target_arch = "aarch64")]
pub const TRAP_INSTRUCTION: &[u8] = &[0x00, 0x00, 0x20, 0xD4]; // BRK #0
#[cfg(not(target_arch = "aarch64"))]
pub const TRAP_INSTRUCTION: &[u8] = &[0xCC]; // INT3

pub const TRAP_SIZE: usize = TRAP_INSTRUCTION.len();

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakpointError {
    #[error("no line-table entry matches the requested location")]
    NoAddressForLine,

    #[error("invalid instruction reference: {0:?}")]
    InvalidInstructionReference(String),

    #[error("no breakpoint with id {0}")]
    BreakpointNotFound(u32),

    #[error("process memory access failed at {0:#x}")]
    ProcessAccess(u64),
}

/// One software breakpoint.
#[derive(Debug, Clone, Default)]
pub struct Breakpoint {
    pub id: u32,
    pub address: u64,
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub enabled: bool,
    pub hit_count: u32,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
    pub is_temporary: bool,
    original_bytes: SmallVec<[u8; 4]>,
}

/// Extra stop rules attached at creation time.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSpec {
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
}

/// Owns the breakpoint list and assigns ids.
#[derive(Debug)]
pub struct BreakpointManager {
    breakpoints: Vec<Breakpoint>,
    next_id: u32,
}

/// How well a line entry's file matches the request. Higher wins.
fn file_match_quality(requested: &str, candidate: &str) -> u8 {
    if requested == candidate {
        return 3;
    }
    if requested.ends_with(candidate) || candidate.ends_with(requested) {
        return 2;
    }
    let base = |p: &str| p.rsplit('/').next().map(str::to_owned);
    if base(requested).is_some() && base(requested) == base(candidate) {
        return 1;
    }
    0
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self { breakpoints: Vec::new(), next_id: 1 }
    }

    /// Resolve `file:line[:column]` to an address and create a
    /// breakpoint there.
    ///
    /// Candidates are statement rows whose line is at or past the
    /// request; they are ranked by file-match quality, then closeness
    /// of the line, then closeness of the column.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &mut self,
        file: &str,
        line: u32,
        column: Option<u32>,
        line_entries: &[LineEntry],
        file_entries: &[FileEntry],
        spec: BreakpointSpec,
    ) -> Result<&Breakpoint, BreakpointError> {
        // (quality, line distance, column distance), compared lexicographically.
        let mut best: Option<(u8, u32, u32, &LineEntry)> = None;

        for entry in line_entries {
            if entry.end_sequence || !entry.is_stmt || entry.line < line {
                continue;
            }
            let Some(entry_file) = file_entries.get(entry.file_index as usize) else {
                continue;
            };
            let quality = file_match_quality(file, &entry_file.path);
            if quality == 0 {
                continue;
            }
            let line_distance = entry.line - line;
            let column_distance = match column {
                Some(col) => entry.column.abs_diff(col),
                None => 0,
            };

            let better = match &best {
                None => true,
                Some((q, ld, cd, _)) => {
                    quality > *q
                        || (quality == *q
                            && (line_distance < *ld
                                || (line_distance == *ld && column_distance < *cd)))
                }
            };
            if better {
                best = Some((quality, line_distance, column_distance, entry));
            }
            // A perfect match cannot be beaten.
            if quality == 3 && line_distance == 0 && column.is_none() {
                break;
            }
        }

        let (_, _, _, entry) = best.ok_or(BreakpointError::NoAddressForLine)?;
        let bp = Breakpoint {
            id: self.take_id(),
            address: entry.address,
            file: file.to_owned(),
            line: entry.line,
            column,
            enabled: false,
            condition: spec.condition,
            hit_condition: spec.hit_condition,
            log_message: spec.log_message,
            ..Default::default()
        };
        tracing::debug!(id = bp.id, address = bp.address, file, line, "resolved breakpoint");
        self.breakpoints.push(bp);
        Ok(self.breakpoints.last().unwrap())
    }

    /// Create a breakpoint at a raw instruction reference (a hex
    /// address, optionally `0x`-prefixed) plus a signed byte offset.
    pub fn set_instruction(
        &mut self,
        reference: &str,
        offset: Option<i64>,
    ) -> Result<&Breakpoint, BreakpointError> {
        let trimmed = reference.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let base = u64::from_str_radix(digits, 16)
            .map_err(|_| BreakpointError::InvalidInstructionReference(reference.to_owned()))?;
        let address = base.wrapping_add_signed(offset.unwrap_or(0));

        let bp = Breakpoint { id: self.take_id(), address, ..Default::default() };
        self.breakpoints.push(bp);
        Ok(self.breakpoints.last().unwrap())
    }

    /// Create a temporary breakpoint (used for step-over/step-out and
    /// run-to-cursor); swept by [BreakpointManager::cleanup_temporary].
    pub fn set_temporary(&mut self, address: u64) -> u32 {
        let bp = Breakpoint {
            id: self.take_id(),
            address,
            is_temporary: true,
            ..Default::default()
        };
        let id = bp.id;
        self.breakpoints.push(bp);
        id
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|bp| bp.id == id)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut Breakpoint> {
        self.breakpoints.iter_mut().find(|bp| bp.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    /// Breakpoint whose trap covers `address`, if any. The SIGTRAP
    /// handler uses this to map a stop back to its breakpoint.
    pub fn find_by_address(&self, address: u64) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|bp| bp.address == address)
    }

    pub fn set_enabled(&mut self, id: u32, enabled: bool) -> Result<(), BreakpointError> {
        let bp = self.get_mut(id).ok_or(BreakpointError::BreakpointNotFound(id))?;
        bp.enabled = enabled;
        Ok(())
    }

    /// Arm a breakpoint: save the original bytes, then write the trap.
    pub fn write_breakpoint(
        &mut self,
        id: u32,
        process: &mut dyn ProcessMemory,
    ) -> Result<(), BreakpointError> {
        let bp = self.get_mut(id).ok_or(BreakpointError::BreakpointNotFound(id))?;
        let mut original = [0u8; TRAP_SIZE];
        if !process.read_exact(bp.address, &mut original) {
            return Err(BreakpointError::ProcessAccess(bp.address));
        }
        // The first trap write captures the real instruction bytes;
        // re-arming must not capture our own trap.
        if bp.original_bytes.is_empty() {
            bp.original_bytes.extend_from_slice(&original);
        }
        if !process.write_all(bp.address, TRAP_INSTRUCTION) {
            return Err(BreakpointError::ProcessAccess(bp.address));
        }
        bp.enabled = true;
        tracing::debug!(id, address = bp.address, "armed breakpoint");
        Ok(())
    }

    /// Remove a breakpoint, restoring the original bytes first when a
    /// live process is attached.
    pub fn remove_breakpoint(
        &mut self,
        id: u32,
        process: Option<&mut dyn ProcessMemory>,
    ) -> Result<(), BreakpointError> {
        let index = self
            .breakpoints
            .iter()
            .position(|bp| bp.id == id)
            .ok_or(BreakpointError::BreakpointNotFound(id))?;
        let bp = &self.breakpoints[index];
        if bp.enabled && !bp.original_bytes.is_empty() {
            if let Some(process) = process {
                if !process.write_all(bp.address, &bp.original_bytes) {
                    return Err(BreakpointError::ProcessAccess(bp.address));
                }
            }
        }
        self.breakpoints.remove(index);
        Ok(())
    }

    /// Decide whether a hit should stop the debuggee. Always counts
    /// the hit; conditions are delegated to the caller's evaluator and
    /// logpoints never stop.
    pub fn should_stop(
        &mut self,
        id: u32,
        mut evaluator: Option<&mut dyn ConditionEval>,
    ) -> Result<bool, BreakpointError> {
        let bp = self.get_mut(id).ok_or(BreakpointError::BreakpointNotFound(id))?;
        bp.hit_count += 1;

        if let (Some(condition), Some(eval)) = (&bp.condition, evaluator.as_mut()) {
            if !eval.evaluate(condition) {
                return Ok(false);
            }
        }
        if let Some(hit_condition) = &bp.hit_condition {
            return Ok(eval_hit_condition(hit_condition, bp.hit_count));
        }
        if let Some(message) = &bp.log_message {
            tracing::debug!(id, message = message.as_str(), "logpoint hit");
            return Ok(false);
        }
        Ok(true)
    }

    /// Drop every temporary breakpoint that has fired, restoring its
    /// bytes.
    pub fn cleanup_temporary(&mut self, process: &mut dyn ProcessMemory) {
        let expired: Vec<u32> = self
            .breakpoints
            .iter()
            .filter(|bp| bp.is_temporary && bp.hit_count > 0)
            .map(|bp| bp.id)
            .collect();
        for id in expired {
            let _ = self.remove_breakpoint(id, Some(process));
        }
    }
}

/// Hit-condition grammar: a bare count means equality; otherwise an
/// operator from `>= > == = <= < %` followed by a count. Anything
/// unparseable stops.
fn eval_hit_condition(expr: &str, hit_count: u32) -> bool {
    let trimmed = expr.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return hit_count == n;
    }
    let operators: [(&str, fn(u32, u32) -> bool); 7] = [
        (">=", |h, n| h >= n),
        (">", |h, n| h > n),
        ("==", |h, n| h == n),
        ("=", |h, n| h == n),
        ("<=", |h, n| h <= n),
        ("<", |h, n| h < n),
        ("%", |h, n| if n > 0 { h % n == 0 } else { true }),
    ];
    for (op, apply) in operators {
        if let Some(rest) = trimmed.strip_prefix(op) {
            return match rest.trim().parse::<u32>() {
                Ok(n) => apply(hit_count, n),
                Err(_) => true,
            };
        }
    }
    true
}
