//! DWARF interpretation: call-frame information, location expressions
//! and location lists, all evaluated over raw section bytes.

use crate::access::{MemoryRead, RegisterRead};

pub mod consts;
pub mod encoding;

mod cfi;
mod expression;
mod instruction;
mod loclists;

#[cfg(test)]
pub(crate) mod test_streams;

pub use cfi::{parse_cie, CieEntry, EhFrameHeader, FdeEntry, FrameSectionKind};
pub use expression::{evaluate, EvalContext, LocationPiece, LocationResult, PieceLocation};
pub use instruction::{run, CfaRule, CfaState, ExprRef, MAX_RULE_REGISTERS};
pub use loclists::{locate_dwarf4, locate_dwarf5};

#[derive(thiserror::Error, Debug, Copy, Clone)]
pub enum DwarfError {
    #[error("unexpected end of data at offset {0:#x}")]
    UnexpectedEof(usize),

    #[error("truncated uleb128 at offset {0:#x}")]
    TruncatedUleb128(usize),

    #[error("malformed uleb128 at offset {0:#x}")]
    MalformedUleb128(usize),

    #[error("truncated sleb128 at offset {0:#x}")]
    TruncatedSleb128(usize),

    #[error("invalid pointer encoding offset bits: {0:#x}")]
    InvalidPointerEncodingOffset(u8),

    #[error("invalid pointer encoding value bits: {0:#x}")]
    InvalidPointerEncodingValue(u8),

    #[error("invalid datarel base")]
    InvalidDataRelBase,

    #[error("invalid .eh_frame_hdr version: {0}")]
    InvalidHeaderVersion(u8),

    #[error("cie zero length")]
    CieZeroLength,

    #[error("entry at offset {0:#x} is not a cie")]
    NotACie(usize),

    #[error("invalid cie version: {0}")]
    CieInvalidVersion(u8),

    #[error("fde not found")]
    FdeNotFound,

    #[error("fde is really a cie")]
    FdeIsReallyCie,

    #[error("invalid register number: {0}")]
    InvalidRegisterNumber(u64),

    #[error("invalid call frame instruction: {0:#x}")]
    InvalidInstruction(u8),

    #[error("no remembered state to restore")]
    NoRememberState,

    #[error("no way to calculate cfa")]
    NoWayToCalculateCfa,

    #[error("register {0} unavailable")]
    RegisterUnavailable(u64),

    #[error("memory at {0:#x} unavailable")]
    MemoryUnavailable(u64),

    #[error("invalid expression opcode: {0:#x}")]
    InvalidExpression(u8),

    #[error("invalid expression deref size: {0}")]
    InvalidDerefSize(u8),

    #[error("expression stack overflow")]
    StackOverflow,

    #[error("expression stack underflow")]
    StackUnderflow,

    #[error("expression branch target out of bounds")]
    BranchOutOfBounds,

    #[error("division by zero in expression")]
    DivisionByZero,

    #[error("no frame base available")]
    NoFrameBase,

    #[error("unsupported expression opcode: {0:#x}")]
    UnsupportedExpression(u8),
}

/// One resolved unwind step: where the caller's frame starts and where
/// control returns to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnwindStep {
    pub cfa: u64,
    pub return_address: u64,
}

/// Unwind one frame: find the FDE covering `target_pc` in `frame_data`,
/// execute its CFI program, and resolve the CFA and return address
/// against the supplied readers.
///
/// Returns `None` when no FDE covers the PC, the CFI program is
/// malformed, or the return-address rule is undefined (end of stack).
pub fn unwind(
    frame_data: &[u8],
    kind: FrameSectionKind,
    target_pc: u64,
    registers: &dyn RegisterRead,
    memory: &dyn MemoryRead,
) -> Option<UnwindStep> {
    match unwind_inner(frame_data, kind, target_pc, registers, memory) {
        Ok(step) => step,
        Err(err) => {
            tracing::trace!(pc = target_pc, %err, "unwind failed");
            None
        }
    }
}

fn unwind_inner(
    frame_data: &[u8],
    kind: FrameSectionKind,
    target_pc: u64,
    registers: &dyn RegisterRead,
    memory: &dyn MemoryRead,
) -> Result<Option<UnwindStep>, DwarfError> {
    let (fde, cie) = cfi::find_fde(frame_data, kind, target_pc)?;
    let state = instruction::run(frame_data, &cie, &fde, target_pc)?;

    let cfa = state.cfa(frame_data, registers, memory)?;
    let return_address = match state.rule(state.return_address_register) {
        CfaRule::Offset(off) => {
            let addr = (cfa as i64).wrapping_add(off) as u64;
            match memory.read(addr, 8) {
                Some(v) => v,
                None => return Err(DwarfError::MemoryUnavailable(addr)),
            }
        }
        CfaRule::ValOffset(off) => (cfa as i64).wrapping_add(off) as u64,
        CfaRule::Register(r) => registers
            .register(r)
            .ok_or(DwarfError::RegisterUnavailable(r))?,
        CfaRule::SameValue => registers
            .register(state.return_address_register)
            .ok_or(DwarfError::RegisterUnavailable(state.return_address_register))?,
        CfaRule::Expression(range) => {
            let addr = state.eval_rule_expression(frame_data, range, cfa, registers, memory)?;
            match memory.read(addr, 8) {
                Some(v) => v,
                None => return Err(DwarfError::MemoryUnavailable(addr)),
            }
        }
        CfaRule::ValExpression(range) => {
            state.eval_rule_expression(frame_data, range, cfa, registers, memory)?
        }
        // An undefined return address means the walk is over.
        CfaRule::Undefined => return Ok(None),
    };

    Ok(Some(UnwindStep { cfa, return_address }))
}
