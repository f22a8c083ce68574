use crate::access::{MemoryRead, RegisterRead};
use crate::dwarf::cfi::{CieEntry, FdeEntry};
use crate::dwarf::consts::*;
use crate::dwarf::encoding::*;
use crate::dwarf::{expression, DwarfError};
use smallvec::SmallVec;

/// Size of the register-rule map. DWARF register numbers above this are
/// rejected as malformed.
pub const MAX_RULE_REGISTERS: usize = 128;

/// A byte range of an expression inside the frame section.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExprRef {
    pub start: usize,
    pub end: usize,
}

/// How to recover one register of the caller's frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum CfaRule {
    #[default]
    Undefined,
    SameValue,
    /// Saved in memory at `CFA + offset`.
    Offset(i64),
    /// The value itself is `CFA + offset`.
    ValOffset(i64),
    /// Saved in another register.
    Register(u64),
    /// Saved in memory at the address the expression computes.
    Expression(ExprRef),
    /// The value itself is what the expression computes.
    ValExpression(ExprRef),
}

/// The register-recovery row produced by running a CFI program to a
/// target PC.
#[derive(Debug, Copy, Clone)]
pub struct CfaState {
    pub cfa_register: u64,
    pub cfa_offset: i64,
    pub cfa_expression: Option<ExprRef>,
    pub return_address_register: u64,
    cfa_defined: bool,
    rules: [CfaRule; MAX_RULE_REGISTERS],
}

impl CfaState {
    fn new(return_address_register: u64) -> Self {
        Self {
            cfa_register: 0,
            cfa_offset: 0,
            cfa_expression: None,
            return_address_register,
            cfa_defined: false,
            rules: [CfaRule::Undefined; MAX_RULE_REGISTERS],
        }
    }

    /// Rule for a DWARF register number; out-of-range numbers read as
    /// undefined.
    #[inline]
    pub fn rule(&self, reg: u64) -> CfaRule {
        self.rules
            .get(reg as usize)
            .copied()
            .unwrap_or(CfaRule::Undefined)
    }

    fn set_rule(&mut self, reg: u64, rule: CfaRule) -> Result<(), DwarfError> {
        let slot = self
            .rules
            .get_mut(reg as usize)
            .ok_or(DwarfError::InvalidRegisterNumber(reg))?;
        *slot = rule;
        Ok(())
    }

    /// Compute the CFA for this row against live registers.
    pub fn cfa(
        &self,
        data: &[u8],
        registers: &dyn RegisterRead,
        memory: &dyn MemoryRead,
    ) -> Result<u64, DwarfError> {
        if let Some(expr) = self.cfa_expression {
            let bytes = expr_bytes(data, expr)?;
            // The common `DW_OP_bregN off` idiom short-circuits the
            // full evaluator.
            if let Some(v) = breg_shortcut(bytes, registers)? {
                return Ok(v);
            }
            return eval_to_u64(bytes, registers, memory, None);
        }
        if self.cfa_defined {
            let base = registers
                .register(self.cfa_register)
                .ok_or(DwarfError::RegisterUnavailable(self.cfa_register))?;
            return Ok((base as i64).wrapping_add(self.cfa_offset) as u64);
        }
        Err(DwarfError::NoWayToCalculateCfa)
    }

    /// Evaluate a rule expression to a 64-bit result with the CFA on
    /// the initial stack.
    pub(crate) fn eval_rule_expression(
        &self,
        data: &[u8],
        expr: ExprRef,
        cfa: u64,
        registers: &dyn RegisterRead,
        memory: &dyn MemoryRead,
    ) -> Result<u64, DwarfError> {
        eval_to_u64(expr_bytes(data, expr)?, registers, memory, Some(cfa))
    }
}

fn expr_bytes(data: &[u8], expr: ExprRef) -> Result<&[u8], DwarfError> {
    data.get(expr.start..expr.end)
        .ok_or(DwarfError::UnexpectedEof(expr.start))
}

/// Recognise `[DW_OP_bregN sleb]` / `[DW_OP_bregx uleb sleb]` and
/// compute it directly.
fn breg_shortcut(
    bytes: &[u8],
    registers: &dyn RegisterRead,
) -> Result<Option<u64>, DwarfError> {
    let mut loc = 0usize;
    let Some(&op) = bytes.first() else {
        return Ok(None);
    };
    let reg = match op {
        DW_OP_BREG0..=DW_OP_BREG31 => {
            loc = 1;
            (op - DW_OP_BREG0) as u64
        }
        DW_OP_BREGX => {
            loc = 1;
            decode_uleb128(bytes, &mut loc, bytes.len())?
        }
        _ => return Ok(None),
    };
    let offset = decode_sleb128(bytes, &mut loc, bytes.len())?;
    if loc != bytes.len() {
        return Ok(None);
    }
    let base = registers
        .register(reg)
        .ok_or(DwarfError::RegisterUnavailable(reg))?;
    Ok(Some((base as i64).wrapping_add(offset) as u64))
}

fn eval_to_u64(
    bytes: &[u8],
    registers: &dyn RegisterRead,
    memory: &dyn MemoryRead,
    cfa: Option<u64>,
) -> Result<u64, DwarfError> {
    let mut ctx = expression::EvalContext::new(registers);
    ctx.memory = Some(memory);
    ctx.cfa = cfa;
    match expression::evaluate_inner(bytes, &ctx)? {
        expression::LocationResult::Address(v) | expression::LocationResult::Value(v) => Ok(v),
        expression::LocationResult::Register(r) => registers
            .register(r)
            .ok_or(DwarfError::RegisterUnavailable(r)),
        _ => Err(DwarfError::NoWayToCalculateCfa),
    }
}

/// Run the CIE's initial instructions, then the FDE's program up to
/// `target_pc`, and return the resulting row.
pub fn run(
    data: &[u8],
    cie: &CieEntry,
    fde: &FdeEntry,
    target_pc: u64,
) -> Result<CfaState, DwarfError> {
    let mut state = CfaState::new(cie.return_address_register);
    execute(
        data,
        &mut state,
        cie,
        cie.initial_instructions.clone(),
        0,
        u64::MAX,
        None,
    )?;
    let initial = state;
    execute(
        data,
        &mut state,
        cie,
        fde.instructions.clone(),
        fde.initial_location,
        target_pc.wrapping_sub(fde.initial_location),
        Some(&initial),
    )?;
    Ok(state)
}

/// Interpret one instruction stream. `pc_offset` is the highest code
/// offset whose row we still want; an advance past it ends the run with
/// the previous row active. `initial` is the post-CIE snapshot that
/// DW_CFA_restore consults; during the CIE itself restore resets to
/// undefined.
fn execute(
    data: &[u8],
    state: &mut CfaState,
    cie: &CieEntry,
    range: std::ops::Range<usize>,
    pc_base: u64,
    pc_offset: u64,
    initial: Option<&CfaState>,
) -> Result<(), DwarfError> {
    let mut loc = range.start;
    let end = range.end.min(data.len());
    let mut code_offset = 0u64;
    let mut remembered: SmallVec<[CfaState; 8]> = SmallVec::new();

    let restore_rule = |reg: u64| -> CfaRule {
        match initial {
            Some(snapshot) => snapshot.rule(reg),
            None => CfaRule::Undefined,
        }
    };

    // See DWARF 5 section 6.4.2 for the instruction set.
    while loc < end {
        let opcode = read_u8(data, &mut loc)?;
        match opcode {
            DW_CFA_NOP => {}
            DW_CFA_SET_LOC => {
                let addr =
                    decode_pointer(data, &mut loc, end, cie.fde_pointer_encoding, 0, 0)?;
                let new_offset = addr.wrapping_sub(pc_base);
                if new_offset > pc_offset {
                    break;
                }
                code_offset = new_offset;
            }
            DW_CFA_ADVANCE_LOC1 => {
                code_offset =
                    code_offset.wrapping_add(read_u8(data, &mut loc)? as u64 * cie.code_alignment);
                if code_offset > pc_offset {
                    break;
                }
            }
            DW_CFA_ADVANCE_LOC2 => {
                code_offset = code_offset
                    .wrapping_add(read_u16(data, &mut loc)? as u64 * cie.code_alignment);
                if code_offset > pc_offset {
                    break;
                }
            }
            DW_CFA_ADVANCE_LOC4 => {
                code_offset = code_offset
                    .wrapping_add(read_u32(data, &mut loc)? as u64 * cie.code_alignment);
                if code_offset > pc_offset {
                    break;
                }
            }
            DW_CFA_OFFSET_EXTENDED => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let offset = decode_uleb128(data, &mut loc, end)? as i64 * cie.data_alignment;
                state.set_rule(reg, CfaRule::Offset(offset))?;
            }
            DW_CFA_OFFSET_EXTENDED_SF => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let offset = decode_sleb128(data, &mut loc, end)? * cie.data_alignment;
                state.set_rule(reg, CfaRule::Offset(offset))?;
            }
            DW_CFA_RESTORE_EXTENDED => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                state.set_rule(reg, restore_rule(reg))?;
            }
            DW_CFA_UNDEFINED => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                state.set_rule(reg, CfaRule::Undefined)?;
            }
            DW_CFA_SAME_VALUE => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                state.set_rule(reg, CfaRule::SameValue)?;
            }
            DW_CFA_REGISTER => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let other = decode_uleb128(data, &mut loc, end)?;
                state.set_rule(reg, CfaRule::Register(other))?;
            }
            DW_CFA_REMEMBER_STATE => {
                remembered.push(*state);
            }
            DW_CFA_RESTORE_STATE => {
                *state = remembered.pop().ok_or(DwarfError::NoRememberState)?;
            }
            DW_CFA_DEF_CFA => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                if reg as usize >= MAX_RULE_REGISTERS {
                    return Err(DwarfError::InvalidRegisterNumber(reg));
                }
                state.cfa_register = reg;
                state.cfa_offset = decode_uleb128(data, &mut loc, end)? as i64;
                state.cfa_expression = None;
                state.cfa_defined = true;
            }
            DW_CFA_DEF_CFA_SF => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                if reg as usize >= MAX_RULE_REGISTERS {
                    return Err(DwarfError::InvalidRegisterNumber(reg));
                }
                state.cfa_register = reg;
                state.cfa_offset = decode_sleb128(data, &mut loc, end)? * cie.data_alignment;
                state.cfa_expression = None;
                state.cfa_defined = true;
            }
            DW_CFA_DEF_CFA_REGISTER => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                if reg as usize >= MAX_RULE_REGISTERS {
                    return Err(DwarfError::InvalidRegisterNumber(reg));
                }
                state.cfa_register = reg;
                state.cfa_expression = None;
                state.cfa_defined = true;
            }
            DW_CFA_DEF_CFA_OFFSET => {
                state.cfa_offset = decode_uleb128(data, &mut loc, end)? as i64;
                state.cfa_expression = None;
            }
            DW_CFA_DEF_CFA_OFFSET_SF => {
                state.cfa_offset = decode_sleb128(data, &mut loc, end)? * cie.data_alignment;
                state.cfa_expression = None;
            }
            DW_CFA_DEF_CFA_EXPRESSION => {
                let len = decode_uleb128(data, &mut loc, end)? as usize;
                let expr_end = loc
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                state.cfa_expression = Some(ExprRef { start: loc, end: expr_end });
                state.cfa_defined = false;
                loc = expr_end;
            }
            DW_CFA_EXPRESSION => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let len = decode_uleb128(data, &mut loc, end)? as usize;
                let expr_end = loc
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                state.set_rule(reg, CfaRule::Expression(ExprRef { start: loc, end: expr_end }))?;
                loc = expr_end;
            }
            DW_CFA_VAL_EXPRESSION => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let len = decode_uleb128(data, &mut loc, end)? as usize;
                let expr_end = loc
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                state
                    .set_rule(reg, CfaRule::ValExpression(ExprRef { start: loc, end: expr_end }))?;
                loc = expr_end;
            }
            DW_CFA_VAL_OFFSET => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let offset = decode_uleb128(data, &mut loc, end)? as i64 * cie.data_alignment;
                state.set_rule(reg, CfaRule::ValOffset(offset))?;
            }
            DW_CFA_VAL_OFFSET_SF => {
                let reg = decode_uleb128(data, &mut loc, end)?;
                let offset = decode_sleb128(data, &mut loc, end)? * cie.data_alignment;
                state.set_rule(reg, CfaRule::ValOffset(offset))?;
            }
            DW_CFA_GNU_ARGS_SIZE => {
                // Informational only.
                let _ = decode_uleb128(data, &mut loc, end)?;
            }
            _ => {
                let operand = (opcode & 0b11_1111) as u64;
                match opcode & 0b1100_0000 {
                    DW_CFA_ADVANCE_LOC => {
                        code_offset = code_offset.wrapping_add(operand * cie.code_alignment);
                        if code_offset > pc_offset {
                            break;
                        }
                    }
                    DW_CFA_OFFSET => {
                        let offset =
                            decode_uleb128(data, &mut loc, end)? as i64 * cie.data_alignment;
                        state.set_rule(operand, CfaRule::Offset(offset))?;
                    }
                    DW_CFA_RESTORE => {
                        state.set_rule(operand, restore_rule(operand))?;
                    }
                    _ => return Err(DwarfError::InvalidInstruction(opcode)),
                }
            }
        }
    }
    Ok(())
}
