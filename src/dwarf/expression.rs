use crate::access::{DieLocationLookup, MemoryRead, RegisterRead};
use crate::dwarf::consts::*;
use crate::dwarf::encoding::*;
use crate::dwarf::DwarfError;
use crate::registers::FRAME_POINTER;
use smallvec::SmallVec;

const STACK_SIZE: usize = 64;
const MAX_PIECES: usize = 16;

/// Where a variable (or one piece of it) lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationResult {
    /// The expression produced nothing.
    Empty,
    /// The value lives in memory at this address.
    Address(u64),
    /// The value lives in this DWARF register.
    Register(u64),
    /// This literal is the value itself.
    Value(u64),
    /// The value was optimized into a pointee known only to the
    /// producer; `die_offset` names the DIE describing it.
    ImplicitPointer { die_offset: u64, byte_offset: i64 },
    /// The value is scattered across several locations.
    Composite(SmallVec<[LocationPiece; MAX_PIECES]>),
}

/// Location of a single composite fragment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PieceLocation {
    Empty,
    Address(u64),
    Register(u64),
    Value(u64),
}

/// One fragment of a composite location.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocationPiece {
    pub location: PieceLocation,
    pub size_bits: u64,
    pub bit_offset: u64,
}

/// Everything an expression may consult while it runs. Only the
/// register reader is mandatory; every other input is optional and its
/// absence fails exactly the opcodes that need it.
pub struct EvalContext<'a> {
    pub registers: &'a dyn RegisterRead,
    pub memory: Option<&'a dyn MemoryRead>,
    /// Register values at function entry, for DW_OP_entry_value.
    pub entry_registers: Option<&'a dyn RegisterRead>,
    /// Result of evaluating DW_AT_frame_base, if the caller has one.
    pub frame_base: Option<u64>,
    /// CFA captured from the unwind interpreter, if the caller has one.
    pub cfa: Option<u64>,
    /// DIE lookup behind DW_OP_call2/call4/call_ref.
    pub die_lookup: Option<&'a dyn DieLocationLookup>,
    /// Raw `.debug_addr` contents for DW_OP_addrx/constx.
    pub debug_addr: Option<&'a [u8]>,
    pub addr_base: u64,
    /// DWARF-64 offsets (8-byte DIE references) in this unit.
    pub dwarf64: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(registers: &'a dyn RegisterRead) -> Self {
        Self {
            registers,
            memory: None,
            entry_registers: None,
            frame_base: None,
            cfa: None,
            die_lookup: None,
            debug_addr: None,
            addr_base: 0,
            dwarf64: false,
        }
    }
}

/// Evaluate a DWARF location expression.
///
/// Malformed programs, unknown opcodes and missing context inputs all
/// collapse to [LocationResult::Empty]; the evaluator never guesses.
pub fn evaluate(expression: &[u8], ctx: &EvalContext) -> LocationResult {
    match evaluate_inner(expression, ctx) {
        Ok(result) => result,
        Err(err) => {
            tracing::trace!(%err, "location expression failed");
            LocationResult::Empty
        }
    }
}

/// Fixed-size operand stack.
struct EvalStack {
    len: usize,
    slots: [u64; STACK_SIZE],
}

impl EvalStack {
    fn new() -> Self {
        Self { len: 0, slots: [0; STACK_SIZE] }
    }

    #[inline]
    fn push(&mut self, v: u64) -> Result<(), DwarfError> {
        if self.len == STACK_SIZE {
            return Err(DwarfError::StackOverflow);
        }
        self.slots[self.len] = v;
        self.len += 1;
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Result<u64, DwarfError> {
        if self.len == 0 {
            return Err(DwarfError::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.slots[self.len])
    }

    #[inline]
    fn top(&self, n: usize) -> Result<u64, DwarfError> {
        if n >= self.len {
            return Err(DwarfError::StackUnderflow);
        }
        Ok(self.slots[self.len - 1 - n])
    }

    #[inline]
    fn top_mut(&mut self, n: usize) -> Result<&mut u64, DwarfError> {
        if n >= self.len {
            return Err(DwarfError::StackUnderflow);
        }
        Ok(&mut self.slots[self.len - 1 - n])
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub(crate) fn evaluate_inner(
    expression: &[u8],
    ctx: &EvalContext,
) -> Result<LocationResult, DwarfError> {
    let end = expression.len();
    let mut loc = 0usize;
    let mut stack = EvalStack::new();
    // reg0..reg31/regx name a register as the result without touching
    // the stack; the choice between "register location" and "one
    // composite piece" is made by what follows.
    let mut pending_register: Option<u64> = None;
    let mut pieces: SmallVec<[LocationPiece; MAX_PIECES]> = SmallVec::new();

    while loc < end {
        let opcode = read_u8(expression, &mut loc)?;
        match opcode {
            DW_OP_ADDR => {
                let v = read_u64(expression, &mut loc)?;
                stack.push(v)?;
            }
            DW_OP_DEREF => {
                let addr = stack.pop()?;
                match ctx.memory {
                    Some(memory) => {
                        let v = memory.read(addr, 8).ok_or(DwarfError::MemoryUnavailable(addr))?;
                        stack.push(v)?;
                    }
                    // No reader: hand the address back for the caller
                    // to dereference.
                    None => return Ok(LocationResult::Address(addr)),
                }
            }
            DW_OP_DEREF_SIZE => {
                let size = read_u8(expression, &mut loc)?;
                if size == 0 || size > 8 {
                    return Err(DwarfError::InvalidDerefSize(size));
                }
                let addr = stack.pop()?;
                match ctx.memory {
                    Some(memory) => {
                        let v = memory
                            .read(addr, size as usize)
                            .ok_or(DwarfError::MemoryUnavailable(addr))?;
                        stack.push(v)?;
                    }
                    None => return Ok(LocationResult::Address(addr)),
                }
            }
            DW_OP_XDEREF | DW_OP_XDEREF_SIZE => {
                let size = if opcode == DW_OP_XDEREF_SIZE {
                    let s = read_u8(expression, &mut loc)?;
                    if s == 0 || s > 8 {
                        return Err(DwarfError::InvalidDerefSize(s));
                    }
                    s as usize
                } else {
                    8
                };
                let addr = stack.pop()?;
                let _address_space = stack.pop()?;
                match ctx.memory {
                    Some(memory) => {
                        let v = memory
                            .read(addr, size)
                            .ok_or(DwarfError::MemoryUnavailable(addr))?;
                        stack.push(v)?;
                    }
                    None => return Ok(LocationResult::Address(addr)),
                }
            }
            DW_OP_CONST1U => {
                let v = read_u8(expression, &mut loc)? as u64;
                stack.push(v)?;
            }
            DW_OP_CONST1S => {
                let v = read_u8(expression, &mut loc)? as i8 as i64;
                stack.push(v as u64)?;
            }
            DW_OP_CONST2U => {
                let v = read_u16(expression, &mut loc)? as u64;
                stack.push(v)?;
            }
            DW_OP_CONST2S => {
                let v = read_u16(expression, &mut loc)? as i16 as i64;
                stack.push(v as u64)?;
            }
            DW_OP_CONST4U => {
                let v = read_u32(expression, &mut loc)? as u64;
                stack.push(v)?;
            }
            DW_OP_CONST4S => {
                let v = read_u32(expression, &mut loc)? as i32 as i64;
                stack.push(v as u64)?;
            }
            DW_OP_CONST8U => {
                let v = read_u64(expression, &mut loc)?;
                stack.push(v)?;
            }
            DW_OP_CONST8S => {
                let v = read_u64(expression, &mut loc)?;
                stack.push(v)?;
            }
            DW_OP_CONSTU => {
                let v = decode_uleb128(expression, &mut loc, end)?;
                stack.push(v)?;
            }
            DW_OP_CONSTS => {
                let v = decode_sleb128(expression, &mut loc, end)?;
                stack.push(v as u64)?;
            }
            DW_OP_CONST_TYPE => {
                let _type_die = decode_uleb128(expression, &mut loc, end)?;
                let size = read_u8(expression, &mut loc)? as usize;
                let value_end = loc
                    .checked_add(size)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                let mut v = 0u64;
                for (i, &b) in expression[loc..value_end].iter().take(8).enumerate() {
                    v |= (b as u64) << (i * 8);
                }
                loc = value_end;
                stack.push(v)?;
            }
            DW_OP_DUP => {
                let v = stack.top(0)?;
                stack.push(v)?;
            }
            DW_OP_DROP => {
                stack.pop()?;
            }
            DW_OP_OVER => {
                let v = stack.top(1)?;
                stack.push(v)?;
            }
            DW_OP_PICK => {
                let n = read_u8(expression, &mut loc)? as usize;
                let v = stack.top(n)?;
                stack.push(v)?;
            }
            DW_OP_SWAP => {
                let a = stack.top(0)?;
                let b = stack.top(1)?;
                *stack.top_mut(0)? = b;
                *stack.top_mut(1)? = a;
            }
            DW_OP_ROT => {
                let a = stack.top(0)?;
                let b = stack.top(1)?;
                let c = stack.top(2)?;
                *stack.top_mut(0)? = b;
                *stack.top_mut(1)? = c;
                *stack.top_mut(2)? = a;
            }
            DW_OP_ABS => {
                let v = stack.top(0)? as i64;
                *stack.top_mut(0)? = v.wrapping_abs() as u64;
            }
            DW_OP_AND => {
                let v = stack.pop()?;
                *stack.top_mut(0)? &= v;
            }
            DW_OP_DIV => {
                let divisor = stack.pop()? as i64;
                if divisor == 0 {
                    return Err(DwarfError::DivisionByZero);
                }
                let v = stack.top(0)? as i64;
                let r = v.wrapping_div(divisor) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_MINUS => {
                let v = stack.pop()?;
                let r = stack.top(0)?.wrapping_sub(v);
                *stack.top_mut(0)? = r;
            }
            DW_OP_MOD => {
                let divisor = stack.pop()? as i64;
                if divisor == 0 {
                    return Err(DwarfError::DivisionByZero);
                }
                let v = stack.top(0)? as i64;
                let r = v.wrapping_rem(divisor) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_MUL => {
                let v = stack.pop()?;
                let r = stack.top(0)?.wrapping_mul(v);
                *stack.top_mut(0)? = r;
            }
            DW_OP_NEG => {
                let v = stack.top(0)? as i64;
                *stack.top_mut(0)? = v.wrapping_neg() as u64;
            }
            DW_OP_NOT => {
                let v = stack.top(0)?;
                *stack.top_mut(0)? = !v;
            }
            DW_OP_OR => {
                let v = stack.pop()?;
                *stack.top_mut(0)? |= v;
            }
            DW_OP_PLUS => {
                let v = stack.pop()?;
                let r = stack.top(0)?.wrapping_add(v);
                *stack.top_mut(0)? = r;
            }
            DW_OP_PLUS_UCONST => {
                let v = decode_uleb128(expression, &mut loc, end)?;
                let r = stack.top(0)?.wrapping_add(v);
                *stack.top_mut(0)? = r;
            }
            DW_OP_SHL => {
                let shift = stack.pop()?;
                let v = stack.top(0)?;
                *stack.top_mut(0)? = if shift < 64 { v << shift } else { 0 };
            }
            DW_OP_SHR => {
                let shift = stack.pop()?;
                let v = stack.top(0)?;
                *stack.top_mut(0)? = if shift < 64 { v >> shift } else { 0 };
            }
            DW_OP_SHRA => {
                let shift = stack.pop()?;
                let v = stack.top(0)? as i64;
                let shifted = if shift < 64 { v >> shift } else { v >> 63 };
                *stack.top_mut(0)? = shifted as u64;
            }
            DW_OP_XOR => {
                let v = stack.pop()?;
                *stack.top_mut(0)? ^= v;
            }
            DW_OP_SKIP => {
                let delta = read_u16(expression, &mut loc)? as i16 as i64;
                loc = branch_target(loc, delta, end)?;
            }
            DW_OP_BRA => {
                let delta = read_u16(expression, &mut loc)? as i16 as i64;
                if stack.pop()? != 0 {
                    loc = branch_target(loc, delta, end)?;
                }
            }
            DW_OP_EQ => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) == v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_NE => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) != v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_LT => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) < v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_LE => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) <= v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_GT => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) > v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_GE => {
                let v = stack.pop()? as i64;
                let r = ((stack.top(0)? as i64) >= v) as u64;
                *stack.top_mut(0)? = r;
            }
            DW_OP_LIT0..=DW_OP_LIT31 => {
                stack.push((opcode - DW_OP_LIT0) as u64)?;
            }
            DW_OP_REG0..=DW_OP_REG31 => {
                pending_register = Some((opcode - DW_OP_REG0) as u64);
            }
            DW_OP_REGX => {
                pending_register = Some(decode_uleb128(expression, &mut loc, end)?);
            }
            DW_OP_BREG0..=DW_OP_BREG31 => {
                let reg = (opcode - DW_OP_BREG0) as u64;
                let offset = decode_sleb128(expression, &mut loc, end)?;
                let base = ctx
                    .registers
                    .register(reg)
                    .ok_or(DwarfError::RegisterUnavailable(reg))?;
                stack.push((base as i64).wrapping_add(offset) as u64)?;
            }
            DW_OP_BREGX => {
                let reg = decode_uleb128(expression, &mut loc, end)?;
                let offset = decode_sleb128(expression, &mut loc, end)?;
                let base = ctx
                    .registers
                    .register(reg)
                    .ok_or(DwarfError::RegisterUnavailable(reg))?;
                stack.push((base as i64).wrapping_add(offset) as u64)?;
            }
            DW_OP_FBREG => {
                let offset = decode_sleb128(expression, &mut loc, end)?;
                let base = ctx.frame_base.ok_or(DwarfError::NoFrameBase)?;
                stack.push((base as i64).wrapping_add(offset) as u64)?;
            }
            DW_OP_CALL_FRAME_CFA => {
                // Caller CFA first; the frame base is the same thing
                // when DW_AT_frame_base is DW_OP_call_frame_cfa; last
                // resort is the frame-pointer idiom.
                let cfa = match ctx.cfa.or(ctx.frame_base) {
                    Some(v) => v,
                    None => ctx
                        .registers
                        .register(FRAME_POINTER)
                        .map(|fp| fp.wrapping_add(16))
                        .ok_or(DwarfError::RegisterUnavailable(FRAME_POINTER))?,
                };
                stack.push(cfa)?;
            }
            DW_OP_PIECE => {
                let size_bytes = decode_uleb128(expression, &mut loc, end)?;
                let location = piece_location(&mut stack, &mut pending_register)?;
                pieces.push(LocationPiece { location, size_bits: size_bytes * 8, bit_offset: 0 });
            }
            DW_OP_BIT_PIECE => {
                let size_bits = decode_uleb128(expression, &mut loc, end)?;
                let bit_offset = decode_uleb128(expression, &mut loc, end)?;
                let location = piece_location(&mut stack, &mut pending_register)?;
                pieces.push(LocationPiece { location, size_bits, bit_offset });
            }
            DW_OP_STACK_VALUE => {
                return Ok(LocationResult::Value(stack.pop()?));
            }
            DW_OP_IMPLICIT_VALUE => {
                let len = decode_uleb128(expression, &mut loc, end)? as usize;
                let value_end = loc
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                let mut v = 0u64;
                for (i, &b) in expression[loc..value_end].iter().take(8).enumerate() {
                    v |= (b as u64) << (i * 8);
                }
                return Ok(LocationResult::Value(v));
            }
            DW_OP_IMPLICIT_POINTER => {
                let die_offset = if ctx.dwarf64 {
                    read_u64(expression, &mut loc)?
                } else {
                    read_u32(expression, &mut loc)? as u64
                };
                let byte_offset = decode_sleb128(expression, &mut loc, end)?;
                return Ok(LocationResult::ImplicitPointer { die_offset, byte_offset });
            }
            DW_OP_ADDRX | DW_OP_CONSTX => {
                let index = decode_uleb128(expression, &mut loc, end)?;
                let debug_addr = ctx
                    .debug_addr
                    .ok_or(DwarfError::UnsupportedExpression(opcode))?;
                let offset = index
                    .checked_mul(8)
                    .and_then(|o| ctx.addr_base.checked_add(o))
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                let mut addr_loc = offset as usize;
                let v = read_u64(debug_addr, &mut addr_loc)?;
                stack.push(v)?;
            }
            DW_OP_ENTRY_VALUE | DW_OP_GNU_ENTRY_VALUE => {
                let len = decode_uleb128(expression, &mut loc, end)? as usize;
                let sub_end = loc
                    .checked_add(len)
                    .filter(|&e| e <= end)
                    .ok_or(DwarfError::UnexpectedEof(loc))?;
                let sub = &expression[loc..sub_end];
                loc = sub_end;
                // Evaluate against the entry snapshot, falling back to
                // current registers when none was captured.
                let entry_regs = ctx.entry_registers.unwrap_or(ctx.registers);
                let mut sub_ctx = EvalContext::new(entry_regs);
                sub_ctx.memory = ctx.memory;
                sub_ctx.cfa = ctx.cfa;
                sub_ctx.frame_base = ctx.frame_base;
                let v = result_to_u64(evaluate_inner(sub, &sub_ctx)?, entry_regs)?;
                stack.push(v)?;
            }
            DW_OP_CALL2 | DW_OP_CALL4 | DW_OP_CALL_REF => {
                let die_offset = match opcode {
                    DW_OP_CALL2 => read_u16(expression, &mut loc)? as u64,
                    DW_OP_CALL4 => read_u32(expression, &mut loc)? as u64,
                    _ if ctx.dwarf64 => read_u64(expression, &mut loc)?,
                    _ => read_u32(expression, &mut loc)? as u64,
                };
                let lookup = ctx
                    .die_lookup
                    .ok_or(DwarfError::UnsupportedExpression(opcode))?;
                let callee = lookup
                    .location_expr(die_offset)
                    .ok_or(DwarfError::UnsupportedExpression(opcode))?;
                let v = result_to_u64(evaluate_inner(&callee, ctx)?, ctx.registers)?;
                stack.push(v)?;
            }
            DW_OP_REGVAL_TYPE => {
                let reg = decode_uleb128(expression, &mut loc, end)?;
                let _type_die = decode_uleb128(expression, &mut loc, end)?;
                let v = ctx
                    .registers
                    .register(reg)
                    .ok_or(DwarfError::RegisterUnavailable(reg))?;
                stack.push(v)?;
            }
            DW_OP_DEREF_TYPE | DW_OP_XDEREF_TYPE => {
                let size = read_u8(expression, &mut loc)?;
                let _type_die = decode_uleb128(expression, &mut loc, end)?;
                if size == 0 || size > 8 {
                    return Err(DwarfError::InvalidDerefSize(size));
                }
                let addr = stack.pop()?;
                if opcode == DW_OP_XDEREF_TYPE {
                    let _address_space = stack.pop()?;
                }
                match ctx.memory {
                    Some(memory) => {
                        let v = memory
                            .read(addr, size as usize)
                            .ok_or(DwarfError::MemoryUnavailable(addr))?;
                        stack.push(v)?;
                    }
                    None => return Ok(LocationResult::Address(addr)),
                }
            }
            DW_OP_CONVERT | DW_OP_REINTERPRET => {
                // Typed-value conversions; the engine works on plain
                // 64-bit words, so the operand is consumed and the
                // value kept as-is.
                let _type_die = decode_uleb128(expression, &mut loc, end)?;
            }
            DW_OP_NOP => {}
            DW_OP_PUSH_OBJECT_ADDRESS | DW_OP_FORM_TLS_ADDRESS => {
                return Err(DwarfError::UnsupportedExpression(opcode));
            }
            _ => return Err(DwarfError::InvalidExpression(opcode)),
        }
    }

    if !pieces.is_empty() {
        return Ok(LocationResult::Composite(pieces));
    }
    if let Some(reg) = pending_register {
        return Ok(LocationResult::Register(reg));
    }
    if !stack.is_empty() {
        return Ok(LocationResult::Address(stack.top(0)?));
    }
    Ok(LocationResult::Empty)
}

fn branch_target(loc: usize, delta: i64, end: usize) -> Result<usize, DwarfError> {
    let target = loc as i64 + delta;
    if target < 0 || target > end as i64 {
        return Err(DwarfError::BranchOutOfBounds);
    }
    Ok(target as usize)
}

fn piece_location(
    stack: &mut EvalStack,
    pending_register: &mut Option<u64>,
) -> Result<PieceLocation, DwarfError> {
    if let Some(reg) = pending_register.take() {
        return Ok(PieceLocation::Register(reg));
    }
    if !stack.is_empty() {
        return Ok(PieceLocation::Address(stack.pop()?));
    }
    Ok(PieceLocation::Empty)
}

fn result_to_u64(result: LocationResult, registers: &dyn RegisterRead) -> Result<u64, DwarfError> {
    match result {
        LocationResult::Address(v) | LocationResult::Value(v) => Ok(v),
        LocationResult::Register(r) => registers
            .register(r)
            .ok_or(DwarfError::RegisterUnavailable(r)),
        _ => Err(DwarfError::StackUnderflow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwarf::test_streams::{sleb, uleb};

    fn no_regs(_reg: u64) -> Option<u64> {
        None
    }

    fn eval(expr: &[u8]) -> LocationResult {
        let regs = no_regs;
        let ctx = EvalContext::new(&regs);
        evaluate(expr, &ctx)
    }

    #[test]
    fn test_literals_round_trip() {
        for n in 0u8..=31 {
            let expr = [DW_OP_LIT0 + n, DW_OP_STACK_VALUE];
            assert_eq!(eval(&expr), LocationResult::Value(n as u64));
        }
    }

    #[test]
    fn test_constu_stack_value() {
        let mut expr = vec![DW_OP_CONSTU];
        expr.extend_from_slice(&uleb(42));
        expr.push(DW_OP_STACK_VALUE);
        assert_eq!(eval(&expr), LocationResult::Value(42));
    }

    #[test]
    fn test_fbreg() {
        let mut expr = vec![DW_OP_FBREG];
        expr.extend_from_slice(&sleb(-8));
        let regs = no_regs;
        let mut ctx = EvalContext::new(&regs);
        ctx.frame_base = Some(0x7FFF_0100);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Address(0x7FFF_00F8));
    }

    #[test]
    fn test_breg() {
        let mut expr = vec![DW_OP_BREG0 + 6];
        expr.extend_from_slice(&sleb(-16));
        let regs = |reg: u64| -> Option<u64> { (reg == 6).then_some(0x7FFF_0200) };
        let ctx = EvalContext::new(&regs);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Address(0x7FFF_01F0));
    }

    #[test]
    fn test_register_result() {
        assert_eq!(eval(&[DW_OP_REG0 + 5]), LocationResult::Register(5));

        let mut expr = vec![DW_OP_REGX];
        expr.extend_from_slice(&uleb(90));
        assert_eq!(eval(&expr), LocationResult::Register(90));
    }

    #[test]
    fn test_arithmetic() {
        // (20 + 4) * 2 - 6 = 42
        let expr = [
            DW_OP_LIT0 + 20,
            DW_OP_LIT0 + 4,
            DW_OP_PLUS,
            DW_OP_LIT0 + 2,
            DW_OP_MUL,
            DW_OP_LIT0 + 6,
            DW_OP_MINUS,
            DW_OP_STACK_VALUE,
        ];
        assert_eq!(eval(&expr), LocationResult::Value(42));
    }

    #[test]
    fn test_signed_division() {
        // -8 / 2 = -4
        let mut expr = vec![DW_OP_CONSTS];
        expr.extend_from_slice(&sleb(-8));
        expr.push(DW_OP_LIT0 + 2);
        expr.push(DW_OP_DIV);
        expr.push(DW_OP_STACK_VALUE);
        assert_eq!(eval(&expr), LocationResult::Value(-4i64 as u64));
    }

    #[test]
    fn test_division_by_zero_is_empty() {
        let expr = [DW_OP_LIT0 + 8, DW_OP_LIT0, DW_OP_DIV, DW_OP_STACK_VALUE];
        assert_eq!(eval(&expr), LocationResult::Empty);
    }

    #[test]
    fn test_bra_taken_and_skipped() {
        // lit1 bra +1 -> skips the lit31, leaves lit7.
        let expr = [
            DW_OP_LIT0 + 1,
            DW_OP_BRA, 0x01, 0x00,
            DW_OP_LIT31,
            DW_OP_LIT0 + 7,
            DW_OP_STACK_VALUE,
        ];
        assert_eq!(eval(&expr), LocationResult::Value(7));

        // lit0 bra -> branch not taken, lit31 executes.
        let expr = [
            DW_OP_LIT0,
            DW_OP_BRA, 0x01, 0x00,
            DW_OP_LIT31,
            DW_OP_STACK_VALUE,
        ];
        assert_eq!(eval(&expr), LocationResult::Value(31));
    }

    #[test]
    fn test_skip_out_of_bounds_is_empty() {
        let expr = [DW_OP_SKIP, 0x40, 0x00];
        assert_eq!(eval(&expr), LocationResult::Empty);
    }

    #[test]
    fn test_deref_without_memory_short_circuits() {
        let mut expr = vec![DW_OP_CONSTU];
        expr.extend_from_slice(&uleb(0x5000));
        expr.push(DW_OP_DEREF);
        expr.push(DW_OP_LIT0); // never reached
        assert_eq!(eval(&expr), LocationResult::Address(0x5000));
    }

    #[test]
    fn test_deref_with_memory() {
        let mut expr = vec![DW_OP_CONSTU];
        expr.extend_from_slice(&uleb(0x5000));
        expr.push(DW_OP_DEREF);
        expr.push(DW_OP_STACK_VALUE);
        let regs = no_regs;
        let mem = |addr: u64, size: usize| -> Option<u64> {
            (addr == 0x5000 && size == 8).then_some(0xDEAD)
        };
        let mut ctx = EvalContext::new(&regs);
        ctx.memory = Some(&mem);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Value(0xDEAD));
    }

    #[test]
    fn test_implicit_value() {
        let mut expr = vec![DW_OP_IMPLICIT_VALUE];
        expr.extend_from_slice(&uleb(4));
        expr.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        assert_eq!(eval(&expr), LocationResult::Value(0x1234_5678));
    }

    #[test]
    fn test_implicit_pointer() {
        let mut expr = vec![DW_OP_IMPLICIT_POINTER];
        expr.extend_from_slice(&0x40u32.to_le_bytes());
        expr.extend_from_slice(&sleb(2));
        assert_eq!(
            eval(&expr),
            LocationResult::ImplicitPointer { die_offset: 0x40, byte_offset: 2 }
        );
    }

    #[test]
    fn test_composite_pieces() {
        // Register piece followed by an address piece.
        let mut expr = vec![DW_OP_REG0 + 3, DW_OP_PIECE];
        expr.extend_from_slice(&uleb(4));
        expr.push(DW_OP_CONSTU);
        expr.extend_from_slice(&uleb(0x6000));
        expr.push(DW_OP_PIECE);
        expr.extend_from_slice(&uleb(4));

        match eval(&expr) {
            LocationResult::Composite(pieces) => {
                assert_eq!(pieces.len(), 2);
                assert_eq!(pieces[0].location, PieceLocation::Register(3));
                assert_eq!(pieces[0].size_bits, 32);
                assert_eq!(pieces[1].location, PieceLocation::Address(0x6000));
            }
            other => panic!("expected composite, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_value_uses_entry_snapshot() {
        // entry_value(reg5) with different entry and current values.
        let mut expr = vec![DW_OP_ENTRY_VALUE];
        expr.extend_from_slice(&uleb(1));
        expr.push(DW_OP_REG0 + 5);
        expr.push(DW_OP_STACK_VALUE);

        let current = |reg: u64| -> Option<u64> { (reg == 5).then_some(111) };
        let entry = |reg: u64| -> Option<u64> { (reg == 5).then_some(999) };
        let mut ctx = EvalContext::new(&current);
        ctx.entry_registers = Some(&entry);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Value(999));

        // Without a snapshot, current registers are used.
        let ctx = EvalContext::new(&current);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Value(111));
    }

    #[test]
    fn test_call_frame_cfa_priority() {
        let expr = [DW_OP_CALL_FRAME_CFA];
        let regs = |reg: u64| -> Option<u64> { (reg == FRAME_POINTER).then_some(0x1000) };

        let mut ctx = EvalContext::new(&regs);
        ctx.cfa = Some(0x3000);
        ctx.frame_base = Some(0x2000);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Address(0x3000));

        let mut ctx = EvalContext::new(&regs);
        ctx.frame_base = Some(0x2000);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Address(0x2000));

        let ctx = EvalContext::new(&regs);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Address(0x1010));
    }

    #[test]
    fn test_addrx_reads_debug_addr() {
        let mut debug_addr = Vec::new();
        debug_addr.extend_from_slice(&0x1111u64.to_le_bytes());
        debug_addr.extend_from_slice(&0x2222u64.to_le_bytes());

        let mut expr = vec![DW_OP_ADDRX];
        expr.extend_from_slice(&uleb(1));
        expr.push(DW_OP_STACK_VALUE);

        let regs = no_regs;
        let mut ctx = EvalContext::new(&regs);
        ctx.debug_addr = Some(&debug_addr);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Value(0x2222));
    }

    #[test]
    fn test_die_call() {
        let mut expr = vec![DW_OP_CALL4];
        expr.extend_from_slice(&0x99u32.to_le_bytes());
        expr.push(DW_OP_STACK_VALUE);

        let regs = no_regs;
        let lookup = |die_offset: u64| -> Option<Vec<u8>> {
            (die_offset == 0x99).then(|| vec![DW_OP_LIT0 + 13])
        };
        let mut ctx = EvalContext::new(&regs);
        ctx.die_lookup = Some(&lookup);
        assert_eq!(evaluate(&expr, &ctx), LocationResult::Value(13));
    }

    #[test]
    fn test_unknown_opcode_is_empty() {
        assert_eq!(eval(&[0x02]), LocationResult::Empty);
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(eval(&[]), LocationResult::Empty);
    }

    #[test]
    fn test_stack_ops() {
        // over: [1, 2] -> [1, 2, 1]; plus -> [1, 3]; swap -> [3, 1]; drop -> [3]
        let expr = [
            DW_OP_LIT0 + 1,
            DW_OP_LIT0 + 2,
            DW_OP_OVER,
            DW_OP_PLUS,
            DW_OP_SWAP,
            DW_OP_DROP,
            DW_OP_STACK_VALUE,
        ];
        assert_eq!(eval(&expr), LocationResult::Value(3));
    }
}
