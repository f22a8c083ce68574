//! Seams between the engine and the caller-owned debuggee state.
//!
//! The engine never talks to a process directly. Everything it needs
//! (registers of the stopped thread, debuggee memory, condition
//! evaluation, DIE lookups) comes in through these traits. A `&dyn`
//! reference is a data pointer plus a vtable, so call sites stay
//! heapless and trivially wrappable over FFI.

/// Read one DWARF-numbered register of the stopped thread.
///
/// Returns `None` when the register is unavailable in the caller's
/// context (e.g. not captured in a snapshot).
pub trait RegisterRead {
    fn register(&self, reg: u64) -> Option<u64>;
}

impl<F: Fn(u64) -> Option<u64>> RegisterRead for F {
    fn register(&self, reg: u64) -> Option<u64> {
        self(reg)
    }
}

/// Read up to 8 bytes of debuggee memory, little-endian.
pub trait MemoryRead {
    fn read(&self, addr: u64, size: usize) -> Option<u64>;
}

impl<F: Fn(u64, usize) -> Option<u64>> MemoryRead for F {
    fn read(&self, addr: u64, size: usize) -> Option<u64> {
        self(addr, size)
    }
}

/// Byte-exact read/write access to a live debuggee, used for trap
/// patching. Both operations report plain success.
pub trait ProcessMemory {
    fn read_exact(&mut self, addr: u64, buf: &mut [u8]) -> bool;
    fn write_all(&mut self, addr: u64, bytes: &[u8]) -> bool;
}

/// Evaluate a breakpoint condition expression against the current
/// frame. The engine owns no expression language; the session does.
pub trait ConditionEval {
    fn evaluate(&mut self, expr: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> ConditionEval for F {
    fn evaluate(&mut self, expr: &str) -> bool {
        self(expr)
    }
}

/// Fetch the `DW_AT_location` expression of a DIE by its offset in
/// `.debug_info`. Backs `DW_OP_call2`/`DW_OP_call4`/`DW_OP_call_ref`.
pub trait DieLocationLookup {
    fn location_expr(&self, die_offset: u64) -> Option<Vec<u8>>;
}

impl<F: Fn(u64) -> Option<Vec<u8>>> DieLocationLookup for F {
    fn location_expr(&self, die_offset: u64) -> Option<Vec<u8>> {
        self(die_offset)
    }
}
