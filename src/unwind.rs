//! Stack unwinding: walk call frames with CFI when the binary has
//! unwind tables, or chase saved frame pointers when it keeps them.

use crate::access::{MemoryRead, RegisterRead};
use crate::dwarf::{self, FrameSectionKind};
use crate::symbols::{find_function_for_pc, find_line_for_pc, FileEntry, FunctionInfo, LineEntry};

/// One resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindFrame {
    pub address: u64,
    pub function_name: String,
    pub file: String,
    pub line: u32,
    pub frame_index: u32,
}

/// The symbol tables frames resolve against, as produced by the
/// external debug-info parser.
#[derive(Debug, Copy, Clone, Default)]
pub struct SymbolTables<'a> {
    pub functions: &'a [FunctionInfo],
    pub line_entries: &'a [LineEntry],
    pub file_entries: &'a [FileEntry],
}

impl SymbolTables<'_> {
    fn resolve(&self, pc: u64, frame_index: u32) -> UnwindFrame {
        let function_name = find_function_for_pc(self.functions, pc)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "<unknown>".to_owned());
        let (file, line) = match find_line_for_pc(self.line_entries, pc) {
            Some(entry) => {
                let file = self
                    .file_entries
                    .get(entry.file_index as usize)
                    .map(|f| f.path.clone())
                    .unwrap_or_default();
                (file, entry.line)
            }
            None => (String::new(), 0),
        };
        UnwindFrame { address: pc, function_name, file, line, frame_index }
    }
}

/// Walk the stack with CFI from `frame_data`.
///
/// The register and memory readers see the current thread state for
/// every frame; a caller that wants exact saved-register recovery
/// across deep stacks supplies a reader that re-simulates the callee
/// state between iterations.
///
/// The walk ends at `main`/`_start`, at `max_depth`, at a zero return
/// address, or when no unwind info covers the current PC.
pub fn build_stack_trace(
    start_pc: u64,
    frame_data: &[u8],
    kind: FrameSectionKind,
    registers: &dyn RegisterRead,
    memory: &dyn MemoryRead,
    symbols: &SymbolTables,
    max_depth: u32,
) -> Vec<UnwindFrame> {
    let mut frames = Vec::new();
    let mut pc = start_pc;
    loop {
        let frame = symbols.resolve(pc, frames.len() as u32);
        let at_bottom = frame.function_name == "main" || frame.function_name == "_start";
        frames.push(frame);
        if at_bottom || frames.len() as u32 >= max_depth {
            break;
        }
        let Some(step) = dwarf::unwind(frame_data, kind, pc, registers, memory) else {
            break;
        };
        if step.return_address == 0 {
            break;
        }
        pc = step.return_address;
    }
    tracing::debug!(frames = frames.len(), "stack trace complete");
    frames
}

/// Walk the stack by chasing saved frame pointers.
///
/// Assumes the standard `[saved FP, return address]` pair at the frame
/// pointer (x86_64 and AArch64 ABIs agree) and a downward-growing
/// stack: a new FP at or below the current one ends the walk.
pub fn build_stack_trace_fp(
    start_pc: u64,
    start_fp: u64,
    memory: &dyn MemoryRead,
    symbols: &SymbolTables,
    max_depth: u32,
) -> Vec<UnwindFrame> {
    let mut frames = Vec::new();
    let mut pc = start_pc;
    let mut fp = start_fp;
    loop {
        let frame = symbols.resolve(pc, frames.len() as u32);
        let at_bottom = frame.function_name == "main" || frame.function_name == "_start";
        frames.push(frame);
        if at_bottom || frames.len() as u32 >= max_depth || fp == 0 {
            break;
        }
        let (Some(new_fp), Some(return_address)) =
            (memory.read(fp, 8), memory.read(fp + 8, 8))
        else {
            break;
        };
        if return_address == 0 || new_fp <= fp {
            break;
        }
        pc = return_address;
        fp = new_fp;
    }
    frames
}
