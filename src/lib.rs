//! Core engine of a native source-level debugger: it consumes an
//! unmodified executable plus its DWARF debug information and drives a
//! traced child through caller-supplied register and memory readers.
//!
//! The engine is split along the DWARF data it interprets:
//!
//! - [object] locates (and inflates) the DWARF sections of an ELF or
//!   Mach-O image;
//! - [dwarf] interprets call-frame information and location
//!   expressions over those raw bytes;
//! - [unwind] walks call stacks, via CFI or saved frame pointers;
//! - [breakpoint] resolves source lines to addresses and patches trap
//!   instructions;
//! - [inspect] renders variable values from their DWARF locations.
//!
//! Process control (ptrace, register capture, memory transfer) stays
//! with the embedding session; everything crosses the boundary through
//! the traits in [access]. All work is synchronous and happens while
//! the debuggee is stopped.
//!
//! ```no_run
//! use debugcore::dwarf::FrameSectionKind;
//! use debugcore::unwind::{build_stack_trace, SymbolTables};
//!
//! let bytes = std::fs::read("./a.out").unwrap();
//! let image = debugcore::object::load(&bytes).unwrap();
//! let info = image.sections.eh_frame.unwrap();
//! let eh_frame = image.section_data(&info).unwrap();
//!
//! // Readers over the stopped debuggee, supplied by the session.
//! let regs = |_reg: u64| -> Option<u64> { None };
//! let mem = |_addr: u64, _size: usize| -> Option<u64> { None };
//!
//! let frames = build_stack_trace(
//!     0x401000,
//!     eh_frame,
//!     FrameSectionKind::EhFrame,
//!     &regs,
//!     &mem,
//!     &SymbolTables::default(),
//!     64,
//! );
//! for frame in frames {
//!     println!("#{} {:#x} {}", frame.frame_index, frame.address, frame.function_name);
//! }
//! ```

pub mod access;
pub mod breakpoint;
pub mod dwarf;
pub mod inspect;
pub mod object;
pub mod registers;
pub mod symbols;
pub mod unwind;

pub use access::{ConditionEval, DieLocationLookup, MemoryRead, ProcessMemory, RegisterRead};
pub use breakpoint::{Breakpoint, BreakpointManager, BreakpointSpec, TRAP_INSTRUCTION, TRAP_SIZE};
pub use dwarf::{EvalContext, LocationResult, UnwindStep};
pub use inspect::{inspect_locals, VariableValue};
pub use object::{load, DebugSections, Image, SectionInfo};
pub use symbols::{FileEntry, FunctionInfo, LineEntry, VariableInfo};
pub use unwind::{build_stack_trace, build_stack_trace_fp, SymbolTables, UnwindFrame};

/// A result type that wraps [Error].
pub type Result<T> = std::result::Result<T, Error>;

/// Error definition.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{0}")]
    Object(#[from] object::ObjectError),

    #[error("{0}")]
    Dwarf(#[from] dwarf::DwarfError),

    #[error("{0}")]
    Breakpoint(#[from] breakpoint::BreakpointError),
}
