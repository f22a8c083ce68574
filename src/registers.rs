//! DWARF register numbering for the supported targets.
//!
//! Both the CFA interpreter and the location evaluator speak DWARF
//! register numbers; the mapping to machine registers is fixed per
//! architecture by the respective psABI.

// x86_64 (System V psABI, table 3.36).
pub const X86_64_RAX: u64 = 0;
pub const X86_64_RDX: u64 = 1;
pub const X86_64_RCX: u64 = 2;
pub const X86_64_RBX: u64 = 3;
pub const X86_64_RSI: u64 = 4;
pub const X86_64_RDI: u64 = 5;
pub const X86_64_RBP: u64 = 6;
pub const X86_64_RSP: u64 = 7;
pub const X86_64_R8: u64 = 8;
pub const X86_64_R15: u64 = 15;
pub const X86_64_RIP: u64 = 16;

// AArch64 (DWARF for the Arm 64-bit architecture).
pub const AARCH64_X0: u64 = 0;
pub const AARCH64_FP: u64 = 29; // x29
pub const AARCH64_LR: u64 = 30; // x30
pub const AARCH64_SP: u64 = 31;
pub const AARCH64_PC: u64 = 32;

/// Frame-pointer register of the host target, used only by the
/// `DW_OP_call_frame_cfa` last-resort heuristic.
#[cfg(target_arch = "aarch64")]
pub const FRAME_POINTER: u64 = AARCH64_FP;
#[cfg(not(target_arch = "aarch64"))]
pub const FRAME_POINTER: u64 = X86_64_RBP;
