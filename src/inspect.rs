//! Variable inspection: evaluate a variable's location expression and
//! render the bytes it points at according to the DWARF base type.

use crate::access::{MemoryRead, RegisterRead};
use crate::dwarf::consts::*;
use crate::dwarf::{evaluate, EvalContext, LocationResult, PieceLocation};
use crate::symbols::{FieldDescriptor, VariableInfo};

/// A variable rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    pub name: String,
    pub value: String,
    pub type_name: String,
}

/// Evaluate and format every variable in scope.
///
/// `frame_base` is the evaluated `DW_AT_frame_base` of the selected
/// frame; without a memory reader, memory-resident variables render as
/// optimized out.
pub fn inspect_locals(
    variables: &[VariableInfo],
    registers: &dyn RegisterRead,
    frame_base: Option<u64>,
    memory: Option<&dyn MemoryRead>,
) -> Vec<VariableValue> {
    variables
        .iter()
        .map(|var| {
            let mut ctx = EvalContext::new(registers);
            ctx.frame_base = frame_base;
            ctx.memory = memory;
            let result = evaluate(&var.location_expr, &ctx);
            let bytes = materialize(&result, var.byte_size, registers, memory);
            VariableValue {
                name: var.name.clone(),
                value: format_value(&bytes, var.encoding),
                type_name: var.type_name.clone(),
            }
        })
        .collect()
}

/// Turn a location result into the variable's little-endian bytes. An
/// empty result means the value is unavailable.
fn materialize(
    result: &LocationResult,
    byte_size: u64,
    registers: &dyn RegisterRead,
    memory: Option<&dyn MemoryRead>,
) -> Vec<u8> {
    let size = byte_size as usize;
    match result {
        LocationResult::Empty | LocationResult::ImplicitPointer { .. } => Vec::new(),
        LocationResult::Address(addr) => read_bytes(memory, *addr, size),
        LocationResult::Register(reg) => match registers.register(*reg) {
            Some(v) => truncate_le(v, size),
            None => Vec::new(),
        },
        LocationResult::Value(v) => truncate_le(*v, size),
        // A full consumer reassembles bits across pieces; rendering
        // degrades to the first piece.
        LocationResult::Composite(pieces) => match pieces.first() {
            Some(piece) => {
                let piece_size = (piece.size_bits as usize).div_ceil(8).min(size.max(1));
                match piece.location {
                    PieceLocation::Address(addr) => read_bytes(memory, addr, piece_size),
                    PieceLocation::Register(reg) => match registers.register(reg) {
                        Some(v) => truncate_le(v, piece_size),
                        None => Vec::new(),
                    },
                    PieceLocation::Value(v) => truncate_le(v, piece_size),
                    PieceLocation::Empty => Vec::new(),
                }
            }
            None => Vec::new(),
        },
    }
}

fn truncate_le(value: u64, size: usize) -> Vec<u8> {
    value.to_le_bytes()[..size.clamp(1, 8)].to_vec()
}

fn read_bytes(memory: Option<&dyn MemoryRead>, addr: u64, size: usize) -> Vec<u8> {
    let Some(memory) = memory else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(size);
    let mut offset = 0usize;
    while offset < size {
        let chunk = (size - offset).min(8);
        let Some(v) = memory.read(addr + offset as u64, chunk) else {
            return Vec::new();
        };
        out.extend_from_slice(&v.to_le_bytes()[..chunk]);
        offset += chunk;
    }
    out
}

fn unsigned_from_le(bytes: &[u8]) -> u64 {
    let mut v = 0u64;
    for (i, &b) in bytes.iter().take(8).enumerate() {
        v |= (b as u64) << (i * 8);
    }
    v
}

fn signed_from_le(bytes: &[u8]) -> i64 {
    let width = bytes.len().min(8);
    let v = unsigned_from_le(bytes);
    if width == 0 || width == 8 {
        return v as i64;
    }
    let shift = 64 - width * 8;
    ((v << shift) as i64) >> shift
}

/// Render raw little-endian bytes per the DWARF base-type encoding.
pub fn format_value(bytes: &[u8], encoding: u8) -> String {
    if bytes.is_empty() {
        return "<optimized out>".to_owned();
    }
    match encoding {
        DW_ATE_SIGNED | DW_ATE_SIGNED_CHAR => signed_from_le(bytes).to_string(),
        DW_ATE_UNSIGNED | DW_ATE_UNSIGNED_CHAR => unsigned_from_le(bytes).to_string(),
        DW_ATE_ADDRESS => format!("{:#x}", unsigned_from_le(bytes)),
        DW_ATE_BOOLEAN => if bytes[0] != 0 { "true" } else { "false" }.to_owned(),
        DW_ATE_FLOAT => match bytes.len() {
            4 => f32::from_le_bytes(bytes[0..4].try_into().unwrap()).to_string(),
            8 => f64::from_le_bytes(bytes[0..8].try_into().unwrap()).to_string(),
            _ => format!("{:#x}", unsigned_from_le(bytes)),
        },
        _ => format!("{:#x}", unsigned_from_le(bytes)),
    }
}

/// Render a struct as `{name: value, ...}` by slicing member bytes out
/// of the whole.
pub fn format_struct(bytes: &[u8], fields: &[FieldDescriptor]) -> String {
    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        let start = field.byte_offset as usize;
        let end = start + field.byte_size as usize;
        let value = match bytes.get(start..end) {
            Some(member) => format_value(member, field.encoding),
            None => "<optimized out>".to_owned(),
        };
        parts.push(format!("{}: {}", field.name, value));
    }
    format!("{{{}}}", parts.join(", "))
}

/// Render an array as `[v0, v1, ...]`, truncated to the bytes
/// available.
pub fn format_array(bytes: &[u8], element_size: u64, encoding: u8) -> String {
    let element_size = element_size.max(1) as usize;
    let values: Vec<String> = bytes
        .chunks_exact(element_size)
        .map(|chunk| format_value(chunk, encoding))
        .collect();
    format!("[{}]", values.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwarf::consts::{DW_OP_FBREG, DW_OP_REG0};
    use crate::dwarf::test_streams::sleb;
    use std::collections::HashMap;

    fn var(name: &str, expr: Vec<u8>, byte_size: u64, encoding: u8) -> VariableInfo {
        VariableInfo {
            name: name.into(),
            location_expr: expr,
            byte_size,
            encoding,
            type_name: "int".into(),
        }
    }

    #[test]
    fn test_register_variable() {
        let regs = |reg: u64| -> Option<u64> { (reg == 3).then_some(0xFFFF_FFFF_FFFF_FFF6) };
        let vars = vec![var("x", vec![DW_OP_REG0 + 3], 4, DW_ATE_SIGNED)];
        let values = inspect_locals(&vars, &regs, None, None);
        assert_eq!(values[0].value, "-10");
    }

    #[test]
    fn test_memory_variable_via_frame_base() {
        let mut expr = vec![DW_OP_FBREG];
        expr.extend_from_slice(&sleb(-8));
        let vars = vec![var("count", expr, 4, DW_ATE_UNSIGNED)];

        let regs = |_reg: u64| -> Option<u64> { None };
        let mut cells = HashMap::new();
        cells.insert(0x7FFF_00F8u64, 1234u64);
        let mem = move |addr: u64, _size: usize| -> Option<u64> { cells.get(&addr).copied() };
        let values = inspect_locals(&vars, &regs, Some(0x7FFF_0100), Some(&mem));
        assert_eq!(values[0].value, "1234");
    }

    #[test]
    fn test_optimized_out() {
        let regs = |_reg: u64| -> Option<u64> { None };
        let vars = vec![var("gone", vec![], 8, DW_ATE_SIGNED)];
        let values = inspect_locals(&vars, &regs, None, None);
        assert_eq!(values[0].value, "<optimized out>");
    }

    #[test]
    fn test_format_scalars() {
        assert_eq!(format_value(&(-5i32).to_le_bytes(), DW_ATE_SIGNED), "-5");
        assert_eq!(format_value(&7u16.to_le_bytes(), DW_ATE_UNSIGNED), "7");
        assert_eq!(format_value(&[1], DW_ATE_BOOLEAN), "true");
        assert_eq!(format_value(&[0], DW_ATE_BOOLEAN), "false");
        assert_eq!(
            format_value(&0x7FFF_1234u64.to_le_bytes(), DW_ATE_ADDRESS),
            "0x7fff1234"
        );
        assert_eq!(format_value(&2.5f32.to_le_bytes(), DW_ATE_FLOAT), "2.5");
        assert_eq!(format_value(&(-0.25f64).to_le_bytes(), DW_ATE_FLOAT), "-0.25");
        assert_eq!(format_value(&[], DW_ATE_SIGNED), "<optimized out>");
    }

    #[test]
    fn test_format_struct() {
        let fields = vec![
            FieldDescriptor { name: "x".into(), byte_offset: 0, byte_size: 4, encoding: DW_ATE_SIGNED },
            FieldDescriptor { name: "y".into(), byte_offset: 4, byte_size: 4, encoding: DW_ATE_SIGNED },
        ];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&(-4i32).to_le_bytes());
        assert_eq!(format_struct(&bytes, &fields), "{x: 3, y: -4}");
    }

    #[test]
    fn test_format_struct_truncated_member() {
        let fields = vec![FieldDescriptor {
            name: "x".into(),
            byte_offset: 8,
            byte_size: 4,
            encoding: DW_ATE_SIGNED,
        }];
        assert_eq!(format_struct(&[0u8; 4], &fields), "{x: <optimized out>}");
    }

    #[test]
    fn test_format_array_truncates() {
        let mut bytes = Vec::new();
        for v in [10u32, 20, 30] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xAA); // trailing partial element is dropped
        assert_eq!(format_array(&bytes, 4, DW_ATE_UNSIGNED), "[10, 20, 30]");
    }

    #[test]
    fn test_composite_renders_first_piece() {
        use crate::dwarf::consts::DW_OP_PIECE;
        // reg3 as a 4-byte piece, then an empty piece.
        let expr = vec![DW_OP_REG0 + 3, DW_OP_PIECE, 4, DW_OP_PIECE, 4];
        let regs = |reg: u64| -> Option<u64> { (reg == 3).then_some(99) };
        let vars = vec![var("pair", expr, 8, DW_ATE_UNSIGNED)];
        let values = inspect_locals(&vars, &regs, None, None);
        assert_eq!(values[0].value, "99");
    }
}
