//! Input types produced by the external `.debug_info`/`.debug_line`
//! parser. The engine consumes these as plain data; it never reads the
//! info or line sections itself.

/// A function with its PC range. `high_pc == 0` means the range is
/// open-ended.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    pub name: String,
    pub low_pc: u64,
    pub high_pc: u64,
}

/// One row of the line-number program.
#[derive(Debug, Clone, Default)]
pub struct LineEntry {
    pub address: u64,
    pub file_index: u64,
    pub line: u32,
    pub column: u32,
    pub is_stmt: bool,
    pub end_sequence: bool,
}

/// A source file referenced by line entries.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub path: String,
}

/// A variable with its resolved location expression and base type.
#[derive(Debug, Clone, Default)]
pub struct VariableInfo {
    pub name: String,
    pub location_expr: Vec<u8>,
    pub byte_size: u64,
    /// DW_ATE_* base-type encoding.
    pub encoding: u8,
    pub type_name: String,
}

/// One member of a struct being formatted.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    pub name: String,
    pub byte_offset: u64,
    pub byte_size: u64,
    pub encoding: u8,
}

/// First function whose `[low_pc, high_pc)` contains `pc`. An entry
/// with `high_pc == 0` matches any `pc >= low_pc`.
pub fn find_function_for_pc(functions: &[FunctionInfo], pc: u64) -> Option<&FunctionInfo> {
    functions
        .iter()
        .find(|f| f.low_pc <= pc && (f.high_pc == 0 || pc < f.high_pc))
}

/// Last line-table row at or below `pc`, ignoring end-of-sequence
/// markers.
pub fn find_line_for_pc(line_entries: &[LineEntry], pc: u64) -> Option<&LineEntry> {
    line_entries
        .iter()
        .filter(|e| !e.end_sequence && e.address <= pc)
        .max_by_key(|e| e.address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn functions() -> Vec<FunctionInfo> {
        vec![
            FunctionInfo { name: "main".into(), low_pc: 0x1000, high_pc: 0x1100 },
            FunctionInfo { name: "level1".into(), low_pc: 0x1100, high_pc: 0x1200 },
            FunctionInfo { name: "open_ended".into(), low_pc: 0x9000, high_pc: 0 },
        ]
    }

    #[test]
    fn test_find_function() {
        let funcs = functions();
        assert_eq!(find_function_for_pc(&funcs, 0x1000).unwrap().name, "main");
        assert_eq!(find_function_for_pc(&funcs, 0x10FF).unwrap().name, "main");
        assert_eq!(find_function_for_pc(&funcs, 0x1100).unwrap().name, "level1");
        assert!(find_function_for_pc(&funcs, 0x800).is_none());
    }

    #[test]
    fn test_open_ended_range() {
        let funcs = functions();
        assert_eq!(find_function_for_pc(&funcs, 0xFFFF_0000).unwrap().name, "open_ended");
    }

    #[test]
    fn test_find_line() {
        let entries = vec![
            LineEntry { address: 0x1000, line: 5, is_stmt: true, ..Default::default() },
            LineEntry { address: 0x1010, line: 6, is_stmt: true, ..Default::default() },
            LineEntry { address: 0x1020, line: 0, end_sequence: true, ..Default::default() },
        ];
        assert_eq!(find_line_for_pc(&entries, 0x100F).unwrap().line, 5);
        assert_eq!(find_line_for_pc(&entries, 0x1010).unwrap().line, 6);
        // The end-sequence marker never resolves.
        assert_eq!(find_line_for_pc(&entries, 0x5000).unwrap().line, 6);
        assert!(find_line_for_pc(&entries, 0xFFF).is_none());
    }
}
