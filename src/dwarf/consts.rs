#![allow(unused)]

// Pointer-encoding bytes used by .eh_frame (DW_EH_PE_*).
//
// The low nibble selects the value format, bits 0x70 select how the
// value relocates, and 0x80 requests an extra indirection.
pub const DW_EH_PE_PTR: u8 = 0x00;
pub const DW_EH_PE_ULEB128: u8 = 0x01;
pub const DW_EH_PE_UDATA2: u8 = 0x02;
pub const DW_EH_PE_UDATA4: u8 = 0x03;
pub const DW_EH_PE_UDATA8: u8 = 0x04;
pub const DW_EH_PE_SLEB128: u8 = 0x09;
pub const DW_EH_PE_SDATA2: u8 = 0x0A;
pub const DW_EH_PE_SDATA4: u8 = 0x0B;
pub const DW_EH_PE_SDATA8: u8 = 0x0C;
pub const DW_EH_PE_ABSPTR: u8 = 0x00;
pub const DW_EH_PE_PCREL: u8 = 0x10;
pub const DW_EH_PE_DATAREL: u8 = 0x30;
pub const DW_EH_PE_INDIRECT: u8 = 0x80;
pub const DW_EH_PE_OMIT: u8 = 0xFF;

// Call-frame instructions, DWARF 5 section 6.4.2.
//
// The top two bits of the first byte select the three compact forms;
// everything else dispatches on the full byte.
pub const DW_CFA_NOP: u8 = 0x00;
pub const DW_CFA_SET_LOC: u8 = 0x01;
pub const DW_CFA_ADVANCE_LOC1: u8 = 0x02;
pub const DW_CFA_ADVANCE_LOC2: u8 = 0x03;
pub const DW_CFA_ADVANCE_LOC4: u8 = 0x04;
pub const DW_CFA_OFFSET_EXTENDED: u8 = 0x05;
pub const DW_CFA_RESTORE_EXTENDED: u8 = 0x06;
pub const DW_CFA_UNDEFINED: u8 = 0x07;
pub const DW_CFA_SAME_VALUE: u8 = 0x08;
pub const DW_CFA_REGISTER: u8 = 0x09;
pub const DW_CFA_REMEMBER_STATE: u8 = 0x0A;
pub const DW_CFA_RESTORE_STATE: u8 = 0x0B;
pub const DW_CFA_DEF_CFA: u8 = 0x0C;
pub const DW_CFA_DEF_CFA_REGISTER: u8 = 0x0D;
pub const DW_CFA_DEF_CFA_OFFSET: u8 = 0x0E;
pub const DW_CFA_DEF_CFA_EXPRESSION: u8 = 0x0F;
pub const DW_CFA_EXPRESSION: u8 = 0x10;
pub const DW_CFA_OFFSET_EXTENDED_SF: u8 = 0x11;
pub const DW_CFA_DEF_CFA_SF: u8 = 0x12;
pub const DW_CFA_DEF_CFA_OFFSET_SF: u8 = 0x13;
pub const DW_CFA_VAL_OFFSET: u8 = 0x14;
pub const DW_CFA_VAL_OFFSET_SF: u8 = 0x15;
pub const DW_CFA_VAL_EXPRESSION: u8 = 0x16;
pub const DW_CFA_GNU_ARGS_SIZE: u8 = 0x2E;
// Compact forms (high two bits).
pub const DW_CFA_ADVANCE_LOC: u8 = 0x40;
pub const DW_CFA_OFFSET: u8 = 0x80;
pub const DW_CFA_RESTORE: u8 = 0xC0;

// DWARF expression opcodes, DWARF 5 section 2.5.
pub const DW_OP_ADDR: u8 = 0x03; // constant address (target specific)
pub const DW_OP_DEREF: u8 = 0x06;
pub const DW_OP_CONST1U: u8 = 0x08; // 1-byte constant
pub const DW_OP_CONST1S: u8 = 0x09; // 1-byte signed constant
pub const DW_OP_CONST2U: u8 = 0x0A; // 2-byte constant
pub const DW_OP_CONST2S: u8 = 0x0B; // 2-byte signed constant
pub const DW_OP_CONST4U: u8 = 0x0C; // 4-byte constant
pub const DW_OP_CONST4S: u8 = 0x0D; // 4-byte signed constant
pub const DW_OP_CONST8U: u8 = 0x0E; // 8-byte constant
pub const DW_OP_CONST8S: u8 = 0x0F; // 8-byte signed constant
pub const DW_OP_CONSTU: u8 = 0x10; // ULEB128 constant
pub const DW_OP_CONSTS: u8 = 0x11; // SLEB128 constant
pub const DW_OP_DUP: u8 = 0x12;
pub const DW_OP_DROP: u8 = 0x13;
pub const DW_OP_OVER: u8 = 0x14;
pub const DW_OP_PICK: u8 = 0x15; // 1-byte stack index
pub const DW_OP_SWAP: u8 = 0x16;
pub const DW_OP_ROT: u8 = 0x17;
pub const DW_OP_XDEREF: u8 = 0x18;
pub const DW_OP_ABS: u8 = 0x19;
pub const DW_OP_AND: u8 = 0x1A;
pub const DW_OP_DIV: u8 = 0x1B;
pub const DW_OP_MINUS: u8 = 0x1C;
pub const DW_OP_MOD: u8 = 0x1D;
pub const DW_OP_MUL: u8 = 0x1E;
pub const DW_OP_NEG: u8 = 0x1F;
pub const DW_OP_NOT: u8 = 0x20;
pub const DW_OP_OR: u8 = 0x21;
pub const DW_OP_PLUS: u8 = 0x22;
pub const DW_OP_PLUS_UCONST: u8 = 0x23; // ULEB128 addend
pub const DW_OP_SHL: u8 = 0x24;
pub const DW_OP_SHR: u8 = 0x25;
pub const DW_OP_SHRA: u8 = 0x26;
pub const DW_OP_XOR: u8 = 0x27;
pub const DW_OP_BRA: u8 = 0x28; // signed 2-byte branch offset
pub const DW_OP_EQ: u8 = 0x29;
pub const DW_OP_GE: u8 = 0x2A;
pub const DW_OP_GT: u8 = 0x2B;
pub const DW_OP_LE: u8 = 0x2C;
pub const DW_OP_LT: u8 = 0x2D;
pub const DW_OP_NE: u8 = 0x2E;
pub const DW_OP_SKIP: u8 = 0x2F; // signed 2-byte jump offset
pub const DW_OP_LIT0: u8 = 0x30; // literals 0..=31
pub const DW_OP_LIT31: u8 = 0x4F;
pub const DW_OP_REG0: u8 = 0x50; // registers 0..=31
pub const DW_OP_REG31: u8 = 0x6F;
pub const DW_OP_BREG0: u8 = 0x70; // register 0..=31 + SLEB128 offset
pub const DW_OP_BREG31: u8 = 0x8F;
pub const DW_OP_REGX: u8 = 0x90; // ULEB128 register
pub const DW_OP_FBREG: u8 = 0x91; // frame base + SLEB128 offset
pub const DW_OP_BREGX: u8 = 0x92; // ULEB128 register + SLEB128 offset
pub const DW_OP_PIECE: u8 = 0x93; // ULEB128 piece size in bytes
pub const DW_OP_DEREF_SIZE: u8 = 0x94; // 1-byte size
pub const DW_OP_XDEREF_SIZE: u8 = 0x95; // 1-byte size
pub const DW_OP_NOP: u8 = 0x96;
pub const DW_OP_PUSH_OBJECT_ADDRESS: u8 = 0x97;
pub const DW_OP_CALL2: u8 = 0x98; // 2-byte DIE offset
pub const DW_OP_CALL4: u8 = 0x99; // 4-byte DIE offset
pub const DW_OP_CALL_REF: u8 = 0x9A; // 4- or 8-byte DIE offset
pub const DW_OP_FORM_TLS_ADDRESS: u8 = 0x9B;
pub const DW_OP_CALL_FRAME_CFA: u8 = 0x9C;
pub const DW_OP_BIT_PIECE: u8 = 0x9D; // ULEB128 size, ULEB128 offset (bits)
pub const DW_OP_IMPLICIT_VALUE: u8 = 0x9E; // ULEB128 length + block
pub const DW_OP_STACK_VALUE: u8 = 0x9F;
pub const DW_OP_IMPLICIT_POINTER: u8 = 0xA0; // DIE offset + SLEB128 byte offset
pub const DW_OP_ADDRX: u8 = 0xA1; // ULEB128 index into .debug_addr
pub const DW_OP_CONSTX: u8 = 0xA2; // ULEB128 index into .debug_addr
pub const DW_OP_ENTRY_VALUE: u8 = 0xA3; // ULEB128 length + sub-expression
pub const DW_OP_CONST_TYPE: u8 = 0xA4; // ULEB128 type DIE + 1-byte size + value
pub const DW_OP_REGVAL_TYPE: u8 = 0xA5; // ULEB128 register + ULEB128 type DIE
pub const DW_OP_DEREF_TYPE: u8 = 0xA6; // 1-byte size + ULEB128 type DIE
pub const DW_OP_XDEREF_TYPE: u8 = 0xA7; // 1-byte size + ULEB128 type DIE
pub const DW_OP_CONVERT: u8 = 0xA8; // ULEB128 type DIE
pub const DW_OP_REINTERPRET: u8 = 0xA9; // ULEB128 type DIE
pub const DW_OP_GNU_ENTRY_VALUE: u8 = 0xF3;

// Location-list entry kinds, DWARF 5 section 7.7.3.
pub const DW_LLE_END_OF_LIST: u8 = 0x00;
pub const DW_LLE_BASE_ADDRESSX: u8 = 0x01;
pub const DW_LLE_STARTX_ENDX: u8 = 0x02;
pub const DW_LLE_STARTX_LENGTH: u8 = 0x03;
pub const DW_LLE_OFFSET_PAIR: u8 = 0x04;
pub const DW_LLE_DEFAULT_LOCATION: u8 = 0x05;
pub const DW_LLE_BASE_ADDRESS: u8 = 0x06;
pub const DW_LLE_START_END: u8 = 0x07;
pub const DW_LLE_START_LENGTH: u8 = 0x08;

// Base-type encodings (DW_AT_encoding values), DWARF 5 section 5.1.
pub const DW_ATE_ADDRESS: u8 = 0x01;
pub const DW_ATE_BOOLEAN: u8 = 0x02;
pub const DW_ATE_FLOAT: u8 = 0x04;
pub const DW_ATE_SIGNED: u8 = 0x05;
pub const DW_ATE_SIGNED_CHAR: u8 = 0x06;
pub const DW_ATE_UNSIGNED: u8 = 0x07;
pub const DW_ATE_UNSIGNED_CHAR: u8 = 0x08;
