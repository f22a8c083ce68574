use crate::dwarf::consts::*;
use crate::dwarf::DwarfError;
use byteorder::{ByteOrder, LittleEndian};

/// Read a `u8` at `*loc` and advance the cursor.
#[inline]
pub fn read_u8(data: &[u8], loc: &mut usize) -> Result<u8, DwarfError> {
    let v = *data.get(*loc).ok_or(DwarfError::UnexpectedEof(*loc))?;
    *loc += 1;
    Ok(v)
}

/// Read a little-endian `u16` at `*loc` and advance the cursor.
#[inline]
pub fn read_u16(data: &[u8], loc: &mut usize) -> Result<u16, DwarfError> {
    let end = loc.checked_add(2).ok_or(DwarfError::UnexpectedEof(*loc))?;
    let bytes = data.get(*loc..end).ok_or(DwarfError::UnexpectedEof(*loc))?;
    *loc = end;
    Ok(LittleEndian::read_u16(bytes))
}

/// Read a little-endian `u32` at `*loc` and advance the cursor.
#[inline]
pub fn read_u32(data: &[u8], loc: &mut usize) -> Result<u32, DwarfError> {
    let end = loc.checked_add(4).ok_or(DwarfError::UnexpectedEof(*loc))?;
    let bytes = data.get(*loc..end).ok_or(DwarfError::UnexpectedEof(*loc))?;
    *loc = end;
    Ok(LittleEndian::read_u32(bytes))
}

/// Read a little-endian `u64` at `*loc` and advance the cursor.
#[inline]
pub fn read_u64(data: &[u8], loc: &mut usize) -> Result<u64, DwarfError> {
    let end = loc.checked_add(8).ok_or(DwarfError::UnexpectedEof(*loc))?;
    let bytes = data.get(*loc..end).ok_or(DwarfError::UnexpectedEof(*loc))?;
    *loc = end;
    Ok(LittleEndian::read_u64(bytes))
}

/// Read a ULEB128 into a 64-bit word.
pub fn decode_uleb128(data: &[u8], loc: &mut usize, end: usize) -> Result<u64, DwarfError> {
    let mut res = 0u64;
    let mut bit = 0u64;
    loop {
        if *loc >= end || *loc >= data.len() {
            return Err(DwarfError::TruncatedUleb128(*loc));
        }
        let byte = data[*loc];
        *loc += 1;
        let b = (byte & 0b111_1111) as u64;
        if bit >= 64 || b << bit >> bit != b {
            return Err(DwarfError::MalformedUleb128(*loc));
        }
        res |= b << bit;
        bit += 7;
        if byte < 0b1000_0000 {
            break;
        }
    }
    Ok(res)
}

/// Read a SLEB128 into a 64-bit word.
pub fn decode_sleb128(data: &[u8], loc: &mut usize, end: usize) -> Result<i64, DwarfError> {
    let mut res = 0i64;
    let mut bit = 0u64;
    let mut byte;
    loop {
        if *loc >= end || *loc >= data.len() {
            return Err(DwarfError::TruncatedSleb128(*loc));
        }
        byte = data[*loc];
        *loc += 1;
        res |= (((byte & 0b111_1111) as u64) << bit) as i64;
        bit += 7;
        if (byte & 0b1000_0000) == 0 {
            break;
        }
    }
    // Sign extend negative numbers.
    if (byte & 0x40) != 0 && bit < 64 {
        res |= (u64::MAX << bit) as i64;
    }
    Ok(res)
}

/// Decode a pointer-encoded value (DW_EH_PE_*).
///
/// `section_base` is the address the section's first byte is mapped at;
/// PC-relative values relocate against `section_base + field offset`.
/// An omitted encoding (0xFF) falls back to an 8-byte absolute pointer.
pub fn decode_pointer(
    data: &[u8],
    loc: &mut usize,
    end: usize,
    enc: u8,
    section_base: u64,
    datarel_base: u64,
) -> Result<u64, DwarfError> {
    if enc == DW_EH_PE_OMIT {
        return read_u64(data, loc);
    }

    // Calculate the relocation offset.
    let offset = match enc & 0b0111_0000 {
        DW_EH_PE_ABSPTR => 0,
        DW_EH_PE_PCREL => section_base.wrapping_add(*loc as u64),
        DW_EH_PE_DATAREL => {
            // DATAREL is only valid with a real base; zero means the
            // caller had none to give.
            if datarel_base == 0 {
                return Err(DwarfError::InvalidDataRelBase);
            }
            datarel_base
        }
        v => return Err(DwarfError::InvalidPointerEncodingOffset(v)),
    };

    let res = match enc & 0b1111 {
        DW_EH_PE_PTR => offset.wrapping_add(read_u64(data, loc)?),
        DW_EH_PE_ULEB128 => offset.wrapping_add(decode_uleb128(data, loc, end)?),
        DW_EH_PE_UDATA2 => offset.wrapping_add(read_u16(data, loc)? as u64),
        DW_EH_PE_UDATA4 => offset.wrapping_add(read_u32(data, loc)? as u64),
        DW_EH_PE_UDATA8 => offset.wrapping_add(read_u64(data, loc)?),
        DW_EH_PE_SLEB128 => offset.wrapping_add(decode_sleb128(data, loc, end)? as u64),
        DW_EH_PE_SDATA2 => offset.wrapping_add(read_u16(data, loc)? as i16 as i64 as u64),
        DW_EH_PE_SDATA4 => offset.wrapping_add(read_u32(data, loc)? as i32 as i64 as u64),
        DW_EH_PE_SDATA8 => offset.wrapping_add(read_u64(data, loc)?),
        v => return Err(DwarfError::InvalidPointerEncodingValue(v)),
    };

    // Indirect pointers dereference debuggee memory; a file-backed
    // reader has nothing to dereference into.
    if enc & DW_EH_PE_INDIRECT != 0 {
        return Err(DwarfError::InvalidPointerEncodingValue(enc));
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uleb128() {
        for value in [0u64, 1, 127, 128, 0x12345678, u64::MAX] {
            let mut buf = Vec::new();
            let len = leb128::write::unsigned(&mut buf, value).unwrap();
            assert_eq!(len, buf.len());
            let mut loc = 0;
            assert_eq!(decode_uleb128(&buf, &mut loc, buf.len()).unwrap(), value);
            assert_eq!(loc, len);
        }
    }

    #[test]
    fn test_decode_uleb128_truncated() {
        let mut buf = Vec::new();
        leb128::write::unsigned(&mut buf, 0x12345678).unwrap();
        buf.pop();
        let mut loc = 0;
        assert!(decode_uleb128(&buf, &mut loc, buf.len()).is_err());
    }

    #[test]
    fn test_decode_sleb128() {
        for value in [0i64, 1, -1, 63, -64, 0x12345678, i64::MAX, i64::MIN] {
            let mut buf = Vec::new();
            let len = leb128::write::signed(&mut buf, value).unwrap();
            assert_eq!(len, buf.len());
            let mut loc = 0;
            assert_eq!(decode_sleb128(&buf, &mut loc, buf.len()).unwrap(), value);
            assert_eq!(loc, len);
        }
    }

    #[test]
    fn test_decode_pointer_formats() {
        let data = u64::MAX.to_le_bytes();
        let mut loc = 0;
        let enc = DW_EH_PE_ABSPTR | DW_EH_PE_PTR;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0, 0).unwrap(), u64::MAX);
        assert_eq!(loc, 8);

        let data = 0xABCDu16.to_le_bytes();
        let mut loc = 0;
        let enc = DW_EH_PE_ABSPTR | DW_EH_PE_UDATA2;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0, 0).unwrap(), 0xABCD);
        assert_eq!(loc, 2);

        let data = 0xDEADBEEFu32.to_le_bytes();
        let mut loc = 0;
        let enc = DW_EH_PE_ABSPTR | DW_EH_PE_UDATA4;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0, 0).unwrap(), 0xDEADBEEF);
        assert_eq!(loc, 4);

        let data = (-1i32 as u32).to_le_bytes();
        let mut loc = 0;
        let enc = DW_EH_PE_ABSPTR | DW_EH_PE_SDATA4;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0, 0).unwrap(), u64::MAX);
        assert_eq!(loc, 4);
    }

    #[test]
    fn test_decode_pointer_pcrel() {
        // Field sits at offset 8 of a section based at 0x1000; the stored
        // value 0x20 relocates to 0x1000 + 8 + 0x20.
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&0x20u32.to_le_bytes());
        let mut loc = 8;
        let enc = DW_EH_PE_PCREL | DW_EH_PE_UDATA4;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0x1000, 0).unwrap(), 0x1028);
    }

    #[test]
    fn test_decode_pointer_negative_datarel() {
        let data = (-1i32 as u32).to_le_bytes();
        let mut loc = 0;
        let enc = DW_EH_PE_DATAREL | DW_EH_PE_SDATA4;
        assert_eq!(decode_pointer(&data, &mut loc, data.len(), enc, 0, 0x456).unwrap(), 0x455);
        assert_eq!(loc, 4);
    }

    #[test]
    fn test_decode_pointer_omit_defaults_to_absolute() {
        let data = 0x7FFF_0000u64.to_le_bytes();
        let mut loc = 0;
        assert_eq!(
            decode_pointer(&data, &mut loc, data.len(), DW_EH_PE_OMIT, 0, 0).unwrap(),
            0x7FFF_0000
        );
    }
}
