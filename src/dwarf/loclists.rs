use crate::dwarf::consts::*;
use crate::dwarf::encoding::*;
use crate::dwarf::DwarfError;

/// Find the expression covering `pc` in a DWARF 4 `.debug_loc` list.
///
/// `base_address` is the owning compilation unit's base (usually its
/// `DW_AT_low_pc`); `(u64::MAX, x)` entries switch the base to `x`.
/// Returns `None` when no range covers the PC or the list is malformed.
pub fn locate_dwarf4<'a>(
    loc_data: &'a [u8],
    offset: usize,
    pc: u64,
    base_address: u64,
) -> Option<&'a [u8]> {
    locate_dwarf4_inner(loc_data, offset, pc, base_address).ok().flatten()
}

fn locate_dwarf4_inner<'a>(
    data: &'a [u8],
    offset: usize,
    pc: u64,
    mut base: u64,
) -> Result<Option<&'a [u8]>, DwarfError> {
    let mut loc = offset;
    loop {
        let begin = read_u64(data, &mut loc)?;
        let end = read_u64(data, &mut loc)?;
        if begin == u64::MAX {
            // Base-address selection entry.
            base = end;
            continue;
        }
        if begin == 0 && end == 0 {
            return Ok(None);
        }
        let len = read_u16(data, &mut loc)? as usize;
        let expr_end = loc
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or(DwarfError::UnexpectedEof(loc))?;
        if pc >= base.wrapping_add(begin) && pc < base.wrapping_add(end) {
            return Ok(Some(&data[loc..expr_end]));
        }
        loc = expr_end;
    }
}

/// Find the expression covering `pc` in a DWARF 5 `.debug_loclists`
/// list.
///
/// Indexed entry kinds resolve through `debug_addr` at `addr_base`. A
/// `DW_LLE_default_location` entry applies only when no explicit range
/// matched.
pub fn locate_dwarf5<'a>(
    loclists_data: &'a [u8],
    offset: usize,
    pc: u64,
    base_address: u64,
    debug_addr: Option<&[u8]>,
    addr_base: u64,
) -> Option<&'a [u8]> {
    locate_dwarf5_inner(loclists_data, offset, pc, base_address, debug_addr, addr_base)
        .ok()
        .flatten()
}

fn locate_dwarf5_inner<'a>(
    data: &'a [u8],
    offset: usize,
    pc: u64,
    mut base: u64,
    debug_addr: Option<&[u8]>,
    addr_base: u64,
) -> Result<Option<&'a [u8]>, DwarfError> {
    let end = data.len();
    let mut loc = offset;
    let mut default_location: Option<&'a [u8]> = None;

    let indexed_addr = |index: u64| -> Result<u64, DwarfError> {
        let table = debug_addr.ok_or(DwarfError::UnexpectedEof(0))?;
        let offset = index
            .checked_mul(8)
            .and_then(|o| addr_base.checked_add(o))
            .ok_or(DwarfError::UnexpectedEof(0))?;
        let mut addr_loc = offset as usize;
        read_u64(table, &mut addr_loc)
    };

    loop {
        let kind = read_u8(data, &mut loc)?;
        let range = match kind {
            DW_LLE_END_OF_LIST => break,
            DW_LLE_BASE_ADDRESSX => {
                let index = decode_uleb128(data, &mut loc, end)?;
                base = indexed_addr(index)?;
                continue;
            }
            DW_LLE_BASE_ADDRESS => {
                base = read_u64(data, &mut loc)?;
                continue;
            }
            DW_LLE_STARTX_ENDX => {
                let start = indexed_addr(decode_uleb128(data, &mut loc, end)?)?;
                let range_end = indexed_addr(decode_uleb128(data, &mut loc, end)?)?;
                Some((start, range_end))
            }
            DW_LLE_STARTX_LENGTH => {
                let start = indexed_addr(decode_uleb128(data, &mut loc, end)?)?;
                let len = decode_uleb128(data, &mut loc, end)?;
                Some((start, start.wrapping_add(len)))
            }
            DW_LLE_OFFSET_PAIR => {
                let begin = decode_uleb128(data, &mut loc, end)?;
                let range_end = decode_uleb128(data, &mut loc, end)?;
                Some((base.wrapping_add(begin), base.wrapping_add(range_end)))
            }
            DW_LLE_DEFAULT_LOCATION => None,
            DW_LLE_START_END => {
                let start = read_u64(data, &mut loc)?;
                let range_end = read_u64(data, &mut loc)?;
                Some((start, range_end))
            }
            DW_LLE_START_LENGTH => {
                let start = read_u64(data, &mut loc)?;
                let len = decode_uleb128(data, &mut loc, end)?;
                Some((start, start.wrapping_add(len)))
            }
            _ => return Err(DwarfError::InvalidExpression(kind)),
        };

        // Counted location description follows every non-base entry.
        let len = decode_uleb128(data, &mut loc, end)? as usize;
        let expr_end = loc
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or(DwarfError::UnexpectedEof(loc))?;
        let expr = &data[loc..expr_end];
        loc = expr_end;

        match range {
            Some((start, range_end)) => {
                if pc >= start && pc < range_end {
                    return Ok(Some(expr));
                }
            }
            None => default_location = Some(expr),
        }
    }

    Ok(default_location)
}
