use crate::dwarf::consts::*;
use crate::dwarf::encoding::*;
use crate::dwarf::DwarfError;
use std::ops::Range;

/// Which frame section an entry stream came from. The two share a wire
/// format but disagree on the CIE-id marker and on how an FDE points
/// back at its CIE.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameSectionKind {
    EhFrame,
    DebugFrame,
}

impl FrameSectionKind {
    #[inline]
    fn cie_id(self) -> u32 {
        match self {
            FrameSectionKind::EhFrame => 0,
            FrameSectionKind::DebugFrame => 0xFFFF_FFFF,
        }
    }
}

/// A parsed Common Information Entry.
#[derive(Debug, Default, Clone)]
pub struct CieEntry {
    pub code_alignment: u64,
    pub data_alignment: i64,
    pub return_address_register: u64,
    /// Byte range of the initial instruction stream within the section.
    pub initial_instructions: Range<usize>,
    pub augmentation: String,
    pub fde_pointer_encoding: u8,
}

/// A parsed Frame Description Entry covering
/// `[initial_location, initial_location + address_range)`.
#[derive(Debug, Default, Clone)]
pub struct FdeEntry {
    pub cie_offset: usize,
    pub initial_location: u64,
    pub address_range: u64,
    /// Byte range of the instruction stream within the section.
    pub instructions: Range<usize>,
}

impl FdeEntry {
    /// Determine whether the target address is in the current FDE.
    #[inline]
    pub fn contains(&self, target: u64) -> bool {
        self.initial_location <= target
            && target < self.initial_location.wrapping_add(self.address_range)
    }
}

/// Read an entry's length prefix. Returns the entry's content end, or
/// `None` for the zero terminator.
fn read_entry_length(data: &[u8], loc: &mut usize) -> Result<Option<usize>, DwarfError> {
    let mut length = read_u32(data, loc)? as u64;
    if length == 0xFFFF_FFFF {
        // 0xffffffff means the length is really the next 8 bytes.
        length = read_u64(data, loc)?;
    }
    if length == 0 {
        return Ok(None);
    }
    let end = loc
        .checked_add(length as usize)
        .filter(|&e| e <= data.len())
        .ok_or(DwarfError::UnexpectedEof(*loc))?;
    Ok(Some(end))
}

/// Parse the CIE at `offset` into a [CieEntry].
pub fn parse_cie(data: &[u8], offset: usize) -> Result<CieEntry, DwarfError> {
    let mut loc = offset;
    let content_end = read_entry_length(data, &mut loc)?.ok_or(DwarfError::CieZeroLength)?;

    // Both the .eh_frame and the .debug_frame marker are accepted here;
    // the caller already knows which section it is holding.
    let cie_id = read_u32(data, &mut loc)?;
    if cie_id != 0 && cie_id != 0xFFFF_FFFF {
        return Err(DwarfError::NotACie(offset));
    }

    let version = read_u8(data, &mut loc)?;
    if version != 1 && version != 3 && version != 4 {
        return Err(DwarfError::CieInvalidVersion(version));
    }

    // NUL-terminated augmentation string.
    let aug_start = loc;
    while read_u8(data, &mut loc)? != 0 {}
    let augmentation = String::from_utf8_lossy(&data[aug_start..loc - 1]).into_owned();

    // DWARF 4 and later CIEs carry address and segment selector sizes.
    if version == 4 {
        let _address_size = read_u8(data, &mut loc)?;
        let _segment_selector_size = read_u8(data, &mut loc)?;
    }

    let code_alignment = decode_uleb128(data, &mut loc, content_end)?;
    let data_alignment = decode_sleb128(data, &mut loc, content_end)?;
    let return_address_register = if version == 1 {
        read_u8(data, &mut loc)? as u64
    } else {
        decode_uleb128(data, &mut loc, content_end)?
    };

    let mut cie = CieEntry {
        code_alignment,
        data_alignment,
        return_address_register,
        initial_instructions: 0..0,
        augmentation,
        fde_pointer_encoding: DW_EH_PE_OMIT,
    };

    if cie.augmentation.starts_with('z') {
        let aug_len = decode_uleb128(data, &mut loc, content_end)?;
        let aug_end = loc
            .checked_add(aug_len as usize)
            .filter(|&e| e <= content_end)
            .ok_or(DwarfError::UnexpectedEof(loc))?;
        // A malformed or unknown augmentation aborts parsing here; the
        // CIE stays usable with the default pointer encoding.
        let _ = parse_augmentation_data(data, &mut cie, loc, aug_end);
        loc = aug_end;
    }

    cie.initial_instructions = loc..content_end;
    Ok(cie)
}

fn parse_augmentation_data(
    data: &[u8],
    cie: &mut CieEntry,
    mut loc: usize,
    aug_end: usize,
) -> Result<(), DwarfError> {
    let augmentation = cie.augmentation.clone();
    for ch in augmentation.chars().skip(1) {
        match ch {
            'R' => {
                cie.fde_pointer_encoding = read_u8(data, &mut loc)?;
            }
            'L' => {
                // LSDA encoding; the engine never reads the LSDA itself.
                let _lsda_encoding = read_u8(data, &mut loc)?;
            }
            'P' => {
                // Personality routine pointer, skipped.
                let enc = read_u8(data, &mut loc)?;
                let _ = decode_pointer(data, &mut loc, aug_end, enc & !DW_EH_PE_INDIRECT, 0, 0)?;
            }
            'S' => {} // signal frame marker, zero-width
            _ => return Err(DwarfError::UnexpectedEof(loc)),
        }
        if loc > aug_end {
            return Err(DwarfError::UnexpectedEof(loc));
        }
    }
    Ok(())
}

/// Parse the FDE at `offset`, together with the CIE it references.
pub fn parse_fde_at(
    data: &[u8],
    kind: FrameSectionKind,
    offset: usize,
) -> Result<(FdeEntry, CieEntry), DwarfError> {
    let mut loc = offset;
    let content_end = read_entry_length(data, &mut loc)?.ok_or(DwarfError::FdeNotFound)?;

    let cie_field_offset = loc;
    let cie_ptr = read_u32(data, &mut loc)?;
    if cie_ptr == kind.cie_id() {
        return Err(DwarfError::FdeIsReallyCie);
    }
    let cie_offset = match kind {
        // Back-offset from the CIE-pointer field to the CIE's start.
        FrameSectionKind::EhFrame => cie_field_offset
            .checked_sub(cie_ptr as usize)
            .ok_or(DwarfError::UnexpectedEof(cie_field_offset))?,
        // Section offset of the CIE.
        FrameSectionKind::DebugFrame => cie_ptr as usize,
    };
    let cie = parse_cie(data, cie_offset)?;

    let enc = cie.fde_pointer_encoding;
    let initial_location = decode_pointer(data, &mut loc, content_end, enc, 0, 0)?;
    // The range shares the value format but is always absolute.
    let address_range = if enc == DW_EH_PE_OMIT {
        read_u64(data, &mut loc)?
    } else {
        decode_pointer(data, &mut loc, content_end, enc & 0x0F, 0, 0)?
    };

    // FDEs of a 'z' CIE carry a ULEB128-prefixed augmentation block.
    if cie.augmentation.starts_with('z') {
        let aug_len = decode_uleb128(data, &mut loc, content_end)?;
        loc = loc
            .checked_add(aug_len as usize)
            .filter(|&e| e <= content_end)
            .ok_or(DwarfError::UnexpectedEof(loc))?;
    }

    let fde = FdeEntry {
        cie_offset,
        initial_location,
        address_range,
        instructions: loc..content_end,
    };
    Ok((fde, cie))
}

/// Full scan of a frame section for the FDE covering `target`.
pub fn find_fde(
    data: &[u8],
    kind: FrameSectionKind,
    target: u64,
) -> Result<(FdeEntry, CieEntry), DwarfError> {
    let mut offset = 0usize;
    while offset < data.len() {
        let mut loc = offset;
        let Some(content_end) = read_entry_length(data, &mut loc)? else {
            break; // zero terminator
        };
        let id = read_u32(data, &mut loc)?;
        if id != kind.cie_id() {
            let (fde, cie) = parse_fde_at(data, kind, offset)?;
            if fde.contains(target) {
                return Ok((fde, cie));
            }
        }
        offset = content_end;
    }
    Err(DwarfError::FdeNotFound)
}

/// Parsed `.eh_frame_hdr`: the sorted FDE lookup table emitted by the
/// linker. Avoids the linear section scan when the caller knows where
/// the header is mapped.
#[derive(Debug)]
pub struct EhFrameHeader {
    pub eh_frame_ptr: u64,
    pub fde_count: u64,
    table_offset: usize,
    table_enc: u8,
}

impl EhFrameHeader {
    /// Parse a version-1 header. `hdr_vaddr` is the address the header
    /// bytes are mapped at; relative encodings resolve against it.
    pub fn parse(data: &[u8], hdr_vaddr: u64) -> Result<Self, DwarfError> {
        let mut loc = 0usize;
        let version = read_u8(data, &mut loc)?;
        if version != 1 {
            return Err(DwarfError::InvalidHeaderVersion(version));
        }
        let eh_frame_ptr_enc = read_u8(data, &mut loc)?;
        let fde_count_enc = read_u8(data, &mut loc)?;
        let table_enc = read_u8(data, &mut loc)?;

        let eh_frame_ptr =
            decode_pointer(data, &mut loc, data.len(), eh_frame_ptr_enc, hdr_vaddr, hdr_vaddr)?;
        let fde_count = if fde_count_enc != DW_EH_PE_OMIT {
            decode_pointer(data, &mut loc, data.len(), fde_count_enc, hdr_vaddr, hdr_vaddr)?
        } else {
            0
        };
        Ok(Self {
            eh_frame_ptr,
            fde_count,
            table_offset: loc,
            table_enc,
        })
    }

    fn entry_size(&self) -> Option<usize> {
        match self.table_enc & 0b1111 {
            DW_EH_PE_UDATA2 | DW_EH_PE_SDATA2 => Some(4),
            DW_EH_PE_UDATA4 | DW_EH_PE_SDATA4 => Some(8),
            DW_EH_PE_PTR | DW_EH_PE_UDATA8 | DW_EH_PE_SDATA8 => Some(16),
            _ => None,
        }
    }

    /// Binary-search the table for the FDE covering `target`. Returns
    /// the FDE's address; the caller subtracts the `.eh_frame` base to
    /// get a section offset.
    pub fn search(&self, data: &[u8], hdr_vaddr: u64, target: u64) -> Option<u64> {
        let entry_size = self.entry_size()?;
        let count = self.fde_count as usize;
        if count == 0 {
            return None;
        }

        let read_entry = |index: usize| -> Result<(u64, u64), DwarfError> {
            let mut loc = self.table_offset + index * entry_size;
            let initial =
                decode_pointer(data, &mut loc, data.len(), self.table_enc, hdr_vaddr, hdr_vaddr)?;
            let fde =
                decode_pointer(data, &mut loc, data.len(), self.table_enc, hdr_vaddr, hdr_vaddr)?;
            Ok((initial, fde))
        };

        // Find the last entry whose initial_location <= target.
        let mut low = 0usize;
        let mut len = count;
        while len > 1 {
            let mid = low + len / 2;
            let (initial, _) = read_entry(mid).ok()?;
            if initial <= target {
                low = mid;
                len -= len / 2;
            } else {
                len /= 2;
            }
        }
        let (initial, fde) = read_entry(low).ok()?;
        if initial > target {
            return None;
        }
        Some(fde)
    }
}
