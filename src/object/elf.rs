//! ELF section-header walk. Only the little-endian 32/64-bit layouts
//! are supported; the loader reads the section-header table directly
//! off the header fields.

use super::{Compression, DebugSections, ObjectError, SectionInfo};
use byteorder::{ByteOrder, LittleEndian};

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const SHF_COMPRESSED: u64 = 0x800;

pub(crate) fn parse(data: &[u8]) -> Result<DebugSections, ObjectError> {
    if data[5] != ELFDATA2LSB {
        return Err(ObjectError::UnsupportedFormat("big-endian ELF"));
    }
    match data[4] {
        ELFCLASS64 => parse_class(data, true),
        ELFCLASS32 => parse_class(data, false),
        _ => Err(ObjectError::UnsupportedFormat("unknown ELF class")),
    }
}

struct SectionHeader {
    name_offset: u32,
    flags: u64,
    offset: u64,
    size: u64,
}

fn parse_class(data: &[u8], is64: bool) -> Result<DebugSections, ObjectError> {
    let ehdr_size = if is64 { 64 } else { 52 };
    if data.len() < ehdr_size {
        return Err(ObjectError::IncompleteRead);
    }

    let (shoff, shentsize, shnum, shstrndx) = if is64 {
        (
            LittleEndian::read_u64(&data[0x28..0x30]),
            LittleEndian::read_u16(&data[0x3A..0x3C]) as usize,
            LittleEndian::read_u16(&data[0x3C..0x3E]) as usize,
            LittleEndian::read_u16(&data[0x3E..0x40]) as usize,
        )
    } else {
        (
            LittleEndian::read_u32(&data[0x20..0x24]) as u64,
            LittleEndian::read_u16(&data[0x2E..0x30]) as usize,
            LittleEndian::read_u16(&data[0x30..0x32]) as usize,
            LittleEndian::read_u16(&data[0x32..0x34]) as usize,
        )
    };

    let header_at = |index: usize| -> Option<SectionHeader> {
        let start = (shoff as usize).checked_add(index.checked_mul(shentsize)?)?;
        let bytes = data.get(start..start.checked_add(shentsize)?)?;
        Some(if is64 {
            if bytes.len() < 0x28 {
                return None;
            }
            SectionHeader {
                name_offset: LittleEndian::read_u32(&bytes[0..4]),
                flags: LittleEndian::read_u64(&bytes[0x08..0x10]),
                offset: LittleEndian::read_u64(&bytes[0x18..0x20]),
                size: LittleEndian::read_u64(&bytes[0x20..0x28]),
            }
        } else {
            if bytes.len() < 0x18 {
                return None;
            }
            SectionHeader {
                name_offset: LittleEndian::read_u32(&bytes[0..4]),
                flags: LittleEndian::read_u32(&bytes[0x08..0x0C]) as u64,
                offset: LittleEndian::read_u32(&bytes[0x10..0x14]) as u64,
                size: LittleEndian::read_u32(&bytes[0x14..0x18]) as u64,
            }
        })
    };

    let mut sections = DebugSections::default();

    // The name string table is the key to everything; without it no
    // section can be classified. Its absence is not fatal, the map
    // just stays empty.
    let strtab: &[u8] = match header_at(shstrndx) {
        Some(hdr) => (hdr.offset as usize)
            .checked_add(hdr.size as usize)
            .and_then(|end| data.get(hdr.offset as usize..end))
            .unwrap_or(&[]),
        None => &[],
    };

    for index in 0..shnum {
        let Some(hdr) = header_at(index) else {
            continue;
        };
        let Some(name) = read_name(strtab, hdr.name_offset as usize) else {
            continue;
        };
        let compression = if hdr.flags & SHF_COMPRESSED != 0 && name.starts_with(".debug_") {
            if is64 {
                Compression::Shf64
            } else {
                Compression::Shf32
            }
        } else {
            Compression::None
        };
        sections.store(
            name,
            SectionInfo { offset: hdr.offset, size: hdr.size, compression },
        );
    }
    Ok(sections)
}

fn read_name(strtab: &[u8], offset: usize) -> Option<&str> {
    let tail = strtab.get(offset..)?;
    let len = tail.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&tail[..len]).ok()
}
