//! Mach-O segment walk. Only 64-bit little-endian images are
//! supported; DWARF sections live in the `__DWARF` segment under
//! abbreviated names (`__debug_info`, …).

use super::{Compression, DebugSections, ObjectError, SectionInfo};
use byteorder::{ByteOrder, LittleEndian};

const MH_MAGIC_64: u32 = 0xFEED_FACF;
const MH_MAGIC_32: u32 = 0xFEED_FACE;
const MH_CIGAM_64: u32 = 0xCFFA_EDFE;
const MH_CIGAM_32: u32 = 0xCEFA_EDFE;
const LC_SEGMENT_64: u32 = 0x19;
const HEADER_SIZE: usize = 32;
const SECTION_64_SIZE: usize = 80;

pub(crate) fn is_macho_magic(magic: &[u8]) -> bool {
    let value = LittleEndian::read_u32(magic);
    matches!(value, MH_MAGIC_64 | MH_MAGIC_32 | MH_CIGAM_64 | MH_CIGAM_32)
}

pub(crate) fn parse(data: &[u8]) -> Result<DebugSections, ObjectError> {
    match LittleEndian::read_u32(&data[0..4]) {
        MH_MAGIC_64 => {}
        MH_MAGIC_32 => return Err(ObjectError::UnsupportedFormat("32-bit Mach-O")),
        MH_CIGAM_64 | MH_CIGAM_32 => {
            return Err(ObjectError::UnsupportedFormat("big-endian Mach-O"))
        }
        _ => return Err(ObjectError::InvalidMagic),
    }
    if data.len() < HEADER_SIZE {
        return Err(ObjectError::IncompleteRead);
    }

    let ncmds = LittleEndian::read_u32(&data[16..20]) as usize;
    let mut sections = DebugSections::default();
    let mut loc = HEADER_SIZE;

    for _ in 0..ncmds {
        let Some(cmd_bytes) = data.get(loc..loc + 8) else {
            break;
        };
        let cmd = LittleEndian::read_u32(&cmd_bytes[0..4]);
        let cmdsize = LittleEndian::read_u32(&cmd_bytes[4..8]) as usize;
        if cmdsize < 8 {
            break;
        }
        if cmd == LC_SEGMENT_64 {
            parse_segment(data, loc, cmdsize, &mut sections);
        }
        loc = match loc.checked_add(cmdsize) {
            Some(next) if next <= data.len() => next,
            _ => break,
        };
    }
    Ok(sections)
}

fn parse_segment(data: &[u8], seg_start: usize, cmdsize: usize, sections: &mut DebugSections) {
    // segment_command_64: nsects sits at offset 64, section_64 records
    // follow the 72-byte command header.
    let Some(seg) = data.get(seg_start..seg_start + cmdsize) else {
        return;
    };
    if seg.len() < 72 {
        return;
    }
    let nsects = LittleEndian::read_u32(&seg[64..68]) as usize;

    for index in 0..nsects {
        let start = 72 + index * SECTION_64_SIZE;
        let Some(sect) = seg.get(start..start + SECTION_64_SIZE) else {
            return;
        };
        let Some(name) = canonical_name(&sect[0..16]) else {
            continue;
        };
        let size = LittleEndian::read_u64(&sect[40..48]);
        let offset = LittleEndian::read_u32(&sect[48..52]) as u64;
        sections.store(&name, SectionInfo { offset, size, compression: Compression::None });
    }
}

/// Map a Mach-O section name (`__debug_info`, `__zdebug_info`,
/// `__eh_frame`) onto the canonical ELF-style spelling.
fn canonical_name(raw: &[u8]) -> Option<String> {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let name = std::str::from_utf8(&raw[..len]).ok()?;
    let rest = name.strip_prefix("__")?;
    Some(format!(".{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::load;

    /// Assemble a Mach-O 64 image with one `__DWARF` segment holding
    /// the given (section name, payload) pairs.
    fn build_macho64(specs: &[(&str, &[u8])]) -> Vec<u8> {
        let cmdsize = 72 + specs.len() * SECTION_64_SIZE;
        let data_base = HEADER_SIZE + cmdsize;

        let mut out = vec![0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut out[0..4], MH_MAGIC_64);
        LittleEndian::write_u32(&mut out[16..20], 1); // ncmds
        LittleEndian::write_u32(&mut out[20..24], cmdsize as u32);

        let mut seg = vec![0u8; 72];
        LittleEndian::write_u32(&mut seg[0..4], LC_SEGMENT_64);
        LittleEndian::write_u32(&mut seg[4..8], cmdsize as u32);
        seg[8..8 + 7].copy_from_slice(b"__DWARF");
        LittleEndian::write_u32(&mut seg[64..68], specs.len() as u32);
        out.extend_from_slice(&seg);

        let mut payload = Vec::new();
        for (name, bytes) in specs {
            let mut sect = [0u8; SECTION_64_SIZE];
            sect[0..name.len()].copy_from_slice(name.as_bytes());
            sect[16..16 + 7].copy_from_slice(b"__DWARF");
            LittleEndian::write_u64(&mut sect[40..48], bytes.len() as u64);
            LittleEndian::write_u32(
                &mut sect[48..52],
                (data_base + payload.len()) as u32,
            );
            out.extend_from_slice(&sect);
            payload.extend_from_slice(bytes);
        }
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn test_macho_dwarf_sections() {
        let bytes = build_macho64(&[
            ("__debug_info", b"info bytes"),
            ("__debug_line", b"line bytes"),
            ("__eh_frame", b"frame bytes"),
        ]);
        let image = load(&bytes).unwrap();
        assert_eq!(image.sections.count(), 3);
        let info = image.sections.debug_info.unwrap();
        assert_eq!(image.section_data(&info).unwrap(), b"info bytes");
        assert!(image.sections.eh_frame.is_some());
    }

    #[test]
    fn test_macho_32_bit_rejected() {
        let mut bytes = vec![0u8; 32];
        LittleEndian::write_u32(&mut bytes[0..4], MH_MAGIC_32);
        assert!(matches!(load(&bytes), Err(ObjectError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_macho_big_endian_rejected() {
        let mut bytes = vec![0u8; 32];
        LittleEndian::write_u32(&mut bytes[0..4], MH_CIGAM_64);
        assert!(matches!(load(&bytes), Err(ObjectError::UnsupportedFormat(_))));
    }
}
