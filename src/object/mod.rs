//! Object-file loading: find the DWARF sections inside an ELF or
//! Mach-O image and hand out their bytes, inflating compressed
//! sections on demand.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::io::Read;

mod elf;
mod macho;

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectError {
    #[error("input shorter than minimum header")]
    TooSmall,

    #[error("unrecognized image magic")]
    InvalidMagic,

    #[error("unsupported object format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("incomplete read of object header")]
    IncompleteRead,

    #[error("section extends past end of image")]
    TruncatedSection,

    #[error("invalid compressed section header")]
    InvalidCompressedSection,

    #[error("zlib decompression failed")]
    DecompressFailed,
}

/// How a section's bytes are stored in the image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    /// `.zdebug_*`: "ZLIB" signature + 8-byte big-endian size.
    ZDebug,
    /// SHF_COMPRESSED with an Elf32_Chdr.
    Shf32,
    /// SHF_COMPRESSED with an Elf64_Chdr.
    Shf64,
}

/// File placement of one located section.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SectionInfo {
    pub offset: u64,
    pub size: u64,
    pub compression: Compression,
}

/// Logical section names the loader recognises, in their canonical
/// (uncompressed, non-dwo) spelling.
pub const SECTION_NAMES: &[&str] = &[
    ".debug_info",
    ".debug_abbrev",
    ".debug_line",
    ".debug_str",
    ".debug_line_str",
    ".debug_str_offsets",
    ".debug_addr",
    ".debug_ranges",
    ".debug_rnglists",
    ".debug_loc",
    ".debug_loclists",
    ".debug_aranges",
    ".debug_frame",
    ".eh_frame",
    ".eh_frame_hdr",
    ".debug_macro",
    ".debug_names",
    ".debug_types",
    ".debug_pubnames",
    ".debug_pubtypes",
];

/// One optional slot per recognised DWARF section.
#[derive(Debug, Default)]
pub struct DebugSections {
    pub debug_info: Option<SectionInfo>,
    pub debug_abbrev: Option<SectionInfo>,
    pub debug_line: Option<SectionInfo>,
    pub debug_str: Option<SectionInfo>,
    pub debug_line_str: Option<SectionInfo>,
    pub debug_str_offsets: Option<SectionInfo>,
    pub debug_addr: Option<SectionInfo>,
    pub debug_ranges: Option<SectionInfo>,
    pub debug_rnglists: Option<SectionInfo>,
    pub debug_loc: Option<SectionInfo>,
    pub debug_loclists: Option<SectionInfo>,
    pub debug_aranges: Option<SectionInfo>,
    pub debug_frame: Option<SectionInfo>,
    pub eh_frame: Option<SectionInfo>,
    pub eh_frame_hdr: Option<SectionInfo>,
    pub debug_macro: Option<SectionInfo>,
    pub debug_names: Option<SectionInfo>,
    pub debug_types: Option<SectionInfo>,
    pub debug_pubnames: Option<SectionInfo>,
    pub debug_pubtypes: Option<SectionInfo>,
}

impl DebugSections {
    fn slot_mut(&mut self, logical: &str) -> Option<&mut Option<SectionInfo>> {
        let slot = match logical {
            ".debug_info" => &mut self.debug_info,
            ".debug_abbrev" => &mut self.debug_abbrev,
            ".debug_line" => &mut self.debug_line,
            ".debug_str" => &mut self.debug_str,
            ".debug_line_str" => &mut self.debug_line_str,
            ".debug_str_offsets" => &mut self.debug_str_offsets,
            ".debug_addr" => &mut self.debug_addr,
            ".debug_ranges" => &mut self.debug_ranges,
            ".debug_rnglists" => &mut self.debug_rnglists,
            ".debug_loc" => &mut self.debug_loc,
            ".debug_loclists" => &mut self.debug_loclists,
            ".debug_aranges" => &mut self.debug_aranges,
            ".debug_frame" => &mut self.debug_frame,
            ".eh_frame" => &mut self.eh_frame,
            ".eh_frame_hdr" => &mut self.eh_frame_hdr,
            ".debug_macro" => &mut self.debug_macro,
            ".debug_names" => &mut self.debug_names,
            ".debug_types" => &mut self.debug_types,
            ".debug_pubnames" => &mut self.debug_pubnames,
            ".debug_pubtypes" => &mut self.debug_pubtypes,
            _ => return None,
        };
        Some(slot)
    }

    /// Look up a located section by its canonical name.
    pub fn get(&self, logical: &str) -> Option<&SectionInfo> {
        match logical {
            ".debug_info" => self.debug_info.as_ref(),
            ".debug_abbrev" => self.debug_abbrev.as_ref(),
            ".debug_line" => self.debug_line.as_ref(),
            ".debug_str" => self.debug_str.as_ref(),
            ".debug_line_str" => self.debug_line_str.as_ref(),
            ".debug_str_offsets" => self.debug_str_offsets.as_ref(),
            ".debug_addr" => self.debug_addr.as_ref(),
            ".debug_ranges" => self.debug_ranges.as_ref(),
            ".debug_rnglists" => self.debug_rnglists.as_ref(),
            ".debug_loc" => self.debug_loc.as_ref(),
            ".debug_loclists" => self.debug_loclists.as_ref(),
            ".debug_aranges" => self.debug_aranges.as_ref(),
            ".debug_frame" => self.debug_frame.as_ref(),
            ".eh_frame" => self.eh_frame.as_ref(),
            ".eh_frame_hdr" => self.eh_frame_hdr.as_ref(),
            ".debug_macro" => self.debug_macro.as_ref(),
            ".debug_names" => self.debug_names.as_ref(),
            ".debug_types" => self.debug_types.as_ref(),
            ".debug_pubnames" => self.debug_pubnames.as_ref(),
            ".debug_pubtypes" => self.debug_pubtypes.as_ref(),
            _ => None,
        }
    }

    /// Number of located sections.
    pub fn count(&self) -> usize {
        SECTION_NAMES.iter().filter(|name| self.get(name).is_some()).count()
    }

    /// Canonicalise a raw section name and store the entry.
    ///
    /// `.zdebug_*` entries force zdebug compression and override a
    /// previously stored plain entry; otherwise the first entry for a
    /// logical section wins. A `.dwo` suffix maps onto the same slot.
    pub(crate) fn store(&mut self, raw_name: &str, mut info: SectionInfo) {
        let name = raw_name.strip_suffix(".dwo").unwrap_or(raw_name);
        let logical;
        if let Some(rest) = name.strip_prefix(".zdebug_") {
            logical = format!(".debug_{rest}");
            info.compression = Compression::ZDebug;
        } else {
            logical = name.to_owned();
        }
        let Some(slot) = self.slot_mut(&logical) else {
            return;
        };
        match slot {
            Some(existing) if existing.compression == Compression::ZDebug => {}
            Some(_) if info.compression == Compression::ZDebug => *slot = Some(info),
            Some(_) => {}
            None => *slot = Some(info),
        }
        tracing::debug!(section = logical.as_str(), offset = info.offset, size = info.size, "located section");
    }
}

/// A loaded object image. Borrows the input bytes; section slices
/// returned by [Image::section_data] alias them.
#[derive(Debug)]
pub struct Image<'d> {
    data: &'d [u8],
    pub sections: DebugSections,
}

/// Parse an ELF or Mach-O image and locate its DWARF sections.
///
/// Individual unparseable section headers are skipped; only a
/// malformed or unsupported top-level header fails the load.
pub fn load(data: &[u8]) -> Result<Image<'_>, ObjectError> {
    if data.len() < 16 {
        return Err(ObjectError::TooSmall);
    }
    let sections = if &data[0..4] == b"\x7FELF" {
        elf::parse(data)?
    } else if macho::is_macho_magic(&data[0..4]) {
        macho::parse(data)?
    } else {
        return Err(ObjectError::InvalidMagic);
    };
    Ok(Image { data, sections })
}

impl<'d> Image<'d> {
    /// Raw bytes of a section, exactly as stored in the file.
    pub fn section_data(&self, info: &SectionInfo) -> Result<&'d [u8], ObjectError> {
        let start = info.offset as usize;
        let end = start
            .checked_add(info.size as usize)
            .ok_or(ObjectError::TruncatedSection)?;
        self.data.get(start..end).ok_or(ObjectError::TruncatedSection)
    }

    /// Section bytes with any compression peeled off.
    pub fn section_data_decompressed(
        &self,
        info: &SectionInfo,
    ) -> Result<Cow<'d, [u8]>, ObjectError> {
        let raw = self.section_data(info)?;
        match info.compression {
            Compression::None => Ok(Cow::Borrowed(raw)),
            Compression::ZDebug => {
                // 4-byte "ZLIB" signature, 8-byte big-endian size.
                if raw.len() < 12 || &raw[0..4] != b"ZLIB" {
                    return Err(ObjectError::InvalidCompressedSection);
                }
                let size = BigEndian::read_u64(&raw[4..12]);
                inflate(&raw[12..], size)
            }
            Compression::Shf32 => {
                // Elf32_Chdr: ch_type, ch_size, ch_addralign.
                if raw.len() < 12 || LittleEndian::read_u32(&raw[0..4]) != 1 {
                    return Err(ObjectError::InvalidCompressedSection);
                }
                let size = LittleEndian::read_u32(&raw[4..8]) as u64;
                inflate(&raw[12..], size)
            }
            Compression::Shf64 => {
                // Elf64_Chdr: ch_type, ch_reserved, ch_size, ch_addralign.
                if raw.len() < 24 || LittleEndian::read_u32(&raw[0..4]) != 1 {
                    return Err(ObjectError::InvalidCompressedSection);
                }
                let size = LittleEndian::read_u64(&raw[8..16]);
                inflate(&raw[24..], size)
            }
        }
    }
}

fn inflate(stream: &[u8], expected_size: u64) -> Result<Cow<'static, [u8]>, ObjectError> {
    let mut out = Vec::with_capacity(expected_size.min(1 << 24) as usize);
    flate2::read::ZlibDecoder::new(stream)
        .read_to_end(&mut out)
        .map_err(|_| ObjectError::DecompressFailed)?;
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::elf::tests::{build_elf64, SectionSpec};
    use std::io::Write;

    fn zlib_compress(bytes: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_every_recognised_name_maps_to_its_slot() {
        for name in SECTION_NAMES {
            let image_bytes = build_elf64(&[SectionSpec::plain(name, b"payload")]);
            let image = load(&image_bytes).unwrap();
            assert_eq!(image.sections.count(), 1, "section {name}");
            let info = image.sections.get(name).expect(name);
            assert_eq!(image.section_data(info).unwrap(), b"payload");
        }
    }

    #[test]
    fn test_dwo_suffix_maps_to_same_slot() {
        let image_bytes = build_elf64(&[SectionSpec::plain(".debug_info.dwo", b"dwo")]);
        let image = load(&image_bytes).unwrap();
        assert!(image.sections.debug_info.is_some());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = vec![0u8; 64];
        bytes[0..4].copy_from_slice(b"\x7FELG");
        assert_eq!(load(&bytes).unwrap_err(), ObjectError::InvalidMagic);
    }

    #[test]
    fn test_too_small() {
        assert_eq!(load(&[0x7F, b'E']).unwrap_err(), ObjectError::TooSmall);
    }

    #[test]
    fn test_big_endian_rejected() {
        let mut bytes = build_elf64(&[]);
        bytes[5] = 2; // ELFDATA2MSB
        assert!(matches!(load(&bytes), Err(ObjectError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_zdebug_overrides_plain() {
        let payload = zlib_prefixed(b"inflated contents");
        let image_bytes = build_elf64(&[
            SectionSpec::plain(".debug_info", b"plain"),
            SectionSpec::plain(".zdebug_info", &payload),
        ]);
        let image = load(&image_bytes).unwrap();
        let info = image.sections.debug_info.unwrap();
        assert_eq!(info.compression, Compression::ZDebug);
        assert_eq!(
            image.section_data_decompressed(&info).unwrap().as_ref(),
            b"inflated contents"
        );

        // Plain never overrides a stored zdebug entry.
        let image_bytes = build_elf64(&[
            SectionSpec::plain(".zdebug_info", &payload),
            SectionSpec::plain(".debug_info", b"plain"),
        ]);
        let image = load(&image_bytes).unwrap();
        assert_eq!(image.sections.debug_info.unwrap().compression, Compression::ZDebug);
    }

    fn zlib_prefixed(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"ZLIB");
        out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
        out.extend_from_slice(&zlib_compress(bytes));
        out
    }

    #[test]
    fn test_zdebug_bad_signature() {
        let mut payload = zlib_prefixed(b"x");
        payload[0] = b'Q';
        let image_bytes = build_elf64(&[SectionSpec::plain(".zdebug_info", &payload)]);
        let image = load(&image_bytes).unwrap();
        let info = image.sections.debug_info.unwrap();
        assert_eq!(
            image.section_data_decompressed(&info).unwrap_err(),
            ObjectError::InvalidCompressedSection
        );
    }

    #[test]
    fn test_shf_compressed_64() {
        let body = b"shf compressed bytes";
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes()); // ELFCOMPRESS_ZLIB
        payload.extend_from_slice(&0u32.to_le_bytes()); // reserved
        payload.extend_from_slice(&(body.len() as u64).to_le_bytes());
        payload.extend_from_slice(&8u64.to_le_bytes()); // addralign
        payload.extend_from_slice(&zlib_compress(body));

        let image_bytes =
            build_elf64(&[SectionSpec::compressed(".debug_line", &payload)]);
        let image = load(&image_bytes).unwrap();
        let info = image.sections.debug_line.unwrap();
        assert_eq!(info.compression, Compression::Shf64);
        assert_eq!(image.section_data_decompressed(&info).unwrap().as_ref(), body);
    }

    #[test]
    fn test_corrupt_zlib_stream() {
        let body = b"shf compressed bytes";
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&(body.len() as u64).to_le_bytes());
        payload.extend_from_slice(&8u64.to_le_bytes());
        payload.extend_from_slice(&[0xAA; 16]); // not a zlib stream

        let image_bytes =
            build_elf64(&[SectionSpec::compressed(".debug_line", &payload)]);
        let image = load(&image_bytes).unwrap();
        let info = image.sections.debug_line.unwrap();
        assert_eq!(
            image.section_data_decompressed(&info).unwrap_err(),
            ObjectError::DecompressFailed
        );
    }

    #[test]
    fn test_truncated_section() {
        let image_bytes = build_elf64(&[SectionSpec::plain(".debug_str", b"abc")]);
        let image = load(&image_bytes).unwrap();
        let info = SectionInfo {
            offset: image_bytes.len() as u64 - 1,
            size: 16,
            compression: Compression::None,
        };
        assert_eq!(image.section_data(&info).unwrap_err(), ObjectError::TruncatedSection);
    }
}
