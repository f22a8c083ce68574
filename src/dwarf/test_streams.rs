//! Builders for synthetic `.eh_frame` byte streams used across the
//! dwarf test modules.

use crate::dwarf::consts::*;

pub fn uleb(v: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::unsigned(&mut buf, v).unwrap();
    buf
}

pub fn sleb(v: i64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::signed(&mut buf, v).unwrap();
    buf
}

/// Build a version-1 CIE with the given augmentation string. An `R`
/// augmentation records an absolute 8-byte FDE pointer encoding.
pub fn build_cie(
    augmentation: &[u8],
    code_alignment: u64,
    data_alignment: i64,
    return_address_register: u8,
    instructions: &[u8],
) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&0u32.to_le_bytes()); // CIE id
    content.push(1); // version
    content.extend_from_slice(augmentation);
    content.push(0);
    content.extend_from_slice(&uleb(code_alignment));
    content.extend_from_slice(&sleb(data_alignment));
    content.push(return_address_register);
    if augmentation.first() == Some(&b'z') {
        let mut aug_data = Vec::new();
        for &ch in &augmentation[1..] {
            match ch {
                b'R' => aug_data.push(DW_EH_PE_ABSPTR | DW_EH_PE_UDATA8),
                b'L' => aug_data.push(DW_EH_PE_OMIT),
                b'S' => {}
                _ => panic!("unsupported augmentation char in builder"),
            }
        }
        content.extend_from_slice(&uleb(aug_data.len() as u64));
        content.extend_from_slice(&aug_data);
    }
    content.extend_from_slice(instructions);

    let mut out = Vec::new();
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&content);
    out
}

/// Build an FDE referencing the CIE at section offset 0, appended after
/// `section` (which must currently end right where the FDE starts).
pub fn build_fde(
    section: &mut Vec<u8>,
    has_z: bool,
    initial_location: u64,
    address_range: u64,
    instructions: &[u8],
) {
    let mut content = Vec::new();
    // Back-offset from the CIE-pointer field to offset 0.
    let cie_ptr_field = section.len() + 4;
    content.extend_from_slice(&(cie_ptr_field as u32).to_le_bytes());
    content.extend_from_slice(&initial_location.to_le_bytes());
    content.extend_from_slice(&address_range.to_le_bytes());
    if has_z {
        content.extend_from_slice(&uleb(0));
    }
    content.extend_from_slice(instructions);

    section.extend_from_slice(&(content.len() as u32).to_le_bytes());
    section.extend_from_slice(&content);
}

/// A complete single-CIE single-FDE `.eh_frame` section with a zero
/// terminator.
#[allow(clippy::too_many_arguments)]
pub fn build_frame_section(
    augmentation: &[u8],
    code_alignment: u64,
    data_alignment: i64,
    return_address_register: u8,
    cie_instructions: &[u8],
    initial_location: u64,
    address_range: u64,
    fde_instructions: &[u8],
) -> Vec<u8> {
    let mut section = build_cie(
        augmentation,
        code_alignment,
        data_alignment,
        return_address_register,
        cie_instructions,
    );
    build_fde(
        &mut section,
        augmentation.first() == Some(&b'z'),
        initial_location,
        address_range,
        fde_instructions,
    );
    section.extend_from_slice(&0u32.to_le_bytes());
    section
}
