//! Hand-built DWARF4 fixtures: a `.debug_info`/`.debug_abbrev`/`.debug_str`
//! triple laid out byte by byte, the same way the COMDAT fixture in
//! `comdat-count/tests/common` hand-lays-out ELF section bytes rather than
//! reaching for a builder crate that doesn't cover the case needed here.

use std::sync::Arc;

use scan_core::provider::DwarfReader;

struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }
}

fn load_sections(debug_info: Vec<u8>, debug_abbrev: Vec<u8>, debug_str: Vec<u8>) -> gimli::Dwarf<DwarfReader> {
    let load = |id: gimli::SectionId| -> Result<DwarfReader, gimli::Error> {
        let bytes: &[u8] = match id {
            gimli::SectionId::DebugInfo => &debug_info,
            gimli::SectionId::DebugAbbrev => &debug_abbrev,
            gimli::SectionId::DebugStr => &debug_str,
            _ => &[],
        };
        Ok(gimli::EndianArcSlice::new(
            Arc::from(bytes.to_vec().into_boxed_slice()),
            gimli::RunTimeEndian::Little,
        ))
    };
    gimli::Dwarf::load(load).expect("hand-built sections are well-formed")
}

fn wrap_unit(info: Vec<u8>) -> Vec<u8> {
    let unit_length = (2 + 4 + 1 + info.len()) as u32;
    let mut debug_info = Vec::new();
    debug_info.extend_from_slice(&unit_length.to_le_bytes());
    debug_info.extend_from_slice(&4u16.to_le_bytes()); // version
    debug_info.extend_from_slice(&0u32.to_le_bytes()); // debug_abbrev_offset
    debug_info.push(8); // address_size
    debug_info.extend_from_slice(&info);
    debug_info
}

pub struct MemberFixture {
    pub dwarf: gimli::Dwarf<DwarfReader>,
    pub struct_offset: gimli::UnitOffset,
    pub base_offset: gimli::UnitOffset,
}

/// `compile_unit { base_type "<base_name>"; namespace "N" { structure_type
/// "C" { member "x": type -> base_type } } }`, laid out as one compilation
/// unit starting at `.debug_info` offset 0.
///
/// DIEs land at fixed offsets regardless of `base_name`'s length, since every
/// name is stored as `DW_FORM_strp` (a 4-byte section offset): CU root at
/// 11, the base type at 16, the namespace at 23, the struct at 28, the
/// member at 34.
pub fn build_struct_with_member(base_name: &str, base_encoding: u8, base_size: u8) -> MemberFixture {
    let mut strings = StringTable::new();
    let producer_off = strings.add("GNU C 4.8.4");
    let base_name_off = strings.add(base_name);
    let ns_name_off = strings.add("N");
    let struct_name_off = strings.add("C");
    let member_name_off = strings.add("x");

    let mut info = Vec::new();

    // abbrev 1: DW_TAG_compile_unit, children, DW_AT_producer/strp
    info.push(1);
    info.extend_from_slice(&producer_off.to_le_bytes());

    let base_offset_val = 11 + info.len() as u32;
    // abbrev 2: DW_TAG_base_type, no children, name/strp, encoding/data1, byte_size/data1
    info.push(2);
    info.extend_from_slice(&base_name_off.to_le_bytes());
    info.push(base_encoding);
    info.push(base_size);

    // abbrev 3: DW_TAG_namespace, children, name/strp
    info.push(3);
    info.extend_from_slice(&ns_name_off.to_le_bytes());

    let struct_offset_val = 11 + info.len() as u32;
    // abbrev 4: DW_TAG_structure_type, children, name/strp, byte_size/data1
    info.push(4);
    info.extend_from_slice(&struct_name_off.to_le_bytes());
    info.push(8u8);

    // abbrev 5: DW_TAG_member, no children, name/strp, type/ref4, data_member_location/data1
    info.push(5);
    info.extend_from_slice(&member_name_off.to_le_bytes());
    info.extend_from_slice(&base_offset_val.to_le_bytes());
    info.push(0u8);

    info.push(0); // end struct C's children
    info.push(0); // end namespace N's children
    info.push(0); // end CU's children

    let debug_info = wrap_unit(info);

    let mut debug_abbrev = Vec::new();
    debug_abbrev.extend_from_slice(&[1, 0x11, 1, 0x25, 0x0e, 0, 0]); // compile_unit
    debug_abbrev.extend_from_slice(&[2, 0x24, 0, 0x03, 0x0e, 0x3e, 0x0b, 0x0b, 0x0b, 0, 0]); // base_type
    debug_abbrev.extend_from_slice(&[3, 0x39, 1, 0x03, 0x0e, 0, 0]); // namespace
    debug_abbrev.extend_from_slice(&[4, 0x13, 1, 0x03, 0x0e, 0x0b, 0x0b, 0, 0]); // structure_type
    debug_abbrev.extend_from_slice(&[5, 0x0d, 0, 0x03, 0x0e, 0x49, 0x13, 0x38, 0x0b, 0, 0]); // member
    debug_abbrev.push(0);

    let dwarf = load_sections(debug_info, debug_abbrev, strings.bytes);
    MemberFixture {
        dwarf,
        struct_offset: gimli::UnitOffset(struct_offset_val as usize),
        base_offset: gimli::UnitOffset(base_offset_val as usize),
    }
}

pub struct PointerFixture {
    pub dwarf: gimli::Dwarf<DwarfReader>,
    pub pointer_offset: gimli::UnitOffset,
    pub pointee_offset: gimli::UnitOffset,
}

/// `compile_unit { structure_type "<pointee_name>"; pointer_type: type ->
/// structure_type }`, exercising the named-reference ('N') path of steps
/// 5/6 for a `pointer_type` DIE whose `DW_AT_type` points at a named type.
pub fn build_pointer_to_named(pointee_name: &str) -> PointerFixture {
    let mut strings = StringTable::new();
    let producer_off = strings.add("GNU C 4.8.4");
    let pointee_name_off = strings.add(pointee_name);

    let mut info = Vec::new();

    // abbrev 1: DW_TAG_compile_unit, children, producer/strp
    info.push(1);
    info.extend_from_slice(&producer_off.to_le_bytes());

    let pointee_offset_val = 11 + info.len() as u32;
    // abbrev 2: DW_TAG_structure_type, no children, name/strp
    info.push(2);
    info.extend_from_slice(&pointee_name_off.to_le_bytes());

    let pointer_offset_val = 11 + info.len() as u32;
    // abbrev 3: DW_TAG_pointer_type, no children, type/ref4
    info.push(3);
    info.extend_from_slice(&pointee_offset_val.to_le_bytes());

    info.push(0); // end CU's children

    let debug_info = wrap_unit(info);

    let mut debug_abbrev = Vec::new();
    debug_abbrev.extend_from_slice(&[1, 0x11, 1, 0x25, 0x0e, 0, 0]); // compile_unit
    debug_abbrev.extend_from_slice(&[2, 0x13, 0, 0x03, 0x0e, 0, 0]); // structure_type, no children
    debug_abbrev.extend_from_slice(&[3, 0x0f, 0, 0x49, 0x13, 0, 0]); // pointer_type
    debug_abbrev.push(0);

    let dwarf = load_sections(debug_info, debug_abbrev, strings.bytes);
    PointerFixture {
        dwarf,
        pointer_offset: gimli::UnitOffset(pointer_offset_val as usize),
        pointee_offset: gimli::UnitOffset(pointee_offset_val as usize),
    }
}

pub fn first_unit(dwarf: &gimli::Dwarf<DwarfReader>) -> gimli::Unit<DwarfReader> {
    let mut headers = dwarf.units();
    let header = headers
        .next()
        .expect("reading the lone unit header")
        .expect("fixture always has exactly one compilation unit");
    dwarf.unit(header).expect("parsing the lone compilation unit")
}
