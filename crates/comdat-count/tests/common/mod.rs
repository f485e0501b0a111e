//! Synthetic ELF64 fixtures for the end-to-end COMDAT tests.
//!
//! Grounded on the shape of `examples/original_source/comdat_count/unittest/make_elf.cpp`
//! and `sections.cpp`: those build a minimal relocatable ELF object with a
//! handful of hand-populated sections rather than pulling in a full linker.
//! `object::write` has no support for `SHT_GROUP`, so this does the same
//! thing at the byte level: lay out a null section, a section-name string
//! table, a symbol-name string table, a symbol table with one `STT_SECTION`
//! identifier symbol per group, one zero-filled data section per group
//! member, and one `SHT_GROUP` section per group.

const ET_REL: u16 = 1;
const EM_X86_64: u16 = 0x3e;
const EV_CURRENT: u32 = 1;

const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_GROUP: u32 = 17;

const GRP_COMDAT: u32 = 1;

const STB_GLOBAL: u8 = 1;
const STT_SECTION: u8 = 3;

struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        // Byte 0 is reserved for the empty name.
        StringTable { bytes: vec![0] }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }
}

struct RawSection {
    name_offset: u32,
    sh_type: u32,
    sh_link: u32,
    sh_info: u32,
    sh_entsize: u64,
    data: Vec<u8>,
}

/// One comdat group to synthesize: its identifier symbol name and the sizes
/// of its member sections.
pub struct GroupSpec<'a> {
    pub identifier: &'a str,
    pub member_sizes: &'a [u64],
}

/// Builds a single little-endian ELF64 relocatable object file containing one
/// `SHT_GROUP` section (with `GRP_COMDAT` set) per entry in `groups`, each
/// pointing at freshly synthesized zero-filled member sections, plus a
/// symbol table resolving each group's identifier symbol.
pub fn build_elf64_with_groups(groups: &[GroupSpec]) -> Vec<u8> {
    let mut shstrtab = StringTable::new();
    let mut strtab = StringTable::new();
    let mut sections: Vec<RawSection> = Vec::new();

    // Section 0: the mandatory null section.
    sections.push(RawSection {
        name_offset: 0,
        sh_type: SHT_NULL,
        sh_link: 0,
        sh_info: 0,
        sh_entsize: 0,
        data: Vec::new(),
    });

    let shstrtab_name = shstrtab.add(".shstrtab");
    let strtab_name = shstrtab.add(".strtab");
    let symtab_name = shstrtab.add(".symtab");

    // Symbols: index 0 is the mandatory null symbol; one STT_SECTION symbol
    // per group, each bound to that group's first member section.
    let mut symbols: Vec<(u32, u8, u16)> = vec![(0, 0, 0)]; // (name_offset, info, shndx) — shndx patched below

    // First pass: member + group sections are appended after symtab/strtab,
    // so section indices for members are only known once we reserve slots.
    // Reserve: [0]=null [1]=.shstrtab [2]=.strtab [3]=.symtab, then members
    // and group sections interleaved per group in the order given.
    let mut member_section_indices_per_group: Vec<Vec<u32>> = Vec::new();
    let mut next_index = 4u32;
    for group in groups {
        let mut member_indices = Vec::new();
        for _ in group.member_sizes {
            member_indices.push(next_index);
            next_index += 1;
        }
        member_indices.push(next_index); // placeholder slot for the group section itself
        next_index += 1;
        member_section_indices_per_group.push(member_indices);
    }

    for (group, indices) in groups.iter().zip(&member_section_indices_per_group) {
        let name_off = strtab.add(group.identifier);
        let first_member_shndx = indices[0] as u16;
        symbols.push((name_off, (STB_GLOBAL << 4) | STT_SECTION, first_member_shndx));
    }

    // Build the symtab / group sections now that symbol indices are fixed.
    let mut symtab_data = Vec::new();
    for (name_off, info, shndx) in &symbols {
        symtab_data.extend_from_slice(&name_off.to_le_bytes());
        symtab_data.push(*info);
        symtab_data.push(0); // st_other
        symtab_data.extend_from_slice(&shndx.to_le_bytes());
        symtab_data.extend_from_slice(&0u64.to_le_bytes()); // st_value
        symtab_data.extend_from_slice(&0u64.to_le_bytes()); // st_size
    }

    sections.push(RawSection {
        name_offset: shstrtab_name,
        sh_type: SHT_STRTAB,
        sh_link: 0,
        sh_info: 0,
        sh_entsize: 0,
        data: Vec::new(), // filled in after all names are known
    });
    sections.push(RawSection {
        name_offset: strtab_name,
        sh_type: SHT_STRTAB,
        sh_link: 0,
        sh_info: 0,
        sh_entsize: 0,
        data: Vec::new(),
    });
    sections.push(RawSection {
        name_offset: symtab_name,
        sh_type: SHT_SYMTAB,
        sh_link: 2, // .strtab is section 2
        sh_info: 1, // index of first non-local symbol
        sh_entsize: 24,
        data: symtab_data,
    });

    for (group_idx, group) in groups.iter().enumerate() {
        let indices = &member_section_indices_per_group[group_idx];
        for (member_idx, &size) in group.member_sizes.iter().enumerate() {
            let member_name = shstrtab.add(&format!(".data.{}.{}", group.identifier, member_idx));
            sections.push(RawSection {
                name_offset: member_name,
                sh_type: SHT_PROGBITS,
                sh_link: 0,
                sh_info: 0,
                sh_entsize: 0,
                data: vec![0u8; size as usize],
            });
            let _ = indices;
        }

        let group_name = shstrtab.add(&format!(".group.{}", group.identifier));
        let symbol_index = (group_idx + 1) as u32;
        let mut group_data = Vec::new();
        group_data.extend_from_slice(&GRP_COMDAT.to_le_bytes());
        for &member_shndx in &indices[..group.member_sizes.len()] {
            group_data.extend_from_slice(&member_shndx.to_le_bytes());
        }
        sections.push(RawSection {
            name_offset: group_name,
            sh_type: SHT_GROUP,
            sh_link: 3, // .symtab is section 3
            sh_info: symbol_index,
            sh_entsize: 4,
            data: group_data,
        });
    }

    // Patch the .shstrtab section's data now that every name has been added.
    sections[1].data = shstrtab.bytes;
    // Rebuild .strtab's data (added to after symtab_data was computed above).
    sections[2].data = strtab.bytes;

    serialize(sections)
}

fn serialize(sections: Vec<RawSection>) -> Vec<u8> {
    const EHDR_SIZE: u64 = 64;
    const SHDR_SIZE: u64 = 64;

    let mut out = Vec::new();

    // e_ident
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    out.push(2); // ELFCLASS64
    out.push(1); // ELFDATA2LSB
    out.push(1); // EI_VERSION
    out.push(0); // EI_OSABI
    out.extend_from_slice(&[0u8; 8]); // EI_ABIVERSION + padding

    out.extend_from_slice(&ET_REL.to_le_bytes()); // e_type
    out.extend_from_slice(&EM_X86_64.to_le_bytes()); // e_machine
    out.extend_from_slice(&EV_CURRENT.to_le_bytes()); // e_version
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff

    let shoff_pos = out.len();
    out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff, patched below
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes()); // e_shentsize
    out.extend_from_slice(&(sections.len() as u16).to_le_bytes()); // e_shnum
    out.extend_from_slice(&1u16.to_le_bytes()); // e_shstrndx (.shstrtab is section 1)

    assert_eq!(out.len() as u64, EHDR_SIZE);

    // Section data, back to back, immediately after the header.
    let mut offsets = Vec::with_capacity(sections.len());
    for section in &sections {
        // Keep everything 8-byte aligned; it's not load-bearing here but
        // mirrors what a real linker would do.
        while out.len() % 8 != 0 {
            out.push(0);
        }
        offsets.push(out.len() as u64);
        out.extend_from_slice(&section.data);
    }

    let shoff = out.len() as u64;
    for (section, &offset) in sections.iter().zip(&offsets) {
        out.extend_from_slice(&section.name_offset.to_le_bytes());
        out.extend_from_slice(&section.sh_type.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_flags
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(section.data.len() as u64).to_le_bytes());
        out.extend_from_slice(&section.sh_link.to_le_bytes());
        out.extend_from_slice(&section.sh_info.to_le_bytes());
        out.extend_from_slice(&1u64.to_le_bytes()); // sh_addralign
        out.extend_from_slice(&section.sh_entsize.to_le_bytes());
    }

    out[shoff_pos..shoff_pos + 8].copy_from_slice(&shoff.to_le_bytes());
    out
}
