//! The object-file provider (§6.1): the one place this crate talks to raw
//! ELF section tables and DWARF debug info. Everything above this module
//! works against the small types defined here, not against `object`/`gimli`
//! directly, so a different binary-format backend could be dropped in
//! without touching the COMDAT or DWARF engines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use object::elf;
use object::read::elf::{FileHeader, SectionHeader};
use object::{Endianness, Object, ObjectSection};

use crate::error::ScanError;

/// A memory-mapped input file plus its parsed `object::File` view. One
/// `MappedFile` is opened per work item; mappings are never shared mutably
/// across threads.
pub struct MappedFile {
    _mmap: memmap2::Mmap,
    data: &'static [u8],
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let file = std::fs::File::open(path).map_err(|e| ScanError::Skip {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mmap = unsafe {
            memmap2::Mmap::map(&file).map_err(|e| ScanError::Skip {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        // SAFETY: `data` never outlives `self`; the 'static lifetime is an
        // internal convenience so `object::File` can borrow from the mapping
        // without entangling this struct's lifetime through every caller.
        // The mapping is kept alive for exactly as long as `self` is.
        let data: &'static [u8] = unsafe { std::mem::transmute(&*mmap) };
        Ok(MappedFile { _mmap: mmap, data })
    }

    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// Parses the generic `object::File` view, used for the full-content
    /// digest and for DWARF section loading.
    pub fn parse(&self) -> Result<object::File<'_>, ScanError> {
        object::File::parse(self.data).map_err(|e| ScanError::Skip {
            path: PathBuf::new(),
            reason: format!("not a recognised object file: {e}"),
        })
    }
}

/// One logical object delivered by the archive enumerator: either the whole
/// file (for a plain `.o`) or one member (for a `.a` static archive).
pub struct LogicalObject<'data> {
    pub name: String,
    pub data: &'data [u8],
}

/// Yields one [`LogicalObject`] per member of a static archive, or a single
/// entry wrapping the whole file if it is not an archive.
pub fn enumerate_archive_members(data: &[u8]) -> Result<Vec<LogicalObject<'_>>, ScanError> {
    match object::read::archive::ArchiveFile::parse(data) {
        Ok(archive) => {
            let mut members = Vec::new();
            for member in archive.members() {
                let member = member.map_err(|e| ScanError::FatalParse {
                    path: PathBuf::new(),
                    reason: format!("corrupt archive member: {e}"),
                })?;
                let name = String::from_utf8_lossy(member.name()).into_owned();
                let bytes = member.data(data).map_err(|e| ScanError::FatalParse {
                    path: PathBuf::new(),
                    reason: format!("corrupt archive member {name}: {e}"),
                })?;
                members.push(LogicalObject { name, data: bytes });
            }
            Ok(members)
        }
        Err(_) => Ok(vec![LogicalObject {
            name: String::new(),
            data,
        }]),
    }
}

/// One instance of a link-once group section: its identifier symbol name and
/// the summed size of the member sections it lists.
#[derive(Debug, Clone)]
pub struct GroupInstance {
    pub identifier: String,
    pub total_size: u64,
}

/// Walks the ELF section table looking for `SHT_GROUP` sections, following
/// §4.6: the first word is a flag word (only `GRP_COMDAT` groups count), the
/// remaining words index sections whose sizes are summed, and the group's
/// identifier symbol is resolved through the linked symbol table.
pub fn comdat_groups(data: &[u8]) -> Result<Vec<GroupInstance>, ScanError> {
    match object::FileKind::parse(data).map_err(|e| ScanError::Skip {
        path: PathBuf::new(),
        reason: format!("unrecognised file kind: {e}"),
    })? {
        object::FileKind::Elf32 => groups_for::<elf::FileHeader32<Endianness>>(data),
        object::FileKind::Elf64 => groups_for::<elf::FileHeader64<Endianness>>(data),
        _ => Ok(Vec::new()),
    }
}

fn groups_for<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
) -> Result<Vec<GroupInstance>, ScanError> {
    let header = Elf::parse(data).map_err(|e| ScanError::Skip {
        path: PathBuf::new(),
        reason: e.to_string(),
    })?;
    let endian = header.endian().map_err(|e| ScanError::Skip {
        path: PathBuf::new(),
        reason: e.to_string(),
    })?;
    let sections = header.sections(endian, data).map_err(|e| ScanError::Skip {
        path: PathBuf::new(),
        reason: e.to_string(),
    })?;

    let mut groups = Vec::new();
    for section in sections.iter() {
        if section.sh_type(endian) != elf::SHT_GROUP {
            continue;
        }
        let raw = section.data(endian, data).map_err(|e| ScanError::FatalParse {
            path: PathBuf::new(),
            reason: format!("unreadable group section: {e}"),
        })?;
        if raw.len() % 4 != 0 {
            return Err(ScanError::FatalParse {
                path: PathBuf::new(),
                reason: "malformed_group: section size is not a multiple of 4 bytes".into(),
            });
        }
        let words: Vec<u32> = raw
            .chunks_exact(4)
            .map(|chunk| read_u32(chunk, endian))
            .collect();
        let Some((&flags, member_indices)) = words.split_first() else {
            continue;
        };
        if flags & elf::GRP_COMDAT == 0 {
            continue;
        }

        let symtab_index = section.sh_link(endian) as usize;
        let symbol_index = section.sh_info(endian) as usize;
        let identifier = resolve_symbol_name::<Elf>(
            &sections,
            symtab_index,
            symbol_index,
            endian,
            data,
        )?;

        let mut total_size: u64 = 0;
        for &member_section_index in member_indices {
            if let Ok(member) = sections.section(object::SectionIndex(member_section_index as usize))
            {
                total_size += member.sh_size(endian).into();
            }
        }

        groups.push(GroupInstance {
            identifier,
            total_size,
        });
    }

    Ok(groups)
}

fn read_u32(bytes: &[u8], endian: Endianness) -> u32 {
    let arr: [u8; 4] = bytes.try_into().expect("chunks_exact(4) guarantees length");
    if endian.is_little_endian() {
        u32::from_le_bytes(arr)
    } else {
        u32::from_be_bytes(arr)
    }
}

fn resolve_symbol_name<Elf: FileHeader<Endian = Endianness>>(
    sections: &object::read::elf::SectionTable<Elf>,
    symtab_index: usize,
    symbol_index: usize,
    endian: Endianness,
    data: &[u8],
) -> Result<String, ScanError> {
    let symtab_section = sections
        .section(object::SectionIndex(symtab_index))
        .map_err(|e| ScanError::FatalParse {
            path: PathBuf::new(),
            reason: format!("group references missing symbol table: {e}"),
        })?;
    let (symbols, strings) = sections
        .symbols(endian, data, symtab_section.sh_link(endian) as usize)
        .map_err(|e| ScanError::FatalParse {
            path: PathBuf::new(),
            reason: format!("unreadable symbol table: {e}"),
        })
        .map(|table| (table.symbols().to_vec(), table.strings()))?;

    let symbol = symbols
        .get(symbol_index)
        .ok_or_else(|| ScanError::FatalParse {
            path: PathBuf::new(),
            reason: "group identifier symbol index out of range".into(),
        })?;
    let name = symbol
        .name(endian, strings)
        .map_err(|e| ScanError::FatalParse {
            path: PathBuf::new(),
            reason: format!("unresolvable group identifier: {e}"),
        })?;
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Reader type used for all `gimli` access: an `Arc`-owned byte slice, so
/// decompressed sections don't need to entangle their lifetime with the
/// mapped file's, and the `Dwarf<DwarfReader>` can be shared read-only across
/// the worker pool that walks and scans it (an `Rc`-backed reader would not
/// be `Send`/`Sync`, which the DWARF phases require).
pub type DwarfReader = gimli::EndianArcSlice<gimli::RunTimeEndian>;

/// Builds a `gimli::Dwarf` over the debug sections of `obj`, decompressing
/// any compressed sections eagerly (an `Rc<[u8]>` per section, loaded once).
pub fn load_dwarf(obj: &object::File<'_>) -> Result<gimli::Dwarf<DwarfReader>, ScanError> {
    let endian = if obj.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };

    let load_section = |id: gimli::SectionId| -> Result<DwarfReader, ScanError> {
        let data = match obj.section_by_name(id.name()) {
            Some(section) => section
                .uncompressed_data()
                .map_err(|e| ScanError::FatalParse {
                    path: PathBuf::new(),
                    reason: format!("failed to decompress {}: {e}", id.name()),
                })?
                .into_owned(),
            None => Vec::new(),
        };
        Ok(gimli::EndianArcSlice::new(Arc::from(data.into_boxed_slice()), endian))
    };

    gimli::Dwarf::load(load_section)
}
