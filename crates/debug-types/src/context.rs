//! Type-context builder (DWARF phase 1, §4.9): walks every compilation
//! unit's DIE tree once, recording the namespace/type-qualified context
//! bytes leading to each type DIE, and counting every DIE visited.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use scan_core::error::ScanError;
use scan_core::leb128::encode_unsigned;
use scan_core::provider::DwarfReader;

/// Identifies a DIE within one compilation unit: the unit's index in
/// iteration order, plus its unit-relative offset. `DW_AT_type` and similar
/// references are themselves unit-relative (`UnitRef`) in the overwhelming
/// common case, so this pair is the natural key for both DWARF phases.
pub type DieKey = (usize, gimli::UnitOffset);

/// The namespace/type-qualified path leading to one type DIE, plus the
/// producer string of the compilation unit it came from. `producer` is
/// shared by reference across every entry of the same CU (§9 "Shared
/// strings"), not copied per entry.
#[derive(Clone)]
pub struct TypeContext {
    pub context: Vec<u8>,
    pub producer: Arc<str>,
}

/// Shared output of phase 1: every type DIE's context, plus the running
/// count of DIEs visited across every unit (the `total` field of the final
/// count report).
#[derive(Default)]
pub struct ContextMap {
    entries: Mutex<HashMap<DieKey, TypeContext>>,
    total_dies: AtomicU64,
}

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, key: DieKey, context: TypeContext) {
        self.entries.lock().unwrap().insert(key, context);
    }

    pub fn total_dies(&self) -> u64 {
        self.total_dies.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> HashMap<DieKey, TypeContext> {
        self.entries.into_inner().unwrap()
    }
}

pub(crate) fn is_type_tag(tag: gimli::DwTag) -> bool {
    matches!(
        tag,
        gimli::DW_TAG_structure_type
            | gimli::DW_TAG_class_type
            | gimli::DW_TAG_union_type
            | gimli::DW_TAG_base_type
            | gimli::DW_TAG_pointer_type
            | gimli::DW_TAG_reference_type
            | gimli::DW_TAG_rvalue_reference_type
            | gimli::DW_TAG_ptr_to_member_type
            | gimli::DW_TAG_friend
    )
}

fn is_namespace_tag(tag: gimli::DwTag) -> bool {
    tag == gimli::DW_TAG_namespace
}

pub(crate) fn parse_err(e: gimli::Error) -> ScanError {
    ScanError::FatalParse {
        path: Default::default(),
        reason: format!("DWARF parse error: {e}"),
    }
}

pub(crate) fn die_name(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    die: &gimli::DebuggingInformationEntry<DwarfReader>,
) -> Result<Vec<u8>, ScanError> {
    match die.attr_value(gimli::DW_AT_name).map_err(parse_err)? {
        Some(value) => {
            let reader = dwarf.attr_string(unit, value).map_err(parse_err)?;
            Ok(reader.to_slice().map_err(parse_err)?.into_owned())
        }
        None => Ok(Vec::new()),
    }
}

/// Walks one compilation unit's DIE tree, recording §4.9's context bytes for
/// every type DIE it finds and incrementing `map`'s DIE count for every DIE
/// visited (the CU root included).
pub fn walk_unit(
    dwarf: &gimli::Dwarf<DwarfReader>,
    cu_index: usize,
    unit: &gimli::Unit<DwarfReader>,
    map: &ContextMap,
) -> Result<(), ScanError> {
    let mut tree = unit.entries_tree(None).map_err(parse_err)?;
    let root = tree.root().map_err(parse_err)?;
    let producer = root_producer(dwarf, unit, root.entry())?;
    walk_node(dwarf, unit, cu_index, root, Vec::new(), &producer, map)
}

fn root_producer(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    die: &gimli::DebuggingInformationEntry<DwarfReader>,
) -> Result<Arc<str>, ScanError> {
    match die.attr_value(gimli::DW_AT_producer).map_err(parse_err)? {
        Some(value) => {
            let reader = dwarf.attr_string(unit, value).map_err(parse_err)?;
            let bytes = reader.to_slice().map_err(parse_err)?;
            Ok(Arc::from(String::from_utf8_lossy(&bytes).into_owned()))
        }
        None => Ok(Arc::from("unknown")),
    }
}

fn walk_node(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    cu_index: usize,
    node: gimli::EntriesTreeNode<DwarfReader>,
    context: Vec<u8>,
    producer: &Arc<str>,
    map: &ContextMap,
) -> Result<(), ScanError> {
    let die = node.entry();
    let tag = die.tag();
    map.total_dies.fetch_add(1, Ordering::Relaxed);

    if is_type_tag(tag) {
        map.record(
            (cu_index, die.offset()),
            TypeContext {
                context: context.clone(),
                producer: producer.clone(),
            },
        );
    }

    let child_context = if is_type_tag(tag) || is_namespace_tag(tag) {
        let mut extended = context;
        extended.push(b'C');
        encode_unsigned(tag.0 as u64, &mut extended);
        extended.extend_from_slice(&die_name(dwarf, unit, die)?);
        extended.push(0);
        extended
    } else {
        context
    };

    let mut children = node.children();
    while let Some(child) = children.next().map_err(parse_err)? {
        walk_node(dwarf, unit, cu_index, child, child_context.clone(), producer, map)?;
    }
    Ok(())
}
