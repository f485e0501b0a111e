//! Type-signature scanner (DWARF phase 2, §4.10): for each type DIE recorded
//! in phase 1, emits the canonical byte sequence over its subtree described
//! by the published DWARF-4 type-signature procedure, then hashes it down to
//! a 64-bit signature (§4.10 "Signature derivation").

use std::collections::HashMap;

use scan_core::error::ScanError;
use scan_core::leb128::{encode_signed, encode_unsigned};
use scan_core::md5::{digest, signature_from_digest};
use scan_core::provider::DwarfReader;

use crate::context::{die_name, is_type_tag, parse_err, DieKey, TypeContext};

/// Attribute priority order (§4.10): lowest index sorts first; attributes
/// not in this table are omitted entirely.
const PRIORITY: &[gimli::DwAt] = &[
    gimli::DW_AT_name,
    gimli::DW_AT_accessibility,
    gimli::DW_AT_address_class,
    gimli::DW_AT_allocated,
    gimli::DW_AT_artificial,
    gimli::DW_AT_associated,
    gimli::DW_AT_binary_scale,
    gimli::DW_AT_bit_offset,
    gimli::DW_AT_bit_size,
    gimli::DW_AT_bit_stride,
    gimli::DW_AT_byte_size,
    gimli::DW_AT_byte_stride,
    gimli::DW_AT_const_expr,
    gimli::DW_AT_const_value,
    gimli::DW_AT_containing_type,
    gimli::DW_AT_count,
    gimli::DW_AT_data_bit_offset,
    gimli::DW_AT_data_location,
    gimli::DW_AT_data_member_location,
    gimli::DW_AT_decimal_scale,
    gimli::DW_AT_decimal_sign,
    gimli::DW_AT_default_value,
    gimli::DW_AT_digit_count,
    gimli::DW_AT_discr,
    gimli::DW_AT_discr_list,
    gimli::DW_AT_discr_value,
    gimli::DW_AT_encoding,
    gimli::DW_AT_enum_class,
    gimli::DW_AT_endianity,
    gimli::DW_AT_explicit,
    gimli::DW_AT_is_optional,
    gimli::DW_AT_location,
    gimli::DW_AT_lower_bound,
    gimli::DW_AT_mutable,
    gimli::DW_AT_ordering,
    gimli::DW_AT_picture_string,
    gimli::DW_AT_prototyped,
    gimli::DW_AT_small,
    gimli::DW_AT_segment,
    gimli::DW_AT_string_length,
    gimli::DW_AT_threads_scaled,
    gimli::DW_AT_upper_bound,
    gimli::DW_AT_use_location,
    gimli::DW_AT_use_UTF8,
    gimli::DW_AT_variable_parameter,
    gimli::DW_AT_virtuality,
    gimli::DW_AT_visibility,
    gimli::DW_AT_vtable_elem_location,
];

fn priority_index(at: gimli::DwAt) -> Option<usize> {
    PRIORITY.iter().position(|&candidate| candidate == at)
}

fn is_type_reference_tag(tag: gimli::DwTag) -> bool {
    matches!(
        tag,
        gimli::DW_TAG_pointer_type
            | gimli::DW_TAG_reference_type
            | gimli::DW_TAG_rvalue_reference_type
            | gimli::DW_TAG_ptr_to_member_type
            | gimli::DW_TAG_friend
    )
}

fn is_type_or_subprogram_tag(tag: gimli::DwTag) -> bool {
    is_type_tag(tag) || tag == gimli::DW_TAG_subprogram
}

/// One signature computation: the visited set `V` and output sink `S` are
/// local to this single DIE's signature, never shared across computations.
struct Scan<'a> {
    dwarf: &'a gimli::Dwarf<DwarfReader>,
    unit: &'a gimli::Unit<DwarfReader>,
    cu_index: usize,
    contexts: &'a HashMap<DieKey, TypeContext>,
    visited: Vec<gimli::UnitOffset>,
    sink: Vec<u8>,
}

impl<'a> Scan<'a> {
    fn visited_index(&self, offset: gimli::UnitOffset) -> Option<usize> {
        self.visited.iter().position(|&o| o == offset).map(|i| i + 1)
    }

    fn context_of(&self, offset: gimli::UnitOffset) -> Vec<u8> {
        self.contexts
            .get(&(self.cu_index, offset))
            .map(|c| c.context.clone())
            .unwrap_or_default()
    }

    /// Steps 2-7 for the DIE at `offset`, appended to `self.sink`.
    fn visit(&mut self, offset: gimli::UnitOffset) -> Result<(), ScanError> {
        let die = self.unit.entry(offset).map_err(parse_err)?;
        let tag = die.tag();

        self.sink.extend_from_slice(&self.context_of(offset)); // step 2
        self.sink.push(b'D'); // step 3
        encode_unsigned(tag.0 as u64, &mut self.sink);

        let mut attrs = Vec::new();
        let mut iter = die.attrs();
        while let Some(attr) = iter.next().map_err(parse_err)? {
            if priority_index(attr.name()).is_some() {
                attrs.push((attr.name(), attr.value()));
            }
        }
        attrs.sort_by_key(|(at, _)| priority_index(*at).unwrap());
        for (at, value) in attrs {
            self.emit_attribute(tag, at, value)?;
        }

        // Step 5/6: the type-reference attribute is never in PRIORITY, so it
        // never reaches the loop above. `friend` carries it as DW_AT_friend;
        // every other tag (reference tags and plain type/variable/member
        // tags alike) carries it as DW_AT_type. `emit_attribute` itself
        // branches on whether `tag` is a reference tag.
        let type_at = if tag == gimli::DW_TAG_friend {
            gimli::DW_AT_friend
        } else {
            gimli::DW_AT_type
        };
        if let Some(value) = die.attr_value(type_at).map_err(parse_err)? {
            self.emit_attribute(tag, type_at, value)?;
        }

        let mut tree = self.unit.entries_tree(Some(offset)).map_err(parse_err)?;
        let root = tree.root().map_err(parse_err)?;
        let mut children = root.children();
        while let Some(child) = children.next().map_err(parse_err)? {
            let child_die = child.entry();
            let child_tag = child_die.tag();
            if is_type_or_subprogram_tag(child_tag) {
                let name = die_name(self.dwarf, self.unit, child_die)?;
                if !name.is_empty() {
                    // step 7, named child: record by name, never recurse —
                    // nested type DIEs are covered independently via the
                    // context map.
                    self.sink.push(b'S');
                    encode_unsigned(child_tag.0 as u64, &mut self.sink);
                    self.sink.extend_from_slice(&name);
                    self.sink.push(0);
                }
                // Unnamed nested type/subprogram DIEs are skipped, not
                // recursed into: they're signed independently since they
                // appear in the context map too.
                continue;
            }
            self.visit(child_die.offset())?;
        }

        self.sink.push(0); // step 7 terminator
        Ok(())
    }

    fn emit_attribute(
        &mut self,
        tag: gimli::DwTag,
        at: gimli::DwAt,
        value: gimli::AttributeValue<DwarfReader>,
    ) -> Result<(), ScanError> {
        if let Some(target) = type_reference_target(&value) {
            if is_type_reference_tag(tag) && (at == gimli::DW_AT_type || at == gimli::DW_AT_friend) {
                // TODO: friend-to-subprogram references need the DWARF
                // ABI-mangled-name path (§9); only friend-to-type is handled
                // here, so a friend subprogram falls through to the generic
                // reference encoding below instead.
                let target_die = self.unit.entry(target).map_err(parse_err)?;
                let name = die_name(self.dwarf, self.unit, &target_die)?;
                if !name.is_empty() {
                    self.sink.push(b'N'); // steps 5/6
                    encode_unsigned(at.0 as u64, &mut self.sink);
                    self.sink.extend_from_slice(&self.context_of(target));
                    self.sink.push(b'E');
                    self.sink.extend_from_slice(&name);
                    self.sink.push(0);
                    return Ok(());
                }
            }

            if let Some(idx) = self.visited_index(target) {
                self.sink.push(b'R');
                encode_unsigned(at.0 as u64, &mut self.sink);
                encode_unsigned(idx as u64, &mut self.sink);
            } else {
                self.sink.push(b'T');
                encode_unsigned(at.0 as u64, &mut self.sink);
                self.visited.push(target);
                self.visit(target)?;
            }
            return Ok(());
        }

        self.sink.push(b'A');
        encode_unsigned(at.0 as u64, &mut self.sink);
        self.emit_value(value)
    }

    fn emit_value(&mut self, value: gimli::AttributeValue<DwarfReader>) -> Result<(), ScanError> {
        match value {
            gimli::AttributeValue::Flag(flag) => {
                encode_unsigned(gimli::DW_FORM_flag.0 as u64, &mut self.sink);
                self.sink.push(u8::from(flag));
            }
            gimli::AttributeValue::String(s) => {
                encode_unsigned(gimli::DW_FORM_string.0 as u64, &mut self.sink);
                self.sink.extend_from_slice(&s.to_slice().map_err(parse_err)?);
                self.sink.push(0);
            }
            gimli::AttributeValue::DebugStrRef(offset) => {
                let s = self.dwarf.debug_str.get_str(offset).map_err(parse_err)?;
                encode_unsigned(gimli::DW_FORM_string.0 as u64, &mut self.sink);
                self.sink.extend_from_slice(&s.to_slice().map_err(parse_err)?);
                self.sink.push(0);
            }
            gimli::AttributeValue::Block(b) => {
                encode_unsigned(gimli::DW_FORM_block.0 as u64, &mut self.sink);
                self.sink.extend_from_slice(&b.to_slice().map_err(parse_err)?);
            }
            gimli::AttributeValue::Sdata(v) => {
                encode_unsigned(gimli::DW_FORM_sdata.0 as u64, &mut self.sink);
                encode_signed(v, &mut self.sink);
            }
            other => {
                // Every remaining constant form (Udata, Data1/2/4/8, …):
                // widen to i64 and encode SLEB128, per the published
                // algorithm's signed path (§9, "truncation risk is
                // documented rather than silently fixed").
                if let Some(v) = other.sdata_value() {
                    encode_unsigned(gimli::DW_FORM_sdata.0 as u64, &mut self.sink);
                    encode_signed(v, &mut self.sink);
                } else if let Some(v) = other.udata_value() {
                    encode_unsigned(gimli::DW_FORM_sdata.0 as u64, &mut self.sink);
                    encode_signed(v as i64, &mut self.sink);
                }
            }
        }
        Ok(())
    }
}

fn type_reference_target(value: &gimli::AttributeValue<DwarfReader>) -> Option<gimli::UnitOffset> {
    match value {
        gimli::AttributeValue::UnitRef(offset) => Some(*offset),
        _ => None,
    }
}

/// Computes the 64-bit signature of the type DIE at `offset` (§4.10, §4.11).
pub fn compute_signature(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    cu_index: usize,
    offset: gimli::UnitOffset,
    contexts: &HashMap<DieKey, TypeContext>,
) -> Result<u64, ScanError> {
    let mut scan = Scan {
        dwarf,
        unit,
        cu_index,
        contexts,
        visited: vec![offset],
        sink: Vec::new(),
    };
    scan.visit(offset)?;
    Ok(signature_from_digest(&digest(&scan.sink)))
}
