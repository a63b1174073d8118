//! Location and range lists: the legacy ".debug_loc"/".debug_ranges"
//! address-pair format and the DWARF 5 ".debug_loclists"/".debug_rnglists"
//! entry-kind format shared with split (.dwo) units.
use crate::{
    error::{Error, Result},
    reader::{Cursor, Reader},
    section::RelocationQuery,
};

// DW_LLE_* / DW_RLE_* entry kinds. The two v5 sections share the numbering.
const LE_END_OF_LIST: u8 = 0x00;
const LE_BASE_ADDRESSX: u8 = 0x01;
const LE_STARTX_ENDX: u8 = 0x02;
const LE_STARTX_LENGTH: u8 = 0x03;
const LE_OFFSET_PAIR: u8 = 0x04;
const LE_DEFAULT_LOCATION: u8 = 0x05;
const LE_BASE_ADDRESS: u8 = 0x06;
const LE_START_END: u8 = 0x07;
const LE_START_LENGTH: u8 = 0x08;

/// One decoded list entry. Addresses are resolved against the current base
/// address where possible; `indexed` bounds are .debug_addr indices the
/// caller still has to look up (they need the unit's addr_base).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEntry<'a> {
    /// Base-address selection. Subsequent offset pairs are relative to it.
    BaseAddress { address: u64, indexed: bool },
    StartEnd {
        begin: u64,
        end: u64,
        indexed: bool,
        expr: Option<&'a [u8]>,
    },
    StartLength {
        begin: u64,
        length: u64,
        indexed: bool,
        expr: Option<&'a [u8]>,
    },
    /// An offset pair whose base was itself indexed, so it could not be
    /// applied here.
    OffsetPair {
        begin: u64,
        end: u64,
        expr: Option<&'a [u8]>,
    },
    /// DW_LLE_default_location: applies wherever no other entry matches.
    DefaultLocation { expr: &'a [u8] },
}

/// Legacy .debug_loc: address pairs plus a 2-byte-length location
/// expression, terminated by an all-zero pair. An all-ones first address
/// selects a new base instead.
pub fn decode_loc_list<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: u64,
) -> Result<Vec<ListEntry<'a>>> {
    decode_legacy(reader, offset, address_size, base_address, true, |_| false)
}

/// Legacy .debug_ranges: same shape as .debug_loc without the expressions.
pub fn decode_range_list<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: u64,
) -> Result<Vec<ListEntry<'a>>> {
    decode_legacy(reader, offset, address_size, base_address, false, |_| false)
}

/// In an unlinked object file a pair that reads as all zeros may just be
/// awaiting relocation. These variants consult the relocation set for
/// `section_name` before treating a zero pair as the list terminator.
pub fn decode_loc_list_in<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: u64,
    relocs: &dyn RelocationQuery,
    section_name: &str,
) -> Result<Vec<ListEntry<'a>>> {
    decode_legacy(reader, offset, address_size, base_address, true, |at| {
        relocs.reloc_at(section_name, at)
    })
}

pub fn decode_range_list_in<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: u64,
    relocs: &dyn RelocationQuery,
    section_name: &str,
) -> Result<Vec<ListEntry<'a>>> {
    decode_legacy(reader, offset, address_size, base_address, false, |at| {
        relocs.reloc_at(section_name, at)
    })
}

fn decode_legacy<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    mut base_address: u64,
    has_expressions: bool,
    pending_reloc: impl Fn(usize) -> bool,
) -> Result<Vec<ListEntry<'a>>> {
    let mut cursor = Cursor::new(reader, offset);
    let width = address_size.clamp(1, 8) as usize;
    // the all-ones base-selection sentinel at this address width
    let sentinel = if width == 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    };

    let mut entries = Vec::new();
    loop {
        if cursor.at_end() {
            return Err(Error::Unterminated(offset));
        }
        let pair_offset = cursor.offset;
        let first = cursor.read_uint(width)?;
        let second = cursor.read_uint(width)?;

        // a zero pair ends the list, unless the words are only zero because
        // the linker hasn't filled them in yet
        if first == 0 && second == 0 && !pending_reloc(pair_offset) {
            return Ok(entries);
        }
        if first == sentinel {
            base_address = second;
            entries.push(ListEntry::BaseAddress {
                address: second,
                indexed: false,
            });
            continue;
        }

        let expr = if has_expressions {
            let len = cursor.read_half()? as usize;
            Some(cursor.read_slice(len)?)
        } else {
            None
        };
        entries.push(ListEntry::StartEnd {
            begin: base_address.wrapping_add(first),
            end: base_address.wrapping_add(second),
            indexed: false,
            expr,
        });
    }
}

/// DWARF 5 .debug_loclists entries starting at `offset`, which should point
/// just past the section header (or at an offset from the offset table).
pub fn decode_loclist_v5<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: Option<u64>,
) -> Result<Vec<ListEntry<'a>>> {
    decode_v5(reader, offset, address_size, base_address, true)
}

pub fn decode_rnglist_v5<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    base_address: Option<u64>,
) -> Result<Vec<ListEntry<'a>>> {
    decode_v5(reader, offset, address_size, base_address, false)
}

fn decode_v5<'a>(
    reader: Reader<'a>,
    offset: usize,
    address_size: u8,
    mut base_address: Option<u64>,
    has_expressions: bool,
) -> Result<Vec<ListEntry<'a>>> {
    let mut cursor = Cursor::new(reader, offset);
    let width = address_size.clamp(1, 8) as usize;
    let mut entries = Vec::new();

    loop {
        if cursor.at_end() {
            return Err(Error::Unterminated(offset));
        }
        let kind = cursor.read_byte()?;
        match kind {
            LE_END_OF_LIST => return Ok(entries),
            LE_BASE_ADDRESSX => {
                let index = cursor.read_uleb128()?;
                // an indexed base can't be applied without .debug_addr
                base_address = None;
                entries.push(ListEntry::BaseAddress {
                    address: index,
                    indexed: true,
                });
            }
            LE_BASE_ADDRESS => {
                let address = cursor.read_uint(width)?;
                base_address = Some(address);
                entries.push(ListEntry::BaseAddress {
                    address,
                    indexed: false,
                });
            }
            LE_STARTX_ENDX => {
                let begin = cursor.read_uleb128()?;
                let end = cursor.read_uleb128()?;
                let expr = read_counted_expr(&mut cursor, has_expressions)?;
                entries.push(ListEntry::StartEnd {
                    begin,
                    end,
                    indexed: true,
                    expr,
                });
            }
            LE_STARTX_LENGTH => {
                let begin = cursor.read_uleb128()?;
                let length = cursor.read_uleb128()?;
                let expr = read_counted_expr(&mut cursor, has_expressions)?;
                entries.push(ListEntry::StartLength {
                    begin,
                    length,
                    indexed: true,
                    expr,
                });
            }
            LE_OFFSET_PAIR => {
                let begin = cursor.read_uleb128()?;
                let end = cursor.read_uleb128()?;
                let expr = read_counted_expr(&mut cursor, has_expressions)?;
                entries.push(match base_address {
                    Some(base) => ListEntry::StartEnd {
                        begin: base.wrapping_add(begin),
                        end: base.wrapping_add(end),
                        indexed: false,
                        expr,
                    },
                    None => ListEntry::OffsetPair { begin, end, expr },
                });
            }
            LE_DEFAULT_LOCATION => {
                if !has_expressions {
                    // a loclists-only kind inside a range list
                    return Err(Error::UnknownOpcode(kind));
                }
                let len = cursor.read_uleb128()? as usize;
                entries.push(ListEntry::DefaultLocation {
                    expr: cursor.read_slice(len)?,
                });
            }
            LE_START_END => {
                let begin = cursor.read_uint(width)?;
                let end = cursor.read_uint(width)?;
                let expr = read_counted_expr(&mut cursor, has_expressions)?;
                entries.push(ListEntry::StartEnd {
                    begin,
                    end,
                    indexed: false,
                    expr,
                });
            }
            LE_START_LENGTH => {
                let begin = cursor.read_uint(width)?;
                let length = cursor.read_uleb128()?;
                let expr = read_counted_expr(&mut cursor, has_expressions)?;
                entries.push(ListEntry::StartLength {
                    begin,
                    length,
                    indexed: false,
                    expr,
                });
            }
            _ => {
                // operand layout unknowable, stop before losing sync
                tracing::warn!(kind, offset = cursor.offset - 1, "unknown list entry kind");
                return Err(Error::UnknownOpcode(kind));
            }
        }
    }
}

fn read_counted_expr<'a>(cursor: &mut Cursor<'a>, has_expressions: bool) -> Result<Option<&'a [u8]>> {
    if !has_expressions {
        return Ok(None);
    }
    let len = cursor.read_uleb128()? as usize;
    Ok(Some(cursor.read_slice(len)?))
}

/// The header at the front of a .debug_loclists/.debug_rnglists section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListsHeader {
    pub unit_length: u64,
    pub is_64bit: bool,
    pub version: u16,
    pub address_size: u8,
    pub segment_selector_size: u8,
    /// Offsets into the entry area, relative to just past this count field's
    /// table start. Indexed by DW_FORM_loclistx/rnglistx values.
    pub offsets: Vec<u64>,
    /// Where the offset table (the base for the offsets above) begins.
    pub offsets_start: usize,
}

impl ListsHeader {
    pub fn parse(reader: Reader<'_>, offset: usize) -> Result<Self> {
        let mut cursor = Cursor::new(reader, offset);
        let (unit_length, is_64bit) = cursor.read_initial_length()?;
        let end = cursor.offset.saturating_add(unit_length as usize).min(reader.len());
        cursor.end = end;

        let version = cursor.read_half()?;
        if version != 5 {
            return Err(Error::UnsupportedVersion(version));
        }
        let address_size = cursor.read_byte()?;
        let segment_selector_size = cursor.read_byte()?;
        let offset_entry_count = cursor.read_word()?;
        let offsets_start = cursor.offset;

        let offset_width = if is_64bit { 8 } else { 4 };
        if (offset_entry_count as usize)
            .checked_mul(offset_width)
            .map(|total| total > cursor.remaining())
            .unwrap_or(true)
        {
            return Err(Error::BogusStructure(format!(
                "offset table of {offset_entry_count} entries overruns the section"
            )));
        }
        let mut offsets = Vec::with_capacity(offset_entry_count as usize);
        for _ in 0..offset_entry_count {
            offsets.push(cursor.read_offset(is_64bit)?);
        }

        Ok(ListsHeader {
            unit_length,
            is_64bit,
            version,
            address_size,
            segment_selector_size,
            offsets,
            offsets_start,
        })
    }

    /// Absolute section offset of list `index` from the offset table.
    pub fn list_offset(&self, index: u64) -> Option<usize> {
        let relative = *self.offsets.get(index as usize)?;
        self.offsets_start.checked_add(relative as usize)
    }
}
