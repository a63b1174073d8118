//! Compilation/type-unit headers and the DIE tree walk. A unit is a header
//! followed by a flat stream of DIEs; nesting is encoded by has_children
//! flags and null-DIE terminators, so the walker only has to track a depth.
use crate::{
    error::{Error, Result},
    info::{AbbrevCache, AbbrevTable, AttrValue, AttributeName, Tag, UnitContext, decode_value},
    reader::{Cursor, Reader},
    section::UnitSections,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// 7.5.1: the v5 unit_type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Compile,
    Type {
        signature: u64,
        type_offset: u64,
    },
    Partial,
    Skeleton {
        dwo_id: u64,
    },
    SplitCompile {
        dwo_id: u64,
    },
    SplitType {
        signature: u64,
        type_offset: u64,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct UnitHeader {
    /// Offset of the initial-length field within the section.
    pub offset: usize,

    /// Declared content length (not counting the length field itself).
    pub unit_length: u64,

    /// One past the last byte of this unit, clamped to the section.
    pub end: usize,

    pub version: u16,
    pub abbrev_offset: u64,
    pub address_size: u8,
    pub is_64bit: bool,
    pub kind: UnitKind,

    /// Where the first DIE starts.
    pub first_die: usize,
}

impl UnitHeader {
    /// Parse a unit header at `offset`. `in_types_section` selects the
    /// DWARF 4 .debug_types layout (signature + type offset after the
    /// address size); version 5 instead carries a unit_type byte.
    pub fn parse(reader: Reader<'_>, offset: usize, in_types_section: bool) -> Result<UnitHeader> {
        let mut cursor = Cursor::new(reader, offset);
        let (unit_length, is_64bit) = cursor.read_initial_length()?;
        let length_of_length = cursor.offset - offset;

        let declared_end = (offset + length_of_length) as u64 + unit_length;
        let end = if declared_end > reader.len() as u64 {
            tracing::warn!(
                offset,
                unit_length,
                section_len = reader.len(),
                "unit length overruns the section, clamping"
            );
            reader.len()
        } else {
            declared_end as usize
        };
        cursor.end = end;

        let version = cursor.read_half()?;
        if !(2..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        // Versions 2-4 put the abbrev offset before the address size;
        // version 5 inserts a unit_type byte and swaps the two fields.
        let (abbrev_offset, address_size, kind) = if version < 5 {
            let abbrev_offset = cursor.read_offset(is_64bit)?;
            let address_size = cursor.read_byte()?;
            let kind = if in_types_section {
                let signature = cursor.read_xword()?;
                let type_offset = cursor.read_offset(is_64bit)?;
                UnitKind::Type {
                    signature,
                    type_offset,
                }
            } else {
                UnitKind::Compile
            };
            (abbrev_offset, address_size, kind)
        } else {
            let unit_type = cursor.read_byte()?;
            let address_size = cursor.read_byte()?;
            let abbrev_offset = cursor.read_offset(is_64bit)?;
            let kind = match unit_type {
                0x01 => UnitKind::Compile,
                0x02 => UnitKind::Type {
                    signature: cursor.read_xword()?,
                    type_offset: cursor.read_offset(is_64bit)?,
                },
                0x03 => UnitKind::Partial,
                0x04 => UnitKind::Skeleton {
                    dwo_id: cursor.read_xword()?,
                },
                0x05 => UnitKind::SplitCompile {
                    dwo_id: cursor.read_xword()?,
                },
                0x06 => UnitKind::SplitType {
                    signature: cursor.read_xword()?,
                    type_offset: cursor.read_offset(is_64bit)?,
                },
                other => {
                    return Err(Error::MalformedHeader(format!("bad unit type {other:#x}")));
                }
            };
            (abbrev_offset, address_size, kind)
        };

        if !(1..=8).contains(&address_size) {
            return Err(Error::MalformedHeader(format!(
                "bad address size: {address_size}"
            )));
        }

        Ok(UnitHeader {
            offset,
            unit_length,
            end,
            version,
            abbrev_offset,
            address_size,
            is_64bit,
            kind,
            first_die: cursor.offset,
        })
    }
}

/// One decoded debug information entry.
#[derive(Clone, Debug)]
pub struct Die<'a> {
    /// Section offset of the DIE (what references point at).
    pub offset: usize,
    pub code: u64,
    pub tag: Tag,
    /// 0 for the unit root, +1 per has_children ancestor.
    pub depth: u32,
    pub attrs: SmallVec<[(AttributeName, AttrValue<'a>); 8]>,
}

impl<'a> Die<'a> {
    pub fn attr(&self, name: AttributeName) -> Option<&AttrValue<'a>> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// One unit, ready to walk. Borrow of the section bytes only.
pub struct Unit<'a> {
    pub header: UnitHeader,
    ctx: UnitContext<'a>,
    abbrevs: Arc<AbbrevTable>,
    reader: Reader<'a>,
}

impl<'a> Unit<'a> {
    pub fn parse(
        info: Reader<'a>,
        offset: usize,
        abbrev: Reader<'a>,
        cache: &mut AbbrevCache,
        sections: UnitSections<'a>,
    ) -> Result<Unit<'a>> {
        Self::parse_in(info, offset, false, abbrev, cache, sections)
    }

    pub fn parse_in(
        info: Reader<'a>,
        offset: usize,
        in_types_section: bool,
        abbrev: Reader<'a>,
        cache: &mut AbbrevCache,
        sections: UnitSections<'a>,
    ) -> Result<Unit<'a>> {
        let header = UnitHeader::parse(info, offset, in_types_section)?;
        let abbrevs = cache.table(abbrev, header.abbrev_offset as usize)?;

        // Until the root DIE supplies DW_AT_str_offsets_base the v5 default
        // is the offset just past the .debug_str_offsets header.
        let str_offsets_base = if header.version >= 5 {
            if header.is_64bit { 16 } else { 8 }
        } else {
            0
        };
        let ctx = UnitContext {
            version: header.version,
            address_size: header.address_size,
            is_64bit: header.is_64bit,
            little_endian: info.little_endian,
            unit_offset: offset,
            sections,
            str_offsets_base,
            addr_base: 0,
            loclists_base: 0,
            rnglists_base: 0,
            low_pc: 0,
        };
        Ok(Unit {
            header,
            ctx,
            abbrevs,
            reader: info,
        })
    }

    /// Walk this unit's DIEs from the top. Restartable: each call starts a
    /// fresh walk at the first DIE.
    pub fn dies(&self) -> DieWalker<'a> {
        DieWalker {
            cursor: Cursor::with_end(self.reader, self.header.first_die, self.header.end),
            ctx: self.ctx,
            abbrevs: self.abbrevs.clone(),
            depth: 0,
            seen_root: false,
            done: false,
        }
    }
}

/// Iterator over a unit's DIEs in stream order (a pre-order traversal of
/// the tree). Null entries are consumed for depth tracking, not yielded.
pub struct DieWalker<'a> {
    cursor: Cursor<'a>,
    ctx: UnitContext<'a>,
    abbrevs: Arc<AbbrevTable>,
    depth: u32,
    seen_root: bool,
    done: bool,
}

impl<'a> DieWalker<'a> {
    /// The per-unit bases picked up from the root DIE, for the loc/range
    /// list and address-table decoders that run as separate passes.
    pub fn context(&self) -> &UnitContext<'a> {
        &self.ctx
    }

    fn next_die(&mut self) -> Result<Option<Die<'a>>> {
        loop {
            if self.cursor.at_end() {
                if self.depth != 0 {
                    tracing::warn!(depth = self.depth, "unit ended inside a child list");
                }
                return Ok(None);
            }

            let offset = self.cursor.offset;
            let code = self.cursor.read_uleb128()?;
            if code == 0 {
                if self.depth == 0 {
                    // A null DIE at depth 0 is normal zero padding at the
                    // end of the unit, as long as everything left is zero.
                    let rest = self.cursor.remaining();
                    let pad = self.cursor.read_slice(rest)?;
                    if pad.iter().any(|&b| b != 0) {
                        tracing::warn!(offset, "sibling terminator below the unit root");
                        self.cursor.offset = offset + 1;
                        continue;
                    }
                    return Ok(None);
                }
                self.depth -= 1;
                continue;
            }

            let abbrevs = self.abbrevs.clone();
            let Some(abbrev) = abbrevs.get(code) else {
                // The cursor can no longer be trusted: without the abbrev we
                // don't know the DIE's size, so the whole unit walk aborts.
                return Err(Error::UnknownAbbrevCode { code, offset });
            };

            let mut attrs = SmallVec::new();
            for ae in abbrev.attrs.iter() {
                let value =
                    decode_value(&mut self.cursor, ae.encoding, ae.implicit_const, &self.ctx)?;
                attrs.push((ae.name, value));
            }

            let die = Die {
                offset,
                code,
                tag: abbrev.tag,
                depth: self.depth,
                attrs,
            };
            if !self.seen_root {
                self.seen_root = true;
                self.record_bases(&die);
            }
            if abbrev.has_children {
                self.depth += 1;
            }
            return Ok(Some(die));
        }
    }

    /// The root DIE carries the bases later indexed lookups are relative to.
    fn record_bases(&mut self, die: &Die<'a>) {
        for (name, value) in die.attrs.iter() {
            let Some(v) = value.as_uint() else { continue };
            match name {
                AttributeName::DW_AT_str_offsets_base => self.ctx.str_offsets_base = v,
                AttributeName::DW_AT_addr_base | AttributeName::DW_AT_GNU_addr_base => {
                    self.ctx.addr_base = v;
                }
                AttributeName::DW_AT_loclists_base => self.ctx.loclists_base = v,
                AttributeName::DW_AT_rnglists_base => self.ctx.rnglists_base = v,
                AttributeName::DW_AT_low_pc => self.ctx.low_pc = v,
                _ => {}
            }
        }
    }
}

impl<'a> Iterator for DieWalker<'a> {
    type Item = Result<Die<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_die() {
            Ok(Some(die)) => Some(Ok(die)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
