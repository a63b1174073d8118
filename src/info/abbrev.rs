//! Parsing of ".debug_abbrev": the per-unit schemas that DIEs reference by
//! code so attribute layouts aren't repeated in ".debug_info".
use crate::{
    error::{Error, Result},
    info::{AttributeName, FormEncoding, Tag},
    reader::{Cursor, Reader},
};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// The type of an attribute in a .debug_info entry along with how the
/// associated value is encoded. DW_FORM_implicit_const is special: its value
/// lives here in the abbreviation, not in the DIE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeEncoding {
    pub name: AttributeName,
    pub encoding: FormEncoding,
    pub implicit_const: Option<i64>,
}

/// This determines how values are encoded into the .debug_info section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Abbreviation {
    pub code: u64,

    /// DW_TAG_compile_unit, DW_TAG_typedef, DW_TAG_base_type, etc
    pub tag: Tag,

    /// If true then subsequent entries are children (until a NULL entry).
    /// Otherwise they are siblings.
    pub has_children: bool,

    pub attrs: SmallVec<[AttributeEncoding; 8]>,
}

impl Abbreviation {
    /// Returns an abbreviation or None for the code-0 entry that ends the
    /// table. Fails if the attribute list's (0, 0) terminator is missing.
    fn parse(cursor: &mut Cursor<'_>) -> Result<Option<Self>> {
        let code = cursor.read_uleb128()?;
        if code == 0 {
            return Ok(None);
        }

        let tag = Tag::from_u64(cursor.read_uleb128()?);
        let has_children = cursor.read_byte()? != 0;

        let mut attrs = SmallVec::new();
        loop {
            let name = cursor.read_uleb128()?;
            let encoding = cursor.read_uleb128()?;
            if name == 0 && encoding == 0 {
                break;
            }

            let encoding = FormEncoding::from_u64(encoding)?;
            let implicit_const = if encoding == FormEncoding::DW_FORM_implicit_const {
                Some(cursor.read_sleb128()?)
            } else {
                None
            };
            attrs.push(AttributeEncoding {
                name: AttributeName::from_u64(name),
                encoding,
                implicit_const,
            });
        }
        Ok(Some(Abbreviation {
            code,
            tag,
            has_children,
            attrs,
        }))
    }
}

/// One abbreviation set: everything from an offset within .debug_abbrev up
/// to its code-0 terminator. Codes are usually 1..n but nothing requires
/// that, so lookup goes through a map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbbrevTable {
    pub offset: usize,
    entries: HashMap<u64, Abbreviation>,
}

impl AbbrevTable {
    pub fn parse(reader: Reader<'_>, offset: usize) -> Result<AbbrevTable> {
        let mut cursor = Cursor::new(reader, offset);
        let mut entries = HashMap::new();
        loop {
            match Abbreviation::parse(&mut cursor) {
                Ok(Some(abbrev)) => {
                    if entries.insert(abbrev.code, abbrev).is_some() {
                        // Duplicate codes within one set: the later one wins,
                        // matching what consumers of the original data did.
                        tracing::warn!(offset, "duplicate abbreviation code");
                    }
                }
                Ok(None) => return Ok(AbbrevTable { offset, entries }),
                Err(Error::Truncated { .. }) => return Err(Error::MalformedAbbrev(offset)),
                Err(err) => return Err(err),
            }
        }
    }

    pub fn get(&self, code: u64) -> Option<&Abbreviation> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Caller-held cache of abbreviation tables keyed by section offset. Units
/// routinely share one table, so each offset is parsed at most once. Held by
/// the caller rather than a global so repeated or parallel decodes just work
/// (clone it per thread, or wrap it in a lock).
#[derive(Default)]
pub struct AbbrevCache {
    tables: HashMap<usize, Arc<AbbrevTable>>,
}

impl AbbrevCache {
    pub fn new() -> Self {
        AbbrevCache {
            tables: HashMap::new(),
        }
    }

    pub fn table(&mut self, reader: Reader<'_>, offset: usize) -> Result<Arc<AbbrevTable>> {
        if let Some(table) = self.tables.get(&offset) {
            return Ok(table.clone());
        }
        let table = Arc::new(AbbrevTable::parse(reader, offset)?);
        self.tables.insert(offset, table.clone());
        Ok(table)
    }
}
