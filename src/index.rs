//! DWARF package-file (.dwp) unit indexes: the ".debug_cu_index" and
//! ".debug_tu_index" hash tables that map a unit signature to that unit's
//! contributions inside the package's concatenated sections.
use crate::{
    error::{Error, Result},
    reader::{Cursor, Reader},
};

/// Section identifiers used by the version 2 column table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DwSect {
    Info,
    Types,
    Abbrev,
    Line,
    Loc,
    StrOffsets,
    Macinfo,
    Macro,
    Unknown(u32),
}

impl DwSect {
    fn from_u32(value: u32) -> Self {
        match value {
            1 => DwSect::Info,
            2 => DwSect::Types,
            3 => DwSect::Abbrev,
            4 => DwSect::Line,
            5 => DwSect::Loc,
            6 => DwSect::StrOffsets,
            7 => DwSect::Macinfo,
            8 => DwSect::Macro,
            other => DwSect::Unknown(other),
        }
    }
}

/// One section's slice of the package file for one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub offset: u64,
    pub size: u64,
}

/// What a signature maps to: version 2 gives per-section offset/size pairs;
/// version 1 only a zero-terminated list of section indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexRow {
    Contributions(Vec<(DwSect, Contribution)>),
    SectionIndices(Vec<u32>),
}

#[derive(Debug)]
pub struct UnitIndex {
    pub version: u32,
    slot_count: u32,
    used_count: u32,
    signatures: Vec<u64>,
    /// Per slot: 0 for empty, else a 1-based row number (v2) or a pool
    /// offset in u32 units (v1).
    rows: Vec<u32>,
    columns: Vec<DwSect>,
    offsets: Vec<u32>,
    sizes: Vec<u32>,
    pool: Vec<u32>,
}

impl UnitIndex {
    pub fn parse(reader: Reader<'_>) -> Result<Self> {
        let mut cursor = Cursor::new(reader, 0);
        let version = cursor.read_word()?;
        if !(1..=2).contains(&version) {
            return Err(Error::UnsupportedVersion(version.min(u16::MAX as u32) as u16));
        }
        let column_count = cursor.read_word()?; // padding in version 1
        let used_count = cursor.read_word()?;
        let slot_count = cursor.read_word()?;

        if slot_count == 0 && used_count > 0 {
            return Err(Error::BogusStructure(
                "unit index with used entries but no slots".into(),
            ));
        }
        // hash and row arrays are 12 bytes per slot; verify before looping
        let table_bytes = (slot_count as usize)
            .checked_mul(12)
            .ok_or_else(|| Error::BogusStructure("slot count overflows".into()))?;
        if table_bytes > cursor.remaining() {
            return Err(Error::BogusStructure(format!(
                "unit index slot count {slot_count} overruns the section"
            )));
        }

        let mut signatures = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            signatures.push(cursor.read_xword()?);
        }
        let mut rows = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            rows.push(cursor.read_word()?);
        }

        let mut columns = Vec::new();
        let mut offsets = Vec::new();
        let mut sizes = Vec::new();
        let mut pool = Vec::new();

        if version == 2 {
            let cells = (column_count as usize)
                .checked_mul(used_count as usize)
                .and_then(|cells| cells.checked_mul(2))
                .and_then(|cells| cells.checked_add(column_count as usize))
                .ok_or_else(|| Error::BogusStructure("column pool overflows".into()))?;
            if cells.checked_mul(4).map(|b| b > cursor.remaining()).unwrap_or(true) {
                return Err(Error::BogusStructure(format!(
                    "{column_count} columns for {used_count} rows overrun the section"
                )));
            }

            for _ in 0..column_count {
                columns.push(DwSect::from_u32(cursor.read_word()?));
            }
            for _ in 0..column_count as usize * used_count as usize {
                offsets.push(cursor.read_word()?);
            }
            for _ in 0..column_count as usize * used_count as usize {
                sizes.push(cursor.read_word()?);
            }
        } else {
            // version 1: everything after the arrays is the section-index
            // pool, addressed by the row values
            while !cursor.at_end() {
                pool.push(cursor.read_word()?);
            }
        }

        Ok(UnitIndex {
            version,
            slot_count,
            used_count,
            signatures,
            rows,
            columns,
            offsets,
            sizes,
            pool,
        })
    }

    pub fn columns(&self) -> &[DwSect] {
        &self.columns
    }

    /// Find the slot holding `signature`, if any.
    fn slot_of(&self, signature: u64) -> Option<usize> {
        if self.slot_count == 0 {
            return None;
        }
        if self.slot_count.is_power_of_two() {
            // open addressing with the secondary hash forced odd, so every
            // slot is eventually probed
            let mask = (self.slot_count - 1) as u64;
            let mut slot = signature & mask;
            let stride = ((signature >> 32) & mask) | 1;
            for _ in 0..self.slot_count {
                if self.signatures[slot as usize] == signature && self.rows[slot as usize] != 0 {
                    return Some(slot as usize);
                }
                if self.rows[slot as usize] == 0 {
                    return None;
                }
                slot = (slot + stride) & mask;
            }
            None
        } else {
            // a producer wrote a non-power-of-two table; probing math no
            // longer matches, but a scan still finds the signature
            tracing::warn!(slots = self.slot_count, "unit index slot count not a power of two");
            (0..self.slot_count as usize)
                .find(|&slot| self.signatures[slot] == signature && self.rows[slot] != 0)
        }
    }

    pub fn lookup(&self, signature: u64) -> Option<IndexRow> {
        let slot = self.slot_of(signature)?;
        let row = self.rows[slot];

        if self.version == 2 {
            // row numbers are 1-based; 0 marked an empty slot
            let row = (row as usize).checked_sub(1)?;
            if row >= self.used_count as usize {
                tracing::warn!(row, used = self.used_count, "unit index row out of range");
                return None;
            }
            let width = self.columns.len();
            let base = row.checked_mul(width)?;
            let mut contributions = Vec::with_capacity(width);
            for (column, &section) in self.columns.iter().enumerate() {
                let cell = base + column;
                contributions.push((
                    section,
                    Contribution {
                        offset: *self.offsets.get(cell)? as u64,
                        size: *self.sizes.get(cell)? as u64,
                    },
                ));
            }
            Some(IndexRow::Contributions(contributions))
        } else {
            // version 1: the row value indexes the u32 pool; the list there
            // is zero-terminated
            let mut at = row as usize;
            let mut indices = Vec::new();
            loop {
                let value = *self.pool.get(at)?;
                if value == 0 {
                    return Some(IndexRow::SectionIndices(indices));
                }
                indices.push(value);
                at = at.checked_add(1)?;
            }
        }
    }
}
