//! The ".debug_line" state machine: a bytecode program that reconstructs the
//! address to (file, line, column) mapping one row at a time. Versions 2
//! through 5 share the opcode set; the header layout and the directory/file
//! tables are what changed across versions.
use crate::{
    error::{Error, Result},
    info::{decode_value, AttrValue, FormEncoding, UnitContext},
    reader::{Cursor, Reader},
    section::UnitSections,
};

// DW_LNCT_* content type codes for the v5 format-descriptor tables.
const LNCT_PATH: u64 = 1;
const LNCT_DIRECTORY_INDEX: u64 = 2;
const LNCT_TIMESTAMP: u64 = 3;
const LNCT_SIZE: u64 = 4;
const LNCT_MD5: u64 = 5;

/// One directory or file-name table entry. Pre-v5 programs only fill `path`
/// and the three ULEB fields; v5 programs fill whatever their format
/// descriptors describe.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FileEntry<'a> {
    /// Inline or resolved through .debug_str/.debug_line_str. `StrRef` when
    /// the string section wasn't supplied.
    pub path: Option<AttrValue<'a>>,
    pub directory_index: u64,
    pub timestamp: u64,
    pub size: u64,
    pub md5: Option<&'a [u8]>,
}

/// A parsed line-program header. Kept separate from the interpreter so a
/// continuation fragment (a `.debug_line.<suffix>` section produced by
/// link-time section GC) can be run against the last full header seen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineHeader<'a> {
    pub offset: usize,
    pub end: usize,
    /// Where the opcode stream starts.
    pub program_start: usize,
    pub version: u16,
    pub is_64bit: bool,
    pub address_size: u8,
    pub segment_selector_size: u8,
    pub min_insn_length: u8,
    pub max_ops_per_insn: u8,
    pub default_is_stmt: bool,
    pub line_base: i8,
    pub line_range: u8,
    pub opcode_base: u8,
    /// Operand counts for standard opcodes 1..opcode_base.
    pub standard_opcode_lengths: Vec<u8>,
    pub directories: Vec<FileEntry<'a>>,
    pub file_names: Vec<FileEntry<'a>>,
}

impl<'a> LineHeader<'a> {
    /// Parse one program header starting at `offset` in .debug_line.
    /// `address_size` is the enclosing unit's, used by pre-v5 programs which
    /// don't carry their own.
    pub fn parse(
        reader: Reader<'a>,
        offset: usize,
        address_size: u8,
        sections: &UnitSections<'a>,
    ) -> Result<Self> {
        let mut cursor = Cursor::new(reader, offset);
        let (unit_length, is_64bit) = cursor.read_initial_length()?;

        let mut end = cursor.offset.saturating_add(unit_length as usize);
        if end > reader.len() {
            tracing::warn!(offset, unit_length, "line program overruns its section");
            end = reader.len();
        }
        cursor.end = end;

        let version = cursor.read_half()?;
        if !(2..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let (address_size, segment_selector_size) = if version >= 5 {
            (cursor.read_byte()?, cursor.read_byte()?)
        } else {
            (address_size, 0)
        };

        let header_length = cursor.read_offset(is_64bit)?;
        let program_start = cursor
            .offset
            .saturating_add(header_length as usize)
            .min(end);

        let min_insn_length = cursor.read_byte()?;
        let max_ops_per_insn = if version >= 4 {
            let max_ops = cursor.read_byte()?;
            if max_ops == 0 {
                tracing::warn!(offset, "maximum operations per instruction is zero");
                1
            } else {
                max_ops
            }
        } else {
            1
        };
        let default_is_stmt = cursor.read_byte()? != 0;
        let line_base = cursor.read_sint(1)? as i8;
        let mut line_range = cursor.read_byte()?;
        if line_range == 0 {
            // divisor for special opcodes; 0 would be a fatal divide
            tracing::warn!(offset, "line range of zero corrected to one");
            line_range = 1;
        }
        let opcode_base = cursor.read_byte()?;
        let mut standard_opcode_lengths = Vec::with_capacity(opcode_base.saturating_sub(1) as usize);
        for _ in 1..opcode_base {
            standard_opcode_lengths.push(cursor.read_byte()?);
        }

        let ctx = UnitContext {
            version,
            address_size,
            is_64bit,
            little_endian: reader.little_endian,
            unit_offset: offset,
            sections: *sections,
            str_offsets_base: 0,
            addr_base: 0,
            loclists_base: 0,
            rnglists_base: 0,
            low_pc: 0,
        };

        let (directories, file_names) = if version >= 5 {
            let directories = parse_descriptor_table(&mut cursor, &ctx)?;
            let file_names = parse_descriptor_table(&mut cursor, &ctx)?;
            (directories, file_names)
        } else {
            (
                parse_legacy_directories(&mut cursor)?,
                parse_legacy_file_names(&mut cursor)?,
            )
        };

        Ok(LineHeader {
            offset,
            end,
            program_start,
            version,
            is_64bit,
            address_size,
            segment_selector_size,
            min_insn_length,
            max_ops_per_insn,
            default_is_stmt,
            line_base,
            line_range,
            opcode_base,
            standard_opcode_lengths,
            directories,
            file_names,
        })
    }

    /// The file-name entry the `file` register names. File numbers are
    /// 1-based before version 5 and 0-based from version 5 on.
    pub fn file(&self, index: u64) -> Option<&FileEntry<'a>> {
        let index = if self.version >= 5 {
            index as usize
        } else {
            (index as usize).checked_sub(1)?
        };
        self.file_names.get(index)
    }
}

/// Pre-v5 directory table: NUL-terminated paths until an empty one.
fn parse_legacy_directories<'a>(cursor: &mut Cursor<'a>) -> Result<Vec<FileEntry<'a>>> {
    let mut dirs = Vec::new();
    loop {
        let path = cursor.read_cstr()?;
        if path.is_empty() {
            return Ok(dirs);
        }
        dirs.push(FileEntry {
            path: Some(AttrValue::Str(path)),
            ..FileEntry::default()
        });
    }
}

/// Pre-v5 file table: (path, dir index, mtime, size) until an empty path.
fn parse_legacy_file_names<'a>(cursor: &mut Cursor<'a>) -> Result<Vec<FileEntry<'a>>> {
    let mut files = Vec::new();
    loop {
        let path = cursor.read_cstr()?;
        if path.is_empty() {
            return Ok(files);
        }
        files.push(FileEntry {
            path: Some(AttrValue::Str(path)),
            directory_index: cursor.read_uleb128()?,
            timestamp: cursor.read_uleb128()?,
            size: cursor.read_uleb128()?,
            md5: None,
        });
    }
}

/// V5 directory/file tables: a list of (content type, form) descriptors
/// followed by that many-field rows, decoded with the ordinary form decoder.
fn parse_descriptor_table<'a>(
    cursor: &mut Cursor<'a>,
    ctx: &UnitContext<'a>,
) -> Result<Vec<FileEntry<'a>>> {
    let format_count = cursor.read_byte()?;
    let mut formats = Vec::with_capacity(format_count as usize);
    for _ in 0..format_count {
        let content_type = cursor.read_uleb128()?;
        let form = FormEncoding::from_u64(cursor.read_uleb128()?)?;
        formats.push((content_type, form));
    }

    let count = cursor.read_uleb128()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        if cursor.at_end() {
            return Err(Error::Truncated {
                offset: cursor.offset,
                wanted: 1,
                end: cursor.end,
            });
        }
        let mut entry = FileEntry::default();
        for &(content_type, form) in &formats {
            let value = decode_value(cursor, form, None, ctx)?;
            match content_type {
                LNCT_PATH => entry.path = Some(value),
                LNCT_DIRECTORY_INDEX => {
                    entry.directory_index = value.as_uint().unwrap_or(0);
                }
                LNCT_TIMESTAMP => entry.timestamp = value.as_uint().unwrap_or(0),
                LNCT_SIZE => entry.size = value.as_uint().unwrap_or(0),
                LNCT_MD5 => {
                    if let AttrValue::Bytes(bytes) = value {
                        entry.md5 = Some(bytes);
                    }
                }
                _ => {
                    // vendor content type; the form told us its size so the
                    // cursor is still in sync
                    tracing::debug!(content_type, "skipping vendor line-table column");
                }
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// One emitted row of the line table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRow {
    pub address: u64,
    pub op_index: u32,
    pub file: u64,
    pub line: u64,
    pub column: u64,
    pub is_stmt: bool,
    pub basic_block: bool,
    pub end_sequence: bool,
    pub prologue_end: bool,
    pub epilogue_begin: bool,
    pub isa: u64,
    pub discriminator: u64,
}

impl LineRow {
    fn initial(default_is_stmt: bool) -> Self {
        LineRow {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }
}

/// Interprets one program's opcode stream as an iterator of rows. Rows are
/// emitted exactly on copy, special opcodes, and end_sequence.
pub struct LineProgram<'a> {
    header: LineHeader<'a>,
    cursor: Cursor<'a>,
    registers: LineRow,
    done: bool,
}

impl<'a> LineProgram<'a> {
    pub fn new(header: LineHeader<'a>, reader: Reader<'a>) -> Self {
        let cursor = Cursor::with_end(reader, header.program_start, header.end);
        let registers = LineRow::initial(header.default_is_stmt);
        LineProgram {
            header,
            cursor,
            registers,
            done: false,
        }
    }

    /// Run a header against a different opcode range. This is how a
    /// `.debug_line.<suffix>` continuation fragment, which has no header of
    /// its own, is interpreted against the last full header seen.
    pub fn resume(header: LineHeader<'a>, reader: Reader<'a>, start: usize, end: usize) -> Self {
        let cursor = Cursor::with_end(reader, start, end);
        let registers = LineRow::initial(header.default_is_stmt);
        LineProgram {
            header,
            cursor,
            registers,
            done: false,
        }
    }

    pub fn header(&self) -> &LineHeader<'a> {
        &self.header
    }

    /// Apply an operation advance to address/op_index. The VLIW formula only
    /// differs from the simple one when max_ops > 1.
    fn advance(&mut self, op_advance: u64) {
        let min_insn = self.header.min_insn_length as u64;
        if self.header.max_ops_per_insn > 1 {
            let max_ops = self.header.max_ops_per_insn as u64;
            let total = self.registers.op_index as u64 + op_advance;
            self.registers.address = self
                .registers
                .address
                .wrapping_add((total / max_ops).wrapping_mul(min_insn));
            self.registers.op_index = (total % max_ops) as u32;
        } else {
            self.registers.address = self
                .registers
                .address
                .wrapping_add(op_advance.wrapping_mul(min_insn));
        }
    }

    /// The operation advance encoded by a special opcode byte.
    fn special_op_advance(&self, opcode: u8) -> u64 {
        let adjusted = (opcode - self.header.opcode_base) as u64;
        adjusted / self.header.line_range as u64
    }

    /// Emit a row then clear the per-row flags.
    fn emit(&mut self) -> LineRow {
        let row = self.registers;
        self.registers.basic_block = false;
        self.registers.prologue_end = false;
        self.registers.epilogue_begin = false;
        self.registers.discriminator = 0;
        row
    }

    /// Interpret opcodes until one emits a row.
    fn step(&mut self) -> Result<Option<LineRow>> {
        while !self.cursor.at_end() {
            let opcode = self.cursor.read_byte()?;

            if opcode >= self.header.opcode_base {
                // special opcode: combined advance plus line delta, then emit
                let adjusted = (opcode - self.header.opcode_base) as i64;
                self.advance(self.special_op_advance(opcode));
                let delta = self.header.line_base as i64 + adjusted % self.header.line_range as i64;
                self.registers.line = self.registers.line.wrapping_add_signed(delta);
                return Ok(Some(self.emit()));
            }

            match opcode {
                0 => {
                    if let Some(row) = self.extended_op()? {
                        return Ok(Some(row));
                    }
                }
                1 => return Ok(Some(self.emit())), // copy
                2 => {
                    let advance = self.cursor.read_uleb128()?;
                    self.advance(advance);
                }
                3 => {
                    let delta = self.cursor.read_sleb128()?;
                    self.registers.line = self.registers.line.wrapping_add_signed(delta);
                }
                4 => self.registers.file = self.cursor.read_uleb128()?,
                5 => self.registers.column = self.cursor.read_uleb128()?,
                6 => self.registers.is_stmt = !self.registers.is_stmt,
                7 => self.registers.basic_block = true,
                8 => {
                    // const_add_pc: advance as if by special opcode 255
                    self.advance(self.special_op_advance(255));
                }
                9 => {
                    // fixed_advance_pc: unscaled, resets op_index
                    let advance = self.cursor.read_half()? as u64;
                    self.registers.address = self.registers.address.wrapping_add(advance);
                    self.registers.op_index = 0;
                }
                10 => self.registers.prologue_end = true,
                11 => self.registers.epilogue_begin = true,
                12 => self.registers.isa = self.cursor.read_uleb128()?,
                _ => {
                    // a standard opcode we don't know; the header declared
                    // its operand count so skip exactly that many LEBs
                    let count = self
                        .header
                        .standard_opcode_lengths
                        .get(opcode as usize - 1)
                        .copied()
                        .unwrap_or(0);
                    tracing::warn!(opcode, count, "unknown standard opcode");
                    for _ in 0..count {
                        self.cursor.read_uleb128()?;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Extended opcodes carry their own length so unknown ones can be
    /// skipped without losing cursor sync.
    fn extended_op(&mut self) -> Result<Option<LineRow>> {
        let length = self.cursor.read_uleb128()? as usize;
        let start = self.cursor.offset;
        let end = start.saturating_add(length).min(self.cursor.end);
        if length == 0 {
            tracing::warn!(offset = start, "zero-length extended opcode");
            return Ok(None);
        }

        let mut inner = Cursor::with_end(self.cursor.reader, start, end);
        let opcode = inner.read_byte()?;
        let row = match opcode {
            1 => {
                // end_sequence: emit a final row, then reset the machine
                self.registers.end_sequence = true;
                let row = self.registers;
                self.registers = LineRow::initial(self.header.default_is_stmt);
                Some(row)
            }
            2 => {
                // set_address: operand width is whatever the record holds
                let width = end - inner.offset;
                if (1..=8).contains(&width) {
                    self.registers.address = inner.read_uint(width)?;
                    self.registers.op_index = 0;
                } else {
                    tracing::warn!(width, "bad set_address operand width");
                }
                None
            }
            3 => {
                // define_file: appends a file-table entry at runtime
                let path = inner.read_cstr()?;
                let entry = FileEntry {
                    path: Some(AttrValue::Str(path)),
                    directory_index: inner.read_uleb128()?,
                    timestamp: inner.read_uleb128()?,
                    size: inner.read_uleb128()?,
                    md5: None,
                };
                self.header.file_names.push(entry);
                None
            }
            4 => {
                self.registers.discriminator = inner.read_uleb128()?;
                None
            }
            _ => {
                tracing::warn!(opcode, "unknown extended opcode");
                None
            }
        };

        // resync on the declared length no matter what the opcode consumed
        self.cursor.offset = end;
        Ok(row)
    }
}

impl<'a> Iterator for LineProgram<'a> {
    type Item = Result<LineRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(row)) => Some(Ok(row)),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::encode_uleb128;

    /// A v2 header with the standard opcode table, one directory, one file,
    /// followed by the given program bytes.
    fn program_v2(opcodes: &[u8]) -> Vec<u8> {
        program_with(2, 13, -5, 14, opcodes)
    }

    fn program_with(
        version: u16,
        opcode_base: u8,
        line_base: i8,
        line_range: u8,
        opcodes: &[u8],
    ) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&version.to_le_bytes());

        let mut post_length = Vec::new();
        post_length.push(1); // minimum_instruction_length
        if version >= 4 {
            post_length.push(1); // maximum_operations_per_instruction
        }
        post_length.push(1); // default_is_stmt
        post_length.push(line_base as u8);
        post_length.push(line_range);
        post_length.push(opcode_base);
        // operand counts for the twelve standard opcodes
        let std_lengths = [0u8, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1];
        post_length.extend_from_slice(&std_lengths[..(opcode_base - 1).min(12) as usize]);
        post_length.extend_from_slice(b"src\0\0"); // directories
        post_length.extend_from_slice(b"a.c\0\x01\x00\x00\0"); // file names

        header.extend_from_slice(&(post_length.len() as u32).to_le_bytes());
        header.extend_from_slice(&post_length);
        header.extend_from_slice(opcodes);

        let mut out = Vec::new();
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        out.extend_from_slice(&header);
        out
    }

    fn rows(bytes: &[u8]) -> Vec<LineRow> {
        let reader = Reader::new(bytes, true);
        let header = LineHeader::parse(reader, 0, 8, &UnitSections::default()).unwrap();
        LineProgram::new(header, reader)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn header_fields_parse() {
        let bytes = program_v2(&[]);
        let reader = Reader::new(&bytes, true);
        let header = LineHeader::parse(reader, 0, 8, &UnitSections::default()).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.line_base, -5);
        assert_eq!(header.line_range, 14);
        assert_eq!(header.opcode_base, 13);
        assert_eq!(header.standard_opcode_lengths.len(), 12);
        assert_eq!(header.directories.len(), 1);
        assert_eq!(header.file_names.len(), 1);
        assert_eq!(header.file(1).unwrap().path, Some(AttrValue::Str(b"a.c")));
        assert_eq!(header.end, bytes.len());
    }

    #[test]
    fn minimal_special_opcode_emits_one_row() {
        // special opcode 13 with opcode_base 13: adjusted 0, so the address
        // advance is 0 and the line moves by line_base
        let all = rows(&program_v2(&[13]));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].address, 0);
        assert_eq!(all[0].line, 1u64.wrapping_add_signed(-5));
        assert!(all[0].is_stmt);
    }

    #[test]
    fn copy_advance_and_end_sequence() {
        let mut ops = Vec::new();
        ops.push(2); // advance_pc 0x20
        ops.extend_from_slice(&encode_uleb128(0x20));
        ops.push(3); // advance_line +4
        ops.extend_from_slice(&[0x04]);
        ops.push(1); // copy
        ops.extend_from_slice(&[0, 1, 1]); // end_sequence

        let all = rows(&program_v2(&ops));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].address, 0x20);
        assert_eq!(all[0].line, 5);
        assert!(!all[0].end_sequence);
        assert!(all[1].end_sequence);
    }

    #[test]
    fn set_address_resets_op_index() {
        let mut ops = vec![0, 9, 2]; // extended, len 9, set_address
        ops.extend_from_slice(&0x4000_1000u64.to_le_bytes());
        ops.push(1); // copy
        ops.extend_from_slice(&[0, 1, 1]);

        let all = rows(&program_v2(&ops));
        assert_eq!(all[0].address, 0x4000_1000);
        assert_eq!(all[0].op_index, 0);
    }

    #[test]
    fn registers_reset_after_end_sequence() {
        let mut ops = vec![4, 3]; // set_file 3
        ops.extend_from_slice(&[0, 1, 1]); // end_sequence
        ops.push(1); // copy in a fresh sequence
        ops.extend_from_slice(&[0, 1, 1]);

        let all = rows(&program_v2(&ops));
        assert_eq!(all[0].file, 3);
        assert_eq!(all[1].file, 1); // reset
        assert_eq!(all[2].file, 1);
    }

    #[test]
    fn addresses_are_monotonic_within_a_sequence() {
        let mut ops = Vec::new();
        for advance in [1u64, 4, 0, 16, 2] {
            ops.push(2);
            ops.extend_from_slice(&encode_uleb128(advance));
            ops.push(1);
        }
        ops.push(8); // const_add_pc
        ops.push(1);
        ops.extend_from_slice(&[0, 1, 1]);

        let all = rows(&program_v2(&ops));
        for pair in all.windows(2) {
            assert!(pair[0].address <= pair[1].address);
        }
    }

    #[test]
    fn discriminator_clears_after_each_row() {
        let mut ops = vec![0, 2, 4, 7]; // set_discriminator 7
        ops.push(1); // copy
        ops.push(1); // copy again
        ops.extend_from_slice(&[0, 1, 1]);

        let all = rows(&program_v2(&ops));
        assert_eq!(all[0].discriminator, 7);
        assert_eq!(all[1].discriminator, 0);
    }

    #[test]
    fn unknown_standard_opcode_skips_declared_operands() {
        // opcode_base 14 declares a 13th standard opcode taking one LEB;
        // opcode 13 is unknown to us and must be skipped cleanly
        let mut ops = vec![13]; // the unknown standard opcode
        ops.extend_from_slice(&encode_uleb128(99)); // its declared operand
        ops.push(1); // copy
        ops.extend_from_slice(&[0, 1, 1]);

        let all = rows(&build_base14(&ops));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].line, 1); // the unknown opcode changed nothing
    }

    fn build_base14(opcodes: &[u8]) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&2u16.to_le_bytes());
        let mut post_length = Vec::new();
        post_length.push(1); // min insn length
        post_length.push(1); // default_is_stmt
        post_length.push((-5i8) as u8);
        post_length.push(14); // line_range
        post_length.push(14); // opcode_base
        let std_lengths = [0u8, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1, 1];
        post_length.extend_from_slice(&std_lengths);
        post_length.extend_from_slice(b"\0"); // no directories
        post_length.extend_from_slice(b"a.c\0\x00\x00\x00\0");
        header.extend_from_slice(&(post_length.len() as u32).to_le_bytes());
        header.extend_from_slice(&post_length);
        header.extend_from_slice(opcodes);
        let mut out = Vec::new();
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        out.extend_from_slice(&header);
        out
    }

    #[test]
    fn vliw_advance_uses_op_index() {
        // v4 header with max_ops = 2, min_insn = 4
        let mut header = Vec::new();
        header.extend_from_slice(&4u16.to_le_bytes());
        let mut post_length = Vec::new();
        post_length.push(4); // minimum_instruction_length
        post_length.push(2); // maximum_operations_per_instruction
        post_length.push(1); // default_is_stmt
        post_length.push((-5i8) as u8);
        post_length.push(14);
        post_length.push(13);
        post_length.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
        post_length.extend_from_slice(b"\0");
        post_length.extend_from_slice(b"a.c\0\x00\x00\x00\0");
        header.extend_from_slice(&(post_length.len() as u32).to_le_bytes());
        header.extend_from_slice(&post_length);

        // advance_pc 3: op_index 0 + 3 -> address += (3/2)*4, op_index = 1
        let mut ops = vec![2];
        ops.extend_from_slice(&encode_uleb128(3));
        ops.push(1); // copy
        ops.extend_from_slice(&[0, 1, 1]);
        header.extend_from_slice(&ops);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header);

        let all = rows(&bytes);
        assert_eq!(all[0].address, 4);
        assert_eq!(all[0].op_index, 1);
    }

    #[test]
    fn v5_descriptor_tables() {
        let mut header = Vec::new();
        header.extend_from_slice(&5u16.to_le_bytes());
        header.push(8); // address_size
        header.push(0); // segment_selector_size

        let mut post_length = Vec::new();
        post_length.push(1); // min insn
        post_length.push(1); // max ops
        post_length.push(1); // default_is_stmt
        post_length.push((-5i8) as u8);
        post_length.push(14);
        post_length.push(13);
        post_length.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);

        // directory table: one column (path, DW_FORM_string), one entry
        post_length.push(1);
        post_length.extend_from_slice(&[0x01, 0x08]); // DW_LNCT_path, string
        post_length.push(1); // count
        post_length.extend_from_slice(b"/tmp\0");

        // file table: path + directory_index + md5
        post_length.push(3);
        post_length.extend_from_slice(&[0x01, 0x08]); // path, string
        post_length.extend_from_slice(&[0x02, 0x0b]); // dir index, data1
        post_length.extend_from_slice(&[0x05, 0x1e]); // md5, data16
        post_length.push(1); // count
        post_length.extend_from_slice(b"a.c\0");
        post_length.push(0);
        post_length.extend_from_slice(&[0xaa; 16]);

        header.extend_from_slice(&(post_length.len() as u32).to_le_bytes());
        header.extend_from_slice(&post_length);
        header.push(13); // one minimal special opcode

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header);

        let reader = Reader::new(&bytes, true);
        let parsed = LineHeader::parse(reader, 0, 8, &UnitSections::default()).unwrap();
        assert_eq!(parsed.version, 5);
        assert_eq!(parsed.directories.len(), 1);
        assert_eq!(parsed.file_names.len(), 1);
        assert_eq!(parsed.file_names[0].md5, Some(&[0xaa; 16][..]));
        // v5 file numbering is zero-based
        assert_eq!(parsed.file(0).unwrap().path, Some(AttrValue::Str(b"a.c")));

        let all: Vec<_> = LineProgram::new(parsed, reader)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn continuation_fragment_reuses_header() {
        let bytes = program_v2(&[]);
        let reader = Reader::new(&bytes, true);
        let header = LineHeader::parse(reader, 0, 8, &UnitSections::default()).unwrap();

        let fragment = [13u8, 0, 1, 1]; // special 13, end_sequence
        let frag_reader = Reader::new(&fragment, true);
        let all: Vec<_> = LineProgram::resume(header, frag_reader, 0, fragment.len())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn truncated_prefixes_never_panic() {
        let bytes = program_v2(&[2, 0x20, 1, 0, 1, 1]);
        for len in 0..bytes.len() {
            let reader = Reader::new(&bytes[..len], true);
            match LineHeader::parse(reader, 0, 8, &UnitSections::default()) {
                Ok(header) => {
                    // a short program may still parse a header; rows must
                    // then end in an error, never a panic
                    for row in LineProgram::new(header, reader) {
                        if row.is_err() {
                            break;
                        }
                    }
                }
                Err(_) => {}
            }
        }
    }

    #[test]
    fn line_range_zero_is_corrected() {
        let bytes = program_with(2, 13, -5, 0, &[13]);
        let reader = Reader::new(&bytes, true);
        let header = LineHeader::parse(reader, 0, 8, &UnitSections::default()).unwrap();
        assert_eq!(header.line_range, 1);
        // the program must still run without dividing by zero
        let all: Vec<_> = LineProgram::new(header, reader)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
