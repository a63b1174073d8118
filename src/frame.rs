//! Call Frame Information: CIE/FDE records from ".debug_frame" or
//! ".eh_frame" and the instruction interpreter that turns them into
//! per-program-counter register recovery rules.
use crate::{
    error::{Error, Result},
    reader::{Cursor, Reader},
};
use rangemap::RangeMap;
use std::collections::HashMap;
use std::sync::Arc;

// DW_EH_PE pointer encodings (low nibble = format, high bits = application).
const EH_PE_ABSPTR: u8 = 0x00;
const EH_PE_ULEB128: u8 = 0x01;
const EH_PE_UDATA2: u8 = 0x02;
const EH_PE_UDATA4: u8 = 0x03;
const EH_PE_UDATA8: u8 = 0x04;
const EH_PE_SLEB128: u8 = 0x09;
const EH_PE_SDATA2: u8 = 0x0a;
const EH_PE_SDATA4: u8 = 0x0b;
const EH_PE_SDATA8: u8 = 0x0c;
const EH_PE_PCREL: u8 = 0x10;
const EH_PE_ALIGNED: u8 = 0x50;
const EH_PE_INDIRECT: u8 = 0x80;
const EH_PE_OMIT: u8 = 0xff;

/// Register numbers are ULEB-encoded and attacker controlled; the rule table
/// is dense, so growth is capped rather than letting a bogus number allocate
/// gigabytes.
const MAX_REGISTERS: usize = 1024;

/// Which flavor of frame section is being decoded. The two differ in how an
/// FDE names its CIE and in the CIE-id sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    DebugFrame,
    EhFrame,
}

/// How a register's value in the caller is recovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterRule<'a> {
    Undefined,
    SameValue,
    /// Saved at CFA + offset (already factored by data_alignment_factor).
    OffsetFromCfa(i64),
    /// The value itself is CFA + offset, not a saved-at location.
    ValOffset(i64),
    InRegister(u64),
    Expression(&'a [u8]),
    ValExpression(&'a [u8]),
}

/// How the canonical frame address is computed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfaRule<'a> {
    Unset,
    RegisterOffset { register: u64, offset: i64 },
    Expression(&'a [u8]),
}

/// The rule table in effect over one pc range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleRow<'a> {
    pub cfa: CfaRule<'a>,
    /// Dense, indexed by register number; sized up front by a scan pass.
    pub registers: Vec<RegisterRule<'a>>,
    /// DW_CFA_GNU_args_size: bytes of outgoing arguments below the CFA.
    pub args_size: u64,
}

impl<'a> RuleRow<'a> {
    fn sized(register_count: usize) -> Self {
        RuleRow {
            cfa: CfaRule::Unset,
            registers: vec![RegisterRule::Undefined; register_count],
            args_size: 0,
        }
    }

    pub fn register(&self, number: u64) -> &RegisterRule<'a> {
        self.registers
            .get(number as usize)
            .unwrap_or(&RegisterRule::Undefined)
    }

    fn set(&mut self, number: u64, rule: RegisterRule<'a>) {
        // pass 1 sized the table; anything outside it was over the cap
        if let Some(slot) = self.registers.get_mut(number as usize) {
            *slot = rule;
        } else {
            tracing::warn!(register = number, "register number exceeds rule table");
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cie<'a> {
    pub offset: usize,
    pub version: u8,
    pub augmentation: &'a [u8],
    pub address_size: u8,
    pub segment_size: u8,
    pub code_alignment_factor: u64,
    pub data_alignment_factor: i64,
    pub return_address_register: u64,
    /// DW_EH_PE encoding for FDE addresses, from a 'z' augmentation's 'R'.
    pub fde_encoding: u8,
    pub lsda_encoding: Option<u8>,
    pub personality: Option<u64>,
    /// 'S': this frame is a signal trampoline.
    pub signal_frame: bool,
    /// Initial instruction range within the section.
    instructions: (usize, usize),
}

#[derive(Clone, Debug)]
pub struct Fde<'a> {
    pub offset: usize,
    pub cie: Arc<Cie<'a>>,
    pub pc_begin: u64,
    pub pc_range: u64,
    pub lsda: Option<u64>,
    instructions: (usize, usize),
}

#[derive(Clone, Debug)]
pub enum FrameEntry<'a> {
    Cie(Arc<Cie<'a>>),
    Fde(Fde<'a>),
}

/// One frame section plus the context needed to decode pointer encodings.
pub struct FrameSection<'a> {
    reader: Reader<'a>,
    kind: FrameKind,
    /// Load address of the section, for pc-relative encodings.
    base_address: u64,
    address_size: u8,
}

impl<'a> FrameSection<'a> {
    pub fn new(reader: Reader<'a>, kind: FrameKind, base_address: u64, address_size: u8) -> Self {
        FrameSection {
            reader,
            kind,
            base_address,
            address_size,
        }
    }

    pub fn entries(&self) -> FrameEntryIter<'a, '_> {
        FrameEntryIter {
            section: self,
            offset: 0,
            cies: HashMap::new(),
            done: false,
        }
    }

    fn cie_id_sentinel(&self, is_64bit: bool) -> u64 {
        match self.kind {
            FrameKind::DebugFrame => {
                if is_64bit {
                    u64::MAX
                } else {
                    u32::MAX as u64
                }
            }
            FrameKind::EhFrame => 0,
        }
    }

    fn parse_cie(&self, cursor: &mut Cursor<'a>, offset: usize, end: usize) -> Result<Cie<'a>> {
        let version = cursor.read_byte()?;
        if !matches!(version, 1 | 3 | 4) {
            return Err(Error::UnsupportedVersion(version as u16));
        }
        let augmentation = cursor.read_cstr()?;

        let (address_size, segment_size) = if version >= 4 {
            (cursor.read_byte()?, cursor.read_byte()?)
        } else {
            (self.address_size, 0)
        };

        // gcc 2.x "eh" augmentation: an extra pointer right after the string
        if augmentation.starts_with(b"eh") {
            cursor.skip(address_size as usize)?;
        }

        let code_alignment_factor = cursor.read_uleb128()?;
        let data_alignment_factor = cursor.read_sleb128()?;
        let return_address_register = if version == 1 {
            cursor.read_byte()? as u64
        } else {
            cursor.read_uleb128()?
        };

        let mut fde_encoding = EH_PE_ABSPTR;
        let mut lsda_encoding = None;
        let mut personality = None;
        let mut signal_frame = false;

        if augmentation.first() == Some(&b'z') {
            let data_len = cursor.read_uleb128()? as usize;
            let data_end = cursor.offset.saturating_add(data_len).min(end);
            let mut data = Cursor::with_end(cursor.reader, cursor.offset, data_end);
            for &letter in &augmentation[1..] {
                match letter {
                    b'L' => lsda_encoding = Some(data.read_byte()?),
                    b'P' => {
                        let encoding = data.read_byte()?;
                        personality = self.read_encoded(&mut data, encoding, address_size)?;
                    }
                    b'R' => fde_encoding = data.read_byte()?,
                    b'S' => signal_frame = true,
                    _ => {
                        // unknown letter: the rest of the data block can't
                        // be interpreted, but its length is known
                        tracing::warn!(letter, offset, "unknown augmentation letter");
                        break;
                    }
                }
            }
            cursor.offset = data_end;
        } else if !augmentation.is_empty() && !augmentation.starts_with(b"eh") {
            // without a 'z' there is no length prefix, so an unknown
            // augmentation leaves the initial instructions unlocatable
            tracing::warn!(offset, "unknown augmentation without a length");
        }

        Ok(Cie {
            offset,
            version,
            augmentation,
            address_size,
            segment_size,
            code_alignment_factor,
            data_alignment_factor,
            return_address_register,
            fde_encoding,
            lsda_encoding,
            personality,
            signal_frame,
            instructions: (cursor.offset.min(end), end),
        })
    }

    fn parse_fde(
        &self,
        cursor: &mut Cursor<'a>,
        offset: usize,
        end: usize,
        cie: Arc<Cie<'a>>,
    ) -> Result<Fde<'a>> {
        if cie.segment_size > 0 {
            cursor.skip(cie.segment_size as usize)?;
        }
        let pc_begin = self
            .read_encoded(cursor, cie.fde_encoding, cie.address_size)?
            .unwrap_or(0);
        // pc_range uses the format half of the encoding but is never
        // pc-relative
        let pc_range = self
            .read_encoded(cursor, cie.fde_encoding & 0x0f, cie.address_size)?
            .unwrap_or(0);

        let mut lsda = None;
        if cie.augmentation.first() == Some(&b'z') {
            let data_len = cursor.read_uleb128()? as usize;
            let data_end = cursor.offset.saturating_add(data_len).min(end);
            if let Some(encoding) = cie.lsda_encoding {
                let mut data = Cursor::with_end(cursor.reader, cursor.offset, data_end);
                lsda = self.read_encoded(&mut data, encoding, cie.address_size)?;
            }
            cursor.offset = data_end;
        }

        Ok(Fde {
            offset,
            cie,
            pc_begin,
            pc_range,
            lsda,
            instructions: (cursor.offset.min(end), end),
        })
    }

    /// Read one DW_EH_PE-encoded pointer. Returns None for the omit
    /// encoding. Unsupported applications (textrel, datarel, funcrel,
    /// indirect) leave the raw value with a warning since resolving them
    /// needs linker or target-memory context.
    fn read_encoded(
        &self,
        cursor: &mut Cursor<'a>,
        encoding: u8,
        address_size: u8,
    ) -> Result<Option<u64>> {
        if encoding == EH_PE_OMIT {
            return Ok(None);
        }

        if encoding & 0x70 == EH_PE_ALIGNED {
            let align = address_size.max(1) as usize;
            let misaligned = cursor.offset % align;
            if misaligned != 0 {
                cursor.skip(align - misaligned)?;
            }
        }

        let field_offset = cursor.offset;
        let value = match encoding & 0x0f {
            EH_PE_ABSPTR => cursor.read_uint(address_size as usize)?,
            EH_PE_ULEB128 => cursor.read_uleb128()?,
            EH_PE_UDATA2 => cursor.read_half()? as u64,
            EH_PE_UDATA4 => cursor.read_word()? as u64,
            EH_PE_UDATA8 => cursor.read_xword()?,
            EH_PE_SLEB128 => cursor.read_sleb128()? as u64,
            EH_PE_SDATA2 => cursor.read_sint(2)? as u64,
            EH_PE_SDATA4 => cursor.read_sint(4)? as u64,
            EH_PE_SDATA8 => cursor.read_sint(8)? as u64,
            other => {
                return Err(Error::MalformedHeader(format!(
                    "bad pointer encoding {other:#x}"
                )));
            }
        };

        let value = match encoding & 0x70 {
            0x00 | EH_PE_ALIGNED => value,
            EH_PE_PCREL => self
                .base_address
                .wrapping_add(field_offset as u64)
                .wrapping_add(value),
            other => {
                tracing::warn!(application = other, "unsupported pointer application");
                value
            }
        };
        if encoding & EH_PE_INDIRECT != 0 {
            tracing::warn!("indirect pointer encoding left unresolved");
        }
        Ok(Some(value))
    }
}

/// Walks a frame section record by record, remembering CIEs so FDE
/// references resolve without rescanning.
pub struct FrameEntryIter<'a, 's> {
    section: &'s FrameSection<'a>,
    offset: usize,
    cies: HashMap<usize, Arc<Cie<'a>>>,
    done: bool,
}

impl<'a> FrameEntryIter<'a, '_> {
    fn parse_next(&mut self) -> Result<Option<FrameEntry<'a>>> {
        let reader = self.section.reader;
        loop {
            if self.offset >= reader.len() {
                return Ok(None);
            }
            let record_offset = self.offset;
            let mut cursor = Cursor::new(reader, record_offset);
            let (length, is_64bit) = cursor.read_initial_length()?;
            if length == 0 {
                // .eh_frame terminator
                return Ok(None);
            }

            let mut end = cursor.offset.saturating_add(length as usize);
            if end > reader.len() {
                tracing::warn!(offset = record_offset, length, "record overruns section");
                end = reader.len();
            }
            self.offset = end;
            cursor.end = end;

            let id_offset = cursor.offset;
            let id = cursor.read_offset(is_64bit)?;

            if id == self.section.cie_id_sentinel(is_64bit) {
                let cie = Arc::new(self.section.parse_cie(&mut cursor, record_offset, end)?);
                self.cies.insert(record_offset, cie.clone());
                return Ok(Some(FrameEntry::Cie(cie)));
            }

            // .debug_frame stores an absolute section offset; .eh_frame a
            // distance back from the id field itself
            let cie_offset = match self.section.kind {
                FrameKind::DebugFrame => id as usize,
                FrameKind::EhFrame => match id_offset.checked_sub(id as usize) {
                    Some(offset) => offset,
                    None => {
                        tracing::warn!(offset = record_offset, id, "CIE pointer underflows");
                        continue;
                    }
                },
            };

            let Some(cie) = self.cies.get(&cie_offset).cloned() else {
                // forward references are not a thing; treat as garbage and
                // resynchronize at the next record
                tracing::warn!(offset = record_offset, cie_offset, "FDE references unseen CIE");
                continue;
            };

            let fde = self
                .section
                .parse_fde(&mut cursor, record_offset, end, cie)?;
            return Ok(Some(FrameEntry::Fde(fde)));
        }
    }
}

impl<'a> Iterator for FrameEntryIter<'a, '_> {
    type Item = Result<FrameEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
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

/// One decoded call-frame instruction. Factored offsets have already been
/// multiplied by the CIE's alignment factors.
#[derive(Clone, Debug, PartialEq, Eq)]
enum CfiInstruction<'a> {
    AdvanceLoc(u64),
    SetLoc(u64),
    Offset { register: u64, offset: i64 },
    ValOffset { register: u64, offset: i64 },
    Register { register: u64, from: u64 },
    Undefined(u64),
    SameValue(u64),
    Restore(u64),
    RememberState,
    RestoreState,
    DefCfa { register: u64, offset: i64 },
    DefCfaRegister(u64),
    DefCfaOffset(i64),
    DefCfaExpression(&'a [u8]),
    Expression { register: u64, expr: &'a [u8] },
    ValExpression { register: u64, expr: &'a [u8] },
    ArgsSize(u64),
    WindowSave,
    Nop,
}

/// Decode one instruction. `Ok(None)` means an opcode whose operand size is
/// unknowable: the caller must jump to the record's end.
fn decode_cfi<'a>(
    cursor: &mut Cursor<'a>,
    section: &FrameSection<'a>,
    cie: &Cie<'a>,
) -> Result<Option<CfiInstruction<'a>>> {
    use CfiInstruction::*;

    let code_align = cie.code_alignment_factor;
    let data_align = cie.data_alignment_factor;
    let opcode = cursor.read_byte()?;

    // the top two bits select the three packed-operand forms
    let instruction = match opcode >> 6 {
        1 => AdvanceLoc(((opcode & 0x3f) as u64).wrapping_mul(code_align)),
        2 => {
            let offset = cursor.read_uleb128()? as i64;
            Offset {
                register: (opcode & 0x3f) as u64,
                offset: offset.wrapping_mul(data_align),
            }
        }
        3 => Restore((opcode & 0x3f) as u64),
        _ => match opcode {
            0x00 => Nop,
            0x01 => {
                let address = section
                    .read_encoded(cursor, cie.fde_encoding, cie.address_size)?
                    .unwrap_or(0);
                SetLoc(address)
            }
            0x02 => AdvanceLoc((cursor.read_byte()? as u64).wrapping_mul(code_align)),
            0x03 => AdvanceLoc((cursor.read_half()? as u64).wrapping_mul(code_align)),
            0x04 => AdvanceLoc((cursor.read_word()? as u64).wrapping_mul(code_align)),
            0x05 => {
                let register = cursor.read_uleb128()?;
                let offset = cursor.read_uleb128()? as i64;
                Offset {
                    register,
                    offset: offset.wrapping_mul(data_align),
                }
            }
            0x06 => Restore(cursor.read_uleb128()?),
            0x07 => Undefined(cursor.read_uleb128()?),
            0x08 => SameValue(cursor.read_uleb128()?),
            0x09 => {
                let register = cursor.read_uleb128()?;
                let from = cursor.read_uleb128()?;
                Register { register, from }
            }
            0x0a => RememberState,
            0x0b => RestoreState,
            0x0c => {
                let register = cursor.read_uleb128()?;
                let offset = cursor.read_uleb128()? as i64;
                DefCfa { register, offset }
            }
            0x0d => DefCfaRegister(cursor.read_uleb128()?),
            0x0e => DefCfaOffset(cursor.read_uleb128()? as i64),
            0x0f => {
                let len = cursor.read_uleb128()? as usize;
                DefCfaExpression(cursor.read_slice(len.min(cursor.remaining()))?)
            }
            0x10 => {
                let register = cursor.read_uleb128()?;
                let len = cursor.read_uleb128()? as usize;
                Expression {
                    register,
                    expr: cursor.read_slice(len.min(cursor.remaining()))?,
                }
            }
            0x11 => {
                let register = cursor.read_uleb128()?;
                let factor = cursor.read_sleb128()?;
                Offset {
                    register,
                    offset: factor.wrapping_mul(data_align),
                }
            }
            0x12 => {
                let register = cursor.read_uleb128()?;
                let factor = cursor.read_sleb128()?;
                DefCfa {
                    register,
                    offset: factor.wrapping_mul(data_align),
                }
            }
            0x13 => DefCfaOffset(cursor.read_sleb128()?.wrapping_mul(data_align)),
            0x14 => {
                let register = cursor.read_uleb128()?;
                let offset = cursor.read_uleb128()? as i64;
                ValOffset {
                    register,
                    offset: offset.wrapping_mul(data_align),
                }
            }
            0x15 => {
                let register = cursor.read_uleb128()?;
                let factor = cursor.read_sleb128()?;
                ValOffset {
                    register,
                    offset: factor.wrapping_mul(data_align),
                }
            }
            0x16 => {
                let register = cursor.read_uleb128()?;
                let len = cursor.read_uleb128()? as usize;
                ValExpression {
                    register,
                    expr: cursor.read_slice(len.min(cursor.remaining()))?,
                }
            }
            0x1d => {
                // DW_CFA_MIPS_advance_loc8
                AdvanceLoc(cursor.read_xword()?.wrapping_mul(code_align))
            }
            0x2d => WindowSave, // DW_CFA_GNU_window_save
            0x2e => ArgsSize(cursor.read_uleb128()?),
            0x2f => {
                // DW_CFA_GNU_negative_offset_extended
                let register = cursor.read_uleb128()?;
                let offset = cursor.read_uleb128()? as i64;
                Offset {
                    register,
                    offset: offset.wrapping_neg().wrapping_mul(data_align),
                }
            }
            _ => {
                // operand size unknowable; everything after this byte is
                // untrustworthy
                tracing::warn!(opcode, offset = cursor.offset - 1, "unknown CFI opcode");
                return Ok(None);
            }
        },
    };
    Ok(Some(instruction))
}

/// Registers an instruction mentions, for the sizing pass.
fn referenced_registers(instruction: &CfiInstruction<'_>) -> [Option<u64>; 2] {
    use CfiInstruction::*;
    match *instruction {
        Offset { register, .. }
        | ValOffset { register, .. }
        | Undefined(register)
        | SameValue(register)
        | Restore(register)
        | DefCfa { register, .. }
        | DefCfaRegister(register)
        | Expression { register, .. }
        | ValExpression { register, .. } => [Some(register), None],
        Register { register, from } => [Some(register), Some(from)],
        _ => [None, None],
    }
}

/// The unwind rules for one FDE: a map from pc range to the rule row in
/// effect over it.
pub type UnwindTable<'a> = RangeMap<u64, RuleRow<'a>>;

/// Interpret an FDE against its CIE. Pass 1 scans both instruction streams
/// for the highest register referenced so the dense rule table can be sized
/// once; pass 2 applies effects and emits a row per location advance.
pub fn unwind_fde<'a>(section: &FrameSection<'a>, fde: &Fde<'a>) -> Result<UnwindTable<'a>> {
    let cie = &fde.cie;
    let reader = section.reader;

    let mut max_register = cie.return_address_register.min(MAX_REGISTERS as u64 - 1);
    for range in [cie.instructions, fde.instructions] {
        let mut cursor = Cursor::with_end(reader, range.0, range.1);
        while !cursor.at_end() {
            match decode_cfi(&mut cursor, section, cie)? {
                Some(instruction) => {
                    for register in referenced_registers(&instruction).into_iter().flatten() {
                        if register as usize >= MAX_REGISTERS {
                            tracing::warn!(register, "register number over the table cap");
                        } else {
                            max_register = max_register.max(register);
                        }
                    }
                }
                None => break,
            }
        }
    }
    let register_count = max_register as usize + 1;

    // the CIE's initial instructions establish the row every FDE starts from
    let mut initial = RuleRow::sized(register_count);
    let mut interp = Interpreter {
        row: &mut initial,
        initial: None,
        stack: Vec::new(),
        loc: fde.pc_begin,
    };
    let mut cursor = Cursor::with_end(reader, cie.instructions.0, cie.instructions.1);
    while !cursor.at_end() {
        match decode_cfi(&mut cursor, section, cie)? {
            Some(instruction) => {
                // location advances inside a CIE are meaningless; apply
                // everything else
                interp.apply(&instruction);
            }
            None => break,
        }
    }

    let initial = initial;
    let mut row = initial.clone();
    let mut table = RangeMap::new();
    let fde_end = fde.pc_begin.wrapping_add(fde.pc_range);
    let mut interp = Interpreter {
        row: &mut row,
        initial: Some(&initial),
        stack: Vec::new(),
        loc: fde.pc_begin,
    };

    let mut cursor = Cursor::with_end(reader, fde.instructions.0, fde.instructions.1);
    while !cursor.at_end() {
        let instruction = match decode_cfi(&mut cursor, section, cie)? {
            Some(instruction) => instruction,
            None => break,
        };
        let previous_loc = interp.loc;
        if interp.apply(&instruction) {
            // location moved: the old row covered [previous_loc, new loc)
            if previous_loc < interp.loc {
                table.insert(previous_loc..interp.loc, interp.row.clone());
            }
        }
    }
    let final_loc = interp.loc;
    if final_loc < fde_end {
        table.insert(final_loc..fde_end, row);
    }
    Ok(table)
}

/// Mutable interpreter state shared by the CIE-initial and FDE passes.
struct Interpreter<'a, 'r> {
    row: &'r mut RuleRow<'a>,
    /// The CIE's finished initial row; None while building it.
    initial: Option<&'r RuleRow<'a>>,
    stack: Vec<RuleRow<'a>>,
    loc: u64,
}

impl<'a> Interpreter<'a, '_> {
    /// Apply one instruction; returns true when the location advanced.
    fn apply(&mut self, instruction: &CfiInstruction<'a>) -> bool {
        use CfiInstruction::*;
        match *instruction {
            AdvanceLoc(delta) => {
                self.loc = self.loc.wrapping_add(delta);
                return true;
            }
            SetLoc(address) => {
                if address < self.loc {
                    tracing::warn!(address, loc = self.loc, "set_loc moves backwards");
                }
                self.loc = address;
                return true;
            }
            Offset { register, offset } => {
                self.row.set(register, RegisterRule::OffsetFromCfa(offset));
            }
            ValOffset { register, offset } => {
                self.row.set(register, RegisterRule::ValOffset(offset));
            }
            Register { register, from } => {
                self.row.set(register, RegisterRule::InRegister(from));
            }
            Undefined(register) => self.row.set(register, RegisterRule::Undefined),
            SameValue(register) => self.row.set(register, RegisterRule::SameValue),
            Restore(register) => {
                let rule = match self.initial {
                    Some(initial) => initial.register(register).clone(),
                    None => {
                        // restore inside a CIE's own initial instructions
                        tracing::warn!(register, "restore with no initial state");
                        RegisterRule::Undefined
                    }
                };
                self.row.set(register, rule);
            }
            RememberState => self.stack.push(self.row.clone()),
            RestoreState => match self.stack.pop() {
                Some(saved) => *self.row = saved,
                None => {
                    tracing::warn!(loc = self.loc, "restore_state with empty stack");
                }
            },
            DefCfa { register, offset } => {
                self.row.cfa = CfaRule::RegisterOffset { register, offset };
            }
            DefCfaRegister(register) => {
                let offset = match self.row.cfa {
                    CfaRule::RegisterOffset { offset, .. } => offset,
                    _ => 0,
                };
                self.row.cfa = CfaRule::RegisterOffset { register, offset };
            }
            DefCfaOffset(offset) => {
                let register = match self.row.cfa {
                    CfaRule::RegisterOffset { register, .. } => register,
                    _ => {
                        tracing::warn!(loc = self.loc, "def_cfa_offset with no CFA register");
                        0
                    }
                };
                self.row.cfa = CfaRule::RegisterOffset { register, offset };
            }
            DefCfaExpression(expr) => self.row.cfa = CfaRule::Expression(expr),
            Expression { register, expr } => {
                self.row.set(register, RegisterRule::Expression(expr));
            }
            ValExpression { register, expr } => {
                self.row.set(register, RegisterRule::ValExpression(expr));
            }
            ArgsSize(size) => self.row.args_size = size,
            WindowSave => {
                // SPARC register-window shuffle; it names no registers so
                // there is nothing to record in the table
                tracing::debug!(loc = self.loc, "GNU_window_save");
            }
            Nop => {}
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{encode_sleb128, encode_uleb128};

    /// A .debug_frame CIE: version 1, empty augmentation, code align 1,
    /// the given data alignment, return register 16.
    fn debug_frame_cie(data_align: i64, instructions: &[u8]) -> Vec<u8> {
        let mut body = vec![0xff, 0xff, 0xff, 0xff]; // CIE id sentinel
        body.push(1); // version
        body.push(0); // augmentation ""
        body.extend_from_slice(&encode_uleb128(1));
        body.extend_from_slice(&encode_sleb128(data_align));
        body.push(16); // return address register
        body.extend_from_slice(instructions);

        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn debug_frame_fde(
        cie_offset: u32,
        pc_begin: u64,
        pc_range: u64,
        instructions: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&cie_offset.to_le_bytes());
        body.extend_from_slice(&pc_begin.to_le_bytes());
        body.extend_from_slice(&pc_range.to_le_bytes());
        body.extend_from_slice(instructions);

        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn section(bytes: &[u8], kind: FrameKind) -> FrameSection<'_> {
        FrameSection::new(Reader::new(bytes, true), kind, 0, 8)
    }

    fn first_fde<'a>(section: &FrameSection<'a>) -> Fde<'a> {
        section
            .entries()
            .filter_map(|entry| match entry.unwrap() {
                FrameEntry::Fde(fde) => Some(fde),
                FrameEntry::Cie(_) => None,
            })
            .next()
            .unwrap()
    }

    #[test]
    fn cie_fields_parse() {
        let bytes = debug_frame_cie(-4, &[]);
        let section = section(&bytes, FrameKind::DebugFrame);
        let entries: Vec<_> = section.entries().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(entries.len(), 1);
        let FrameEntry::Cie(cie) = &entries[0] else {
            panic!("expected a CIE");
        };
        assert_eq!(cie.version, 1);
        assert_eq!(cie.code_alignment_factor, 1);
        assert_eq!(cie.data_alignment_factor, -4);
        assert_eq!(cie.return_address_register, 16);
        assert!(!cie.signal_frame);
    }

    #[test]
    fn signed_extended_offset_is_factored() {
        // offset_extended_sf(reg 6, factor 2) with data align -4 puts the
        // register at CFA - 8
        let mut program = vec![0x0c]; // def_cfa r7, 8
        program.extend_from_slice(&encode_uleb128(7));
        program.extend_from_slice(&encode_uleb128(8));
        program.push(0x11); // offset_extended_sf
        program.extend_from_slice(&encode_uleb128(6));
        program.extend_from_slice(&encode_sleb128(2));

        let mut bytes = debug_frame_cie(-4, &[]);
        bytes.extend_from_slice(&debug_frame_fde(0, 0x1000, 0x40, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        let table = unwind_fde(&section, &fde).unwrap();

        let row = table.get(&0x1000).unwrap();
        assert_eq!(*row.register(6), RegisterRule::OffsetFromCfa(-8));
        assert_eq!(
            row.cfa,
            CfaRule::RegisterOffset {
                register: 7,
                offset: 8
            }
        );
    }

    #[test]
    fn packed_opcodes_and_advances() {
        // DW_CFA_offset r5 at offset 1, advance 0x10, restore r5
        let mut program = vec![0x85]; // offset | r5
        program.extend_from_slice(&encode_uleb128(1));
        program.push(0x41 + 0x0f); // advance_loc 0x10
        program.push(0xc5); // restore | r5

        // the CIE makes r5 same_value initially
        let mut cie_instructions = vec![0x08];
        cie_instructions.extend_from_slice(&encode_uleb128(5));

        let mut bytes = debug_frame_cie(-8, &cie_instructions);
        bytes.extend_from_slice(&debug_frame_fde(0, 0x2000, 0x20, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        let table = unwind_fde(&section, &fde).unwrap();

        // before the advance: r5 saved at CFA - 8 (1 * -8)
        assert_eq!(
            *table.get(&0x2000).unwrap().register(5),
            RegisterRule::OffsetFromCfa(-8)
        );
        // after the restore: back to the CIE's same_value
        assert_eq!(
            *table.get(&0x2010).unwrap().register(5),
            RegisterRule::SameValue
        );
    }

    #[test]
    fn huge_code_alignment_wraps_instead_of_overflowing() {
        // code align u64::MAX times any advance must not trip an overflow
        let mut cie_body = vec![0xff, 0xff, 0xff, 0xff]; // CIE id sentinel
        cie_body.push(1); // version
        cie_body.push(0); // augmentation ""
        cie_body.extend_from_slice(&encode_uleb128(u64::MAX));
        cie_body.extend_from_slice(&encode_sleb128(-8));
        cie_body.push(16); // return address register

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(cie_body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&cie_body);

        let program = [
            0x02, 2, // advance_loc1 2
            0x41, // packed advance_loc 1
        ];
        bytes.extend_from_slice(&debug_frame_fde(0, 0x1000, 0x40, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        assert!(unwind_fde(&section, &fde).is_ok());
    }

    #[test]
    fn remember_restore_round_trips() {
        let mut program = vec![0x0c]; // def_cfa r7, 16
        program.extend_from_slice(&encode_uleb128(7));
        program.extend_from_slice(&encode_uleb128(16));
        program.push(0x0a); // remember_state
        program.push(0x0a); // remember_state
        program.push(0x0e); // def_cfa_offset 64
        program.extend_from_slice(&encode_uleb128(64));
        program.push(0x0b); // restore_state
        program.push(0x0b); // restore_state

        let mut bytes = debug_frame_cie(-8, &[]);
        bytes.extend_from_slice(&debug_frame_fde(0, 0, 0x10, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        let table = unwind_fde(&section, &fde).unwrap();

        assert_eq!(
            table.get(&0).unwrap().cfa,
            CfaRule::RegisterOffset {
                register: 7,
                offset: 16
            }
        );
    }

    #[test]
    fn restore_state_underflow_is_tolerated() {
        let program = vec![0x0b]; // restore_state with nothing remembered

        let mut bytes = debug_frame_cie(-8, &[]);
        bytes.extend_from_slice(&debug_frame_fde(0, 0, 0x10, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        assert!(unwind_fde(&section, &fde).is_ok());
    }

    #[test]
    fn unknown_opcode_stops_the_record() {
        let mut program = vec![0x0c]; // def_cfa r7, 8
        program.extend_from_slice(&encode_uleb128(7));
        program.extend_from_slice(&encode_uleb128(8));
        program.push(0x3f); // reserved opcode, operands unknowable
        program.push(0x0e); // would-be def_cfa_offset, must not be applied
        program.extend_from_slice(&encode_uleb128(64));

        let mut bytes = debug_frame_cie(-8, &[]);
        bytes.extend_from_slice(&debug_frame_fde(0, 0, 0x10, &program));

        let section = section(&bytes, FrameKind::DebugFrame);
        let fde = first_fde(&section);
        let table = unwind_fde(&section, &fde).unwrap();
        assert_eq!(
            table.get(&0).unwrap().cfa,
            CfaRule::RegisterOffset {
                register: 7,
                offset: 8
            }
        );
    }

    #[test]
    fn eh_frame_cie_reference_and_augmentation() {
        // CIE with "zR" augmentation selecting udata4 FDE addresses
        let mut cie_body = vec![0, 0, 0, 0]; // eh_frame CIE id
        cie_body.push(1); // version
        cie_body.extend_from_slice(b"zR\0");
        cie_body.extend_from_slice(&encode_uleb128(1)); // code align
        cie_body.extend_from_slice(&encode_sleb128(-8)); // data align
        cie_body.push(16); // return address register
        cie_body.extend_from_slice(&encode_uleb128(1)); // aug data length
        cie_body.push(EH_PE_UDATA4); // 'R'

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(cie_body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&cie_body);

        let fde_offset = bytes.len();
        let mut fde_body = Vec::new();
        // CIE pointer: distance back from this field to the CIE start
        fde_body.extend_from_slice(&((fde_offset + 4) as u32).to_le_bytes());
        fde_body.extend_from_slice(&0x5000u32.to_le_bytes()); // pc_begin
        fde_body.extend_from_slice(&0x100u32.to_le_bytes()); // pc_range
        fde_body.extend_from_slice(&encode_uleb128(0)); // aug data length
        bytes.extend_from_slice(&(fde_body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&fde_body);
        bytes.extend_from_slice(&[0, 0, 0, 0]); // terminator

        let section = section(&bytes, FrameKind::EhFrame);
        let entries: Vec<_> = section.entries().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(entries.len(), 2);
        let FrameEntry::Fde(fde) = &entries[1] else {
            panic!("expected an FDE");
        };
        assert_eq!(fde.pc_begin, 0x5000);
        assert_eq!(fde.pc_range, 0x100);
        assert_eq!(fde.cie.fde_encoding, EH_PE_UDATA4);
    }

    #[test]
    fn pcrel_pointer_encoding() {
        let bytes = 0x40u32.to_le_bytes();
        let section = FrameSection::new(
            Reader::new(&bytes, true),
            FrameKind::EhFrame,
            0x1_0000,
            8,
        );
        let mut cursor = Cursor::new(section.reader, 0);
        let value = section
            .read_encoded(&mut cursor, EH_PE_PCREL | EH_PE_SDATA4, 8)
            .unwrap();
        assert_eq!(value, Some(0x1_0040));
    }

    #[test]
    fn truncated_prefixes_never_panic() {
        let mut program = vec![0x0c];
        program.extend_from_slice(&encode_uleb128(7));
        program.extend_from_slice(&encode_uleb128(8));
        let mut bytes = debug_frame_cie(-4, &[]);
        bytes.extend_from_slice(&debug_frame_fde(0, 0x1000, 0x40, &program));

        for len in 0..bytes.len() {
            let section = FrameSection::new(
                Reader::new(&bytes[..len], true),
                FrameKind::DebugFrame,
                0,
                8,
            );
            for entry in section.entries() {
                match entry {
                    Ok(FrameEntry::Fde(fde)) => {
                        let _ = unwind_fde(&section, &fde);
                    }
                    Ok(FrameEntry::Cie(_)) => {}
                    Err(_) => break,
                }
            }
        }
    }
}
