//! Decoding of attribute values. Given the form from the abbreviation and a
//! cursor sitting on the value, consume exactly the right number of bytes
//! and produce a typed value. Getting the byte count wrong for even one form
//! desynchronizes every later attribute in the unit, which is why each form
//! has its own fixture test below.
use crate::{
    error::{Error, Result},
    info::FormEncoding,
    reader::Cursor,
    section::UnitSections,
};

/// How deep DW_FORM_indirect may chain before we call it corrupt. Real
/// producers emit at most one level.
const MAX_INDIRECT: u32 = 8;

/// Everything the form decoder needs to know about the enclosing unit.
#[derive(Clone, Copy)]
pub struct UnitContext<'a> {
    pub version: u16,
    pub address_size: u8,
    pub is_64bit: bool,
    pub little_endian: bool,

    /// Offset of the unit header within .debug_info; unit-relative
    /// references (ref1..ref_udata) are resolved against this.
    pub unit_offset: usize,

    pub sections: UnitSections<'a>,

    /// Base into .debug_str_offsets for strx forms. For version 5 this comes
    /// from DW_AT_str_offsets_base on the root DIE (with the post-header
    /// default until that attribute has been seen); for split-DWARF GNU
    /// units it is the package file's contribution base.
    pub str_offsets_base: u64,

    /// Base into .debug_addr for addrx forms (DW_AT_addr_base /
    /// DW_AT_GNU_addr_base on the root DIE).
    pub addr_base: u64,

    /// Bases into .debug_loclists/.debug_rnglists that DW_FORM_loclistx and
    /// DW_FORM_rnglistx offsets are relative to (root DIE attributes).
    pub loclists_base: u64,
    pub rnglists_base: u64,

    /// DW_AT_low_pc of the root DIE: the default base address for the
    /// unit's location and range lists.
    pub low_pc: u64,
}

impl<'a> UnitContext<'a> {
    pub fn offset_size(&self) -> usize {
        if self.is_64bit { 8 } else { 4 }
    }
}

/// A decoded attribute value. String-ish and block-ish values borrow from
/// the section buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrValue<'a> {
    /// A relocated address (DW_FORM_addr, or a resolved addrx form).
    Addr(u64),
    UInt(u64),
    SInt(i64),
    /// Raw constant bytes (DW_FORM_data16, block forms used as constants).
    Bytes(&'a [u8]),
    /// A string, either inline or successfully resolved through a string
    /// section. Raw bytes: old producers emit non-UTF-8 paths.
    Str(&'a [u8]),
    /// A string-section offset we could not resolve, e.g. it pointed past
    /// the end of .debug_str or the section wasn't supplied.
    StrRef(u64),
    /// An unresolved .debug_addr index (section missing or too short).
    AddrIndex(u64),
    SecOffset(u64),
    ExprLoc(&'a [u8]),
    Flag(bool),
    /// A DIE reference, already made absolute within .debug_info.
    Ref(u64),
    /// A type-unit signature reference (DW_FORM_ref_sig8).
    RefSig8(u64),
    /// A reference into a supplementary (dwz) file.
    SupRef(u64),
}

impl<'a> AttrValue<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            AttrValue::Str(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match *self {
            AttrValue::UInt(v) | AttrValue::SecOffset(v) | AttrValue::Addr(v) => Some(v),
            AttrValue::SInt(v) => Some(v as u64),
            AttrValue::Flag(true) => Some(1),
            AttrValue::Flag(false) => Some(0),
            _ => None,
        }
    }
}

/// Decode one attribute value. The cursor ends up exactly past the value.
pub fn decode_value<'a>(
    cursor: &mut Cursor<'a>,
    encoding: FormEncoding,
    implicit_const: Option<i64>,
    ctx: &UnitContext<'a>,
) -> Result<AttrValue<'a>> {
    decode_value_depth(cursor, encoding, implicit_const, ctx, 0)
}

fn decode_value_depth<'a>(
    cursor: &mut Cursor<'a>,
    encoding: FormEncoding,
    implicit_const: Option<i64>,
    ctx: &UnitContext<'a>,
    depth: u32,
) -> Result<AttrValue<'a>> {
    use FormEncoding::*;

    let value = match encoding {
        DW_FORM_addr => AttrValue::Addr(cursor.read_uint(ctx.address_size as usize)?),

        DW_FORM_data1 => AttrValue::UInt(cursor.read_byte()? as u64),
        DW_FORM_data2 => AttrValue::UInt(cursor.read_half()? as u64),
        DW_FORM_data4 => AttrValue::UInt(cursor.read_word()? as u64),
        DW_FORM_data8 => AttrValue::UInt(cursor.read_xword()?),
        DW_FORM_data16 => AttrValue::Bytes(cursor.read_slice(16)?),
        DW_FORM_sdata => AttrValue::SInt(cursor.read_sleb128()?),
        DW_FORM_udata => AttrValue::UInt(cursor.read_uleb128()?),
        DW_FORM_implicit_const => AttrValue::SInt(implicit_const.ok_or_else(|| {
            Error::MalformedHeader("implicit_const form without a value in the abbrev".into())
        })?),

        DW_FORM_flag => AttrValue::Flag(cursor.read_byte()? != 0),
        DW_FORM_flag_present => AttrValue::Flag(true),

        DW_FORM_string => AttrValue::Str(cursor.read_cstr()?),
        DW_FORM_strp => {
            let offset = cursor.read_offset(ctx.is_64bit)?;
            lookup_str(ctx.sections.debug_str, offset)
        }
        DW_FORM_line_strp => {
            let offset = cursor.read_offset(ctx.is_64bit)?;
            lookup_str(ctx.sections.debug_line_str, offset)
        }
        DW_FORM_strp_sup | DW_FORM_GNU_strp_alt => {
            let offset = cursor.read_offset(ctx.is_64bit)?;
            lookup_str(ctx.sections.debug_str_sup, offset)
        }
        DW_FORM_strx | DW_FORM_GNU_str_index => {
            let index = cursor.read_uleb128()?;
            lookup_strx(ctx, index)
        }
        DW_FORM_strx1 => lookup_strx(ctx, cursor.read_byte()? as u64),
        DW_FORM_strx2 => lookup_strx(ctx, cursor.read_half()? as u64),
        DW_FORM_strx3 => lookup_strx(ctx, cursor.read_uint(3)?),
        DW_FORM_strx4 => lookup_strx(ctx, cursor.read_word()? as u64),

        DW_FORM_addrx | DW_FORM_GNU_addr_index => {
            let index = cursor.read_uleb128()?;
            lookup_addrx(ctx, index)
        }
        DW_FORM_addrx1 => lookup_addrx(ctx, cursor.read_byte()? as u64),
        DW_FORM_addrx2 => lookup_addrx(ctx, cursor.read_half()? as u64),
        DW_FORM_addrx3 => lookup_addrx(ctx, cursor.read_uint(3)?),
        DW_FORM_addrx4 => lookup_addrx(ctx, cursor.read_word()? as u64),

        DW_FORM_block1 => {
            let len = cursor.read_byte()? as usize;
            AttrValue::Bytes(read_block(cursor, len)?)
        }
        DW_FORM_block2 => {
            let len = cursor.read_half()? as usize;
            AttrValue::Bytes(read_block(cursor, len)?)
        }
        DW_FORM_block4 => {
            let len = cursor.read_word()? as usize;
            AttrValue::Bytes(read_block(cursor, len)?)
        }
        DW_FORM_block => {
            let len = cursor.read_uleb128()? as usize;
            AttrValue::Bytes(read_block(cursor, len)?)
        }
        DW_FORM_exprloc => {
            let len = cursor.read_uleb128()? as usize;
            AttrValue::ExprLoc(read_block(cursor, len)?)
        }

        DW_FORM_ref1 => unit_ref(ctx, cursor.read_byte()? as u64),
        DW_FORM_ref2 => unit_ref(ctx, cursor.read_half()? as u64),
        DW_FORM_ref4 => unit_ref(ctx, cursor.read_word()? as u64),
        DW_FORM_ref8 => unit_ref(ctx, cursor.read_xword()?),
        DW_FORM_ref_udata => unit_ref(ctx, cursor.read_uleb128()?),
        DW_FORM_ref_addr => {
            // Section-absolute. In DWARF 2 this was address sized; from
            // version 3 on it is offset sized.
            let value = if ctx.version == 2 {
                cursor.read_uint(ctx.address_size as usize)?
            } else {
                cursor.read_offset(ctx.is_64bit)?
            };
            AttrValue::Ref(value)
        }
        DW_FORM_ref_sig8 => AttrValue::RefSig8(cursor.read_xword()?),
        DW_FORM_ref_sup4 => AttrValue::SupRef(cursor.read_word()? as u64),
        DW_FORM_ref_sup8 => AttrValue::SupRef(cursor.read_xword()?),
        DW_FORM_GNU_ref_alt => AttrValue::SupRef(cursor.read_offset(ctx.is_64bit)?),

        DW_FORM_sec_offset => AttrValue::SecOffset(cursor.read_offset(ctx.is_64bit)?),
        DW_FORM_loclistx | DW_FORM_rnglistx => AttrValue::SecOffset(cursor.read_uleb128()?),

        DW_FORM_indirect => {
            if depth >= MAX_INDIRECT {
                return Err(Error::BogusStructure("DW_FORM_indirect chain too deep".into()));
            }
            let raw = cursor.read_uleb128()?;
            let actual = FormEncoding::from_u64(raw)?;
            let implicit = if actual == DW_FORM_implicit_const {
                // An indirect implicit_const carries its value inline; this
                // is a DWARF 5 oddity (7.5.3).
                Some(cursor.read_sleb128()?)
            } else {
                None
            };
            return decode_value_depth(cursor, actual, implicit, ctx, depth + 1);
        }
    };
    Ok(value)
}

/// Block and exprloc lengths are clamped to the record end rather than
/// erroring, so one over-long block doesn't take out the rest of the unit;
/// the shortened read is still reported.
fn read_block<'a>(cursor: &mut Cursor<'a>, len: usize) -> Result<&'a [u8]> {
    let take = len.min(cursor.remaining());
    if take < len {
        tracing::warn!(
            offset = cursor.offset,
            wanted = len,
            available = take,
            "block length runs past the end, clamping"
        );
    }
    cursor.read_slice(take)
}

fn lookup_str<'a>(section: Option<&'a [u8]>, offset: u64) -> AttrValue<'a> {
    let Some(bytes) = section else {
        return AttrValue::StrRef(offset);
    };
    let Ok(start) = usize::try_from(offset) else {
        tracing::warn!(offset, "string offset exceeds the section");
        return AttrValue::StrRef(offset);
    };
    if start >= bytes.len() {
        tracing::warn!(offset, len = bytes.len(), "string offset exceeds the section");
        return AttrValue::StrRef(offset);
    }
    match bytes[start..].iter().position(|&b| b == 0) {
        Some(nul) => AttrValue::Str(&bytes[start..start + nul]),
        None => {
            tracing::warn!(offset, "string section is missing its final NUL");
            AttrValue::StrRef(offset)
        }
    }
}

/// strx: index -> .debug_str_offsets entry -> .debug_str.
fn lookup_strx<'a>(ctx: &UnitContext<'a>, index: u64) -> AttrValue<'a> {
    let Some(offsets) = ctx.sections.debug_str_offsets else {
        return AttrValue::StrRef(index);
    };
    let entry_size = ctx.offset_size() as u64;
    let Some(pos) = ctx
        .str_offsets_base
        .checked_add(index.saturating_mul(entry_size))
    else {
        return AttrValue::StrRef(index);
    };
    let Ok(pos) = usize::try_from(pos) else {
        return AttrValue::StrRef(index);
    };
    let mut cursor = Cursor::new(crate::reader::Reader::new(offsets, ctx.little_endian), pos);
    match cursor.read_uint(entry_size as usize) {
        Ok(offset) => lookup_str(ctx.sections.debug_str, offset),
        Err(_) => {
            tracing::warn!(index, "string index outside .debug_str_offsets");
            AttrValue::StrRef(index)
        }
    }
}

/// addrx: index -> .debug_addr entry.
fn lookup_addrx<'a>(ctx: &UnitContext<'a>, index: u64) -> AttrValue<'a> {
    let Some(addrs) = ctx.sections.debug_addr else {
        return AttrValue::AddrIndex(index);
    };
    let entry_size = ctx.address_size as u64;
    let Some(pos) = ctx.addr_base.checked_add(index.saturating_mul(entry_size)) else {
        return AttrValue::AddrIndex(index);
    };
    let Ok(pos) = usize::try_from(pos) else {
        return AttrValue::AddrIndex(index);
    };
    let mut cursor = Cursor::new(crate::reader::Reader::new(addrs, ctx.little_endian), pos);
    match cursor.read_uint(entry_size as usize) {
        Ok(addr) => AttrValue::Addr(addr),
        Err(_) => {
            tracing::warn!(index, "address index outside .debug_addr");
            AttrValue::AddrIndex(index)
        }
    }
}

fn unit_ref<'a>(ctx: &UnitContext<'a>, offset: u64) -> AttrValue<'a> {
    AttrValue::Ref((ctx.unit_offset as u64).wrapping_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    fn ctx<'a>() -> UnitContext<'a> {
        UnitContext {
            version: 4,
            address_size: 8,
            is_64bit: false,
            little_endian: true,
            unit_offset: 0x100,
            sections: UnitSections::default(),
            str_offsets_base: 0,
            addr_base: 0,
            loclists_base: 0,
            rnglists_base: 0,
            low_pc: 0,
        }
    }

    fn decode<'a>(
        bytes: &'a [u8],
        encoding: FormEncoding,
        ctx: &UnitContext<'a>,
    ) -> (Result<AttrValue<'a>>, usize) {
        let mut cursor = Cursor::new(Reader::new(bytes, true), 0);
        let value = decode_value(&mut cursor, encoding, None, ctx);
        (value, cursor.offset)
    }

    #[test]
    fn fixed_width_forms_consume_exactly() {
        let bytes = [0x11u8, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];
        let cases = [
            (FormEncoding::DW_FORM_data1, 1usize, 0x11u64),
            (FormEncoding::DW_FORM_data2, 2, 0x2211),
            (FormEncoding::DW_FORM_data4, 4, 0x4433_2211),
            (FormEncoding::DW_FORM_data8, 8, 0x8877_6655_4433_2211),
        ];
        for (form, width, expected) in cases {
            let (value, used) = decode(&bytes, form, &ctx());
            assert_eq!(value.unwrap(), AttrValue::UInt(expected));
            assert_eq!(used, width, "{form:?}");
        }
    }

    #[test]
    fn leb_forms() {
        let (value, used) = decode(&[0xe5, 0x8e, 0x26], FormEncoding::DW_FORM_udata, &ctx());
        assert_eq!(value.unwrap(), AttrValue::UInt(624_485));
        assert_eq!(used, 3);

        let (value, used) = decode(&[0x7f], FormEncoding::DW_FORM_sdata, &ctx());
        assert_eq!(value.unwrap(), AttrValue::SInt(-1));
        assert_eq!(used, 1);
    }

    #[test]
    fn huge_ref8_wraps_instead_of_overflowing() {
        let bytes = [0xffu8; 8];
        let (value, used) = decode(&bytes, FormEncoding::DW_FORM_ref8, &ctx());
        assert_eq!(value.unwrap(), AttrValue::Ref(0xff));
        assert_eq!(used, 8);
    }

    #[test]
    fn inline_string() {
        let (value, used) = decode(b"abc\0xyz", FormEncoding::DW_FORM_string, &ctx());
        assert_eq!(value.unwrap(), AttrValue::Str(b"abc"));
        assert_eq!(used, 4);
    }

    #[test]
    fn strp_resolves_and_survives_bad_offsets() {
        let strs = b"zero\0one\0";
        let mut c = ctx();
        c.sections.debug_str = Some(strs);

        let five = 5u32.to_le_bytes();
        let (value, used) = decode(&five, FormEncoding::DW_FORM_strp, &c);
        assert_eq!(value.unwrap(), AttrValue::Str(b"one"));
        assert_eq!(used, 4);

        // way past the end: decoded (cursor advances) but unresolved
        let far = 999u32.to_le_bytes();
        let (value, used) = decode(&far, FormEncoding::DW_FORM_strp, &c);
        assert_eq!(value.unwrap(), AttrValue::StrRef(999));
        assert_eq!(used, 4);
    }

    #[test]
    fn strx1_double_indirection() {
        let strs = b"zero\0one\0";
        let offsets = [5u32.to_le_bytes(), 0u32.to_le_bytes()].concat();
        let mut c = ctx();
        c.sections.debug_str = Some(strs);
        c.sections.debug_str_offsets = Some(&offsets);

        let (value, used) = decode(&[0x00], FormEncoding::DW_FORM_strx1, &c);
        assert_eq!(value.unwrap(), AttrValue::Str(b"one"));
        assert_eq!(used, 1);

        // index past the offsets table
        let (value, _) = decode(&[0x09], FormEncoding::DW_FORM_strx1, &c);
        assert_eq!(value.unwrap(), AttrValue::StrRef(9));
    }

    #[test]
    fn addrx_through_debug_addr() {
        let addrs = [0x1000u64.to_le_bytes(), 0x2000u64.to_le_bytes()].concat();
        let mut c = ctx();
        c.sections.debug_addr = Some(&addrs);

        let (value, used) = decode(&[0x01], FormEncoding::DW_FORM_addrx, &c);
        assert_eq!(value.unwrap(), AttrValue::Addr(0x2000));
        assert_eq!(used, 1);

        let (value, _) = decode(&[0x02], FormEncoding::DW_FORM_addrx, &c);
        assert_eq!(value.unwrap(), AttrValue::AddrIndex(2));
    }

    #[test]
    fn blocks_are_length_prefixed_and_clamped() {
        let (value, used) = decode(&[0x02, 0xaa, 0xbb, 0xcc], FormEncoding::DW_FORM_block1, &ctx());
        assert_eq!(value.unwrap(), AttrValue::Bytes(&[0xaa, 0xbb]));
        assert_eq!(used, 3);

        // declared length longer than the data: clamp, don't fail
        let (value, used) = decode(&[0x09, 0xaa, 0xbb], FormEncoding::DW_FORM_block1, &ctx());
        assert_eq!(value.unwrap(), AttrValue::Bytes(&[0xaa, 0xbb]));
        assert_eq!(used, 3);
    }

    #[test]
    fn refs_become_absolute() {
        let (value, used) = decode(&[0x10, 0, 0, 0], FormEncoding::DW_FORM_ref4, &ctx());
        assert_eq!(value.unwrap(), AttrValue::Ref(0x110));
        assert_eq!(used, 4);
    }

    #[test]
    fn ref_addr_width_depends_on_version() {
        let bytes = [0x44u8, 0x33, 0x22, 0x11, 0, 0, 0, 0];
        let mut c = ctx();
        c.version = 2; // address sized (8 here)
        let (value, used) = decode(&bytes, FormEncoding::DW_FORM_ref_addr, &c);
        assert_eq!(value.unwrap(), AttrValue::Ref(0x1122_3344));
        assert_eq!(used, 8);

        c.version = 4; // offset sized (4)
        let (value, used) = decode(&bytes, FormEncoding::DW_FORM_ref_addr, &c);
        assert_eq!(value.unwrap(), AttrValue::Ref(0x1122_3344));
        assert_eq!(used, 4);
    }

    #[test]
    fn indirect_unwraps_the_real_form() {
        // indirect -> data2
        let (value, used) = decode(&[0x05, 0x34, 0x12], FormEncoding::DW_FORM_indirect, &ctx());
        assert_eq!(value.unwrap(), AttrValue::UInt(0x1234));
        assert_eq!(used, 3);
    }

    #[test]
    fn indirect_chain_is_bounded() {
        // endless indirect -> indirect -> ...
        let bytes = [0x16u8; 32];
        let (value, _) = decode(&bytes, FormEncoding::DW_FORM_indirect, &ctx());
        assert!(matches!(value, Err(Error::BogusStructure(_))));
    }

    #[test]
    fn truncation_is_an_error_not_a_panic() {
        for form in [
            FormEncoding::DW_FORM_addr,
            FormEncoding::DW_FORM_data4,
            FormEncoding::DW_FORM_strp,
            FormEncoding::DW_FORM_block2,
            FormEncoding::DW_FORM_string,
        ] {
            let (value, _) = decode(&[0x01], form, &ctx());
            assert!(matches!(value, Err(Error::Truncated { .. })), "{form:?}");
        }
    }
}
