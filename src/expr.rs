//! Decoding of DWARF location expressions: the DW_OP_* bytecode that appears
//! in DW_AT_location/DW_AT_frame_base attributes and inside CFI
//! def_cfa_expression instructions. This walks one instruction at a time;
//! evaluation (running the stack machine against a live target) is a
//! consumer concern.
use crate::reader::{Cursor, Reader};

/// How deep DW_OP_entry_value style sub-expressions may nest. The nesting
/// depth is attacker controlled so recursion gets a hard cap.
const MAX_EXPR_DEPTH: u32 = 8;

/// Widths the operand reader needs from the enclosing unit.
#[derive(Clone, Copy)]
pub struct ExprContext {
    pub version: u16,
    pub address_size: u8,
    pub offset_size: u8,
}

impl ExprContext {
    /// DW_OP_call_ref and DW_OP_GNU_implicit_pointer are address sized in
    /// DWARF 2 and offset sized from version 3 on.
    fn ref_size(&self) -> usize {
        if self.version == 2 {
            self.address_size as usize
        } else {
            self.offset_size as usize
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq)] // section 7.7.1
pub enum Operation<'a> {
    Addr(u64),
    Deref,
    DerefSize(u8),
    Xderef,
    XderefSize(u8),
    /// const1u..const8u, constu, and the lit0..lit31 shorthands.
    Const(u64),
    /// const1s..const8s, consts.
    Consts(i64),
    Dup,
    Drop,
    Over,
    Pick(u8),
    Swap,
    Rot,
    Abs,
    And,
    Div,
    Minus,
    Mod,
    Mul,
    Neg,
    Not,
    Or,
    Plus,
    PlusUconst(u64),
    Shl,
    Shr,
    Shra,
    Xor,
    Skip(i16),
    Bra(i16),
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
    /// reg0..reg31 and regx.
    Reg(u64),
    /// breg0..breg31 and bregx.
    Breg { reg: u64, offset: i64 },
    /// Offset from the frame base; resolving it needs DW_AT_frame_base on
    /// the enclosing function, which is what `need_frame_base` signals.
    Fbreg(i64),
    Piece(u64),
    BitPiece { size: u64, offset: u64 },
    Nop,
    PushObjectAddress,
    Call2(u16),
    Call4(u32),
    CallRef(u64),
    FormTlsAddress,
    CallFrameCfa,
    ImplicitValue(&'a [u8]),
    StackValue,
    ImplicitPointer { die: u64, offset: i64 },
    Addrx(u64),
    Constx(u64),
    /// A nested sub-expression, decoded recursively (bounded).
    EntryValue(Vec<Operation<'a>>),
    ConstType { base_type: u64, value: &'a [u8] },
    RegvalType { reg: u64, base_type: u64 },
    DerefType { size: u8, base_type: u64 },
    XderefType { size: u8, base_type: u64 },
    Convert(u64),
    Reinterpret(u64),
    GNU_push_tls_address,
    GNU_uninit,
    GNU_parameter_ref(u64),
}

/// A decoded expression. If an opcode we can't size was hit, `stopped_at`
/// names it and `ops` holds everything decoded before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression<'a> {
    pub ops: Vec<Operation<'a>>,
    /// Set when DW_OP_fbreg was seen: the consumer must resolve
    /// DW_AT_frame_base before this expression means anything.
    pub need_frame_base: bool,
    /// The opcode decoding stopped on, if any: unknown opcodes have
    /// unknowable operand sizes so nothing after them can be trusted.
    pub stopped_at: Option<u8>,
}

pub fn decode_expression<'a>(
    bytes: &'a [u8],
    little_endian: bool,
    ctx: &ExprContext,
) -> Expression<'a> {
    decode_depth(bytes, little_endian, ctx, 0)
}

fn decode_depth<'a>(
    bytes: &'a [u8],
    little_endian: bool,
    ctx: &ExprContext,
    depth: u32,
) -> Expression<'a> {
    let mut cursor = Cursor::new(Reader::new(bytes, little_endian), 0);
    let mut expr = Expression {
        ops: Vec::new(),
        need_frame_base: false,
        stopped_at: None,
    };

    while !cursor.at_end() {
        let Ok(opcode) = cursor.read_byte() else { break };
        match decode_op(opcode, &mut cursor, little_endian, ctx, depth) {
            Ok(Some(op)) => {
                if matches!(op, Operation::Fbreg(_)) {
                    expr.need_frame_base = true;
                }
                expr.ops.push(op);
            }
            Ok(None) => {
                // operand size unknowable: keep what we have
                tracing::debug!(opcode, "stopping expression decode on unknown opcode");
                expr.stopped_at = Some(opcode);
                return expr;
            }
            Err(_) => {
                // the operand ran off the end of the block
                expr.stopped_at = Some(opcode);
                return expr;
            }
        }
    }
    expr
}

fn decode_op<'a>(
    opcode: u8,
    cursor: &mut Cursor<'a>,
    little_endian: bool,
    ctx: &ExprContext,
    depth: u32,
) -> crate::error::Result<Option<Operation<'a>>> {
    use Operation::*;

    let op = match opcode {
        0x03 => Addr(cursor.read_uint(ctx.address_size as usize)?),
        0x06 => Deref,
        0x08 => Const(cursor.read_byte()? as u64),
        0x09 => Consts(cursor.read_sint(1)?),
        0x0a => Const(cursor.read_half()? as u64),
        0x0b => Consts(cursor.read_sint(2)?),
        0x0c => Const(cursor.read_word()? as u64),
        0x0d => Consts(cursor.read_sint(4)?),
        0x0e => Const(cursor.read_xword()?),
        0x0f => Consts(cursor.read_sint(8)?),
        0x10 => Const(cursor.read_uleb128()?),
        0x11 => Consts(cursor.read_sleb128()?),
        0x12 => Dup,
        0x13 => Drop,
        0x14 => Over,
        0x15 => Pick(cursor.read_byte()?),
        0x16 => Swap,
        0x17 => Rot,
        0x18 => Xderef,
        0x19 => Abs,
        0x1a => And,
        0x1b => Div,
        0x1c => Minus,
        0x1d => Mod,
        0x1e => Mul,
        0x1f => Neg,
        0x20 => Not,
        0x21 => Or,
        0x22 => Plus,
        0x23 => PlusUconst(cursor.read_uleb128()?),
        0x24 => Shl,
        0x25 => Shr,
        0x26 => Shra,
        0x27 => Xor,
        0x28 => Bra(cursor.read_sint(2)? as i16),
        0x29 => Eq,
        0x2a => Ge,
        0x2b => Gt,
        0x2c => Le,
        0x2d => Lt,
        0x2e => Ne,
        0x2f => Skip(cursor.read_sint(2)? as i16),
        0x30..=0x4f => Const((opcode - 0x30) as u64), // lit0..lit31
        0x50..=0x6f => Reg((opcode - 0x50) as u64),   // reg0..reg31
        0x70..=0x8f => Breg {
            // breg0..breg31
            reg: (opcode - 0x70) as u64,
            offset: cursor.read_sleb128()?,
        },
        0x90 => Reg(cursor.read_uleb128()?), // regx
        0x91 => Fbreg(cursor.read_sleb128()?),
        0x92 => {
            // bregx
            let reg = cursor.read_uleb128()?;
            let offset = cursor.read_sleb128()?;
            Breg { reg, offset }
        }
        0x93 => Piece(cursor.read_uleb128()?),
        0x94 => DerefSize(cursor.read_byte()?),
        0x95 => XderefSize(cursor.read_byte()?),
        0x96 => Nop,
        0x97 => PushObjectAddress,
        0x98 => Call2(cursor.read_half()?),
        0x99 => Call4(cursor.read_word()?),
        0x9a => CallRef(cursor.read_uint(ctx.ref_size())?),
        0x9b => FormTlsAddress,
        0x9c => CallFrameCfa,
        0x9d => {
            let size = cursor.read_uleb128()?;
            let offset = cursor.read_uleb128()?;
            BitPiece { size, offset }
        }
        0x9e => {
            let len = cursor.read_uleb128()? as usize;
            ImplicitValue(cursor.read_slice(len.min(cursor.remaining()))?)
        }
        0x9f => StackValue,
        0xa0 | 0xf2 => {
            // implicit_pointer / GNU_implicit_pointer
            let die = cursor.read_uint(ctx.ref_size())?;
            let offset = cursor.read_sleb128()?;
            ImplicitPointer { die, offset }
        }
        0xa1 | 0xfb => Addrx(cursor.read_uleb128()?), // addrx / GNU_addr_index
        0xa2 | 0xfc => Constx(cursor.read_uleb128()?), // constx / GNU_const_index
        0xa3 | 0xf3 => {
            // entry_value / GNU_entry_value: a length-prefixed nested
            // expression, decoded by bounded recursion
            if depth >= MAX_EXPR_DEPTH {
                return Ok(None);
            }
            let len = cursor.read_uleb128()? as usize;
            let nested = cursor.read_slice(len.min(cursor.remaining()))?;
            EntryValue(decode_depth(nested, little_endian, ctx, depth + 1).ops)
        }
        0xa4 | 0xf4 => {
            // const_type / GNU_const_type
            let base_type = cursor.read_uleb128()?;
            let len = cursor.read_byte()? as usize;
            ConstType {
                base_type,
                value: cursor.read_slice(len.min(cursor.remaining()))?,
            }
        }
        0xa5 | 0xf5 => {
            let reg = cursor.read_uleb128()?;
            let base_type = cursor.read_uleb128()?;
            RegvalType { reg, base_type }
        }
        0xa6 | 0xf6 => {
            let size = cursor.read_byte()?;
            let base_type = cursor.read_uleb128()?;
            DerefType { size, base_type }
        }
        0xa7 => {
            let size = cursor.read_byte()?;
            let base_type = cursor.read_uleb128()?;
            XderefType { size, base_type }
        }
        0xa8 | 0xf7 => Convert(cursor.read_uleb128()?),
        0xa9 | 0xf8 => Reinterpret(cursor.read_uleb128()?),
        0xe0 => GNU_push_tls_address,
        0xf0 => GNU_uninit,
        0xfa => GNU_parameter_ref(cursor.read_word()? as u64),
        _ => return Ok(None),
    };
    Ok(Some(op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{encode_sleb128, encode_uleb128};

    fn ctx() -> ExprContext {
        ExprContext {
            version: 4,
            address_size: 8,
            offset_size: 4,
        }
    }

    fn decode(bytes: &[u8]) -> Expression<'_> {
        decode_expression(bytes, true, &ctx())
    }

    #[test]
    fn zero_operand_ops() {
        let expr = decode(&[0x12, 0x1a, 0x22, 0x9f]); // dup, and, plus, stack_value
        assert_eq!(
            expr.ops,
            vec![
                Operation::Dup,
                Operation::And,
                Operation::Plus,
                Operation::StackValue
            ]
        );
        assert!(expr.stopped_at.is_none());
        assert!(!expr.need_frame_base);
    }

    #[test]
    fn literal_and_register_families() {
        let mut bytes = vec![0x30, 0x4f, 0x50, 0x6f]; // lit0, lit31, reg0, reg31
        bytes.push(0x75); // breg5
        bytes.extend_from_slice(&encode_sleb128(-8));
        bytes.push(0x90); // regx
        bytes.extend_from_slice(&encode_uleb128(33));
        bytes.push(0x92); // bregx
        bytes.extend_from_slice(&encode_uleb128(40));
        bytes.extend_from_slice(&encode_sleb128(16));

        let expr = decode(&bytes);
        assert_eq!(
            expr.ops,
            vec![
                Operation::Const(0),
                Operation::Const(31),
                Operation::Reg(0),
                Operation::Reg(31),
                Operation::Breg { reg: 5, offset: -8 },
                Operation::Reg(33),
                Operation::Breg {
                    reg: 40,
                    offset: 16
                },
            ]
        );
    }

    #[test]
    fn fbreg_raises_need_frame_base() {
        let mut bytes = vec![0x91];
        bytes.extend_from_slice(&encode_sleb128(-16));
        let expr = decode(&bytes);
        assert_eq!(expr.ops, vec![Operation::Fbreg(-16)]);
        assert!(expr.need_frame_base);
    }

    #[test]
    fn fixed_width_constants() {
        let mut bytes = vec![0x08, 0xff]; // const1u 255
        bytes.push(0x09);
        bytes.push(0xff); // const1s -1
        bytes.push(0x0c);
        bytes.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        let expr = decode(&bytes);
        assert_eq!(
            expr.ops,
            vec![
                Operation::Const(255),
                Operation::Consts(-1),
                Operation::Const(0xdead_beef)
            ]
        );
    }

    #[test]
    fn branch_offsets_are_signed() {
        let mut bytes = vec![0x28]; // bra
        bytes.extend_from_slice(&(-4i16).to_le_bytes());
        bytes.push(0x2f); // skip
        bytes.extend_from_slice(&8i16.to_le_bytes());
        let expr = decode(&bytes);
        assert_eq!(expr.ops, vec![Operation::Bra(-4), Operation::Skip(8)]);
    }

    #[test]
    fn call_ref_width_depends_on_version() {
        let expr = decode_expression(&[0x9a, 0x11, 0x22, 0x33, 0x44], true, &ctx()); // v4: offset size 4
        assert_eq!(expr.ops, vec![Operation::CallRef(0x4433_2211)]);

        let v2 = ExprContext {
            version: 2,
            address_size: 8,
            offset_size: 4,
        };
        let bytes = [0x9a, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let expr = decode_expression(&bytes, true, &v2); // v2: address size 8
        assert_eq!(expr.ops, vec![Operation::CallRef(0x8877_6655_4433_2211)]);
    }

    #[test]
    fn implicit_value_carries_bytes() {
        let expr = decode(&[0x9e, 0x03, 0xaa, 0xbb, 0xcc]);
        assert_eq!(
            expr.ops,
            vec![Operation::ImplicitValue(&[0xaa, 0xbb, 0xcc])]
        );
    }

    #[test]
    fn entry_value_decodes_nested_expression() {
        // GNU_entry_value(len=1, [reg5])
        let expr = decode(&[0xf3, 0x01, 0x55]);
        assert_eq!(
            expr.ops,
            vec![Operation::EntryValue(vec![Operation::Reg(5)])]
        );
    }

    #[test]
    fn entry_value_recursion_is_capped() {
        // entry_value wrapping entry_value wrapping ... deeper than the cap
        let mut bytes = vec![0x55]; // innermost: reg5
        for _ in 0..20 {
            let mut outer = vec![0xa3];
            outer.extend_from_slice(&encode_uleb128(bytes.len() as u64));
            outer.extend_from_slice(&bytes);
            bytes = outer;
        }
        let expr = decode(&bytes);
        // must terminate; the innermost levels get cut off
        assert_eq!(expr.ops.len(), 1);
    }

    #[test]
    fn unknown_opcode_stops_early() {
        let expr = decode(&[0x22, 0x07, 0x22]); // plus, <unknown 0x07>, plus
        assert_eq!(expr.ops, vec![Operation::Plus]);
        assert_eq!(expr.stopped_at, Some(0x07));
    }

    #[test]
    fn truncated_operand_stops_without_panic() {
        let expr = decode(&[0x03, 0x11, 0x22]); // addr needs 8 bytes, has 2
        assert!(expr.ops.is_empty());
        assert_eq!(expr.stopped_at, Some(0x03));
    }

    #[test]
    fn every_defined_opcode_consumes_bytes_or_stops() {
        // forward progress: no opcode may decode to zero ops and zero
        // consumption without stopping the walk
        for opcode in 0u8..=0xff {
            let bytes = [opcode, 0, 0, 0, 0, 0, 0, 0, 0, 0];
            let expr = decode(&bytes);
            if expr.stopped_at.is_none() {
                assert!(!expr.ops.is_empty(), "opcode {opcode:#x}");
            }
        }
    }
}
