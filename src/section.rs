//! Raw section inputs. The collaborator that knows about object files hands
//! us each ".debug_FOO" section as a named byte buffer; we only borrow them
//! for the duration of a decode pass.
use crate::reader::Reader;

/// One debug section as pulled out of an object file.
#[derive(Clone, Copy)]
pub struct Section<'a> {
    /// e.g. ".debug_info" or ".debug_info.dwo"
    pub name: &'a str,

    /// The address the section is loaded at, zero for non-allocated sections.
    pub base_address: u64,

    pub bytes: &'a [u8],
}

impl<'a> Section<'a> {
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Section {
            name,
            base_address: 0,
            bytes,
        }
    }

    pub fn reader(&self, little_endian: bool) -> Reader<'a> {
        Reader::new(self.bytes, little_endian)
    }
}

/// Lets a decoder ask whether a relocation applies at a section offset.
/// Unrelocated object files store zero where the linker will later patch an
/// address in; this distinguishes "really zero" from "not filled in yet".
/// Only used to decide diagnostics, never for decode correctness.
pub trait RelocationQuery {
    fn reloc_at(&self, section_name: &str, offset: usize) -> bool;
}

/// The default for fully linked files: nothing is pending relocation.
pub struct NoRelocations;

impl RelocationQuery for NoRelocations {
    fn reloc_at(&self, _section_name: &str, _offset: usize) -> bool {
        false
    }
}

/// The cross-section lookups attribute decoding needs: strings, the v5
/// string-offsets and address tables, and the line-table string pool.
/// All optional since small programs routinely lack most of them.
#[derive(Clone, Copy, Default)]
pub struct UnitSections<'a> {
    pub debug_str: Option<&'a [u8]>,
    pub debug_line_str: Option<&'a [u8]>,
    pub debug_str_offsets: Option<&'a [u8]>,
    pub debug_addr: Option<&'a [u8]>,
    /// Strings in a supplementary (dwz) file, for the GNU_*_alt forms.
    pub debug_str_sup: Option<&'a [u8]>,
}
