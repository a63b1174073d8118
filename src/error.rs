use thiserror::Error;

/// Everything that can go wrong while decoding a section. Sections come from
/// arbitrary object files (often corrupt or truncated ones) so none of these
/// abort the process: they bubble up to whoever asked for the decode.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A read would have crossed the end of the section (or of the current
    /// record). By far the most common failure on truncated files.
    #[error("read of {wanted} byte(s) at offset {offset:#x} crosses the end at {end:#x}")]
    Truncated {
        offset: usize,
        wanted: usize,
        end: usize,
    },

    /// A header field is outside the legal set, e.g. a bad version number
    /// or an opcode_base of zero.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The abbreviation table is missing its terminator or is otherwise
    /// unusable.
    #[error("malformed abbreviation table at offset {0:#x}")]
    MalformedAbbrev(usize),

    /// A DIE referenced an abbreviation code the table doesn't have. Fatal
    /// for the unit: we no longer know how many bytes the DIE occupies.
    #[error("unknown abbreviation code {code} at offset {offset:#x}")]
    UnknownAbbrevCode { code: u64, offset: usize },

    /// An attribute used a form we don't recognize so its size is unknowable.
    #[error("unknown attribute form {0:#x}")]
    UnknownForm(u64),

    /// An opcode whose operand size cannot be determined.
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    /// Structurally inconsistent data: sibling depth underflow, a unit
    /// length overrunning the section, an index slot count that overflows.
    #[error("bogus structure: {0}")]
    BogusStructure(String),

    /// A list ran to the end of the section without its terminator entry.
    #[error("unterminated list starting at offset {0:#x}")]
    Unterminated(usize),

    /// A DWARF version outside 2..=5.
    #[error("unsupported DWARF version {0}")]
    UnsupportedVersion(u16),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offsets() {
        let err = Error::Truncated {
            offset: 0x10,
            wanted: 4,
            end: 0x12,
        };
        insta::assert_snapshot!(err, @"read of 4 byte(s) at offset 0x10 crosses the end at 0x12");

        let err = Error::UnknownAbbrevCode {
            code: 9,
            offset: 0x40,
        };
        insta::assert_snapshot!(err, @"unknown abbreviation code 9 at offset 0x40");
    }
}
