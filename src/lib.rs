//! A decoder for the DWARF debugging format, versions 2 through 5.
//!
//! The caller hands over raw section bytes (see [`section`]) and drives the
//! per-section decoders: [`info`] for abbreviation tables and DIE trees,
//! [`line`] for line-number programs, [`frame`] for call-frame unwind
//! records, [`expr`] for location expressions, [`lists`] for
//! location/range lists, and [`index`] for .dwp package indexes. All of it
//! is tolerant of truncated or corrupt input: errors come back as values,
//! reads never leave the supplied buffers, and recoverable oddities are
//! logged through `tracing` rather than aborting the decode.
pub mod error;
pub mod expr;
pub mod frame;
pub mod index;
pub mod info;
pub mod line;
pub mod lists;
pub mod reader;
pub mod section;

pub use error::{Error, Result};
pub use reader::{Cursor, Reader};
pub use section::{NoRelocations, RelocationQuery, Section, UnitSections};
