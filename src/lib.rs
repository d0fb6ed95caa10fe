//! # zx-textconv
//!
//! Converts ZX Spectrum program files to and from Unicode text.
//!
//! Two native formats are supported:
//!
//! - **Sinclair BASIC**: tokenized programs, decoded to text (one direction only)
//! - **HiSoft GEN assembler**: raw source files, decoded and encoded
//!
//! ## Character Set
//!
//! Every native byte maps to a Unicode form, and every form maps back to
//! the same byte. Keyword tokens become the keyword framed by single spaces:
//!
//! ```text
//! 0xF5        -> " PRINT "
//! 0x90..0xA2  -> 🅰..🆂   (user defined graphics)
//! 0x81..0x8F  -> ▝▘▀▗▐▚▜▖▞▌▛▄▟▙█
//! ```
//!
//! ## Headers
//!
//! Files copied off a +3 disk may start with a 128-byte `PLUS3DOS` header;
//! files saved to tape have a separate 17-byte header block. Either one,
//! when present, gives the exact data length and for BASIC the offset where
//! the program ends and its variables begin.
//!
//! ## Finding the End of Data
//!
//! Without a header the end is found heuristically, in order:
//! 1. Declared program length from a header **[AUTHORITATIVE]**
//! 2. First line-start value with bit 15 or 14 set (start of variables)
//! 3. The whole buffer
//!
//! An optional Soft-EOF byte (0x1A by default) cuts the input short. With
//! a disk header it applies after the header is stripped, and the earlier
//! of the declared length and the sentinel wins.

pub mod boundary;
pub mod charset;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod lines;
pub mod options;

pub use boundary::{Boundary, BoundarySource, Strategy};
pub use charset::{CharTable, Flavor, Generation};
pub use decoder::{Decoder, Listing};
pub use encoder::{Encoded, Encoder};
pub use error::{ConvertError, HeaderError};
pub use header::{DiskHeader, FileHeader, FileType, Integrity, TapeHeader, TypeDetail, TypeHeader};
pub use lines::{Dialect, LineRecord};
pub use options::ConvertOptions;
