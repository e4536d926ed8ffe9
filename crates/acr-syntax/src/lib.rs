//! Text parsers for the acr toolchain.
//!
//! Two independent, pure parsers:
//!
//! - [`ssim`]: the line-oriented tuple format printed by `acr` and friends
//!   (`dmmeta.ns  ns:algo  nstype:protocol  comment:"Basic types"`).
//! - [`header`]: recovers enums, structs and function signatures from
//!   amc-generated C++ headers by anchor-line pattern matching.
//!
//! Neither parser can fail: malformed input only yields fewer results.

pub mod header;
pub mod model;
pub mod ssim;

pub use header::{parse_header, parse_signature};
pub use model::*;
pub use ssim::{parse_tuple_line, parse_tuple_output, Record, TupleRecord};
