//! The self-describing tag-driven wire format: the numeric tag
//! vocabulary ([`tag`]), the cursor-based parser ([`parser`]), and the
//! salvage fallback for unparseable objects ([`salvage`]).

pub mod parser;
pub mod salvage;
pub mod tag;

pub use parser::{ParsedMessage, WireParser};
