//! Classification of the raw "currently playing" title into a movie or an
//! episode lookup key.

pub mod parser;
pub mod title;

pub use parser::{parse, parse_with, PatternPriority};
pub use title::ParsedTitle;
