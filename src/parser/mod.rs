//! Turns flat store listings into configuration mappings.

mod tree_parser;

pub use tree_parser::*;
