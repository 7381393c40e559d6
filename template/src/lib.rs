#[macro_use]
mod macros;
mod parse;
pub use parse::{parse, Piece};
mod render;
pub use render::{Error, Lookup, Template};
