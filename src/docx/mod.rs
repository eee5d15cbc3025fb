//! Office Open XML word-processing packages: XML helpers, the element
//! assembler, the zip package writer and the separator-symbol reader.
//!
//! Reading a reference package lives in [`crate::style::extract`]; apart
//! from [`symbols`], this module is the writing side.

pub mod assemble;
pub mod package;
pub mod symbols;
pub mod xml;

pub use assemble::assemble;
pub use package::OutputDocument;
pub use symbols::{SeparatorImage, SeparatorMark};
