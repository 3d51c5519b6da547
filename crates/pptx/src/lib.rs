//! PPTX (Office Open XML) loader for deckscan.
//!
//! Reads .pptx files, which are ZIP archives of XML parts, into the
//! shape-tree model defined by `deckscan-core`: slides in presentation
//! order, text bodies with run font sizes, tables, charts resolved through
//! their relationships, and embedded picture payloads.

mod chart;
mod package;
pub mod parser;
mod slide;
mod text;
mod xml;

pub use parser::PptxParser;
