//! # cagd-io
//!
//! Geometric object model of a CAGD kernel and its paired text and binary
//! persistence formats.
//!
//! ## Modules
//!
//! - [`util`] - Errors, matrices and numeric text conventions
//! - [`object`] - The object model (curves, surfaces, trimmed models, polygons, ...)
//! - [`stream`] - Stream table over files, memory, callbacks, sockets and pipes
//! - [`lexer`] - Tokens of the text format
//! - [`ascii`] - Text reader and writer
//! - [`binary`] - Binary reader and writer with byte order detection
//! - [`hierarchy`] - Attribute propagation, flattening, instance resolution
//! - [`parser`] - Top-level entry points and error reporting
//! - [`config`] - Reader and writer options
//! - [`eval`] - Curve evaluation
//!
//! ## Example
//!
//! ```ignore
//! use cagd_io::prelude::*;
//!
//! let mut parser = Parser::new();
//! let obj = parser.read_str("[CURVE BSPLINE [4 3 E2 [KV 0 0 0 1 2 2 2] [0 0][1 1][2 0][3 1]]]")?;
//! parser.write_file(&[obj], "curve.ibd", None)?;
//! ```

pub mod util;
pub mod object;
pub mod stream;
pub mod lexer;
pub mod ascii;
pub mod binary;
pub mod hierarchy;
pub mod parser;
pub mod config;
pub mod eval;

// Re-export commonly used types
pub use util::{Error, ErrorKind, Result};
pub use config::ParserConfig;
pub use parser::Parser;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, ErrorKind, Result};
    pub use crate::object::*;
    pub use crate::stream::{MemoryChannel, StreamFlags, StreamFormat, StreamHandle, StreamManager, StreamMode, StreamSource};
    pub use crate::binary::Endian;
    pub use crate::hierarchy::{eliminate_degenerate_list, flatten_hierarchy, propagate_attributes, resolve_instances};
    pub use crate::config::ParserConfig;
    pub use crate::parser::Parser;
    pub use crate::eval::{BasisEvaluator, Evaluator};
}
