//! Reader and writer options.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::binary::Endian;

/// Options shared by the readers, writers and the post-processing passes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    // Post-processing of a read
    pub flatten_tree: bool,
    pub propagate_attrs: bool,
    pub flatten_invisible: bool,
    pub resolve_instances: bool,
    pub eliminate_degenerate: bool,
    /// Missing instance targets fail the read instead of warning.
    pub strict_instances: bool,

    /// Close polygon vertex lists into rings on read.
    pub poly_list_circular: bool,

    // Text output
    pub indent_step: usize,
    pub knots_per_line: usize,

    // Binary output
    pub byte_order: Endian,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            flatten_tree: false,
            propagate_attrs: true,
            flatten_invisible: false,
            resolve_instances: true,
            eliminate_degenerate: true,
            strict_instances: false,
            poly_list_circular: false,
            indent_step: 4,
            knots_per_line: 8,
            byte_order: Endian::Native,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the raw list as read, with no post-processing.
    pub fn raw() -> Self {
        Self {
            propagate_attrs: false,
            resolve_instances: false,
            eliminate_degenerate: false,
            ..Self::default()
        }
    }

    pub fn with_flatten_tree(mut self, flatten: bool) -> Self {
        self.flatten_tree = flatten;
        self
    }

    pub fn with_propagate_attrs(mut self, propagate: bool) -> Self {
        self.propagate_attrs = propagate;
        self
    }

    pub fn with_flatten_invisible(mut self, invisible: bool) -> Self {
        self.flatten_invisible = invisible;
        self
    }

    pub fn with_resolve_instances(mut self, resolve: bool) -> Self {
        self.resolve_instances = resolve;
        self
    }

    pub fn with_eliminate_degenerate(mut self, eliminate: bool) -> Self {
        self.eliminate_degenerate = eliminate;
        self
    }

    pub fn with_strict_instances(mut self, strict: bool) -> Self {
        self.strict_instances = strict;
        self
    }

    pub fn with_poly_list_circular(mut self, circular: bool) -> Self {
        self.poly_list_circular = circular;
        self
    }

    pub fn with_indent_step(mut self, step: usize) -> Self {
        self.indent_step = step;
        self
    }

    pub fn with_knots_per_line(mut self, n: usize) -> Self {
        self.knots_per_line = n.max(1);
        self
    }

    pub fn with_byte_order(mut self, order: Endian) -> Self {
        self.byte_order = order;
        self
    }

    /// Load options from a JSON file. Missing fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| crate::Error::invalid(format!("bad config: {e}")))
    }

    /// Save options as pretty JSON.
    #[cfg(feature = "serde")]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::invalid(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let cfg = ParserConfig::new().with_knots_per_line(0).with_flatten_tree(true);
        assert_eq!(cfg.knots_per_line, 1);
        assert!(cfg.flatten_tree);
        assert!(!ParserConfig::raw().resolve_instances);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let cfg = ParserConfig::new().with_byte_order(Endian::Big).with_indent_step(2);
        cfg.save(&path).unwrap();
        assert_eq!(ParserConfig::load(&path).unwrap(), cfg);

        std::fs::write(&path, r#"{ "flatten_tree": true }"#).unwrap();
        let partial = ParserConfig::load(&path).unwrap();
        assert!(partial.flatten_tree);
        assert_eq!(partial.knots_per_line, 8);
    }
}
