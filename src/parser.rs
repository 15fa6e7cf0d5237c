//! Top-level read and write entry points.
//!
//! A [`Parser`] owns the stream table, the options and the error handler.
//! Errors from the low-level readers and writers propagate as `Result`s; at
//! this boundary every error is first handed to the installed handler and
//! then returned, so a read or write either succeeds completely or leaves
//! nothing behind.

use std::path::Path;

use crate::ascii;
use crate::binary::{self, LeafHook};
use crate::config::ParserConfig;
use crate::hierarchy::{eliminate_degenerate_list, flatten_hierarchy, propagate_attributes, resolve_instances};
use crate::object::Object;
use crate::stream::{StreamFlags, StreamFormat, StreamHandle, StreamManager, StreamMode, StreamSource};
use crate::util::{Error, Result};

/// Extension that selects the binary format for file entry points.
pub const BINARY_EXTENSION: &str = "ibd";

/// Receives every error at the top-level boundary.
pub type ErrorHandler = Box<dyn FnMut(&Error)>;

fn default_error_handler() -> ErrorHandler {
    Box::new(|e: &Error| tracing::error!(kind = ?e.kind(), line = ?e.line(), "{e}"))
}

/// Reader/writer context.
pub struct Parser {
    streams: StreamManager,
    config: ParserConfig,
    error_handler: ErrorHandler,
    binary_leaf_hook: Option<Box<LeafHook<'static>>>,
    last_read: Option<Object>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            streams: StreamManager::new(),
            config,
            error_handler: default_error_handler(),
            binary_leaf_hook: None,
            last_read: None,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ParserConfig {
        &mut self.config
    }

    pub fn streams(&self) -> &StreamManager {
        &self.streams
    }

    pub fn streams_mut(&mut self) -> &mut StreamManager {
        &mut self.streams
    }

    /// Replace the error handler. Returns the previous one.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) -> ErrorHandler {
        std::mem::replace(&mut self.error_handler, handler)
    }

    /// Hook run on every top-level object of a binary read.
    pub fn set_binary_leaf_hook(&mut self, hook: Option<Box<LeafHook<'static>>>) {
        self.binary_leaf_hook = hook;
    }

    /// Result of the last successful read.
    pub fn last_read(&self) -> Option<&Object> {
        self.last_read.as_ref()
    }

    pub fn open(
        &mut self,
        source: StreamSource,
        mode: StreamMode,
        format: StreamFormat,
        flags: StreamFlags,
    ) -> Result<StreamHandle> {
        let res = self.streams.open(source, mode, format, flags);
        self.report(res)
    }

    pub fn close(&mut self, handle: StreamHandle) -> Result<()> {
        let res = self.streams.close(handle, true);
        self.report(res)
    }

    fn report<T>(&mut self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            (self.error_handler)(e);
        }
        res
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read every object of an open stream, in the format its flags name,
    /// and post-process the result as configured.
    #[tracing::instrument(skip_all, fields(handle = handle.index()))]
    pub fn read_all_objects(&mut self, handle: StreamHandle) -> Result<Object> {
        let res = self.read_raw(handle).and_then(|obj| self.post_process(obj));
        let obj = self.report(res)?;
        self.last_read = Some(obj.clone());
        Ok(obj)
    }

    fn read_raw(&mut self, handle: StreamHandle) -> Result<Object> {
        if self.streams.get(handle)?.is_binary() {
            binary::read_objects(&mut self.streams, handle, false, self.binary_leaf_hook.as_deref_mut())
        } else {
            ascii::read_objects(&mut self.streams, handle, &self.config)
        }
    }

    fn post_process(&self, mut obj: Object) -> Result<Object> {
        let cfg = &self.config;
        if cfg.resolve_instances {
            obj = resolve_instances(obj, cfg.strict_instances)?;
        }
        if cfg.propagate_attrs {
            propagate_attributes(&mut obj, None);
        }
        if cfg.flatten_tree {
            obj = Object::list(flatten_hierarchy(obj, cfg.flatten_invisible, None));
        }
        if cfg.eliminate_degenerate {
            obj = eliminate_degenerate_list(obj)?;
        }
        Ok(obj)
    }

    /// Read a file; `.ibd` files are binary, everything else text.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<Object> {
        let path = path.as_ref();
        let flags = flags_for(path);
        self.read_source(StreamSource::Path(path.to_path_buf()), flags)
    }

    /// Read objects from text.
    pub fn read_str(&mut self, text: &str) -> Result<Object> {
        self.read_source(StreamSource::Memory(text.as_bytes().to_vec()), StreamFlags::text())
    }

    /// Read objects from binary records.
    pub fn read_binary_bytes(&mut self, bytes: &[u8]) -> Result<Object> {
        self.read_source(StreamSource::Memory(bytes.to_vec()), StreamFlags::binary())
    }

    fn read_source(&mut self, source: StreamSource, flags: StreamFlags) -> Result<Object> {
        let handle = self.open(source, StreamMode::Read, StreamFormat::Native, flags)?;
        let res = self.read_all_objects(handle);
        let closed = self.close(handle);
        let obj = res?;
        closed?;
        Ok(obj)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write objects to an open stream in the format its flags name. Text
    /// output starts at `indent` and is preceded by `comment`, if any.
    pub fn write_objects(
        &mut self,
        objects: &[Object],
        handle: StreamHandle,
        indent: usize,
        comment: Option<&str>,
    ) -> Result<()> {
        let res = match self.streams.get(handle) {
            Ok(s) if s.is_binary() => binary::write_objects(&mut self.streams, handle, objects, self.config.byte_order),
            Ok(_) => ascii::write_objects(&mut self.streams, handle, objects, indent, comment, &self.config),
            Err(e) => Err(e),
        };
        self.report(res)
    }

    /// Write binary records to an open stream regardless of its flags.
    pub fn write_binary(&mut self, objects: &[Object], handle: StreamHandle) -> Result<()> {
        let res = binary::write_objects(&mut self.streams, handle, objects, self.config.byte_order);
        self.report(res)
    }

    /// Write a file, replacing it; `.ibd` files are binary, everything else text.
    pub fn write_file(&mut self, objects: &[Object], path: impl AsRef<Path>, comment: Option<&str>) -> Result<()> {
        let path = path.as_ref();
        let handle = self.open(
            StreamSource::Path(path.to_path_buf()),
            StreamMode::Write,
            StreamFormat::Native,
            flags_for(path),
        )?;
        let res = self.write_objects(objects, handle, 0, comment);
        let closed = self.close(handle);
        res?;
        closed
    }

    /// Render objects as text.
    pub fn write_string(&mut self, objects: &[Object]) -> Result<String> {
        let res = ascii::to_string(objects, &self.config);
        self.report(res)
    }

    /// Render objects as binary records.
    pub fn write_bytes(&mut self, objects: &[Object]) -> Result<Vec<u8>> {
        let res = binary::to_bytes(objects, self.config.byte_order);
        self.report(res)
    }
}

fn flags_for(path: &Path) -> StreamFlags {
    let binary = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BINARY_EXTENSION));
    if binary {
        StreamFlags::binary()
    } else {
        StreamFlags::text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_read_str_unwraps_single() {
        let mut p = Parser::new();
        let obj = p.read_str("[OBJECT A [NUMBER 3.5]]").unwrap();
        assert_eq!(obj.name(), "A");
        assert_eq!(obj.kind, ObjectKind::Numeric(3.5));
        assert!(p.last_read().is_some());
    }

    #[test]
    fn test_empty_input_is_empty_file() {
        let mut p = Parser::new();
        assert!(matches!(p.read_str("  # nothing\n"), Err(Error::EmptyFile)));
        let raw = Parser::with_config(ParserConfig::raw()).read_str("").unwrap();
        assert_eq!(raw, Object::list(vec![]));
    }

    #[test]
    fn test_error_handler_sees_errors() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut p = Parser::new();
        p.set_error_handler(Box::new(move |e: &Error| sink.borrow_mut().push(e.line())));

        assert!(p.read_str("[OBJECT A\n[NUMBER x]]").is_err());
        assert_eq!(*seen.borrow(), [Some(2)]);
        assert!(p.last_read().is_none());
    }

    #[test]
    fn test_binary_leaf_hook() {
        let mut p = Parser::with_config(ParserConfig::raw());
        let bytes = p
            .write_bytes(&[
                Object::new(ObjectKind::Numeric(1.0)),
                Object::new(ObjectKind::String("drop me".into())),
            ])
            .unwrap();
        p.set_binary_leaf_hook(Some(Box::new(|o: Object| {
            matches!(o.kind, ObjectKind::Numeric(_)).then_some(o)
        })));
        let back = p.read_binary_bytes(&bytes).unwrap();
        assert_eq!(back.children(), [Object::new(ObjectKind::Numeric(1.0))]);
    }

    #[test]
    fn test_flags_for_extension() {
        assert!(flags_for(Path::new("a/b.IBD")).binary);
        assert!(!flags_for(Path::new("a/b.itd")).binary);
        assert!(!flags_for(Path::new("noext")).binary);
    }
}
