//! Stream Manager.
//!
//! A fixed table of open streams owned by a [`StreamManager`]. Each stream
//! wraps one byte source or sink and carries the per-stream state the readers
//! need: a byte of pushback, a bounded token pushback stack, the line counter,
//! the endianness decision of the binary reader and a pushed-back sync word.

mod source;

pub use source::*;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::process::Child;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use smallvec::SmallVec;

use crate::lexer::Token;
use crate::util::{BinaryError, Error, Result};

/// Size of the stream table.
pub const MAX_STREAMS: usize = 50;

/// Depth of the per-stream token pushback stack.
pub const TOKEN_STACK_DEPTH: usize = 4;

/// Index of an open stream in its manager's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamHandle(usize);

impl StreamHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Direction of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    Read,
    Write,
}

/// Data format carried by a stream. Only `Native` is handled by this crate;
/// the other tags route to external loaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StreamFormat {
    #[default]
    Native,
    Iges,
    Stl,
    Obj,
    GCode,
    Vrml,
}

impl StreamFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Iges => "IGES",
            Self::Stl => "STL",
            Self::Obj => "OBJ",
            Self::GCode => "G-code",
            Self::Vrml => "VRML",
        }
    }
}

/// Open flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StreamFlags {
    /// Binary format instead of text.
    pub binary: bool,
    /// Gzip compressed payload.
    pub compressed: bool,
    /// Source is a pipe to another process.
    pub pipe: bool,
}

impl StreamFlags {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn binary() -> Self {
        Self { binary: true, ..Default::default() }
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }
}

enum Output {
    Plain(Box<dyn Write>),
    Gzip(GzEncoder<Box<dyn Write>>),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Plain(w) => w,
            Self::Gzip(w) => w,
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(w) => w.finish()?.flush(),
        }
    }
}

/// Resource owned beyond the reader/writer, released on close.
enum Owner {
    None,
    Child(Child),
    Socket(TcpStream),
    Std,
}

/// One open stream and its parse state.
pub struct Stream {
    mode: StreamMode,
    format: StreamFormat,
    flags: StreamFlags,
    input: Option<Box<dyn Read>>,
    output: Option<Output>,
    owner: Owner,
    memory: Option<MemoryChannel>,
    byte_pushback: Option<u8>,
    tokens: SmallVec<[Token; TOKEN_STACK_DEPTH]>,
    line: u32,
    swap_endian: Option<bool>,
    pending_sync: Option<u32>,
}

impl Stream {
    fn open(source: StreamSource, mode: StreamMode, format: StreamFormat, mut flags: StreamFlags) -> Result<Self> {
        let mut owner = Owner::None;
        let mut memory = None;
        let mut input: Option<Box<dyn Read>> = None;
        let mut output: Option<Box<dyn Write>> = None;

        match (source, mode) {
            (StreamSource::File(f), StreamMode::Read) => input = Some(Box::new(BufReader::new(f))),
            (StreamSource::File(f), StreamMode::Write) => output = Some(Box::new(BufWriter::new(f))),
            (StreamSource::Path(path), StreamMode::Read) => {
                let file = File::open(&path).map_err(|e| {
                    if e.kind() == io::ErrorKind::NotFound {
                        Error::FileNotFound(path.clone())
                    } else {
                        Error::Io(e)
                    }
                })?;
                input = Some(open_file_reader(file)?);
            }
            (StreamSource::Path(path), StreamMode::Write) => {
                output = Some(Box::new(BufWriter::new(File::create(&path)?)));
            }
            (StreamSource::Memory(bytes), StreamMode::Read) => input = Some(Box::new(io::Cursor::new(bytes))),
            (StreamSource::Memory(bytes), StreamMode::Write) => {
                let ch = MemoryChannel::new();
                ch.push(&bytes);
                output = Some(Box::new(CallbackWriter::new(ch.write_fn())));
                memory = Some(ch);
            }
            (StreamSource::Callbacks { read, write }, mode) => match mode {
                StreamMode::Read => {
                    let read = read.ok_or_else(|| Error::invalid("callback stream opened for reading without a read callback"))?;
                    input = Some(Box::new(CallbackReader::new(read)));
                }
                StreamMode::Write => {
                    let write = write.ok_or_else(|| Error::invalid("callback stream opened for writing without a write callback"))?;
                    output = Some(Box::new(CallbackWriter::new(write)));
                }
            },
            (StreamSource::Socket(sock), mode) => {
                let (read, write, sock) = StreamSource::socket_callbacks(sock)?;
                match mode {
                    StreamMode::Read => input = Some(Box::new(CallbackReader::new(read))),
                    StreamMode::Write => output = Some(Box::new(CallbackWriter::new(write))),
                }
                owner = Owner::Socket(sock);
            }
            (StreamSource::Pipe(mut child), mode) => {
                flags.pipe = true;
                match mode {
                    StreamMode::Read => {
                        let out = child.stdout.take().ok_or_else(|| Error::invalid("child process has no captured stdout"))?;
                        input = Some(Box::new(BufReader::new(out)));
                    }
                    StreamMode::Write => {
                        let inp = child.stdin.take().ok_or_else(|| Error::invalid("child process has no captured stdin"))?;
                        output = Some(Box::new(BufWriter::new(inp)));
                    }
                }
                owner = Owner::Child(child);
            }
            (StreamSource::Stdin, StreamMode::Read) => {
                input = Some(Box::new(io::stdin()));
                owner = Owner::Std;
            }
            (StreamSource::Stdout, StreamMode::Write) => {
                output = Some(Box::new(io::stdout()));
                owner = Owner::Std;
            }
            (src @ (StreamSource::Stdin | StreamSource::Stdout), mode) => {
                return Err(Error::invalid(format!("{} cannot be opened for {mode:?}", src.describe())));
            }
        }

        let input = input.map(|r| -> Box<dyn Read> {
            if flags.compressed {
                Box::new(GzDecoder::new(r))
            } else {
                r
            }
        });
        let output = output.map(|w| {
            if flags.compressed {
                Output::Gzip(GzEncoder::new(w, Compression::default()))
            } else {
                Output::Plain(w)
            }
        });

        Ok(Self {
            mode,
            format,
            flags,
            input,
            output,
            owner,
            memory,
            byte_pushback: None,
            tokens: SmallVec::new(),
            line: 1,
            swap_endian: None,
            pending_sync: None,
        })
    }

    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    #[inline]
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    #[inline]
    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.flags.binary
    }

    /// Current 1-based line number of a text stream.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub(crate) fn next_line(&mut self) {
        self.line += 1;
    }

    /// Next raw byte, `None` at end of input.
    pub fn get_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.byte_pushback.take() {
            return Ok(Some(b));
        }
        let input = self.input.as_mut().ok_or_else(|| Error::invalid("stream not open for reading"))?;
        let mut b = [0u8; 1];
        loop {
            match input.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Push one byte back; the next `get_byte` returns it.
    pub fn unget_byte(&mut self, b: u8) {
        self.byte_pushback = Some(b);
    }

    /// Push a token back. At most [`TOKEN_STACK_DEPTH`] tokens can be pending.
    pub fn push_token(&mut self, token: Token) -> Result<()> {
        if self.tokens.len() >= TOKEN_STACK_DEPTH {
            return Err(Error::lexical(self.line, "token pushback stack overflow"));
        }
        self.tokens.push(token);
        Ok(())
    }

    /// Most recently pushed back token.
    pub fn pop_token(&mut self) -> Option<Token> {
        self.tokens.pop()
    }

    /// Endianness decision taken at the first sync word, if any yet.
    #[inline]
    pub fn swap_endian(&self) -> Option<bool> {
        self.swap_endian
    }

    pub(crate) fn set_swap_endian(&mut self, swap: bool) {
        self.swap_endian = Some(swap);
    }

    /// Push back a decoded sync word for the next object read.
    pub(crate) fn push_sync(&mut self, word: u32) {
        self.pending_sync = Some(word);
    }

    pub(crate) fn take_sync(&mut self) -> Option<u32> {
        self.pending_sync.take()
    }

    /// Read exactly `buf.len()` bytes; running short is a truncated stream.
    pub fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::Binary(BinaryError::Truncated)
            } else {
                Error::Io(e)
            }
        })
    }

    /// Write bytes to the sink.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        Ok(())
    }

    fn close(mut self, release: bool) -> Result<()> {
        let memory = self.memory.take();
        if let Some(out) = self.output.take() {
            out.finish()?;
        }
        drop(self.input.take());
        if let Some(ch) = memory {
            ch.close();
        }
        match std::mem::replace(&mut self.owner, Owner::None) {
            Owner::Child(mut child) if release => {
                let status = child.wait()?;
                tracing::debug!("pipe child exited with {status}");
            }
            Owner::Socket(sock) if release => {
                if let Err(e) = sock.shutdown(Shutdown::Both) {
                    if e.kind() != io::ErrorKind::NotConnected {
                        return Err(e.into());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.byte_pushback.take() {
            buf[0] = b;
            return Ok(1);
        }
        match self.input.as_mut() {
            Some(r) => r.read(buf),
            None => Err(io::Error::new(io::ErrorKind::Unsupported, "stream not open for reading")),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.output.as_mut() {
            Some(w) => w.writer().write(buf),
            None => Err(io::Error::new(io::ErrorKind::Unsupported, "stream not open for writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.output.as_mut() {
            Some(w) => w.writer().flush(),
            None => Ok(()),
        }
    }
}

#[cfg(feature = "mmap")]
fn open_file_reader(file: File) -> Result<Box<dyn Read>> {
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(Box::new(BufReader::new(file)));
    }
    // Safety: the file is opened read-only and the mapping lives as long as the stream
    let mmap = unsafe { memmap2::Mmap::map(&file) }?;
    Ok(Box::new(io::Cursor::new(mmap)))
}

#[cfg(not(feature = "mmap"))]
fn open_file_reader(file: File) -> Result<Box<dyn Read>> {
    Ok(Box::new(BufReader::new(file)))
}

/// Table of open streams.
pub struct StreamManager {
    slots: Vec<Option<Stream>>,
    high_water: usize,
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamManager {
    pub fn new() -> Self {
        Self { slots: (0..MAX_STREAMS).map(|_| None).collect(), high_water: 0 }
    }

    /// Open a stream over `source` in the first free slot.
    pub fn open(
        &mut self,
        source: StreamSource,
        mode: StreamMode,
        format: StreamFormat,
        flags: StreamFlags,
    ) -> Result<StreamHandle> {
        let idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::StreamTableFull(MAX_STREAMS))?;
        let kind = source.describe();
        let stream = Stream::open(source, mode, format, flags)?;
        self.slots[idx] = Some(stream);
        self.high_water = self.high_water.max(idx + 1);
        tracing::trace!("opened {kind} stream {idx} for {mode:?} ({})", format.name());
        Ok(StreamHandle(idx))
    }

    /// Close a stream. With `release`, owned resources are shut down too:
    /// pipe children are waited for and sockets are shut down.
    pub fn close(&mut self, handle: StreamHandle, release: bool) -> Result<()> {
        let stream = self
            .slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(Error::InvalidHandle(handle.0))?;
        while self.high_water > 0 && self.slots[self.high_water - 1].is_none() {
            self.high_water -= 1;
        }
        tracing::trace!("closing stream {}", handle.0);
        stream.close(release)
    }

    /// Open stream for a handle.
    pub fn get_mut(&mut self, handle: StreamHandle) -> Result<&mut Stream> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidHandle(handle.0))
    }

    pub fn get(&self, handle: StreamHandle) -> Result<&Stream> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidHandle(handle.0))
    }

    /// Open stream for reading in the native format.
    pub fn reader(&mut self, handle: StreamHandle) -> Result<&mut Stream> {
        let stream = self.get_mut(handle)?;
        if stream.mode != StreamMode::Read {
            return Err(Error::WrongMode(handle.0, "reading"));
        }
        if stream.format != StreamFormat::Native {
            return Err(Error::ForeignFormat(stream.format.name().to_string()));
        }
        Ok(stream)
    }

    /// Open stream for writing in the native format.
    pub fn writer(&mut self, handle: StreamHandle) -> Result<&mut Stream> {
        let stream = self.get_mut(handle)?;
        if stream.mode != StreamMode::Write {
            return Err(Error::WrongMode(handle.0, "writing"));
        }
        if stream.format != StreamFormat::Native {
            return Err(Error::ForeignFormat(stream.format.name().to_string()));
        }
        Ok(stream)
    }

    /// Bytes written so far to an in-memory sink.
    pub fn take_memory(&mut self, handle: StreamHandle) -> Result<Vec<u8>> {
        let stream = self.get_mut(handle)?;
        stream.flush()?;
        stream
            .memory
            .as_ref()
            .map(MemoryChannel::take)
            .ok_or_else(|| Error::invalid(format!("stream {} is not a memory sink", handle.0)))
    }

    /// One past the highest slot in use.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Number of open streams.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
