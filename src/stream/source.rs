//! Byte sources and sinks behind a stream.
//!
//! Callback sources poll: a read callback answers `Poll::Pending` when no
//! byte is available yet and the stream sleeps [`POLL_INTERVAL`] before asking
//! again, so a single-threaded host loop is never blocked inside the callback.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::Child;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use parking_lot::Mutex;

/// Sleep between polls of a callback source with no data.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Non-blocking read of one byte. `Ready(None)` is end of input.
pub type ReadFn = Box<dyn FnMut() -> io::Result<Poll<Option<u8>>>>;

/// Write a block, returning how many bytes were accepted.
pub type WriteFn = Box<dyn FnMut(&[u8]) -> io::Result<usize>>;

/// Where a stream gets or puts its bytes.
pub enum StreamSource {
    /// An already opened file.
    File(File),
    /// A path, opened according to the stream mode.
    Path(PathBuf),
    /// In-memory input.
    Memory(Vec<u8>),
    /// Host supplied callbacks.
    Callbacks { read: Option<ReadFn>, write: Option<WriteFn> },
    /// A connected socket, driven through the callback form.
    Socket(TcpStream),
    /// A child process: reads its stdout or writes its stdin.
    Pipe(Child),
    /// Process standard input. Never closed.
    Stdin,
    /// Process standard output. Never closed.
    Stdout,
}

impl StreamSource {
    /// Callback source reading from a [`MemoryChannel`].
    pub fn channel_reader(channel: &MemoryChannel) -> Self {
        Self::Callbacks { read: Some(channel.read_fn()), write: None }
    }

    /// Callback sink writing into a [`MemoryChannel`].
    pub fn channel_writer(channel: &MemoryChannel) -> Self {
        Self::Callbacks { read: None, write: Some(channel.write_fn()) }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Path(_) => "path",
            Self::Memory(_) => "memory",
            Self::Callbacks { .. } => "callbacks",
            Self::Socket(_) => "socket",
            Self::Pipe(_) => "pipe",
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
        }
    }

    /// Socket wrapped into the callback form. The returned clone is kept by
    /// the stream so closing can shut the connection down.
    pub(crate) fn socket_callbacks(sock: TcpStream) -> io::Result<(ReadFn, WriteFn, TcpStream)> {
        sock.set_nonblocking(true)?;
        let mut rd = sock.try_clone()?;
        let mut wr = sock.try_clone()?;
        let read: ReadFn = Box::new(move || {
            let mut b = [0u8; 1];
            match rd.read(&mut b) {
                Ok(0) => Ok(Poll::Ready(None)),
                Ok(_) => Ok(Poll::Ready(Some(b[0]))),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Poll::Pending),
                Err(e) => Err(e),
            }
        });
        let write: WriteFn = Box::new(move |buf| match wr.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            r => r,
        });
        Ok((read, write, sock))
    }
}

/// `Read` over a polling read callback.
pub(crate) struct CallbackReader {
    read: ReadFn,
}

impl CallbackReader {
    pub(crate) fn new(read: ReadFn) -> Self {
        Self { read }
    }
}

impl Read for CallbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match (self.read)()? {
                Poll::Ready(Some(b)) => {
                    buf[0] = b;
                    return Ok(1);
                }
                Poll::Ready(None) => return Ok(0),
                Poll::Pending => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

/// `Write` over a block write callback; a callback accepting nothing is
/// retried after a short sleep.
pub(crate) struct CallbackWriter {
    write: WriteFn,
}

impl CallbackWriter {
    pub(crate) fn new(write: WriteFn) -> Self {
        Self { write }
    }
}

impl Write for CallbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = (self.write)(buf)?;
            if n > 0 {
                return Ok(n);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ChannelState {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// In-memory byte channel exposing the callback pair, for embedding the
/// reader/writer in a host application.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel pre-filled with bytes and already closed for writing.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let ch = Self::new();
        {
            let mut st = ch.inner.lock();
            st.bytes.extend(bytes);
            st.closed = true;
        }
        ch
    }

    /// Append bytes.
    pub fn push(&self, bytes: &[u8]) {
        self.inner.lock().bytes.extend(bytes);
    }

    /// Mark end of input: readers see EOF once the buffer drains.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Drain everything buffered so far.
    pub fn take(&self) -> Vec<u8> {
        self.inner.lock().bytes.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking read callback.
    pub fn read_fn(&self) -> ReadFn {
        let inner = self.inner.clone();
        Box::new(move || {
            let mut st = inner.lock();
            Ok(match st.bytes.pop_front() {
                Some(b) => Poll::Ready(Some(b)),
                None if st.closed => Poll::Ready(None),
                None => Poll::Pending,
            })
        })
    }

    /// Block write callback.
    pub fn write_fn(&self) -> WriteFn {
        let inner = self.inner.clone();
        Box::new(move |buf| {
            inner.lock().bytes.extend(buf);
            Ok(buf.len())
        })
    }
}
