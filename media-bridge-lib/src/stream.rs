//! Seekable pull-stream over a remote streaming object
//!
//! State machine: `Unopened -> Open -> Closed`. Read and seek errors are
//! reported to the caller and never close the stream on their own.

use log::debug;

use crate::error::{Error, Result};
use crate::marshal::remote_count;
use crate::remote::StreamBinding;
use crate::session::Session;
use crate::types::{InterruptSignal, NeverInterrupted, OptionSet, StreamConfig};

pub const AVIO_FLAG_READ: i32 = 1;
pub const AVIO_FLAG_WRITE: i32 = 2;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;
pub const AVSEEK_SIZE: i32 = 0x10000;
pub const AVSEEK_FORCE: i32 = 0x20000;

/// The four conventional seek modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
    /// Query the stream size without moving.
    Size,
}

impl Whence {
    /// Parses a host whence code, ignoring the `AVSEEK_FORCE` hint.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw & !AVSEEK_FORCE {
            SEEK_SET => Some(Whence::Set),
            SEEK_CUR => Some(Whence::Current),
            SEEK_END => Some(Whence::End),
            AVSEEK_SIZE => Some(Whence::Size),
            _ => None,
        }
    }

    /// Code passed verbatim to the remote `seek`.
    pub fn code(self) -> i32 {
        match self {
            Whence::Set => SEEK_SET,
            Whence::Current => SEEK_CUR,
            Whence::End => SEEK_END,
            Whence::Size => AVSEEK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Unopened,
    Open,
    Closed,
}

/// Outcome of one `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    Data(usize),
    EndOfStream,
}

/// Outcome of one `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seeked {
    Position(u64),
    EndOfStream,
}

pub struct StreamReader<B: StreamBinding, I: InterruptSignal = NeverInterrupted> {
    session: Session<B>,
    buffer: Option<B::Buffer>,
    capacity: usize,
    headers: Option<String>,
    mime_type: Option<String>,
    interrupt: I,
    state: StreamState,
}

impl<B: StreamBinding, I: InterruptSignal> StreamReader<B, I> {
    pub fn new(binding: B, capacity: usize, interrupt: I) -> Result<Self> {
        if capacity == 0 || i32::try_from(capacity).is_err() {
            return Err(Error::Config(format!(
                "transfer buffer capacity {} out of range",
                capacity
            )));
        }
        Ok(StreamReader {
            session: Session::new(binding),
            buffer: None,
            capacity,
            headers: None,
            mime_type: None,
            interrupt,
            state: StreamState::Unopened,
        })
    }

    pub fn from_config(binding: B, config: &StreamConfig, interrupt: I) -> Result<Self> {
        Self::new(binding, config.segment_size, interrupt)
    }

    /// Raw header block forwarded verbatim to the remote constructor.
    pub fn set_headers(&mut self, headers: Option<String>) {
        self.headers = headers;
    }

    pub fn headers(&self) -> Option<&str> {
        self.headers.as_deref()
    }

    /// MIME type reported by the remote side after a successful open.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn binding(&self) -> &B {
        self.session.binding()
    }

    pub fn open(&mut self, uri: &str, flags: i32, options: &OptionSet) -> Result<()> {
        if self.state != StreamState::Unopened {
            return Err(Error::invalid_argument("stream already opened"));
        }
        if flags & AVIO_FLAG_WRITE != 0 {
            return Err(Error::invalid_argument("stream bridge is read-only"));
        }
        self.check_interrupt("open")?;

        let headers = self.headers.as_deref();
        self.session.open(|binding| binding.construct(uri, headers))?;

        let capacity = self.capacity;
        let allocated = match self.session.parts() {
            Some((binding, _)) => binding.new_buffer(capacity),
            None => Err(Error::invalid_argument("session not open")),
        };
        match allocated {
            Ok(buffer) => self.buffer = Some(buffer),
            Err(e) => {
                self.rollback(false);
                return Err(e);
            }
        }

        if let Err(e) = self.check_interrupt("open") {
            self.rollback(false);
            return Err(e);
        }

        let status = match self.session.parts() {
            Some((binding, instance)) => {
                let map = if binding.supports_option_map() {
                    Some(options)
                } else {
                    if !options.is_empty() {
                        debug!("remote open takes no option map, {} options dropped", options.len());
                    }
                    None
                };
                binding.open(instance, map)
            }
            None => Err(Error::invalid_argument("session not open")),
        };
        match status {
            Ok(0) => {}
            Ok(code) => {
                self.rollback(false);
                return Err(Error::RemoteOpen(format!("remote open returned {}", code)));
            }
            Err(e) => {
                self.rollback(false);
                return Err(match e {
                    Error::RemoteCall(msg) => Error::RemoteOpen(msg),
                    other => other,
                });
            }
        }

        if let Err(e) = self.check_interrupt("open") {
            self.rollback(true);
            return Err(e);
        }

        self.mime_type = match self.session.parts() {
            Some((binding, instance)) => binding.mime_type(instance).unwrap_or_else(|e| {
                debug!("mime type query failed: {}", e);
                None
            }),
            None => None,
        };

        debug!("opened {} (mime {:?})", uri, self.mime_type);
        self.state = StreamState::Open;
        Ok(())
    }

    /// Reads at most `min(dst.len(), capacity)` bytes with a single remote
    /// call. The caller issues further reads for larger requests.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<Chunk> {
        self.ensure_open()?;
        self.check_interrupt("read")?;
        if dst.is_empty() {
            return Ok(Chunk::Data(0));
        }

        let chunk = dst.len().min(self.capacity);
        let (binding, instance) = self
            .session
            .parts()
            .ok_or_else(|| Error::invalid_argument("session not open"))?;
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::invalid_argument("transfer buffer missing"))?;

        let count = match binding.read(instance, buffer, chunk) {
            Ok(count) => count,
            Err(Error::RemoteCall(msg)) => {
                debug!("remote read raised, ending stream: {}", msg);
                return Ok(Chunk::EndOfStream);
            }
            Err(e) => return Err(e),
        };

        let Some(n) = remote_count(count) else {
            return Ok(Chunk::EndOfStream);
        };
        if n > chunk {
            return Err(Error::RemoteCall(format!(
                "remote read returned {} bytes for a {} byte request",
                n, chunk
            )));
        }

        binding.copy_out(buffer, &mut dst[..n])?;
        Ok(Chunk::Data(n))
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<Seeked> {
        self.ensure_open()?;
        self.check_interrupt("seek")?;

        let (binding, instance) = self
            .session
            .parts()
            .ok_or_else(|| Error::invalid_argument("session not open"))?;
        let position = binding
            .seek(instance, offset, whence.code())
            .map_err(|e| match e {
                Error::RemoteCall(msg) => Error::InvalidArgument(msg),
                other => other,
            })?;

        if position < 0 {
            Ok(Seeked::EndOfStream)
        } else {
            Ok(Seeked::Position(position as u64))
        }
    }

    /// Closes the remote object, then releases the transfer buffer and the
    /// handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == StreamState::Open {
            self.state = StreamState::Closed;
        }
        let buffer = self.buffer.take();
        self.session.close_with(|binding| {
            if let Some(buffer) = buffer {
                binding.release_buffer(buffer);
            }
        })
    }

    fn rollback(&mut self, remote_close: bool) {
        let buffer = self.buffer.take();
        let release = |binding: &mut B| {
            if let Some(buffer) = buffer {
                binding.release_buffer(buffer);
            }
        };
        if remote_close {
            let _ = self.session.close_with(release);
        } else {
            self.session.abandon_with(release);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            StreamState::Open => Ok(()),
            state => Err(Error::InvalidArgument(format!("stream is {:?}", state))),
        }
    }

    fn check_interrupt(&self, op: &str) -> Result<()> {
        if self.interrupt.is_interrupted() {
            debug!("{} interrupted", op);
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

impl<B: StreamBinding, I: InterruptSignal> Drop for StreamReader<B, I> {
    fn drop(&mut self) {
        if self.session.is_open() {
            let _ = self.close();
        }
    }
}
