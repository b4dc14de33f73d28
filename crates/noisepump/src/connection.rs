//! One open byte stream plus the state the pump needs alongside it.

use std::time::{Duration, Instant};

use noisepump_core::wire::DEFAULT_SCRATCH_CAPACITY;

use crate::error::{Error, Result};

/// Fixed-capacity staging area for bytes read off the socket.
///
/// Zeroed before every read. Its contents are only ever handed to the
/// engine, never to the caller.
pub struct ScratchBuffer {
    buf: Box<[u8]>,
}

impl ScratchBuffer {
    /// A buffer of `capacity` bytes. A capacity of 0 is raised to 1: a
    /// zero-length read buffer would make every read look like end of
    /// stream.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Zero the whole buffer and return it for the next read.
    pub(crate) fn zeroed(&mut self) -> &mut [u8] {
        self.buf.fill(0);
        &mut self.buf
    }

    pub(crate) fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_CAPACITY)
    }
}

/// A connected stream, owned by the caller for its whole lifetime.
///
/// The pump and drivers borrow it mutably for each operation and never
/// close it. `S` is any blocking byte stream; in production a
/// `std::net::TcpStream`.
pub struct Connection<S> {
    stream: S,
    scratch: ScratchBuffer,
    deadline: Option<Instant>,
}

impl<S> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self::with_capacity(stream, DEFAULT_SCRATCH_CAPACITY)
    }

    pub fn with_capacity(stream: S, scratch_capacity: usize) -> Self {
        Self {
            stream,
            scratch: ScratchBuffer::new(scratch_capacity),
            deadline: None,
        }
    }

    /// Abort driver loops with [`Error::Timeout`] once `deadline` passes.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Convenience for `set_deadline(Some(now + timeout))`.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.deadline = timeout.map(|t| Instant::now() + t);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Checked between pump steps.
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(Error::Timeout),
            _ => Ok(()),
        }
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub(crate) fn parts(&mut self) -> (&mut S, &mut ScratchBuffer) {
        (&mut self.stream, &mut self.scratch)
    }
}
