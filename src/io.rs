//! I/O wrappers that count transferred bytes.
//!
//! [`ProgressReader`] and [`ProgressWriter`] wrap any [`std::io::Read`] or
//! [`std::io::Write`] and add every byte that passes through to a [`ByteProgress`].
//! The item counter is left alone, so a copy loop can advance it once per file while
//! the wrappers account for the bytes.
//!
//! The overhead is a single atomic addition per `read` or `write` call.

use std::io::{self, Read, Write};

use crate::bytes::ByteProgress;

/// A wrapper around [`Read`] that counts bytes read.
pub struct ProgressReader<R> {
    inner: R,
    progress: ByteProgress,
}

impl<R> ProgressReader<R> {
    /// Wraps `inner`, reporting into `progress`.
    pub const fn new(inner: R, progress: ByteProgress) -> Self {
        Self { inner, progress }
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    #[allow(clippy::cast_possible_wrap)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.add_bytes(n as i64);
        Ok(n)
    }
}

/// A wrapper around [`Write`] that counts bytes written.
pub struct ProgressWriter<W> {
    inner: W,
    progress: ByteProgress,
}

impl<W> ProgressWriter<W> {
    /// Wraps `inner`, reporting into `progress`.
    pub const fn new(inner: W, progress: ByteProgress) -> Self {
        Self { inner, progress }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    #[allow(clippy::cast_possible_wrap)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.progress.add_bytes(n as i64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
