//! Small `Read` adapters the pipeline is stitched together with.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::data::BlobInfo;
use crate::error::SourceReadError;

/// Boxed reader travelling through the pipeline.
pub type BoxRead = Box<dyn Read + Send>;

/// An input of the copy pipeline in progress of being built: the bytes
/// available now and what we know about them.
pub struct SourceStream {
    pub reader: BoxRead,
    /// Describes exactly the bytes `reader` yields.
    pub info: BlobInfo,
}

impl SourceStream {
    pub fn new(reader: BoxRead, info: BlobInfo) -> Self { Self { reader, info } }

    /// Replace the reader with one built on top of it.
    pub fn wrap(&mut self, f: impl FnOnce(BoxRead) -> BoxRead) {
        let inner = std::mem::replace(&mut self.reader, Box::new(io::empty()));
        self.reader = f(inner);
    }

    /// Like [`wrap`](Self::wrap), for wrappers that can fail. On failure the
    /// stream is left with an empty reader; it must not be used any more.
    pub fn try_wrap<E>(&mut self, f: impl FnOnce(BoxRead) -> Result<BoxRead, E>) -> Result<(), E> {
        let inner = std::mem::replace(&mut self.reader, Box::new(io::empty()));
        self.reader = f(inner)?;
        Ok(())
    }
}

/// Copies everything read from `reader` into `writer`.
///
/// A failed write is reported as a failed read.
pub struct TeeReader<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> TeeReader<R, W> {
    pub fn new(reader: R, writer: W) -> Self { Self { reader, writer } }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.writer.write_all(&buf[..n])?;
        } else if !buf.is_empty() {
            self.writer.flush()?;
        }
        Ok(n)
    }
}

/// A reader with two handles: one stays in the pipeline, the other lets the
/// copier keep reading from the same point after the sink is done.
#[derive(Clone)]
pub struct SharedReader(Arc<Mutex<BoxRead>>);

impl SharedReader {
    pub fn new(reader: BoxRead) -> Self { Self(Arc::new(Mutex::new(reader))) }
}

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self
            .0
            .lock()
            .map_err(|_| io::Error::other("shared reader poisoned by a panicking reader"))?;
        reader.read(buf)
    }
}

/// Wraps the reader handed to the sink so read errors are recognisable as
/// source failures rather than sink failures.
pub struct ErrorAnnotationReader<R> {
    reader: R,
}

impl<R> ErrorAnnotationReader<R> {
    pub fn new(reader: R) -> Self { Self { reader } }
}

impl<R: Read> Read for ErrorAnnotationReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf).map_err(SourceReadError::wrap)
    }
}
