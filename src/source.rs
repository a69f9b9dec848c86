//! Refillable byte source abstraction

use std::io;

/// A capability to pull more bytes into the reader window.
///
/// `fill` writes into `dst` and reports `Some(n)` for `n` bytes produced
/// (`Some(0)` is a short but successful read; callers loop) or `None` once
/// the source is exhausted.
pub trait Filler {
    /// Pulls up to `dst.len()` bytes into `dst`
    fn fill(&mut self, dst: &mut [u8]) -> io::Result<Option<usize>>;
}

/// Any `io::Read` is a filler; `Ok(0)` from a reader means end of stream
/// per the std contract, so it maps to `None`.
impl<R: io::Read> Filler for R {
    #[inline]
    fn fill(&mut self, dst: &mut [u8]) -> io::Result<Option<usize>> {
        match self.read(dst) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(n)),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(Some(0)),
            Err(e) => Err(e),
        }
    }
}

/// Adapter turning a closure into a [`Filler`], for sources with refill
/// behavior `io::Read` cannot express (short reads that are not end of
/// stream)
pub struct FnFiller(Box<dyn FnMut(&mut [u8]) -> io::Result<Option<usize>>>);

impl FnFiller {
    /// Wraps `f`; each call services one fill request
    pub fn new<F>(f: F) -> FnFiller
    where
        F: FnMut(&mut [u8]) -> io::Result<Option<usize>> + 'static,
    {
        FnFiller(Box::new(f))
    }
}

impl Filler for FnFiller {
    fn fill(&mut self, dst: &mut [u8]) -> io::Result<Option<usize>> {
        (self.0)(dst)
    }
}
