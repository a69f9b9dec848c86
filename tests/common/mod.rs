#![allow(dead_code)]

use packbuf::{Reader, Writer};
use std::cell::Cell;
use std::io;
use std::rc::Rc;

/// Writer over a growable in-memory backend
pub fn writer() -> Writer<Vec<u8>> {
    Writer::new(Vec::new())
}

/// A source serving at most `chunk` bytes per fill, counting fill calls
pub struct CountingSource {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    fills: Rc<Cell<usize>>,
}

impl CountingSource {
    pub fn new(data: Vec<u8>, chunk: usize) -> (CountingSource, Rc<Cell<usize>>) {
        let fills = Rc::new(Cell::new(0));
        let source = CountingSource {
            data,
            pos: 0,
            chunk,
            fills: Rc::clone(&fills),
        };
        (source, fills)
    }
}

impl io::Read for CountingSource {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.fills.set(self.fills.get() + 1);
        let n = dst.len().min(self.chunk).min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Asserts the window invariant `position <= limit <= capacity`
pub fn assert_window(r: &Reader) {
    assert!(r.position() <= r.limit(), "position {} > limit {}", r.position(), r.limit());
    assert!(r.limit() <= r.capacity(), "limit {} > capacity {}", r.limit(), r.capacity());
}
