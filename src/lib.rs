//! A crate to read and write a compact binary serialization format

pub mod errors;
pub mod order;
pub mod reader;
pub mod source;
pub mod writer;

pub use crate::{
    errors::{Error, Result},
    order::Endian,
    reader::Reader,
    source::{Filler, FnFiller},
    writer::{BytesWriter, Writer, WriterBackend},
};
