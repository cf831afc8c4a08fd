//! Byte sources with non-destructive peek, and text streams decoding them.
//!
//! A [`TextStream`] owns a [`PeekSource`] and decodes it under one
//! [`Charset`](crate::charset::Charset). [`rebind`] swaps the charset while
//! keeping the exact read position of the underlying bytes.

mod rebind;
mod source;
mod text;

pub use rebind::rebind;
pub use source::{ByteSource, PeekSource};
pub use text::TextStream;
