use tracing::debug;

use crate::charset::Charset;
use crate::error::Result;

use super::{PeekSource, TextStream};

/// Re-wrap the bytes under `stream` so they decode as `target`.
///
/// A stream already declared as `target` (names compared ignoring ASCII
/// case) is returned as is. Otherwise the byte source is detached and
/// wrapped again; bytes that were only peeked are decoded with the new
/// charset. The decode error policy carries over.
///
/// Fails with [`IncompatibleStreamState`](crate::TranscodeError::IncompatibleStreamState)
/// when the stream holds decoded text or decoder state that would be lost.
pub fn rebind<S: PeekSource>(stream: TextStream<S>, target: Charset) -> Result<TextStream<S>> {
    if stream.charset().same_as(&target) {
        debug!("stream already decodes as {target}");
        return Ok(stream);
    }

    let from = *stream.charset();
    let policy = stream.policy();
    let consumed = stream.bytes_consumed();
    let source = stream.detach()?;
    debug!("rebinding stream from {from} to {target} at byte {consumed}");
    Ok(TextStream::with_policy(source, target, policy))
}
