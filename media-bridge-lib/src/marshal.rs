//! Native/remote value conversion rules shared by every binding

use log::debug;

use crate::error::{Error, Result};
use crate::types::OptionSet;

/// Remote key/value structure being filled from an `OptionSet`.
pub trait MapSink {
    /// Scoped remote string; dropping it releases the remote reference.
    type Value;

    fn marshal(&mut self, text: &str) -> Result<Self::Value>;

    fn insert(&mut self, key: Self::Value, value: Self::Value) -> Result<()>;
}

/// Copies `options` into `sink` in their defined order.
///
/// Each entry is best-effort: when either side fails to marshal, or the
/// insert itself fails, that entry is skipped and iteration continues.
/// Returns the number of entries inserted.
pub fn marshal_options<S: MapSink>(sink: &mut S, options: &OptionSet) -> usize {
    let mut inserted = 0;
    for (key, value) in options.iter() {
        let remote_key = sink.marshal(key);
        let remote_value = sink.marshal(value);
        match (remote_key, remote_value) {
            (Ok(k), Ok(v)) => match sink.insert(k, v) {
                Ok(()) => inserted += 1,
                Err(e) => debug!("option {} not inserted: {}", key, e),
            },
            (Err(e), _) | (_, Err(e)) => debug!("option {} skipped: {}", key, e),
        }
    }
    inserted
}

/// Narrows a native byte count to the remote 32-bit length type.
pub fn remote_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::Marshal(format!("length {} exceeds remote range", len)))
}

/// Interprets a raw remote byte count. Zero and negative counts mean end of
/// stream.
pub fn remote_count(count: i32) -> Option<usize> {
    if count > 0 {
        Some(count as usize)
    } else {
        None
    }
}
