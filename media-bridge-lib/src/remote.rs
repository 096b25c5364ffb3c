//! Capability traits for remote-side objects
//!
//! A binding owns the resolved capability set (constructor and method
//! identifiers) for one remote object type and knows how to drive an
//! instance of it. Adapters are generic over these traits; the JVM
//! implementation lives in `jni_bridge`.

use std::sync::{Arc, Mutex, Weak};

use log::debug;

use crate::error::Result;
use crate::types::OptionSet;

/// Resolution, teardown and the shared lifecycle calls of one remote type.
pub trait RemoteBinding {
    /// Durable reference to one remote instance.
    type Instance;

    /// Resolves every required operation identifier, or fails with
    /// `Error::Binding` leaving nothing resolved.
    fn resolve(&mut self) -> Result<()>;

    /// Drops the resolved capability set. Must be a no-op when nothing is
    /// resolved.
    fn release(&mut self);

    /// Invokes the remote `close` operation.
    fn close_instance(&mut self, instance: &Self::Instance) -> Result<()>;

    /// Releases the durable reference.
    fn release_instance(&mut self, instance: Self::Instance);
}

/// Remote streaming source (`open`/`read`/`seek`/`close`/`getMime`).
pub trait StreamBinding: RemoteBinding {
    /// Durable remote-visible transfer buffer.
    type Buffer;

    /// Whether the remote `open` accepts a key/value option map.
    fn supports_option_map(&self) -> bool;

    fn construct(&mut self, uri: &str, headers: Option<&str>) -> Result<Self::Instance>;

    fn new_buffer(&mut self, capacity: usize) -> Result<Self::Buffer>;

    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Runs the remote open handshake and returns its raw status; zero is
    /// success.
    fn open(&mut self, instance: &Self::Instance, options: Option<&OptionSet>) -> Result<i32>;

    /// Asks the remote side for up to `len` bytes into `buffer` and returns
    /// its raw count.
    fn read(&mut self, instance: &Self::Instance, buffer: &mut Self::Buffer, len: usize)
        -> Result<i32>;

    /// Copies the first `dst.len()` bytes of `buffer` out.
    fn copy_out(&mut self, buffer: &Self::Buffer, dst: &mut [u8]) -> Result<()>;

    fn seek(&mut self, instance: &Self::Instance, offset: i64, whence: i32) -> Result<i64>;

    fn mime_type(&mut self, instance: &Self::Instance) -> Result<Option<String>>;
}

/// Transient decoded image, valid only inside `DecodeBinding::decode`.
pub trait RemoteImage {
    /// Raster size in pixels.
    fn dimensions(&mut self) -> Result<(u32, u32)>;

    /// Copies tightly packed RGBA pixels into `dst`, which holds exactly
    /// `width * height * 4` bytes.
    fn copy_pixels(&mut self, dst: &mut [u8]) -> Result<()>;
}

/// Remote single-shot decoder (`decode`/`getWidth`/`getHeight`/`close`).
pub trait DecodeBinding: RemoteBinding {
    fn construct(&mut self) -> Result<Self::Instance>;

    /// Copies `data` into a fresh remote buffer and decodes it. `Ok(None)`
    /// means the remote side produced no image. On success `with_image`
    /// runs against the result, which is released before this returns.
    fn decode<R, F>(&mut self, instance: &Self::Instance, data: &[u8], with_image: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut dyn RemoteImage) -> Result<R>;

    /// Logical document size reported by the decoder after the last decode.
    fn document_size(&mut self, instance: &Self::Instance) -> Result<(i32, i32)>;
}

/// Process-wide cache of resolved capability sets.
///
/// Entries are held weakly: a set lives as long as some session holds the
/// `Arc`, and is resolved again once the last holder dropped it.
pub struct CapabilityCache<T> {
    entries: Mutex<Vec<(String, Weak<T>)>>,
}

impl<T> CapabilityCache<T> {
    pub const fn new() -> Self {
        CapabilityCache {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire<F>(&self, key: &str, resolve: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(_, weak)| weak.strong_count() > 0);
        if let Some(live) = entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, weak)| weak.upgrade())
        {
            return Ok(live);
        }

        debug!("resolving capability set {}", key);
        let resolved = Arc::new(resolve()?);
        entries.push((key.to_string(), Arc::downgrade(&resolved)));
        Ok(resolved)
    }

    /// Number of capability sets currently alive.
    pub fn live(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().filter(|(_, weak)| weak.strong_count() > 0).count()
    }
}

impl<T> Default for CapabilityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
