#[cfg(test)]
#[macro_use]
mod tests;

pub mod decode;
pub mod error;
pub mod host;
pub mod marshal;
pub mod remote;
pub mod session;
pub mod stream;
pub mod types;

// JNI bridge for Android
#[cfg(all(feature = "jni-bridge", target_os = "android"))]
pub mod jni_bridge;
