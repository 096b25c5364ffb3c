//! JNI bridge for Android
//!
//! Binds the generic adapters to the JVM classes shipped with the app.
//!
//! ## Architecture
//!
//! - `types`: process-wide JavaVM and configuration (OnceLock)
//! - `lifecycle`: `JNI_OnLoad`, configuration entry point, adapter factories
//! - `env`: per-thread attachment and exception discipline
//! - `okhttp`: streaming capability over `FFmpegOkhttp`
//! - `svg`: decode capability over `FFmpegSVGDecoder`
//!
//! ## Thread Model
//!
//! - Each operation resolves the calling thread's environment, attaching it
//!   permanently on first use
//! - Local references never outlive the operation that created them
//! - Resolved class and method identifiers are shared across sessions and
//!   dropped with the last session that holds them

pub mod env;
pub mod lifecycle;
pub mod okhttp;
pub mod svg;
pub mod types;

pub use lifecycle::{
    http_reader, register_java_vm, svg_decoder,
    Java_com_solarized_firedown_ffmpegutils_MediaBridgeNative_nativeConfigure, JNI_OnLoad,
};
pub use okhttp::OkhttpBinding;
pub use svg::SvgBinding;
