//! Lifecycle management for JNI bridge
//!
//! Library load, configuration and the adapter factories used by the host glue.

use super::okhttp::OkhttpBinding;
use super::svg::SvgBinding;
use super::types::*;
use crate::decode::SvgDecoder;
use crate::error::Result;
use crate::stream::StreamReader;
use crate::types::{BridgeConfig, InterruptSignal};
use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jint, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM};
use log::{error, info, warn};
use std::ffi::c_void;

/// Stores the VM on library load so worker threads can attach later.
#[no_mangle]
pub extern "C" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("media-bridge"),
    );

    if !register_java_vm(vm) {
        warn!("JavaVM already registered");
    }
    info!("media bridge loaded");
    JNI_VERSION_1_6
}

/// Registers the VM for bridged calls. Returns false if one was already set.
pub fn register_java_vm(vm: JavaVM) -> bool {
    JAVA_VM.set(vm).is_ok()
}

/// JNI: publish the bridge configuration
///
/// Reads the TOML file at `config_path`, applies its log level and makes it
/// the configuration of every adapter created afterwards. Can only succeed
/// once per process.
#[no_mangle]
pub extern "C" fn Java_com_solarized_firedown_ffmpegutils_MediaBridgeNative_nativeConfigure(
    mut env: JNIEnv,
    _class: JClass,
    config_path_jstr: JString,
) -> jboolean {
    if !is_vm_registered() {
        match env.get_java_vm() {
            Ok(vm) => {
                register_java_vm(vm);
            }
            Err(e) => {
                error!("Failed to get JavaVM: {}", e);
                return JNI_FALSE;
            }
        }
    }

    let config_path: String = match env.get_string(&config_path_jstr) {
        Ok(s) => s.into(),
        Err(e) => {
            error!("Failed to get config path: {}", e);
            return JNI_FALSE;
        }
    };

    info!("Loading config from: {}", config_path);
    let config = match BridgeConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return JNI_FALSE;
        }
    };

    match config.log.level_filter() {
        Ok(level) => log::set_max_level(level),
        Err(e) => warn!("keeping current log level: {}", e),
    }
    info!(
        "stream class {} ({:?}), segment size {}, decoder class {}",
        config.stream.class, config.stream.variant, config.stream.segment_size, config.decoder.class
    );

    if CONFIG.set(config).is_err() {
        error!("Configuration already published");
        return JNI_FALSE;
    }
    JNI_TRUE
}

/// Streaming reader over the configured okhttp class.
pub fn http_reader<I: InterruptSignal>(interrupt: I) -> Result<StreamReader<OkhttpBinding, I>> {
    let config = config();
    StreamReader::from_config(OkhttpBinding::new(&config.stream), &config.stream, interrupt)
}

/// SVG decoder over the configured rasterizer class. Call `init` before use.
pub fn svg_decoder() -> SvgDecoder<SvgBinding> {
    let config = config();
    SvgDecoder::new(SvgBinding::new(&config.decoder))
}
