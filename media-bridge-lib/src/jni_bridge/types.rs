//! Global state for the JNI bridge

use crate::types::BridgeConfig;
use jni::JavaVM;
use std::sync::OnceLock;

/// JavaVM every bridged call attaches to
pub static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Configuration published by `nativeConfigure`
pub static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// Current configuration, or the defaults when none was published
pub fn config() -> BridgeConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

pub fn is_vm_registered() -> bool {
    JAVA_VM.get().is_some()
}
