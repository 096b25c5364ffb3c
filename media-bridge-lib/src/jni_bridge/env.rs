//! Thread attachment and exception discipline
//!
//! Every remote invocation goes through `checked`, which clears any pending
//! Java exception before the next call can observe it.

use super::types::JAVA_VM;
use crate::error::{Error, Result};
use jni::objects::{GlobalRef, JClass, JMethodID, JStaticMethodID, JString};
use jni::JNIEnv;
use log::debug;
use std::slice;

/// Local reference capacity reserved for one bridged operation.
pub const LOCAL_FRAME: i32 = 16;

/// Environment of the calling thread, attaching it on first use.
///
/// Resolved per operation; an environment is only valid on the thread that
/// obtained it.
pub fn thread_env() -> Result<JNIEnv<'static>> {
    let vm = JAVA_VM
        .get()
        .ok_or_else(|| Error::invalid_argument("JavaVM not registered"))?;
    vm.attach_current_thread_permanently()
        .map_err(|e| Error::InvalidArgument(format!("cannot attach thread: {}", e)))
}

/// Describes and clears a pending exception. Returns whether one was pending.
pub fn clear_exception(env: &mut JNIEnv) -> bool {
    match env.exception_check() {
        Ok(true) => {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
            true
        }
        _ => false,
    }
}

/// Post-call check: a raised exception becomes `kind`, and so does any
/// JNI-level failure of the call itself.
pub fn checked<T>(
    env: &mut JNIEnv,
    result: jni::errors::Result<T>,
    kind: fn(String) -> Error,
    what: &str,
) -> Result<T> {
    let raised = clear_exception(env);
    match result {
        Ok(_) if raised => {
            debug!("{} raised", what);
            Err(kind(format!("{} raised", what)))
        }
        Ok(value) => Ok(value),
        Err(e) => {
            debug!("{} failed: {}", what, e);
            Err(kind(format!("{}: {}", what, e)))
        }
    }
}

pub fn new_string<'local>(env: &mut JNIEnv<'local>, text: &str) -> Result<JString<'local>> {
    let string = env.new_string(text);
    checked(env, string, Error::Marshal, "NewStringUTF")
}

pub fn find_class(env: &mut JNIEnv, name: &str) -> Result<GlobalRef> {
    let class = env.find_class(name);
    let class = checked(env, class, Error::Binding, name)?;
    env.new_global_ref(class)
        .map_err(|e| Error::Binding(format!("{}: {}", name, e)))
}

pub fn class_of(global: &GlobalRef) -> &JClass<'static> {
    global.as_obj().into()
}

pub fn method(env: &mut JNIEnv, class: &GlobalRef, name: &str, sig: &str) -> Result<JMethodID> {
    let id = env.get_method_id(class_of(class), name, sig);
    checked(env, id, Error::Binding, &format!("{}{}", name, sig))
}

pub fn static_method(
    env: &mut JNIEnv,
    class: &GlobalRef,
    name: &str,
    sig: &str,
) -> Result<JStaticMethodID> {
    let id = env.get_static_method_id(class_of(class), name, sig);
    checked(env, id, Error::Binding, &format!("{}{}", name, sig))
}

pub fn as_jbytes(bytes: &[u8]) -> &[i8] {
    // SAFETY: u8 and i8 share size and alignment.
    unsafe { slice::from_raw_parts(bytes.as_ptr() as *const i8, bytes.len()) }
}

pub fn as_jbytes_mut(bytes: &mut [u8]) -> &mut [i8] {
    // SAFETY: u8 and i8 share size and alignment, and the borrow is unique.
    unsafe { slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut i8, bytes.len()) }
}
