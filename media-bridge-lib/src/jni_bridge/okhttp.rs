//! Streaming capability backed by the app's okhttp wrapper class

use super::env::{
    as_jbytes_mut, checked, class_of, find_class, method, new_string, thread_env, LOCAL_FRAME,
};
use crate::error::{Error, Result};
use crate::marshal::{marshal_options, remote_len, MapSink};
use crate::remote::{CapabilityCache, RemoteBinding, StreamBinding};
use crate::types::{OptionSet, StreamConfig, StreamVariant};
use jni::objects::{AutoLocal, GlobalRef, JByteArray, JMethodID, JObject, JString, JValue};
use jni::signature::{Primitive, ReturnType};
use jni::JNIEnv;
use log::debug;
use std::sync::Arc;

static OKHTTP_FIELDS: CapabilityCache<OkhttpFields> = CapabilityCache::new();

/// Resolved class and method identifiers of one okhttp class variant
pub struct OkhttpFields {
    class: GlobalRef,
    init: JMethodID,
    open: JMethodID,
    read: JMethodID,
    seek: JMethodID,
    close: JMethodID,
    get_mime: JMethodID,
    hash_map_class: GlobalRef,
    hash_map_init: JMethodID,
    hash_map_put: JMethodID,
}

impl OkhttpFields {
    fn lookup(env: &mut JNIEnv, class_name: &str, variant: StreamVariant) -> Result<Self> {
        let class = find_class(env, class_name)?;
        let open_sig = match variant {
            StreamVariant::Legacy => "()I",
            StreamVariant::Mapped => "(Ljava/util/Map;)I",
        };
        let init = method(env, &class, "<init>", "(Ljava/lang/String;Ljava/lang/String;)V")?;
        let open = method(env, &class, "okhttpOpen", open_sig)?;
        let read = method(env, &class, "okhttpRead", "([BI)I")?;
        let seek = method(env, &class, "okhttpSeek", "(JI)J")?;
        let close = method(env, &class, "okhttpClose", "()V")?;
        let get_mime = method(env, &class, "okhttpGetMime", "()Ljava/lang/String;")?;

        let hash_map_class = find_class(env, "java/util/HashMap")?;
        let hash_map_init = method(env, &hash_map_class, "<init>", "()V")?;
        let hash_map_put = method(
            env,
            &hash_map_class,
            "put",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
        )?;

        Ok(OkhttpFields {
            class,
            init,
            open,
            read,
            seek,
            close,
            get_mime,
            hash_map_class,
            hash_map_init,
            hash_map_put,
        })
    }
}

pub struct OkhttpBinding {
    class_name: String,
    variant: StreamVariant,
    fields: Option<Arc<OkhttpFields>>,
}

impl OkhttpBinding {
    pub fn new(config: &StreamConfig) -> Self {
        OkhttpBinding {
            class_name: config.class.clone(),
            variant: config.variant,
            fields: None,
        }
    }

    fn fields(&self) -> Result<Arc<OkhttpFields>> {
        self.fields
            .clone()
            .ok_or_else(|| Error::Binding("okhttp capability set not resolved".to_string()))
    }
}

impl RemoteBinding for OkhttpBinding {
    type Instance = GlobalRef;

    fn resolve(&mut self) -> Result<()> {
        let key = format!("{}:{:?}", self.class_name, self.variant);
        let class_name = self.class_name.as_str();
        let variant = self.variant;
        let fields = OKHTTP_FIELDS.acquire(&key, || {
            let mut env = thread_env()?;
            env.with_local_frame(LOCAL_FRAME, |env| {
                OkhttpFields::lookup(env, class_name, variant)
            })
        })?;
        self.fields = Some(fields);
        Ok(())
    }

    fn release(&mut self) {
        self.fields = None;
    }

    fn close_instance(&mut self, instance: &GlobalRef) -> Result<()> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        // SAFETY: `close` was resolved on the instance's class as ()V.
        let closed = unsafe {
            env.call_method_unchecked(
                instance,
                fields.close,
                ReturnType::Primitive(Primitive::Void),
                &[],
            )
        };
        checked(&mut env, closed, Error::RemoteCall, "okhttpClose")?;
        Ok(())
    }

    fn release_instance(&mut self, instance: GlobalRef) {
        drop(instance);
    }
}

impl StreamBinding for OkhttpBinding {
    type Buffer = GlobalRef;

    fn supports_option_map(&self) -> bool {
        self.variant.supports_option_map()
    }

    fn construct(&mut self, uri: &str, headers: Option<&str>) -> Result<GlobalRef> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            let url = new_string(env, uri)?;
            let headers = match headers {
                Some(headers) => JObject::from(new_string(env, headers)?),
                None => JObject::null(),
            };
            // SAFETY: `init` was resolved on this class as (String, String)V.
            let object = unsafe {
                env.new_object_unchecked(
                    class_of(&fields.class),
                    fields.init,
                    &[JValue::Object(&url).as_jni(), JValue::Object(&headers).as_jni()],
                )
            };
            let object = checked(env, object, Error::RemoteConstruction, "okhttp <init>")?;
            if object.is_null() {
                return Err(Error::RemoteConstruction(
                    "okhttp <init> returned no instance".to_string(),
                ));
            }
            env.new_global_ref(object)
                .map_err(|e| Error::RemoteConstruction(e.to_string()))
        })
    }

    fn new_buffer(&mut self, capacity: usize) -> Result<GlobalRef> {
        let len = remote_len(capacity)?;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            let array = env.new_byte_array(len);
            let array = checked(env, array, Error::Marshal, "NewByteArray")?;
            env.new_global_ref(array)
                .map_err(|e| Error::Marshal(e.to_string()))
        })
    }

    fn release_buffer(&mut self, buffer: GlobalRef) {
        drop(buffer);
    }

    fn open(&mut self, instance: &GlobalRef, options: Option<&OptionSet>) -> Result<i32> {
        let fields = self.fields()?;
        let variant = self.variant;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            let status = match variant {
                StreamVariant::Legacy => {
                    // SAFETY: `open` was resolved as ()I for this variant.
                    unsafe {
                        env.call_method_unchecked(
                            instance,
                            fields.open,
                            ReturnType::Primitive(Primitive::Int),
                            &[],
                        )
                    }
                }
                StreamVariant::Mapped => {
                    let map = new_hash_map(env, &fields)?;
                    if let Some(options) = options {
                        let mut sink = HashMapSink {
                            env: &mut *env,
                            map: &map,
                            put: fields.hash_map_put,
                        };
                        let inserted = marshal_options(&mut sink, options);
                        debug!("forwarding {} of {} options", inserted, options.len());
                    }
                    // SAFETY: `open` was resolved as (Map)I for this variant.
                    unsafe {
                        env.call_method_unchecked(
                            instance,
                            fields.open,
                            ReturnType::Primitive(Primitive::Int),
                            &[JValue::Object(&map).as_jni()],
                        )
                    }
                }
            };
            Ok(checked(env, status, Error::RemoteOpen, "okhttpOpen")?.i()?)
        })
    }

    fn read(&mut self, instance: &GlobalRef, buffer: &mut GlobalRef, len: usize) -> Result<i32> {
        let fields = self.fields()?;
        let len = remote_len(len)?;
        let mut env = thread_env()?;
        // SAFETY: `read` was resolved as ([BI)I and `buffer` is a byte[].
        let count = unsafe {
            env.call_method_unchecked(
                instance,
                fields.read,
                ReturnType::Primitive(Primitive::Int),
                &[JValue::Object(buffer.as_obj()).as_jni(), JValue::Int(len).as_jni()],
            )
        };
        Ok(checked(&mut env, count, Error::RemoteCall, "okhttpRead")?.i()?)
    }

    fn copy_out(&mut self, buffer: &GlobalRef, dst: &mut [u8]) -> Result<()> {
        let mut env = thread_env()?;
        let array: &JByteArray = buffer.as_obj().into();
        let copied = env.get_byte_array_region(array, 0, as_jbytes_mut(dst));
        checked(&mut env, copied, Error::Marshal, "GetByteArrayRegion")
    }

    fn seek(&mut self, instance: &GlobalRef, offset: i64, whence: i32) -> Result<i64> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        // SAFETY: `seek` was resolved as (JI)J.
        let position = unsafe {
            env.call_method_unchecked(
                instance,
                fields.seek,
                ReturnType::Primitive(Primitive::Long),
                &[JValue::Long(offset).as_jni(), JValue::Int(whence).as_jni()],
            )
        };
        Ok(checked(&mut env, position, Error::RemoteCall, "okhttpSeek")?.j()?)
    }

    fn mime_type(&mut self, instance: &GlobalRef) -> Result<Option<String>> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            // SAFETY: `get_mime` was resolved as ()Ljava/lang/String;.
            let mime = unsafe {
                env.call_method_unchecked(instance, fields.get_mime, ReturnType::Object, &[])
            };
            let mime = checked(env, mime, Error::RemoteCall, "okhttpGetMime")?.l()?;
            if mime.is_null() {
                return Ok(None);
            }
            let mime = JString::from(mime);
            let text: String = env.get_string(&mime)?.into();
            Ok(Some(text))
        })
    }
}

fn new_hash_map<'local>(
    env: &mut JNIEnv<'local>,
    fields: &OkhttpFields,
) -> Result<JObject<'local>> {
    // SAFETY: `hash_map_init` was resolved on java/util/HashMap as ()V.
    let map = unsafe {
        env.new_object_unchecked(class_of(&fields.hash_map_class), fields.hash_map_init, &[])
    };
    let map = checked(env, map, Error::Marshal, "HashMap <init>")?;
    if map.is_null() {
        return Err(Error::Marshal("HashMap <init> returned no instance".to_string()));
    }
    Ok(map)
}

/// Fills a `java.util.HashMap` one scoped entry at a time.
struct HashMapSink<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    map: &'a JObject<'local>,
    put: JMethodID,
}

impl<'a, 'local> MapSink for HashMapSink<'a, 'local> {
    type Value = AutoLocal<'local, JString<'local>>;

    fn marshal(&mut self, text: &str) -> Result<Self::Value> {
        let string = new_string(self.env, text)?;
        Ok(self.env.auto_local(string))
    }

    fn insert(&mut self, key: Self::Value, value: Self::Value) -> Result<()> {
        // SAFETY: `put` was resolved on java/util/HashMap as (Object, Object)Object.
        let previous = unsafe {
            self.env.call_method_unchecked(
                self.map,
                self.put,
                ReturnType::Object,
                &[JValue::Object(&key).as_jni(), JValue::Object(&value).as_jni()],
            )
        };
        let previous = checked(self.env, previous, Error::RemoteCall, "HashMap.put")?.l()?;
        self.env.delete_local_ref(previous)?;
        Ok(())
    }
}
