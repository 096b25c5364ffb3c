//! Decode capability backed by the app's SVG rasterizer class

use super::env::{
    as_jbytes, as_jbytes_mut, checked, class_of, find_class, method, static_method, thread_env,
    LOCAL_FRAME,
};
use crate::error::{Error, Result};
use crate::marshal::remote_len;
use crate::remote::{CapabilityCache, DecodeBinding, RemoteBinding, RemoteImage};
use crate::types::DecoderConfig;
use jni::objects::{GlobalRef, JByteArray, JMethodID, JObject, JStaticMethodID, JValue};
use jni::signature::{Primitive, ReturnType};
use jni::JNIEnv;
use std::sync::Arc;

static SVG_FIELDS: CapabilityCache<SvgFields> = CapabilityCache::new();

pub struct SvgFields {
    class: GlobalRef,
    init: JMethodID,
    close: JMethodID,
    decode: JMethodID,
    document_width: JMethodID,
    document_height: JMethodID,
    bitmap_width: JMethodID,
    bitmap_height: JMethodID,
    bitmap_byte_count: JMethodID,
    bitmap_copy_pixels: JMethodID,
    byte_buffer_class: GlobalRef,
    byte_buffer_wrap: JStaticMethodID,
}

impl SvgFields {
    fn lookup(env: &mut JNIEnv, class_name: &str) -> Result<Self> {
        let class = find_class(env, class_name)?;
        let init = method(env, &class, "<init>", "()V")?;
        let close = method(env, &class, "decodeClose", "()V")?;
        let decode = method(env, &class, "decodeData", "([B)Landroid/graphics/Bitmap;")?;
        let document_width = method(env, &class, "getDocumentWidth", "()I")?;
        let document_height = method(env, &class, "getDocumentHeight", "()I")?;

        let bitmap = find_class(env, "android/graphics/Bitmap")?;
        let bitmap_width = method(env, &bitmap, "getWidth", "()I")?;
        let bitmap_height = method(env, &bitmap, "getHeight", "()I")?;
        let bitmap_byte_count = method(env, &bitmap, "getByteCount", "()I")?;
        let bitmap_copy_pixels =
            method(env, &bitmap, "copyPixelsToBuffer", "(Ljava/nio/Buffer;)V")?;

        let byte_buffer_class = find_class(env, "java/nio/ByteBuffer")?;
        let byte_buffer_wrap =
            static_method(env, &byte_buffer_class, "wrap", "([B)Ljava/nio/ByteBuffer;")?;

        Ok(SvgFields {
            class,
            init,
            close,
            decode,
            document_width,
            document_height,
            bitmap_width,
            bitmap_height,
            bitmap_byte_count,
            bitmap_copy_pixels,
            byte_buffer_class,
            byte_buffer_wrap,
        })
    }
}

pub struct SvgBinding {
    class_name: String,
    fields: Option<Arc<SvgFields>>,
}

impl SvgBinding {
    pub fn new(config: &DecoderConfig) -> Self {
        SvgBinding {
            class_name: config.class.clone(),
            fields: None,
        }
    }

    fn fields(&self) -> Result<Arc<SvgFields>> {
        self.fields
            .clone()
            .ok_or_else(|| Error::Binding("svg capability set not resolved".to_string()))
    }
}

fn call_int(
    env: &mut JNIEnv,
    object: &JObject,
    id: JMethodID,
    kind: fn(String) -> Error,
    what: &str,
) -> Result<i32> {
    // SAFETY: every id passed here was resolved with an ()I signature.
    let value = unsafe {
        env.call_method_unchecked(object, id, ReturnType::Primitive(Primitive::Int), &[])
    };
    Ok(checked(env, value, kind, what)?.i()?)
}

impl RemoteBinding for SvgBinding {
    type Instance = GlobalRef;

    fn resolve(&mut self) -> Result<()> {
        let class_name = self.class_name.as_str();
        let fields = SVG_FIELDS.acquire(class_name, || {
            let mut env = thread_env()?;
            env.with_local_frame(LOCAL_FRAME, |env| SvgFields::lookup(env, class_name))
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
        // SAFETY: `close` was resolved as ()V.
        let closed = unsafe {
            env.call_method_unchecked(
                instance,
                fields.close,
                ReturnType::Primitive(Primitive::Void),
                &[],
            )
        };
        checked(&mut env, closed, Error::RemoteCall, "decodeClose")?;
        Ok(())
    }

    fn release_instance(&mut self, instance: GlobalRef) {
        drop(instance);
    }
}

impl DecodeBinding for SvgBinding {
    fn construct(&mut self) -> Result<GlobalRef> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            // SAFETY: `init` was resolved as ()V.
            let object =
                unsafe { env.new_object_unchecked(class_of(&fields.class), fields.init, &[]) };
            let object = checked(env, object, Error::RemoteConstruction, "svg <init>")?;
            if object.is_null() {
                return Err(Error::RemoteConstruction(
                    "svg <init> returned no instance".to_string(),
                ));
            }
            env.new_global_ref(object)
                .map_err(|e| Error::RemoteConstruction(e.to_string()))
        })
    }

    fn decode<R, F>(&mut self, instance: &GlobalRef, data: &[u8], with_image: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut dyn RemoteImage) -> Result<R>,
    {
        let fields = self.fields()?;
        let len = remote_len(data.len())?;
        let mut env = thread_env()?;
        env.with_local_frame(LOCAL_FRAME, |env| {
            let array = env.new_byte_array(len);
            let array = checked(env, array, Error::Marshal, "NewByteArray")?;
            let filled = env.set_byte_array_region(&array, 0, as_jbytes(data));
            checked(env, filled, Error::Marshal, "SetByteArrayRegion")?;

            // SAFETY: `decode` was resolved as ([B)Landroid/graphics/Bitmap;.
            let bitmap = unsafe {
                env.call_method_unchecked(
                    instance,
                    fields.decode,
                    ReturnType::Object,
                    &[JValue::Object(&array).as_jni()],
                )
            };
            let bitmap = checked(env, bitmap, Error::Decode, "decodeData")?.l()?;
            if bitmap.is_null() {
                return Ok(None);
            }

            let mut image = JniBitmap {
                env: &mut *env,
                bitmap: &bitmap,
                fields: &fields,
                size: None,
            };
            with_image(&mut image).map(Some)
        })
    }

    fn document_size(&mut self, instance: &GlobalRef) -> Result<(i32, i32)> {
        let fields = self.fields()?;
        let mut env = thread_env()?;
        let width = call_int(
            &mut env,
            instance.as_obj(),
            fields.document_width,
            Error::RemoteCall,
            "getDocumentWidth",
        )?;
        let height = call_int(
            &mut env,
            instance.as_obj(),
            fields.document_height,
            Error::RemoteCall,
            "getDocumentHeight",
        )?;
        Ok((width, height))
    }
}

/// `android.graphics.Bitmap` returned by one `decodeData` call.
struct JniBitmap<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    bitmap: &'a JObject<'local>,
    fields: &'a SvgFields,
    size: Option<(u32, u32)>,
}

impl<'a, 'local> RemoteImage for JniBitmap<'a, 'local> {
    fn dimensions(&mut self) -> Result<(u32, u32)> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let width = call_int(
            self.env,
            self.bitmap,
            self.fields.bitmap_width,
            Error::Decode,
            "Bitmap.getWidth",
        )?;
        let height = call_int(
            self.env,
            self.bitmap,
            self.fields.bitmap_height,
            Error::Decode,
            "Bitmap.getHeight",
        )?;
        let size = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "bitmap size {}x{} is invalid",
                    width, height
                )))
            }
        };
        self.size = Some(size);
        Ok(size)
    }

    fn copy_pixels(&mut self, dst: &mut [u8]) -> Result<()> {
        let byte_count = call_int(
            self.env,
            self.bitmap,
            self.fields.bitmap_byte_count,
            Error::Decode,
            "Bitmap.getByteCount",
        )?;
        if usize::try_from(byte_count).ok() != Some(dst.len()) {
            return Err(Error::Decode(format!(
                "bitmap holds {} bytes, expected tightly packed rgba of {}",
                byte_count,
                dst.len()
            )));
        }

        let array = self.env.new_byte_array(byte_count);
        let array: JByteArray = checked(self.env, array, Error::Marshal, "NewByteArray")?;
        // SAFETY: `byte_buffer_wrap` was resolved as static ([B)Ljava/nio/ByteBuffer;.
        let buffer = unsafe {
            self.env.call_static_method_unchecked(
                class_of(&self.fields.byte_buffer_class),
                self.fields.byte_buffer_wrap,
                ReturnType::Object,
                &[JValue::Object(&array).as_jni()],
            )
        };
        let buffer = checked(self.env, buffer, Error::Marshal, "ByteBuffer.wrap")?.l()?;

        // SAFETY: `bitmap_copy_pixels` was resolved as (Ljava/nio/Buffer;)V.
        let copied = unsafe {
            self.env.call_method_unchecked(
                self.bitmap,
                self.fields.bitmap_copy_pixels,
                ReturnType::Primitive(Primitive::Void),
                &[JValue::Object(&buffer).as_jni()],
            )
        };
        checked(self.env, copied, Error::Decode, "Bitmap.copyPixelsToBuffer")?;

        let region = self.env.get_byte_array_region(&array, 0, as_jbytes_mut(dst));
        checked(self.env, region, Error::Marshal, "GetByteArrayRegion")?;

        self.env.delete_local_ref(buffer)?;
        self.env.delete_local_ref(array)?;
        Ok(())
    }
}
