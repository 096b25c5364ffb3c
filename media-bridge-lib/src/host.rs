//! Host-facing protocol and codec surface
//!
//! Translates adapter results into the host's integer status codes:
//! `0` for success, a byte count or position where one is returned, and a
//! negative `AVERROR` value otherwise.

use log::{debug, error};

use crate::decode::{Frame, SvgDecoder};
use crate::error::{HostError, AVERROR_EINVAL};
use crate::remote::{DecodeBinding, StreamBinding};
use crate::stream::{Chunk, Seeked, StreamReader, Whence};
use crate::types::{InterruptSignal, OptionSet};

/// Private option carrying the raw custom header block.
pub const HEADERS_OPTION: &str = "headers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub name: &'static str,
    pub network: bool,
    pub default_whitelist: &'static str,
}

pub const HTTP_PROTOCOL: ProtocolInfo = ProtocolInfo {
    name: "http",
    network: true,
    default_whitelist: "http,https,tls,tcp,udp,crypto",
};

pub const HTTPS_PROTOCOL: ProtocolInfo = ProtocolInfo {
    name: "https",
    network: true,
    default_whitelist: "http,https,tls,tcp,udp,crypto",
};

pub static PROTOCOLS: [ProtocolInfo; 2] = [HTTP_PROTOCOL, HTTPS_PROTOCOL];

/// Protocol handling `uri`, chosen by its scheme.
pub fn find_protocol(uri: &str) -> Option<&'static ProtocolInfo> {
    let (scheme, _) = uri.split_once(':')?;
    PROTOCOLS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(scheme))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: &'static str,
    pub long_name: &'static str,
    pub codec: &'static str,
    pub wrapper_name: &'static str,
}

pub const SVG_DECODER: CodecInfo = CodecInfo {
    name: "libasvg",
    long_name: "Libasvg android rasterizer",
    codec: "svg",
    wrapper_name: "libasvg",
};

pub trait UrlHandler {
    fn url_open(&mut self, uri: &str, flags: i32, options: &mut OptionSet) -> i32;
    fn url_read(&mut self, buf: &mut [u8]) -> i32;
    fn url_seek(&mut self, offset: i64, whence: i32) -> i64;
    fn url_close(&mut self) -> i32;
    fn url_mime_type(&self) -> Option<&str>;
}

impl<B: StreamBinding, I: InterruptSignal> UrlHandler for StreamReader<B, I> {
    /// Consumes the `headers` entry, as host private options are, and
    /// forwards the remaining entries to the remote open.
    fn url_open(&mut self, uri: &str, flags: i32, options: &mut OptionSet) -> i32 {
        if let Some(headers) = options.remove(HEADERS_OPTION) {
            self.set_headers(Some(headers));
        }
        match self.open(uri, flags, options) {
            Ok(()) => 0,
            Err(e) => {
                debug!("open {} failed: {}", uri, e);
                e.host_code()
            }
        }
    }

    fn url_read(&mut self, buf: &mut [u8]) -> i32 {
        match self.read(buf) {
            Ok(Chunk::Data(n)) => n as i32,
            Ok(Chunk::EndOfStream) => HostError::EndOfStream.code(),
            Err(e) => {
                debug!("read failed: {}", e);
                e.host_code()
            }
        }
    }

    fn url_seek(&mut self, offset: i64, whence: i32) -> i64 {
        let Some(whence) = Whence::from_raw(whence) else {
            return AVERROR_EINVAL as i64;
        };
        match self.seek(offset, whence) {
            Ok(Seeked::Position(position)) => position as i64,
            Ok(Seeked::EndOfStream) => HostError::EndOfStream.code() as i64,
            Err(e) => {
                debug!("seek failed: {}", e);
                e.host_code() as i64
            }
        }
    }

    fn url_close(&mut self) -> i32 {
        match self.close() {
            Ok(()) => 0,
            Err(e) => e.host_code(),
        }
    }

    fn url_mime_type(&self) -> Option<&str> {
        self.mime_type()
    }
}

/// Result of one host decode call.
#[derive(Debug)]
pub struct DecodeStatus {
    pub status: i32,
    pub frame: Option<Frame>,
}

impl DecodeStatus {
    pub fn got_frame(&self) -> bool {
        self.frame.is_some()
    }
}

pub trait CodecHandler {
    fn codec_init(&mut self) -> i32;
    fn codec_decode(&mut self, packet: &[u8]) -> DecodeStatus;
    fn codec_close(&mut self) -> i32;
}

impl<B: DecodeBinding> CodecHandler for SvgDecoder<B> {
    fn codec_init(&mut self) -> i32 {
        match self.init() {
            Ok(()) => 0,
            Err(e) => {
                error!("failed to initialize svg decoder: {}", e);
                e.host_code()
            }
        }
    }

    fn codec_decode(&mut self, packet: &[u8]) -> DecodeStatus {
        match self.decode(packet) {
            Ok(frame) => DecodeStatus {
                status: 0,
                frame: Some(frame),
            },
            Err(e) => {
                error!("error rendering svg: {}", e);
                DecodeStatus {
                    status: e.host_code(),
                    frame: None,
                }
            }
        }
    }

    fn codec_close(&mut self) -> i32 {
        match self.close() {
            Ok(()) => 0,
            Err(e) => e.host_code(),
        }
    }
}
