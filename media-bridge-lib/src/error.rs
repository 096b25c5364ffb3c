use std::{fmt, result};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("binding error: {0}")]
    Binding(String),
    #[error("remote construction error: {0}")]
    RemoteConstruction(String),
    #[error("remote open error: {0}")]
    RemoteOpen(String),
    #[error("remote call error: {0}")]
    RemoteCall(String),
    #[error("marshal error: {0}")]
    Marshal(String),
    #[error("interrupted")]
    Interrupted,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("config error: {0}")]
    Config(String),

    #[cfg(all(feature = "jni-bridge", target_os = "android"))]
    #[error("jni error: {0}")]
    Jni(#[from] jni::errors::Error),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn config<T: fmt::Display>(inner: T) -> Self {
        Self::Config(inner.to_string())
    }
    pub fn argument_should_exist(name: &str) -> Self {
        Self::Config(format!("argument {} should exist", name))
    }
    pub fn invalid_argument<T: fmt::Display>(inner: T) -> Self {
        Self::InvalidArgument(inner.to_string())
    }
    pub fn remote_call<T: fmt::Display>(inner: T) -> Self {
        Self::RemoteCall(inner.to_string())
    }

    /// Classifies this error into the host's closed error domain.
    pub fn host_error(&self) -> HostError {
        match self {
            Error::Binding(_)
            | Error::RemoteConstruction(_)
            | Error::RemoteOpen(_)
            | Error::RemoteCall(_)
            | Error::Marshal(_) => HostError::External,
            #[cfg(all(feature = "jni-bridge", target_os = "android"))]
            Error::Jni(_) => HostError::External,
            Error::Interrupted => HostError::Exit,
            Error::Decode(_) => HostError::InvalidData,
            Error::InvalidArgument(_) | Error::Config(_) => HostError::InvalidArgument,
        }
    }

    pub fn host_code(&self) -> i32 {
        self.host_error().code()
    }
}

const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -((a as i32) | ((b as i32) << 8) | ((c as i32) << 16) | ((d as i32) << 24))
}

pub const AVERROR_EINVAL: i32 = -22;
pub const AVERROR_EXTERNAL: i32 = fferrtag(b'E', b'X', b'T', b' ');
pub const AVERROR_EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
pub const AVERROR_EXIT: i32 = fferrtag(b'E', b'X', b'I', b'T');
pub const AVERROR_INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');

/// Error classes the host framework understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    InvalidArgument,
    External,
    EndOfStream,
    Exit,
    InvalidData,
}

impl HostError {
    pub const fn code(self) -> i32 {
        match self {
            HostError::InvalidArgument => AVERROR_EINVAL,
            HostError::External => AVERROR_EXTERNAL,
            HostError::EndOfStream => AVERROR_EOF,
            HostError::Exit => AVERROR_EXIT,
            HostError::InvalidData => AVERROR_INVALIDDATA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_codes_match_ffmpeg_tags() {
        assert_eq!(AVERROR_EOF, -0x2046_4F45);
        assert_eq!(AVERROR_EXIT, -0x5449_5845);
        assert_eq!(AVERROR_EXTERNAL, -0x2054_5845);
        assert_eq!(AVERROR_INVALIDDATA, -0x4144_4E49);
        assert_eq!(HostError::InvalidArgument.code(), -22);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            Error::Binding("x".into()).host_error(),
            HostError::External
        );
        assert_eq!(Error::Interrupted.host_error(), HostError::Exit);
        assert_eq!(
            Error::Decode("bad svg".into()).host_error(),
            HostError::InvalidData
        );
        assert_eq!(
            Error::config("zero segment").host_code(),
            AVERROR_EINVAL
        );
        assert_eq!(
            Error::remote_call("boom").host_code(),
            AVERROR_EXTERNAL
        );
    }
}
