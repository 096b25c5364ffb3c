use std::{
    fmt, fs,
    path::Path,
    result::Result as StdResult,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use linked_hash_map::LinkedHashMap;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transfer buffer capacity used when the config does not name one.
pub const DEFAULT_SEGMENT_SIZE: usize = 8192;

pub const DEFAULT_STREAM_CLASS: &str = "com/solarized/firedown/ffmpegutils/FFmpegOkhttp";
pub const DEFAULT_DECODER_CLASS: &str = "com/solarized/firedown/ffmpegutils/FFmpegSVGDecoder";

/// Ordered key/value options handed over by the host at open time.
pub type OptionSet = LinkedHashMap<String, String>;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct StreamConfig {
    /// Binary name of the remote streaming class.
    pub class: String,
    pub variant: StreamVariant,
    /// Transfer buffer capacity in bytes, fixed for the session.
    pub segment_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            class: DEFAULT_STREAM_CLASS.to_string(),
            variant: StreamVariant::default(),
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

/// Shape of the deployed remote streaming class.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamVariant {
    /// `okhttpOpen()I`; host options are not forwarded.
    Legacy,
    /// `okhttpOpen(Ljava/util/Map;)I`; host options travel as a map.
    #[default]
    Mapped,
}

impl StreamVariant {
    pub fn supports_option_map(self) -> bool {
        matches!(self, StreamVariant::Mapped)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct DecoderConfig {
    pub class: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            class: DEFAULT_DECODER_CLASS.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "debug".to_string(),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| Error::Config(format!("unknown log level {:?}", self.level)))
    }
}

impl BridgeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(Error::config)?;
        let config: BridgeConfig = content.parse().map_err(Error::config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.segment_size == 0 {
            return Err(Error::config("stream.segment_size must be positive"));
        }
        if i32::try_from(self.stream.segment_size).is_err() {
            return Err(Error::Config(format!(
                "stream.segment_size {} does not fit a remote array length",
                self.stream.segment_size
            )));
        }
        if self.stream.class.is_empty() {
            return Err(Error::argument_should_exist("stream.class"));
        }
        if self.decoder.class.is_empty() {
            return Err(Error::argument_should_exist("decoder.class"));
        }
        self.log.level_filter()?;
        Ok(())
    }
}

impl FromStr for BridgeConfig {
    type Err = toml::de::Error;
    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl fmt::Display for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        toml::to_string_pretty(self)
            .map_err(|_| fmt::Error)
            .and_then(|s| write!(f, "{}", s))
    }
}

/// Externally supplied cooperative cancellation flag.
///
/// Polled before and after every blocking remote call; never preempts one.
pub trait InterruptSignal {
    fn is_interrupted(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupted;

impl InterruptSignal for NeverInterrupted {
    fn is_interrupted(&self) -> bool {
        false
    }
}

impl InterruptSignal for AtomicBool {
    fn is_interrupted(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: InterruptSignal + ?Sized> InterruptSignal for Arc<T> {
    fn is_interrupted(&self) -> bool {
        (**self).is_interrupted()
    }
}

/// Adapts a host interrupt callback.
pub struct InterruptFn<F>(pub F);

impl<F: Fn() -> bool> InterruptSignal for InterruptFn<F> {
    fn is_interrupted(&self) -> bool {
        (self.0)()
    }
}
