//! Session configuration.
use crate::mode::Mode;

const DEFAULT_CHANNEL: i32 = 0;
const DEFAULT_BITRATE: i64 = 500_000;

/// Parameters for [`Session::connect_with`](crate::Session::connect_with).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Channel number of the interface
    pub channel: i32,
    pub mode: Mode,
    /// Nominal bit rate in bits per second. Must be one of the rates in [`Bitrate`](crate::Bitrate).
    pub bitrate: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            channel: DEFAULT_CHANNEL,
            mode: Mode::DEFAULT,
            bitrate: DEFAULT_BITRATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.channel, 0);
        assert_eq!(config.mode, Mode::DEFAULT);
        assert_eq!(config.bitrate, 500_000);
    }
}
