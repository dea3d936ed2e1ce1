use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use simlink_core::defined::{DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Options for [`Connection`](crate::Connection).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOption {
    /// How long a command waits for its ack, and a shared memory read for its ready signal.
    /// The default is 5 seconds.
    pub timeout: Duration,
    /// The directory shared memory regions are created in. The host must see the same directory.
    /// The default is the system temporary directory.
    pub shm_dir: PathBuf,
    /// The protocol version announced in the handshake.
    pub protocol_version: String,
}

impl Default for ConnectionOption {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            shm_dir: std::env::temp_dir(),
            protocol_version: PROTOCOL_VERSION.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        let option = ConnectionOption::default();
        assert_eq!(Duration::from_secs(5), option.timeout);
        assert_eq!(std::env::temp_dir(), option.shm_dir);
        assert_eq!(PROTOCOL_VERSION, option.protocol_version);
    }

    #[test]
    fn partial_config() -> anyhow::Result<()> {
        let option: ConnectionOption =
            serde_json::from_str(r#"{"timeout":{"secs":1,"nanos":500000000},"shm_dir":"/dev/shm"}"#)?;
        assert_eq!(Duration::from_millis(1500), option.timeout);
        assert_eq!(PathBuf::from("/dev/shm"), option.shm_dir);
        assert_eq!(PROTOCOL_VERSION, option.protocol_version);
        Ok(())
    }
}
