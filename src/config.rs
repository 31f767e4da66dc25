use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};
use tracing::Level;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_PORT: u16 = 6379;

/// Server settings, read from the command line or the environment.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "HASHDIS_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// The port to listen on
    #[arg(short, long, env = "HASHDIS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest request, in bytes, a client may send before being disconnected
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Most verbose log level to emit
    #[arg(long, env = "HASHDIS_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            log_level: Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["hashdis"]).unwrap();

        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 6379);
        assert_eq!(config.max_frame_size, 512 * 1024 * 1024);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "hashdis",
            "--bind",
            "0.0.0.0",
            "-p",
            "7000",
            "--max-frame-size",
            "1024",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_port() {
        assert!(Config::try_parse_from(["hashdis", "--port", "abc"]).is_err());
    }
}
