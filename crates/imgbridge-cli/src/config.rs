//! Config - コマンドライン引数と環境変数の設定
//!
//! すべてのオプションはフラグと環境変数の両方で指定できる。
//! 不正な duration や listen address は起動時にエラーにする（Fail-fast）。

use clap::{Parser, ValueEnum};
use imgbridge_core::app::StoreConfig;
use imgbridge_core::impls::{DEFAULT_UPSTREAM_URL, EphemeralConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// OpenAI-compatible image generation proxy for Hyperbolic.
#[derive(Parser, Debug)]
#[command(name = "imgbridge", version)]
pub struct Args {
    /// Address to listen on (`:8080` binds every interface)
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080", value_parser = parse_listen_addr)]
    pub listen_addr: SocketAddr,

    /// Public base URL used in image links; defaults to the request Host
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Scheme for base URLs given without one and for Host-derived links
    #[arg(long, env = "BASE_URL_SCHEME", default_value = "http")]
    pub base_url_scheme: String,

    /// How long an in-memory image stays fetchable (Go duration, e.g. 30m, 1h30m, 90s)
    #[arg(long, env = "IMAGE_EXPIRY", default_value = "30m", value_parser = parse_duration)]
    pub image_expiry: Duration,

    /// How often expired in-memory images are swept
    #[arg(long, env = "CLEANUP_INTERVAL", default_value = "1m", value_parser = parse_duration)]
    pub cleanup_interval: Duration,

    /// Size bound for the in-memory store in MB; 0 disables it
    #[arg(long, env = "MAX_IMAGE_STORE_SIZE_MB", default_value_t = 50)]
    pub max_store_size_mb: u64,

    /// Directory for persisted images; empty keeps images in memory
    #[arg(long, env = "IMAGE_STORE_PATH")]
    pub image_store_path: Option<PathBuf>,

    /// Backend image generation endpoint
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// Timeout for the backend call; unset waits indefinitely
    #[arg(long, env = "UPSTREAM_TIMEOUT", value_parser = parse_duration)]
    pub upstream_timeout: Option<Duration>,

    /// Log filter when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::from_path_or(
            self.image_store_path.clone(),
            EphemeralConfig::with_max_megabytes(self.image_expiry, self.max_store_size_mb),
        )
    }
}

pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, String> {
    let raw = raw.trim();
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    full.parse()
        .map_err(|e| format!("invalid listen address {raw:?}: {e}"))
}

/// Parses Go-style durations: an optional `+`, then a sequence of
/// `<number><unit>` with units `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`
/// and optional fractions, e.g. `1h30m` or `1.5s`. Negative values are
/// rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let invalid = || format!("invalid duration {raw:?}, expected e.g. 30m, 1h30m, 90s");

    let unsigned = match raw.strip_prefix('-') {
        Some(_) => return Err(format!("invalid duration {raw:?}: must not be negative")),
        None => raw.strip_prefix('+').unwrap_or(raw),
    };
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }
    if unsigned.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    let mut rest = unsigned;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        total_nanos += value * nanos_per_unit;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use rstest::rstest;

    /// Parses `argv` with every env fallback detached so the host
    /// environment cannot leak into the result.
    fn parse_args(argv: &[&str]) -> Result<Args, clap::Error> {
        let command = Args::command().mut_args(|arg| arg.env(None::<&'static str>));
        let matches = command.try_get_matches_from(argv)?;
        Args::from_arg_matches(&matches)
    }

    #[rstest]
    #[case::minutes("30m", Duration::from_secs(1800))]
    #[case::compound("1h30m", Duration::from_secs(5400))]
    #[case::seconds("90s", Duration::from_secs(90))]
    #[case::millis("250ms", Duration::from_millis(250))]
    #[case::fraction("1.5s", Duration::from_millis(1500))]
    #[case::zero("0", Duration::ZERO)]
    #[case::nanos("1500ns", Duration::from_nanos(1500))]
    #[case::micros("20us", Duration::from_micros(20))]
    #[case::micro_sign("20\u{b5}s", Duration::from_micros(20))]
    #[case::greek_mu("20\u{3bc}s", Duration::from_micros(20))]
    #[case::plus_sign("+2m", Duration::from_secs(120))]
    #[case::plus_zero("+0", Duration::ZERO)]
    fn parse_duration_accepts(#[case] raw: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_unit("30")]
    #[case::unknown_unit("3d")]
    #[case::unit_only("m")]
    #[case::negative("-5m")]
    #[case::negative_zero("-0")]
    #[case::sign_only("+")]
    fn parse_duration_rejects(#[case] raw: &str) {
        assert!(parse_duration(raw).is_err());
    }

    #[rstest]
    #[case::port_only(":8080", "0.0.0.0:8080")]
    #[case::full("127.0.0.1:9000", "127.0.0.1:9000")]
    fn parse_listen_addr_accepts(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(parse_listen_addr(raw).unwrap(), expected.parse().unwrap());
    }

    #[test]
    fn parse_listen_addr_rejects_garbage() {
        assert!(parse_listen_addr("localhost").is_err());
    }

    #[test]
    fn defaults_select_bounded_ephemeral_store() {
        let args = parse_args(&["imgbridge"]).unwrap();
        assert_eq!(args.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(
            args.store_config(),
            StoreConfig::Ephemeral(EphemeralConfig {
                ttl: Duration::from_secs(1800),
                max_bytes: Some(50 * 1024 * 1024),
            })
        );
        assert_eq!(args.cleanup_interval, Duration::from_secs(60));
        assert_eq!(args.upstream_timeout, None);
    }

    #[test]
    fn store_path_selects_persistent_store() {
        let args = parse_args(&["imgbridge", "--image-store-path", "/var/lib/images"]).unwrap();
        assert_eq!(
            args.store_config(),
            StoreConfig::Persistent {
                path: PathBuf::from("/var/lib/images")
            }
        );
    }

    #[test]
    fn invalid_expiry_fails_parsing() {
        assert!(parse_args(&["imgbridge", "--image-expiry", "soon"]).is_err());
    }
}
