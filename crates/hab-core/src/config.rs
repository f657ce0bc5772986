use std::{env, fs, net::SocketAddr, path::Path, time::Duration};

use crate::{errors::Error, poller::PollerConfig, Result};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_VIDEO_MAX_BYTES: usize = 10 << 20;

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub device_base_url: String,

    // Local listener
    pub listen_addr: SocketAddr,
    pub video_max_bytes: usize,

    // Timeouts
    pub poll_timeout: Duration,
    pub poll_retry_delay: Duration,
    pub device_timeout: Duration,
}

impl Config {
    /// Load from the process environment, after merging `.env` if one exists.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = get("BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| get("TELEGRAM_BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("BOT_TOKEN environment variable is required".to_string())
            })?;

        let device_base_url = get("SERVER_BASE_URL").and_then(non_empty).ok_or_else(|| {
            Error::Config("SERVER_BASE_URL environment variable is required".to_string())
        })?;
        let device_base_url = device_base_url.trim().trim_end_matches('/').to_string();
        if !(device_base_url.starts_with("http://") || device_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "SERVER_BASE_URL must start with http:// or https://, got {device_base_url}"
            )));
        }

        let raw_addr = get("LISTEN_ADDR")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid LISTEN_ADDR {raw_addr}: {e}")))?;

        let video_max_bytes =
            parse_num::<usize>("VIDEO_MAX_BYTES", &get)?.unwrap_or(DEFAULT_VIDEO_MAX_BYTES);

        let poll_timeout =
            Duration::from_secs(parse_num("POLL_TIMEOUT_SECS", &get)?.unwrap_or(60));
        let poll_retry_delay =
            Duration::from_secs(parse_num("POLL_RETRY_DELAY_SECS", &get)?.unwrap_or(5));
        let device_timeout =
            Duration::from_millis(parse_num("DEVICE_TIMEOUT_MS", &get)?.unwrap_or(10_000));

        Ok(Self {
            bot_token,
            device_base_url,
            listen_addr,
            video_max_bytes,
            poll_timeout,
            poll_retry_delay,
            device_timeout,
        })
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            poll_timeout: self.poll_timeout,
            retry_delay: self.poll_retry_delay,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

/// Unset or blank means "use the default"; anything else must parse.
fn parse_num<T>(key: &str, get: &impl Fn(&str) -> Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = get(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("invalid {key} {raw}: {e}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("SERVER_BASE_URL", "http://alarm.local/"),
        ]))
        .unwrap();

        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.device_base_url, "http://alarm.local");
        assert_eq!(cfg.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(cfg.video_max_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.poll_timeout, Duration::from_secs(60));
        assert_eq!(cfg.poll_retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.device_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("SERVER_BASE_URL", "http://x")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("BOT_TOKEN")));

        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "   "),
            ("SERVER_BASE_URL", "http://x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_or_bad_base_url_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("SERVER_BASE_URL")));

        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("SERVER_BASE_URL", "alarm.local"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn telegram_token_fallback_and_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "fallback"),
            ("SERVER_BASE_URL", "https://pi:8443"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("POLL_RETRY_DELAY_SECS", "2"),
            ("VIDEO_MAX_BYTES", "1024"),
            ("DEVICE_TIMEOUT_MS", " "),
        ]))
        .unwrap();

        assert_eq!(cfg.bot_token, "fallback");
        assert_eq!(cfg.listen_addr.port(), 9000);
        assert_eq!(cfg.poller().retry_delay, Duration::from_secs(2));
        assert_eq!(cfg.video_max_bytes, 1024);
        assert_eq!(cfg.device_timeout, Duration::from_secs(10));
    }

    #[test]
    fn invalid_listen_addr_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("SERVER_BASE_URL", "http://x"),
            ("LISTEN_ADDR", "nope"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("LISTEN_ADDR")));
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        for key in [
            "VIDEO_MAX_BYTES",
            "POLL_TIMEOUT_SECS",
            "POLL_RETRY_DELAY_SECS",
            "DEVICE_TIMEOUT_MS",
        ] {
            let err = Config::from_lookup(lookup(&[
                ("BOT_TOKEN", "t"),
                ("SERVER_BASE_URL", "http://x"),
                (key, "not-a-number"),
            ]))
            .unwrap_err();
            assert!(matches!(err, Error::Config(ref m) if m.contains(key)), "{key}: {err}");
        }
    }

    #[test]
    fn dotenv_parsing() {
        let parsed = parse_dotenv(
            "# comment\n\nBOT_TOKEN=\"abc\"\nexport SERVER_BASE_URL = 'http://pi'\nbroken\n=nokey\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("BOT_TOKEN".to_string(), "abc".to_string()),
                ("SERVER_BASE_URL".to_string(), "http://pi".to_string()),
            ]
        );
    }
}
