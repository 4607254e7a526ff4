use std::{collections::BTreeSet, fmt};

use thiserror::Error;

pub(crate) use forward_list::ForwardList;

mod forward_list;
mod loader;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_KEEPALIVE_INTERVAL: u64 = 10;
pub const DEFAULT_KEEPALIVE_MAX: u32 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {1}: {0}")]
    FileAccess(std::io::Error, String),
    #[error("cannot decode config file {1}: {0}")]
    Decode(serde_yaml::Error, String),
    #[error("invalid value {value:?} for --{flag}: {reason}")]
    InvalidFlagValue {
        flag: &'static str,
        value: String,
        reason: String,
    },
}

/// Every setting that can be given on the command line.
///
/// Proxy flags have no config file key, everything else maps to the key
/// returned by [`Flag::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Flag {
    Host,
    Port,
    Tls,
    TlsInsecure,
    PrivateKey,
    Username,
    Password,
    KeepaliveInterval,
    KeepaliveMax,
    Debug,
    NotRunCmd,
    LocalForward,
    RemoteForward,
    DynamicForward,
    DynamicHttp,
    Proxy,
    ProxySni,
    ProxyInsecure,
}

impl Flag {
    pub fn name(self) -> &'static str {
        match self {
            Flag::Host => "host",
            Flag::Port => "port",
            Flag::Tls => "tls",
            Flag::TlsInsecure => "tls-insecure",
            Flag::PrivateKey => "private_key",
            Flag::Username => "username",
            Flag::Password => "password",
            Flag::KeepaliveInterval => "keepalive_interval",
            Flag::KeepaliveMax => "keepalive_max",
            Flag::Debug => "debug",
            Flag::NotRunCmd => "not_run_cmd",
            Flag::LocalForward => "local_forward",
            Flag::RemoteForward => "remote_forward",
            Flag::DynamicForward => "dynamic_forward",
            Flag::DynamicHttp => "dynamic_http",
            Flag::Proxy => "proxy",
            Flag::ProxySni => "proxy-sni",
            Flag::ProxyInsecure => "proxy-insecure",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProxyConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// server name sent in the TLS handshake instead of `host`
    pub sni: String,
    pub insecure: bool,
}

impl ProxyConfig {
    fn render_url(&self) -> String {
        if self.scheme.is_empty() {
            return String::new();
        }
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
    /// parses `scheme://host:port`
    fn set_url(&mut self, raw: &str) -> Result<(), String> {
        let (scheme, address) = raw
            .split_once("://")
            .ok_or_else(|| "expected scheme://host:port".to_string())?;
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| "missing proxy port".to_string())?;
        if scheme.is_empty() || host.is_empty() {
            return Err("expected scheme://host:port".to_string());
        }
        self.port = port.parse().map_err(|e| format!("bad proxy port: {e}"))?;
        self.scheme = scheme.to_string();
        self.host = host.to_string();
        Ok(())
    }
}

#[derive(Clone, PartialEq)]
pub(crate) struct Config {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub tls_insecure: bool,
    pub private_key: String,
    pub username: String,
    pub password: String,
    /// seconds between two keepalive requests
    pub keepalive_interval: u64,
    /// unanswered keepalives before the connection is dropped
    pub keepalive_max: u32,
    pub debug: bool,
    /// don't run a remote command or shell, only forward
    pub not_run_cmd: bool,
    pub local_forwards: ForwardList,
    pub remote_forwards: ForwardList,
    pub dynamic_forwards: ForwardList,
    pub dynamic_http: ForwardList,
    pub proxy: ProxyConfig,
    /// flags the user gave on the command line
    explicit: BTreeSet<Flag>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::new(),
            port: DEFAULT_PORT,
            tls: false,
            tls_insecure: false,
            private_key: String::new(),
            username: String::new(),
            password: String::new(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_max: DEFAULT_KEEPALIVE_MAX,
            debug: false,
            not_run_cmd: false,
            local_forwards: ForwardList::new(),
            remote_forwards: ForwardList::new(),
            dynamic_forwards: ForwardList::new(),
            dynamic_http: ForwardList::new(),
            proxy: ProxyConfig::default(),
            explicit: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("tls_insecure", &self.tls_insecure)
            .field("private_key", &self.private_key)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("keepalive_interval", &self.keepalive_interval)
            .field("keepalive_max", &self.keepalive_max)
            .field("debug", &self.debug)
            .field("not_run_cmd", &self.not_run_cmd)
            .field("local_forwards", &self.local_forwards)
            .field("remote_forwards", &self.remote_forwards)
            .field("dynamic_forwards", &self.dynamic_forwards)
            .field("dynamic_http", &self.dynamic_http)
            .field("proxy", &self.proxy)
            .finish()
    }
}

fn parse_value<T>(flag: Flag, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidFlagValue {
        flag: flag.name(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Applies a raw command line value and marks `flag` as explicitly set.
    ///
    /// Forwarding flags accumulate: every call appends to what is already there.
    pub fn set_flag(&mut self, flag: Flag, raw: &str) -> Result<(), ConfigError> {
        self.apply(flag, raw)?;
        self.explicit.insert(flag);
        Ok(())
    }

    pub fn is_explicit(&self, flag: Flag) -> bool {
        self.explicit.contains(&flag)
    }

    pub fn explicit_flags(&self) -> impl Iterator<Item = Flag> + '_ {
        self.explicit.iter().copied()
    }

    /// Every forwarding spec with the kind of forward it belongs to.
    pub fn forwards(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("local", &self.local_forwards),
            ("remote", &self.remote_forwards),
            ("dynamic", &self.dynamic_forwards),
            ("dynamic http", &self.dynamic_http),
        ]
        .into_iter()
        .flat_map(|(kind, list)| list.iter().map(move |spec| (kind, spec)))
    }

    /// Current value of `flag` in the form [`Config::set_flag`] accepts.
    pub fn render(&self, flag: Flag) -> String {
        match flag {
            Flag::Host => self.host.clone(),
            Flag::Port => self.port.to_string(),
            Flag::Tls => self.tls.to_string(),
            Flag::TlsInsecure => self.tls_insecure.to_string(),
            Flag::PrivateKey => self.private_key.clone(),
            Flag::Username => self.username.clone(),
            Flag::Password => self.password.clone(),
            Flag::KeepaliveInterval => self.keepalive_interval.to_string(),
            Flag::KeepaliveMax => self.keepalive_max.to_string(),
            Flag::Debug => self.debug.to_string(),
            Flag::NotRunCmd => self.not_run_cmd.to_string(),
            Flag::LocalForward => self.local_forwards.render(),
            Flag::RemoteForward => self.remote_forwards.render(),
            Flag::DynamicForward => self.dynamic_forwards.render(),
            Flag::DynamicHttp => self.dynamic_http.render(),
            Flag::Proxy => self.proxy.render_url(),
            Flag::ProxySni => self.proxy.sni.clone(),
            Flag::ProxyInsecure => self.proxy.insecure.to_string(),
        }
    }

    fn forward_list_mut(&mut self, flag: Flag) -> Option<&mut ForwardList> {
        match flag {
            Flag::LocalForward => Some(&mut self.local_forwards),
            Flag::RemoteForward => Some(&mut self.remote_forwards),
            Flag::DynamicForward => Some(&mut self.dynamic_forwards),
            Flag::DynamicHttp => Some(&mut self.dynamic_http),
            _ => None,
        }
    }

    fn apply(&mut self, flag: Flag, raw: &str) -> Result<(), ConfigError> {
        match flag {
            Flag::Host => self.host = raw.to_string(),
            Flag::Port => self.port = parse_value(flag, raw)?,
            Flag::Tls => self.tls = parse_value(flag, raw)?,
            Flag::TlsInsecure => self.tls_insecure = parse_value(flag, raw)?,
            Flag::PrivateKey => self.private_key = raw.to_string(),
            Flag::Username => self.username = raw.to_string(),
            Flag::Password => self.password = raw.to_string(),
            Flag::KeepaliveInterval => self.keepalive_interval = parse_value(flag, raw)?,
            Flag::KeepaliveMax => self.keepalive_max = parse_value(flag, raw)?,
            Flag::Debug => self.debug = parse_value(flag, raw)?,
            Flag::NotRunCmd => self.not_run_cmd = parse_value(flag, raw)?,
            Flag::Proxy => {
                self.proxy
                    .set_url(raw)
                    .map_err(|reason| ConfigError::InvalidFlagValue {
                        flag: flag.name(),
                        value: raw.to_string(),
                        reason,
                    })?
            }
            Flag::ProxySni => self.proxy.sni = raw.to_string(),
            Flag::ProxyInsecure => self.proxy.insecure = parse_value(flag, raw)?,
            Flag::LocalForward => self.local_forwards.append(raw),
            Flag::RemoteForward => self.remote_forwards.append(raw),
            Flag::DynamicForward => self.dynamic_forwards.append(raw),
            Flag::DynamicHttp => self.dynamic_http.append(raw),
        }
        Ok(())
    }

    /// Puts a value captured by [`Config::render`] back in place.
    ///
    /// Forwarding lists are emptied first so the result is exactly the captured
    /// list and not whatever the config file left behind plus the captured one.
    fn restore(&mut self, flag: Flag, raw: &str) -> Result<(), ConfigError> {
        if let Some(list) = self.forward_list_mut(flag) {
            list.clear();
        }
        self.apply(flag, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.keepalive_interval, DEFAULT_KEEPALIVE_INTERVAL);
        assert_eq!(config.keepalive_max, DEFAULT_KEEPALIVE_MAX);
        assert!(config.host.is_empty());
        assert!(!config.debug);
        assert!(config.local_forwards.is_empty());
        assert_eq!(config.proxy, ProxyConfig::default());
        assert_eq!(config.explicit_flags().count(), 0);
    }

    #[test]
    fn set_flag_marks_explicit() {
        let mut config = Config::default();
        config.set_flag(Flag::Port, "2222").unwrap();
        config.set_flag(Flag::Debug, "true").unwrap();
        assert_eq!(config.port, 2222);
        assert!(config.debug);
        assert!(config.is_explicit(Flag::Port));
        assert!(config.is_explicit(Flag::Debug));
        assert!(!config.is_explicit(Flag::Host));
    }

    #[test]
    fn forwarding_flags_accumulate() {
        let mut config = Config::default();
        config.set_flag(Flag::LocalForward, "8080:a:80,9090:b:90").unwrap();
        config.set_flag(Flag::LocalForward, "9090:b:90,7070:c:70").unwrap();
        assert_eq!(
            config.render(Flag::LocalForward),
            "8080:a:80,9090:b:90,7070:c:70"
        );
        assert!(config.remote_forwards.is_empty());
    }

    #[test]
    fn forwards_lists_every_kind_in_order() {
        let mut config = Config::default();
        config.set_flag(Flag::RemoteForward, "9000:localhost:9000").unwrap();
        config.set_flag(Flag::LocalForward, "8080:a:80,8443:a:443").unwrap();
        config.set_flag(Flag::DynamicHttp, "3128").unwrap();
        assert_eq!(
            config.forwards().collect::<Vec<_>>(),
            vec![
                ("local", "8080:a:80"),
                ("local", "8443:a:443"),
                ("remote", "9000:localhost:9000"),
                ("dynamic http", "3128"),
            ]
        );
        assert_eq!(Config::default().forwards().count(), 0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        let err = config.set_flag(Flag::Port, "ssh").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidFlagValue { flag: "port", .. }
        ));
        assert!(config.set_flag(Flag::Tls, "maybe").is_err());
        assert!(config.set_flag(Flag::Proxy, "localhost:3128").is_err());
        assert!(config.set_flag(Flag::Proxy, "http://localhost").is_err());
        assert!(!config.is_explicit(Flag::Port));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn proxy_url_round_trips() {
        let mut config = Config::default();
        config
            .set_flag(Flag::Proxy, "https://proxy.example.com:443")
            .unwrap();
        assert_eq!(config.proxy.scheme, "https");
        assert_eq!(config.proxy.host, "proxy.example.com");
        assert_eq!(config.proxy.port, 443);
        assert_eq!(config.render(Flag::Proxy), "https://proxy.example.com:443");
        assert_eq!(Config::default().render(Flag::Proxy), "");
    }

    #[test]
    fn restore_replaces_forward_list() {
        let mut config = Config::default();
        config.local_forwards.append("9090:other");
        config.restore(Flag::LocalForward, "8080:local").unwrap();
        assert_eq!(config.local_forwards.render(), "8080:local");
    }

    #[test]
    fn debug_output_hides_password() {
        let mut config = Config::default();
        config.set_flag(Flag::Password, "hunter2").unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
