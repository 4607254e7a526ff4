use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, ConfigError, Flag};

#[derive(Parser, Debug)]
#[command(version, about = "obfssh is an ssh client that can tunnel through tls and http proxies", long_about = None)]
pub(crate) struct ObfsshCli {
    /// yaml config file, command line flags take precedence over it
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// remote host, optionally prefixed by `user@`
    #[arg(conflicts_with = "host")]
    pub destination: Option<String>,

    #[arg(long)]
    pub host: Option<String>,
    /// ssh port
    #[arg(short, long)]
    pub port: Option<u16>,
    /// connect with tls
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub tls: Option<bool>,
    /// skip verification of the tls certificate
    #[arg(long = "tls-insecure", num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub tls_insecure: Option<bool>,
    /// private key file used for authentication
    #[arg(short = 'i', long = "private_key")]
    pub private_key: Option<String>,
    #[arg(short = 'l', long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    /// seconds between keepalive requests
    #[arg(long = "keepalive_interval")]
    pub keepalive_interval: Option<u64>,
    /// unanswered keepalives before giving up
    #[arg(long = "keepalive_max")]
    pub keepalive_max: Option<u32>,
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub debug: Option<bool>,
    /// do not run a remote command, only forward ports
    #[arg(short = 'N', long = "not_run_cmd", num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub not_run_cmd: Option<bool>,
    /// local forward [bind_address:]port:host:hostport, repeatable and comma separated
    #[arg(short = 'L', long = "local_forward")]
    pub local_forward: Vec<String>,
    /// remote forward [bind_address:]port:host:hostport, repeatable and comma separated
    #[arg(short = 'R', long = "remote_forward")]
    pub remote_forward: Vec<String>,
    /// socks5 proxy [bind_address:]port, repeatable and comma separated
    #[arg(short = 'D', long = "dynamic_forward")]
    pub dynamic_forward: Vec<String>,
    /// http proxy [bind_address:]port, repeatable and comma separated
    #[arg(long = "dynamic_http")]
    pub dynamic_http: Vec<String>,
    /// connect through a proxy, scheme://host:port
    #[arg(long)]
    pub proxy: Option<String>,
    /// sni sent to the proxy
    #[arg(long = "proxy-sni")]
    pub proxy_sni: Option<String>,
    /// skip verification of the proxy certificate
    #[arg(long = "proxy-insecure", num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub proxy_insecure: Option<bool>,
}

impl ObfsshCli {
    /// Every flag the user gave, in the raw form [`Config::set_flag`] takes.
    ///
    /// Forwarding flags yield one entry per occurrence.
    pub fn explicit_flags(&self) -> Vec<(Flag, String)> {
        let mut flags = Vec::new();
        if let Some(destination) = &self.destination {
            match destination.split_once('@') {
                Some((user, host)) => {
                    if !user.is_empty() {
                        flags.push((Flag::Username, user.to_string()));
                    }
                    flags.push((Flag::Host, host.to_string()));
                }
                None => flags.push((Flag::Host, destination.clone())),
            }
        }

        let scalars = [
            (Flag::Host, self.host.clone()),
            (Flag::Port, self.port.map(|v| v.to_string())),
            (Flag::Tls, self.tls.map(|v| v.to_string())),
            (Flag::TlsInsecure, self.tls_insecure.map(|v| v.to_string())),
            (Flag::PrivateKey, self.private_key.clone()),
            (Flag::Username, self.username.clone()),
            (Flag::Password, self.password.clone()),
            (
                Flag::KeepaliveInterval,
                self.keepalive_interval.map(|v| v.to_string()),
            ),
            (Flag::KeepaliveMax, self.keepalive_max.map(|v| v.to_string())),
            (Flag::Debug, self.debug.map(|v| v.to_string())),
            (Flag::NotRunCmd, self.not_run_cmd.map(|v| v.to_string())),
            (Flag::Proxy, self.proxy.clone()),
            (Flag::ProxySni, self.proxy_sni.clone()),
            (
                Flag::ProxyInsecure,
                self.proxy_insecure.map(|v| v.to_string()),
            ),
        ];
        flags.extend(
            scalars
                .into_iter()
                .filter_map(|(flag, value)| value.map(|v| (flag, v))),
        );

        let lists = [
            (Flag::LocalForward, &self.local_forward),
            (Flag::RemoteForward, &self.remote_forward),
            (Flag::DynamicForward, &self.dynamic_forward),
            (Flag::DynamicHttp, &self.dynamic_http),
        ];
        for (flag, values) in lists {
            flags.extend(values.iter().map(|v| (flag, v.clone())));
        }
        flags
    }

    /// Builds the configuration: command line first, then the config file if any.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for (flag, value) in self.explicit_flags() {
            config.set_flag(flag, &value)?;
        }
        if let Some(path) = &self.config {
            config.load(path)?;
        }
        Ok(config)
    }
}
