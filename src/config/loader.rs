use std::path::Path;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Config, ConfigError, Flag, ForwardList};

/// Where the raw bytes of a config file come from.
#[cfg_attr(test, automock)]
pub(crate) trait ConfigSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

pub(crate) struct FsSource;

impl ConfigSource for FsSource {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// The keys a config file may carry. A key that is absent leaves the
/// corresponding field alone; the proxy settings have no key at all.
#[derive(Deserialize, Debug, Default, PartialEq)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<bool>,
    #[serde(rename = "tls-insecure")]
    tls_insecure: Option<bool>,
    private_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    keepalive_interval: Option<u64>,
    keepalive_max: Option<u32>,
    debug: Option<bool>,
    not_run_cmd: Option<bool>,
    local_forward: Option<ForwardList>,
    remote_forward: Option<ForwardList>,
    dynamic_forward: Option<ForwardList>,
    dynamic_http: Option<ForwardList>,
}

impl FileConfig {
    /// Overwrites every field of `config` the file mentions, command line or not.
    fn write_into(self, config: &mut Config) {
        if let Some(value) = self.host {
            config.host = value;
        }
        if let Some(value) = self.port {
            config.port = value;
        }
        if let Some(value) = self.tls {
            config.tls = value;
        }
        if let Some(value) = self.tls_insecure {
            config.tls_insecure = value;
        }
        if let Some(value) = self.private_key {
            config.private_key = value;
        }
        if let Some(value) = self.username {
            config.username = value;
        }
        if let Some(value) = self.password {
            config.password = value;
        }
        if let Some(value) = self.keepalive_interval {
            config.keepalive_interval = value;
        }
        if let Some(value) = self.keepalive_max {
            config.keepalive_max = value;
        }
        if let Some(value) = self.debug {
            config.debug = value;
        }
        if let Some(value) = self.not_run_cmd {
            config.not_run_cmd = value;
        }
        if let Some(value) = self.local_forward {
            config.local_forwards = value;
        }
        if let Some(value) = self.remote_forward {
            config.remote_forwards = value;
        }
        if let Some(value) = self.dynamic_forward {
            config.dynamic_forwards = value;
        }
        if let Some(value) = self.dynamic_http {
            config.dynamic_http = value;
        }
    }
}

/// Command line values captured before the file is decoded.
struct Snapshot(Vec<(Flag, String)>);

impl Snapshot {
    fn take(config: &Config) -> Self {
        Snapshot(
            config
                .explicit_flags()
                .map(|flag| (flag, config.render(flag)))
                .collect(),
        )
    }
    fn restore(self, config: &mut Config) -> Result<(), ConfigError> {
        for (flag, value) in self.0 {
            debug!("restoring --{} from the command line", flag.name());
            config.restore(flag, &value)?;
        }
        Ok(())
    }
}

impl Config {
    /// Loads the YAML file at `path` on top of the current values.
    ///
    /// Flags given on the command line keep their command line value whatever
    /// the file says. On a decode error some fields may already be overwritten.
    pub fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.load_from(&FsSource, path)
    }

    pub fn load_from(
        &mut self,
        source: &dyn ConfigSource,
        path: &Path,
    ) -> Result<(), ConfigError> {
        let snapshot = Snapshot::take(self);
        let path_str = path.display().to_string();

        let raw = source
            .read(path)
            .map_err(|e| ConfigError::FileAccess(e, path_str.clone()))?;
        let file_config: FileConfig =
            serde_yaml::from_slice(&raw).map_err(|e| ConfigError::Decode(e, path_str.clone()))?;
        file_config.write_into(self);

        snapshot.restore(self)?;
        info!("loaded config file {}", path_str);
        Ok(())
    }
}
