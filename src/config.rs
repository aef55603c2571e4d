//! Configuration for a managed container.

use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BerthError, Result};

/// Value of a single `docker run` option.
///
/// Declarative configs map these from bool / string / sequence-of-string.
/// There is no "disabled" variant: an option that should not appear on the
/// command line is omitted from the option list entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Presence-only flag (`-d`, `--init`).
    Switch,
    /// Flag followed by a single value (`--name chrome`).
    Value(String),
    /// Flag repeated once per element, element order preserved
    /// (`-p 4444:4444 -p 7900:7900`).
    Values(Vec<String>),
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OptionValue::Switch => serializer.serialize_bool(true),
            OptionValue::Value(v) => serializer.serialize_str(v),
            OptionValue::Values(vs) => vs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            One(String),
            Many(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(OptionValue::Switch),
            Raw::Bool(false) => Err(de::Error::custom(
                "disabled options must be omitted, not set to false",
            )),
            Raw::One(v) => Ok(OptionValue::Value(v)),
            Raw::Many(vs) => Ok(OptionValue::Values(vs)),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Value(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Value(v)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(vs: Vec<String>) -> Self {
        OptionValue::Values(vs)
    }
}

/// Configuration for a [`ContainerManager`], fixed at construction.
///
/// Options keep their insertion order; the serialized command line iterates
/// them in the order they were added.
///
/// [`ContainerManager`]: crate::manager::ContainerManager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Docker image to run. Required, must be non-empty.
    pub image: String,
    /// `docker run` options in insertion order.
    #[serde(default)]
    pub options: Vec<(String, OptionValue)>,
    /// Explicit command to run inside the container, after the image.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments to the explicit command, after it.
    #[serde(default)]
    pub args: Option<String>,
    /// Log the exact run command and forward container output as tracing
    /// events.
    #[serde(default)]
    pub debug: bool,
    /// Optional readiness endpoint polled before `run()` resolves.
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Explicit sentinel-file path. Defaults to a path derived from the
    /// image name, see [`cidfile_path`](Self::cidfile_path).
    #[serde(default)]
    pub cidfile: Option<PathBuf>,
    /// Interval between health probes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Maximum time to wait for the health check before giving up.
    #[serde(default = "default_max_wait")]
    pub max_wait: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(15)
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            options: Vec::new(),
            command: None,
            args: None,
            debug: false,
            health_check_url: None,
            cidfile: None,
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

impl ManagerConfig {
    /// Create a config for `image` with defaults for everything else.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Append an option, preserving insertion order.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    /// Append a presence-only flag.
    pub fn switch(mut self, name: impl Into<String>) -> Self {
        self.options.push((name.into(), OptionValue::Switch));
        self
    }

    /// Set the explicit container command.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set the arguments passed after the container command.
    pub fn args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    /// Enable debug logging of the run command and container output.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the readiness endpoint polled before `run()` resolves.
    pub fn health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    /// Override the derived sentinel-file path.
    pub fn cidfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.cidfile = Some(path.into());
        self
    }

    /// Set the interval between health probes.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum time to wait for the health check.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sentinel-file path for this configuration.
    ///
    /// The explicit [`cidfile`](Self::cidfile) wins when set. Otherwise the
    /// path is derived from the image name: every non-alphanumeric character
    /// replaced with `_`, suffixed `.cid`, resolved against the current
    /// working directory.
    pub fn cidfile_path(&self) -> PathBuf {
        if let Some(path) = &self.cidfile {
            return path.clone();
        }
        let sanitized: String = self
            .image
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let name = format!("{sanitized}.cid");
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(name),
            Err(_) => PathBuf::from(name),
        }
    }

    /// Validate the configuration. Called once at manager construction.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(BerthError::Config {
                reason: "image name must not be empty".to_string(),
            });
        }
        if let Some(url) = &self.health_check_url {
            Url::parse(url).map_err(|e| BerthError::Config {
                reason: format!("invalid health check url '{url}': {e}"),
            })?;
        }
        Ok(())
    }
}
