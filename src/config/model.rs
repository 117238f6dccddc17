use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failure read file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failure parse file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Profiles {
    pub active: String,
}
// 用来接收check-mysql.yml解析结果
#[derive(Serialize, Deserialize, Debug)]
pub struct EnvConfig {
    pub profiles: Profiles,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub connection: Connection,
    /// Recorded query results to serve instead of a live server.
    pub replay: Option<PathBuf>,
    pub thresholds: Thresholds,
}

/// Where the server lives and how to log in.
///
/// Checks never read these: they are resolved here (file, then command line)
/// and carried for whichever `MetricSource` talks to the server. The password
/// is never serialized or logged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub socket: Option<PathBuf>,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Connection {
            host: "localhost".to_string(),
            port: 3306,
            socket: None,
            user: "root".to_string(),
            password: None,
        }
    }
}

/// Threshold pair as written in a profile. Either side may be left out and
/// falls back to the built-in value for that check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct Levels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
}

impl Levels {
    /// Fills whatever `self` leaves out from `fallback`.
    pub fn or(self, fallback: Levels) -> Levels {
        Levels {
            warning: self.warning.or(fallback.warning),
            critical: self.critical.or(fallback.critical),
        }
    }

    fn is_finite(&self) -> bool {
        self.warning.map_or(true, f64::is_finite) && self.critical.map_or(true, f64::is_finite)
    }
}

// 内置阈值 (warning, critical)，配置文件和命令行都没给时使用
pub const UPTIME_DEFAULT: (f64, f64) = (0.0, 0.0);
pub const CONNECTION_DEFAULT: (f64, f64) = (250.0, 280.0);
pub const REPLICATION_DEFAULT: (f64, f64) = (5.0, 10.0);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct Thresholds {
    pub uptime: Levels,
    pub connection: Levels,
    pub replication: Levels,
}

impl Thresholds {
    fn check(&self) -> Result<(), String> {
        for (name, levels) in [
            ("uptime", self.uptime),
            ("connection", self.connection),
            ("replication", self.replication),
        ] {
            if !levels.is_finite() {
                return Err(format!("thresholds.{} must be finite numbers", name));
            }
        }
        Ok(())
    }
}

// 加载指定配置文件
pub fn load_config<T, P>(path: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str::<T>(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

// 目录下的check-mysql.yml决定激活哪个环境
fn load_env_config(dir: &Path) -> Result<Option<EnvConfig>, ConfigError> {
    let path = dir.join("check-mysql.yml");
    if !path.exists() {
        debug!("no {} found, using defaults", path.display());
        return Ok(None);
    }
    load_config::<EnvConfig, _>(path).map(Some)
}

/// Loads `check-mysql-<active>.yml` for the profile named in
/// `<dir>/check-mysql.yml`. A directory without `check-mysql.yml` yields the
/// built-in defaults; a named profile whose file is missing is an error.
pub fn load_settings<P: AsRef<Path>>(dir: P) -> Result<Settings, ConfigError> {
    let dir = dir.as_ref();
    match load_env_config(dir)? {
        Some(env_config) => {
            let path = dir.join(format!("check-mysql-{}.yml", env_config.profiles.active));
            debug!("loading profile {}", path.display());
            let settings = load_config::<Settings, _>(&path)?;
            settings
                .thresholds
                .check()
                .map_err(|reason| ConfigError::Invalid { path, reason })?;
            Ok(settings)
        }
        None => Ok(Settings::default()),
    }
}
