use crate::error::{Result, WarehouseError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "dwh.toml";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_PORT: u16 = 5439;

/// Overrides `[cluster].db_password` when set.
pub const PASSWORD_ENV: &str = "DWH_DB_PASSWORD";

/// Parsed once at start-up and handed to each stage.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cluster: Option<ClusterConfig>,
    pub iam_role: Option<IamRoleConfig>,
    pub s3: Option<S3Config>,
    pub local: Option<LocalConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    #[serde(default = "default_port")]
    pub db_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IamRoleConfig {
    pub arn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub log_data: String,
    pub log_jsonpath: String,
    pub song_data: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    pub database_path: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
}

/// Sections needed by the Redshift target.
#[derive(Debug, Clone, Copy)]
pub struct CloudConfig<'a> {
    pub cluster: &'a ClusterConfig,
    pub iam_role: &'a IamRoleConfig,
    pub s3: &'a S3Config,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            WarehouseError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&content)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if let Some(cluster) = config.cluster.as_mut() {
                debug!("Using cluster password from {}", PASSWORD_ENV);
                cluster.db_password = password;
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Cluster, IAM role and S3 sections, validated.
    pub fn cloud(&self) -> Result<CloudConfig<'_>> {
        let cluster = self.cluster()?;
        let iam_role = self
            .iam_role
            .as_ref()
            .ok_or_else(|| missing_section("iam_role"))?;
        let s3 = self.s3.as_ref().ok_or_else(|| missing_section("s3"))?;

        if iam_role.arn.trim().is_empty() {
            return Err(WarehouseError::Config("iam_role.arn must not be empty".into()));
        }
        for (key, location) in [
            ("s3.log_data", &s3.log_data),
            ("s3.log_jsonpath", &s3.log_jsonpath),
            ("s3.song_data", &s3.song_data),
        ] {
            if !location.starts_with("s3://") {
                return Err(WarehouseError::Config(format!(
                    "{key} must be an s3:// location, got '{location}'"
                )));
            }
        }
        if s3.region.trim().is_empty() {
            return Err(WarehouseError::Config("s3.region must not be empty".into()));
        }

        Ok(CloudConfig {
            cluster,
            iam_role,
            s3,
        })
    }

    pub fn cluster(&self) -> Result<&ClusterConfig> {
        let cluster = self
            .cluster
            .as_ref()
            .ok_or_else(|| missing_section("cluster"))?;
        for (key, value) in [
            ("host", &cluster.host),
            ("db_name", &cluster.db_name),
            ("db_user", &cluster.db_user),
        ] {
            if value.trim().is_empty() {
                return Err(WarehouseError::Config(format!(
                    "cluster.{key} must not be empty"
                )));
            }
        }
        if cluster.db_port == 0 {
            return Err(WarehouseError::Config("cluster.db_port must not be 0".into()));
        }
        Ok(cluster)
    }

    pub fn local(&self) -> Result<&LocalConfig> {
        self.local.as_ref().ok_or_else(|| missing_section("local"))
    }
}

fn missing_section(name: &str) -> WarehouseError {
    WarehouseError::Config(format!("missing [{name}] section"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [cluster]
        host = "dwh.example.us-west-2.redshift.amazonaws.com"
        db_name = "dwh"
        db_user = "dwhuser"
        db_password = "secret"

        [iam_role]
        arn = "arn:aws:iam::123456789012:role/dwhRole"

        [s3]
        log_data = "s3://udacity-dend/log_data"
        log_jsonpath = "s3://udacity-dend/log_json_path.json"
        song_data = "s3://udacity-dend/song_data"

        [local]
        database_path = "sparkify.db"
        song_data = "data/song_data"
        log_data = "data/log_data"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(FULL).unwrap();
        let cloud = config.cloud().unwrap();
        assert_eq!(cloud.cluster.db_port, DEFAULT_PORT);
        assert_eq!(cloud.s3.region, DEFAULT_REGION);
        assert_eq!(
            config.local().unwrap().database_path,
            PathBuf::from("sparkify.db")
        );
    }

    #[test]
    fn test_missing_sections_reported_by_target() {
        let config = Config::from_toml_str(
            r#"
            [local]
            database_path = ":memory:"
            song_data = "songs"
            log_data = "logs"
            "#,
        )
        .unwrap();

        assert!(config.local().is_ok());
        let err = config.cloud().unwrap_err();
        assert!(err.to_string().contains("[cluster]"));
    }

    #[test]
    fn test_rejects_non_s3_location() {
        let config =
            Config::from_toml_str(&FULL.replace("s3://udacity-dend/song_data", "/tmp/songs"))
                .unwrap();
        let err = config.cloud().unwrap_err();
        assert!(err.to_string().contains("s3.song_data"));
    }

    #[test]
    fn test_rejects_empty_host() {
        let config = Config::from_toml_str(
            &FULL.replace("dwh.example.us-west-2.redshift.amazonaws.com", ""),
        )
        .unwrap();
        assert!(matches!(config.cluster(), Err(WarehouseError::Config(_))));
    }
}
