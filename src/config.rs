use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Post-processing configuration shared with the rest of the pipeline.
/// Only the LIMS connection keys are interpreted here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub galaxy_url: Option<String>,
    #[serde(default)]
    pub galaxy_user: Option<String>,
    #[serde(default)]
    pub galaxy_password: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimsCredentials {
    pub base_url: String,
    pub user: String,
    pub password: String,
}

impl Config {
    pub fn lims_credentials(&self) -> Result<LimsCredentials, DeliveryError> {
        let base_url = self
            .galaxy_url
            .clone()
            .ok_or(DeliveryError::MissingConfigKey("galaxy_url"))?;
        let user = self
            .galaxy_user
            .clone()
            .ok_or(DeliveryError::MissingConfigKey("galaxy_user"))?;
        let password = self
            .galaxy_password
            .clone()
            .ok_or(DeliveryError::MissingConfigKey("galaxy_password"))?;
        Ok(LimsCredentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            password,
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Utf8Path) -> Result<Config, DeliveryError> {
        if !path.exists() {
            return Err(DeliveryError::MissingConfig(path.to_path_buf()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| DeliveryError::ConfigRead(path.to_path_buf()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, DeliveryError> {
        // An empty YAML document is a valid, empty configuration.
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content).map_err(|err| DeliveryError::ConfigParse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_config_with_lims_keys() {
        let config = ConfigLoader::parse(
            "galaxy_url: http://lims.example.org/\ngalaxy_user: seq\ngalaxy_password: secret\nalgorithm:\n  num_cores: 8\n",
        )
        .unwrap();
        let credentials = config.lims_credentials().unwrap();
        assert_eq!(credentials.base_url, "http://lims.example.org");
        assert_eq!(credentials.user, "seq");
        assert!(config.extra.contains_key("algorithm"));
    }

    #[test]
    fn missing_lims_key() {
        let config = ConfigLoader::parse("galaxy_url: http://lims\n").unwrap();
        assert_matches!(
            config.lims_credentials(),
            Err(DeliveryError::MissingConfigKey("galaxy_user"))
        );
    }

    #[test]
    fn empty_config_is_default() {
        let config = ConfigLoader::parse("\n").unwrap();
        assert!(config.galaxy_url.is_none());
    }
}
