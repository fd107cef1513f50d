//! Configuration file handling
//!
//! Settings come from a TOML file and are then overridden by the
//! environment variables the CI pipelines already export.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, default_test_root};
use super::Result;
use crate::url::redact_signature;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Executables under test
    #[serde(default)]
    pub executables: Executables,

    /// Local directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Remote containers, shares and accounts
    #[serde(default)]
    pub remotes: Remotes,

    /// Account credentials exported to the tool and the validator
    #[serde(default)]
    pub credentials: Credentials,

    /// Scenario family switches
    #[serde(default)]
    pub switches: Switches,

    /// Verbose harness logging
    #[serde(default)]
    pub debug: bool,
}

/// Locations of the two executables that get staged into the test directory
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Executables {
    /// The transfer tool under test
    pub transfer: Option<PathBuf>,
    /// The validator used to check what the transfer tool did
    pub validator: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory under which `test_data` is created
    #[serde(default = "default_test_root")]
    pub test_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            test_root: default_test_root(),
        }
    }
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Bound on a single transfer-tool invocation
    #[serde(default = "default_transfer")]
    pub transfer_secs: u64,

    /// Bound on a single validator invocation; validators may scan large trees
    #[serde(default = "default_validator")]
    pub validator_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            transfer_secs: default_transfer(),
            validator_secs: default_validator(),
        }
    }
}

impl Timeouts {
    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_secs)
    }

    pub fn validator(&self) -> Duration {
        Duration::from_secs(self.validator_secs)
    }
}

fn default_transfer() -> u64 {
    180
}
fn default_validator() -> u64 {
    600
}

/// Remote endpoints, each carrying its own authorization query
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Remotes {
    pub container_sas_url: Option<String>,
    pub container_oauth_url: Option<String>,
    pub container_oauth_validate_sas_url: Option<String>,
    pub share_sas_url: Option<String>,
    pub premium_container_sas_url: Option<String>,
    pub filesystem_url: Option<String>,
    pub filesystem_sas_url: Option<String>,
    pub s2s_src_blob_account_sas_url: Option<String>,
    pub s2s_dst_blob_account_sas_url: Option<String>,
    pub s2s_src_file_account_sas_url: Option<String>,
    pub s2s_src_s3_service_url: Option<String>,
    pub s2s_src_gcp_service_url: Option<String>,
    pub tamper_proof_endpoint: Option<String>,
}

/// Credentials handed to the tool as opaque strings
#[derive(Deserialize, Default, Clone)]
pub struct Credentials {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub oauth_tenant_id: Option<String>,
    pub oauth_aad_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub google_application_credentials: Option<String>,
    pub google_cloud_project: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("oauth_tenant_id", &self.oauth_tenant_id.as_ref().map(|_| "<redacted>"))
            .field("oauth_aad_endpoint", &self.oauth_aad_endpoint)
            .field("aws_access_key_id", &self.aws_access_key_id.as_ref().map(|_| "<redacted>"))
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("google_application_credentials", &self.google_application_credentials)
            .field("google_cloud_project", &self.google_cloud_project)
            .finish()
    }
}

/// Switches that turn whole scenario families off
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Switches {
    #[serde(default)]
    pub s3_tests_off: bool,
    #[serde(default)]
    pub gcp_tests_off: bool,
}

impl Config {
    /// Load configuration from `path`, or from the default config file
    ///
    /// Returns default configuration if the file doesn't exist. Environment
    /// variables are applied on top either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(config_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a configuration file without consulting the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Override fields from environment-style variables
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("TEST_DIRECTORY_PATH") {
            self.paths.test_root = PathBuf::from(v);
        }
        if let Some(v) = get("AZCOPY_EXECUTABLE_PATH") {
            self.executables.transfer = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TEST_SUITE_EXECUTABLE_LOCATION") {
            self.executables.validator = Some(PathBuf::from(v));
        }

        let remotes = &mut self.remotes;
        for (key, slot) in [
            ("CONTAINER_SAS_URL", &mut remotes.container_sas_url),
            ("CONTAINER_OAUTH_URL", &mut remotes.container_oauth_url),
            (
                "CONTAINER_OAUTH_VALIDATE_SAS_URL",
                &mut remotes.container_oauth_validate_sas_url,
            ),
            ("SHARE_SAS_URL", &mut remotes.share_sas_url),
            ("PREMIUM_CONTAINER_SAS_URL", &mut remotes.premium_container_sas_url),
            ("FILESYSTEM_URL", &mut remotes.filesystem_url),
            ("FILESYSTEM_SAS_URL", &mut remotes.filesystem_sas_url),
            (
                "S2S_SRC_BLOB_ACCOUNT_SAS_URL",
                &mut remotes.s2s_src_blob_account_sas_url,
            ),
            (
                "S2S_DST_BLOB_ACCOUNT_SAS_URL",
                &mut remotes.s2s_dst_blob_account_sas_url,
            ),
            (
                "S2S_SRC_FILE_ACCOUNT_SAS_URL",
                &mut remotes.s2s_src_file_account_sas_url,
            ),
            ("S2S_SRC_S3_SERVICE_URL", &mut remotes.s2s_src_s3_service_url),
            ("S2S_SRC_GCP_SERVICE_URL", &mut remotes.s2s_src_gcp_service_url),
            ("TAMPER_PROOF_ENDPOINT", &mut remotes.tamper_proof_endpoint),
        ] {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }

        let credentials = &mut self.credentials;
        for (key, slot) in [
            ("ACCOUNT_NAME", &mut credentials.account_name),
            ("ACCOUNT_KEY", &mut credentials.account_key),
            ("OAUTH_TENANT_ID", &mut credentials.oauth_tenant_id),
            ("OAUTH_AAD_ENDPOINT", &mut credentials.oauth_aad_endpoint),
            ("AWS_ACCESS_KEY_ID", &mut credentials.aws_access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &mut credentials.aws_secret_access_key),
            (
                "GOOGLE_APPLICATION_CREDENTIALS",
                &mut credentials.google_application_credentials,
            ),
            ("GOOGLE_CLOUD_PROJECT", &mut credentials.google_cloud_project),
        ] {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }

        if let Some(v) = get("S3_TESTS_OFF") {
            self.switches.s3_tests_off = parse_switch(&v);
        }
        if let Some(v) = get("GCP_TESTS_OFF") {
            self.switches.gcp_tests_off = parse_switch(&v);
        }
        if let Some(v) = get("HARNESS_DEBUG") {
            self.debug = parse_switch(&v);
        }
    }

    /// Variables exported to every child process
    ///
    /// The validator reads account credentials and remote endpoints from its
    /// environment, so settings that only came from the config file still
    /// have to reach it. Unset values are left out.
    pub fn child_env(&self) -> Vec<(&'static str, String)> {
        let remotes = &self.remotes;
        let credentials = &self.credentials;
        let mut vars: Vec<(&'static str, String)> = [
            ("CONTAINER_SAS_URL", &remotes.container_sas_url),
            ("CONTAINER_OAUTH_URL", &remotes.container_oauth_url),
            (
                "CONTAINER_OAUTH_VALIDATE_SAS_URL",
                &remotes.container_oauth_validate_sas_url,
            ),
            ("SHARE_SAS_URL", &remotes.share_sas_url),
            ("PREMIUM_CONTAINER_SAS_URL", &remotes.premium_container_sas_url),
            ("FILESYSTEM_URL", &remotes.filesystem_url),
            ("FILESYSTEM_SAS_URL", &remotes.filesystem_sas_url),
            ("S2S_SRC_BLOB_ACCOUNT_SAS_URL", &remotes.s2s_src_blob_account_sas_url),
            ("S2S_DST_BLOB_ACCOUNT_SAS_URL", &remotes.s2s_dst_blob_account_sas_url),
            ("S2S_SRC_FILE_ACCOUNT_SAS_URL", &remotes.s2s_src_file_account_sas_url),
            ("S2S_SRC_S3_SERVICE_URL", &remotes.s2s_src_s3_service_url),
            ("S2S_SRC_GCP_SERVICE_URL", &remotes.s2s_src_gcp_service_url),
            ("TAMPER_PROOF_ENDPOINT", &remotes.tamper_proof_endpoint),
            ("ACCOUNT_NAME", &credentials.account_name),
            ("ACCOUNT_KEY", &credentials.account_key),
            ("OAUTH_TENANT_ID", &credentials.oauth_tenant_id),
            ("OAUTH_AAD_ENDPOINT", &credentials.oauth_aad_endpoint),
            ("AWS_ACCESS_KEY_ID", &credentials.aws_access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &credentials.aws_secret_access_key),
            (
                "GOOGLE_APPLICATION_CREDENTIALS",
                &credentials.google_application_credentials,
            ),
            ("GOOGLE_CLOUD_PROJECT", &credentials.google_cloud_project),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
        .collect();

        if self.switches.s3_tests_off {
            vars.push(("S3_TESTS_OFF", "true".to_string()));
        }
        if self.switches.gcp_tests_off {
            vars.push(("GCP_TESTS_OFF", "true".to_string()));
        }
        vars
    }

    /// Log the effective settings, with signatures redacted and secrets omitted
    pub fn log_effective(&self) {
        tracing::info!(test_root = %self.paths.test_root.display(), "test root");
        if let Some(path) = &self.executables.transfer {
            tracing::info!(path = %path.display(), "transfer executable");
        }
        if let Some(path) = &self.executables.validator {
            tracing::info!(path = %path.display(), "validator executable");
        }

        let remotes = &self.remotes;
        for (name, value) in [
            ("container", &remotes.container_sas_url),
            ("oauth container", &remotes.container_oauth_url),
            ("oauth validate container", &remotes.container_oauth_validate_sas_url),
            ("share", &remotes.share_sas_url),
            ("premium container", &remotes.premium_container_sas_url),
            ("filesystem", &remotes.filesystem_url),
            ("filesystem sas", &remotes.filesystem_sas_url),
            ("s2s source blob account", &remotes.s2s_src_blob_account_sas_url),
            ("s2s destination blob account", &remotes.s2s_dst_blob_account_sas_url),
            ("s2s source file account", &remotes.s2s_src_file_account_sas_url),
            ("s2s source s3 service", &remotes.s2s_src_s3_service_url),
            ("s2s source gcp service", &remotes.s2s_src_gcp_service_url),
            ("tamper proof endpoint", &remotes.tamper_proof_endpoint),
        ] {
            match value {
                Some(url) => tracing::info!(url = %redact_signature(url), "{name}"),
                None => tracing::debug!("{name} not configured"),
            }
        }

        if let Some(name) = &self.credentials.account_name {
            tracing::info!(account = %name, "account name");
        }
        if let Some(endpoint) = &self.credentials.oauth_aad_endpoint {
            tracing::info!(endpoint = %endpoint, "oauth endpoint");
        }
        tracing::info!(
            s3_tests_off = self.switches.s3_tests_off,
            gcp_tests_off = self.switches.gcp_tests_off,
            "scenario switches"
        );
    }
}

fn parse_switch(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeouts.transfer_secs, 180);
        assert_eq!(config.timeouts.validator_secs, 600);
        assert!(config.remotes.container_sas_url.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
[executables]
transfer = "/opt/azcopy"
validator = "/opt/testSuite"

[paths]
test_root = "/tmp/harness"

[timeouts]
transfer_secs = 30

[remotes]
container_sas_url = "https://acct.blob.example/c?sig=abc"

[switches]
s3_tests_off = true
"#,
        )
        .unwrap();

        assert_eq!(config.executables.transfer, Some(PathBuf::from("/opt/azcopy")));
        assert_eq!(config.paths.test_root, PathBuf::from("/tmp/harness"));
        assert_eq!(config.timeouts.transfer_secs, 30);
        assert_eq!(config.timeouts.validator_secs, 600);
        assert!(config.switches.s3_tests_off);
        assert!(!config.switches.gcp_tests_off);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.remotes.share_sas_url = Some("https://file/share?sig=old".to_string());

        let env: HashMap<&str, &str> = [
            ("SHARE_SAS_URL", "https://file/share?sig=new"),
            ("AZCOPY_EXECUTABLE_PATH", "/bin/azcopy"),
            ("GCP_TESTS_OFF", "TRUE"),
            ("ACCOUNT_NAME", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.remotes.share_sas_url.as_deref(),
            Some("https://file/share?sig=new")
        );
        assert_eq!(config.executables.transfer, Some(PathBuf::from("/bin/azcopy")));
        assert!(config.switches.gcp_tests_off);
        assert!(config.credentials.account_name.is_none());
    }

    #[test]
    fn test_child_env_carries_file_settings() {
        let config: Config = toml::from_str(
            r#"
[remotes]
filesystem_url = "https://acct.dfs.example/fs"
tamper_proof_endpoint = "https://tamper.example"

[credentials]
account_name = "acct"
account_key = "key=="

[switches]
gcp_tests_off = true
"#,
        )
        .unwrap();

        let env: HashMap<&str, String> = config.child_env().into_iter().collect();
        assert_eq!(env["ACCOUNT_NAME"], "acct");
        assert_eq!(env["ACCOUNT_KEY"], "key==");
        assert_eq!(env["FILESYSTEM_URL"], "https://acct.dfs.example/fs");
        assert_eq!(env["TAMPER_PROOF_ENDPOINT"], "https://tamper.example");
        assert_eq!(env["GCP_TESTS_OFF"], "true");
        assert!(!env.contains_key("S3_TESTS_OFF"));
        assert!(!env.contains_key("CONTAINER_SAS_URL"));
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let credentials = Credentials {
            account_name: Some("acct".to_string()),
            account_key: Some("supersecret".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("acct"));
        assert!(!printed.contains("supersecret"));
    }
}
