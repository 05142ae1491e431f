#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use capstan_net::NetOptions;
use url::Url;

/// Agent configuration.
///
/// Everything the original deployment hard-coded is an option here; the
/// only required inputs are the install root, the managed service's name,
/// and the two repository URLs.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Root of the installation layout.
    pub install_root: PathBuf,
    /// Name of the managed service; also names the index target, the
    /// artifact, and the executable inside each generation.
    pub service_name: String,
    /// Base URL of the trusted metadata files.
    pub metadata_url: Url,
    /// Base URL of the target files.
    pub targets_url: Url,
    /// Active-executable symlink.
    pub bin_link_path: PathBuf,
    /// Active-config symlink.
    pub config_link_path: PathBuf,
    /// Credential material for the artifact store, if any.
    pub service_account_key_path: Option<PathBuf>,
    /// Init-system unit to reload and restart after a swap.
    pub managed_unit_name: String,
    /// Interval between metadata refreshes.
    pub poll_interval_metadata: Duration,
    /// Interval between consent checks.
    pub poll_interval_consent: Duration,
    /// Apply as soon as a fresh index lands, without external consent.
    pub auto_apply: bool,
    /// Log verbosity, mapped to a subscriber filter by the binary.
    pub verbosity: u8,
    /// Transport options.
    pub net: NetOptions,
}

impl AgentConfig {
    pub fn new(
        install_root: impl Into<PathBuf>,
        service_name: impl Into<String>,
        metadata_url: Url,
        targets_url: Url,
    ) -> Self {
        let service_name = service_name.into();
        Self {
            install_root: install_root.into(),
            bin_link_path: PathBuf::from(format!("/usr/local/bin/{service_name}")),
            config_link_path: PathBuf::from(format!(
                "/etc/{service_name}/{service_name}.yml"
            )),
            service_account_key_path: None,
            managed_unit_name: format!("{service_name}.service"),
            service_name,
            metadata_url,
            targets_url,
            poll_interval_metadata: Duration::from_secs(60),
            poll_interval_consent: Duration::from_secs(5),
            auto_apply: false,
            verbosity: 0,
            net: NetOptions::default(),
        }
    }

    pub fn with_bin_link(mut self, path: impl Into<PathBuf>) -> Self {
        self.bin_link_path = path.into();
        self
    }

    pub fn with_config_link(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_link_path = path.into();
        self
    }

    pub fn with_service_account_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.service_account_key_path = Some(path.into());
        self
    }

    pub fn with_managed_unit(mut self, unit: impl Into<String>) -> Self {
        self.managed_unit_name = unit.into();
        self
    }

    pub fn with_poll_intervals(mut self, metadata: Duration, consent: Duration) -> Self {
        self.poll_interval_metadata = metadata;
        self.poll_interval_consent = consent;
        self
    }

    pub fn with_auto_apply(mut self, enabled: bool) -> Self {
        self.auto_apply = enabled;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        raw.parse().unwrap()
    }

    #[test]
    fn link_defaults_derive_from_the_service_name() {
        let config = AgentConfig::new(
            "/srv/orion",
            "orion",
            url("https://repo.example/metadata/"),
            url("https://repo.example/targets/"),
        );
        assert_eq!(config.bin_link_path, PathBuf::from("/usr/local/bin/orion"));
        assert_eq!(
            config.config_link_path,
            PathBuf::from("/etc/orion/orion.yml")
        );
        assert_eq!(config.managed_unit_name, "orion.service");
        assert_eq!(config.poll_interval_metadata, Duration::from_secs(60));
        assert_eq!(config.poll_interval_consent, Duration::from_secs(5));
        assert!(!config.auto_apply);
    }
}
