//! Deploy pipeline orchestration.
//!
//! ```text
//! localize labels -> collect deployed drivers -> package + upload changed
//!                 -> bulk update channel assignments
//! ```
//!
//! Inputs come from the CI environment; the variable names are fixed by the
//! build jobs that call this.

use super::client::{ChannelApi, DriverVersion, parse_channel_drivers, parse_package_key, parse_uploaded};
use super::localize::{Localizer, locale_table_path, read_locale_table};
use super::package::{PartnerKeys, build_archive, inject_app_key, read_package_key, remove_archive};
use super::retry::{RetryPolicy, send_with_retry};
use crate::changes::parse_name_list;
use crate::config::DeploySettings;
use crate::process::CommandRunner;
use crate::testing::discovery::driver_dirs;
use crate::{Error, Result};
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

const OK: u16 = 200;
const NO_CONTENT: u16 = 204;

/// Deploy inputs read from the CI environment.
#[derive(Debug, Clone, Default)]
pub struct DeployEnvironment {
    /// `BRANCH`.
    pub branch: Option<String>,
    /// `ENVIRONMENT`.
    pub environment: Option<String>,
    /// `CHANGED_DRIVERS`.
    pub changed_drivers: Vec<String>,
    /// `DRIVERS_OVERRIDE`.
    pub drivers_override: Vec<String>,
    /// `<ENVIRONMENT>_ENVIRONMENT_URL`.
    pub environment_url: Option<String>,
    /// `<BRANCH>_<ENVIRONMENT>_CHANNEL_ID`.
    pub channel_id: Option<String>,
    /// `<ENVIRONMENT>_TOKEN`.
    pub token: Option<SecretString>,
    /// `BOSE_AUDIONOTIFICATION_APPKEY` and `SONOS_API_KEY`.
    pub partner_keys: PartnerKeys,
    /// `LOCALE`.
    pub locale: Option<String>,
}

impl DeployEnvironment {
    /// Reads the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads variables through `lookup`. Empty values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let branch = get("BRANCH");
        let environment = get("ENVIRONMENT");
        let environment_url = environment
            .as_ref()
            .and_then(|env| get(&format!("{env}_ENVIRONMENT_URL")));
        let channel_id = match (&branch, &environment) {
            (Some(branch), Some(env)) => get(&format!("{branch}_{env}_CHANNEL_ID")),
            _ => None,
        };
        let token = environment
            .as_ref()
            .and_then(|env| get(&format!("{env}_TOKEN")))
            .map(SecretString::from);

        Self {
            changed_drivers: get("CHANGED_DRIVERS")
                .map(|value| parse_name_list(&value))
                .unwrap_or_default(),
            drivers_override: get("DRIVERS_OVERRIDE")
                .map(|value| parse_name_list(&value))
                .unwrap_or_default(),
            partner_keys: PartnerKeys {
                bose: get("BOSE_AUDIONOTIFICATION_APPKEY").map(SecretString::from),
                sonos: get("SONOS_API_KEY").map(SecretString::from),
            },
            locale: get("LOCALE"),
            branch,
            environment,
            environment_url,
            channel_id,
            token,
        }
    }

    /// Resolves where to deploy.
    ///
    /// Returns `Ok(None)` when no environment URL or channel is configured,
    /// which means there is nothing to deploy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `ENVIRONMENT` or the token is
    /// missing.
    pub fn target(&self) -> Result<Option<DeployTarget>> {
        let environment = self
            .environment
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("ENVIRONMENT is not set".to_string()))?;
        let Some(url) = self.environment_url.clone() else {
            warn!(%environment, "no environment url specified, aborting");
            return Ok(None);
        };
        let Some(channel_id) = self.channel_id.clone() else {
            warn!(%environment, branch = ?self.branch, "no channel id specified, aborting");
            return Ok(None);
        };
        let token = self
            .token
            .clone()
            .ok_or_else(|| Error::InvalidInput(format!("{environment}_TOKEN is not set")))?;
        Ok(Some(DeployTarget {
            url,
            channel_id,
            token,
        }))
    }

    /// Returns `true` if `driver` was changed or explicitly requested.
    #[must_use]
    pub fn wants(&self, driver: &str) -> bool {
        self.changed_drivers.iter().any(|name| name == driver)
            || self.drivers_override.iter().any(|name| name == driver)
    }
}

/// Resolved API target.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    /// Environment base URL.
    pub url: String,
    /// Channel to update.
    pub channel_id: String,
    /// API token.
    pub token: SecretString,
}

/// What a deploy run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Fingerprint files rewritten by localization.
    pub localized: Vec<PathBuf>,
    /// Drivers uploaded successfully, in upload order.
    pub updated: Vec<String>,
    /// Drivers whose upload failed terminally.
    pub failed: Vec<String>,
    /// Drivers skipped because no archive could be built.
    pub skipped: Vec<String>,
    /// Channel assignments by package key after the run.
    pub deployed: BTreeMap<String, DriverVersion>,
}

impl DeployReport {
    /// Returns `true` if any upload failed terminally.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// One deploy run against one channel.
pub struct DeployPipeline<'a> {
    /// Repository root.
    pub repo_root: &'a Path,
    /// Environment inputs.
    pub environment: &'a DeployEnvironment,
    /// Channel to update.
    pub channel_id: &'a str,
    /// API client.
    pub api: &'a dyn ChannelApi,
    /// Runs `zip`.
    pub runner: &'a dyn CommandRunner,
    /// Deploy settings.
    pub settings: &'a DeploySettings,
    /// Performs retry waits.
    pub sleep: &'a dyn Fn(Duration),
}

impl DeployPipeline<'_> {
    /// Runs every step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the bulk update is rejected, or an error if
    /// localization, driver discovery or a request fails outright.
    #[instrument(skip_all, fields(channel = self.channel_id))]
    pub fn run(&self) -> Result<DeployReport> {
        let mut report = DeployReport {
            localized: self.localize()?,
            deployed: self.collect_deployed()?,
            ..DeployReport::default()
        };

        for driver_dir in driver_dirs(self.repo_root)? {
            let Some(driver) = driver_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
            else {
                continue;
            };
            if self.environment.wants(&driver) {
                self.deploy_driver(&driver_dir, &driver, &mut report)?;
            }
        }

        self.bulk_update(&report.deployed)?;
        Ok(report)
    }

    fn localize(&self) -> Result<Vec<PathBuf>> {
        let Some(locale) = &self.environment.locale else {
            return Ok(Vec::new());
        };
        let table_path = locale_table_path(self.repo_root, locale);
        if !table_path.is_file() {
            info!(%locale, "no localization table, skipping");
            return Ok(Vec::new());
        }
        info!(%locale, table = %table_path.display(), "localizing device labels");
        let table = read_locale_table(&table_path)?;
        Localizer::new(&table)?.localize_tree(self.repo_root)
    }

    /// Maps package keys to the driver versions currently on the channel.
    fn collect_deployed(&self) -> Result<BTreeMap<String, DriverVersion>> {
        let mut deployed = BTreeMap::new();
        let listing = self.api.list_channel_drivers(self.channel_id)?;
        if listing.status != OK {
            error!(
                status = listing.status,
                body = %listing.body,
                "failed to retrieve channel's current drivers"
            );
            return Ok(deployed);
        }

        for driver in parse_channel_drivers(&listing.body)? {
            let search = self.api.search_driver(&driver)?;
            if search.status != OK {
                warn!(driver_id = %driver.driver_id, status = search.status, "driver search failed");
                continue;
            }
            if let Some(package_key) = parse_package_key(&search.body)? {
                deployed.insert(package_key, driver);
            }
        }
        info!(drivers = deployed.len(), "collected channel drivers");
        Ok(deployed)
    }

    fn deploy_driver(&self, driver_dir: &Path, driver: &str, report: &mut DeployReport) -> Result<()> {
        let package_key = match read_package_key(driver_dir) {
            Ok(key) => key,
            Err(e) => {
                error!(driver, error = %e, "cannot read package key");
                report.failed.push(driver.to_string());
                return Ok(());
            },
        };
        info!(driver, %package_key, "packaging driver");
        inject_app_key(driver_dir, &package_key, &self.environment.partner_keys)?;

        let Some(archive) = build_archive(driver_dir, self.runner, self.settings.zip_attempts)? else {
            warn!(
                driver,
                attempts = self.settings.zip_attempts,
                "zip failures, skipping driver"
            );
            report.skipped.push(driver.to_string());
            return Ok(());
        };

        let uploaded = self.upload(&archive, driver);
        remove_archive(&archive);
        match uploaded {
            Ok(version) => {
                info!(driver, driver_id = %version.driver_id, version = %version.version, "uploaded package");
                report.updated.push(driver.to_string());
                report.deployed.insert(package_key, version);
            },
            Err(e) => {
                error!(driver, error = %e, "failed to upload driver");
                report.failed.push(driver.to_string());
            },
        }
        Ok(())
    }

    fn upload(&self, archive: &Path, driver: &str) -> Result<DriverVersion> {
        let data = std::fs::read(archive)
            .map_err(|e| Error::operation("read_archive", format!("{}: {e}", archive.display())))?;
        let outcome = send_with_retry(
            &RetryPolicy::from_settings(self.settings),
            "upload_package",
            OK,
            self.sleep,
            || self.api.upload_package(&data),
        )?;
        if outcome.response.status != OK {
            return Err(Error::Http {
                endpoint: format!("upload_package ({driver})"),
                status: outcome.response.status,
                body: outcome.response.body,
            });
        }
        parse_uploaded(&outcome.response.body)
    }

    fn bulk_update(&self, deployed: &BTreeMap<String, DriverVersion>) -> Result<()> {
        let assignments: Vec<DriverVersion> = deployed
            .iter()
            .map(|(package_key, version)| {
                info!(
                    %package_key,
                    driver_id = %version.driver_id,
                    version = %version.version,
                    "assigning driver to channel"
                );
                version.clone()
            })
            .collect();

        let response = self.api.bulk_update(self.channel_id, &assignments)?;
        if response.status != NO_CONTENT {
            return Err(Error::Http {
                endpoint: "bulk_update".to_string(),
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}
