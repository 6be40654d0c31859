//! Driver packaging.
//!
//! A driver archive is built with the system `zip` tool from the driver's
//! directory and lands next to it as `<driver>.zip`.

use crate::process::CommandRunner;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Partner drivers that need an API key compiled in.
const BOSE_PACKAGE: &str = "bose";
const SONOS_PACKAGE: &str = "sonos";

/// File the partner key is written to, relative to the driver directory.
pub const APP_KEY_FILE: &str = "src/app_key.lua";

/// Files and globs packed into a driver archive. Test sources are excluded.
const ZIP_SELECTION: &str = concat!(
    "config.yml fingerprints.yml search-parameters.y*ml ",
    r#"$(find . -name "*.pem") $(find . -name "*.crt") "#,
    r#"$(find profiles -name "*.y*ml") $(find . -name "*.lua") "#,
    r#"-x "*test*""#
);

#[derive(Debug, Deserialize)]
struct DriverConfig {
    #[serde(rename = "packageKey")]
    package_key: String,
}

/// Reads `packageKey` from a driver's `config.yml`.
///
/// # Errors
///
/// Returns an error if the file is missing, unparsable or has no
/// `packageKey`.
pub fn read_package_key(driver_dir: &Path) -> Result<String> {
    let path = driver_dir.join("config.yml");
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| Error::operation("read_driver_config", format!("{}: {e}", path.display())))?;
    let config: DriverConfig = serde_yaml_ng::from_str(&contents)
        .map_err(|e| Error::operation("parse_driver_config", format!("{}: {e}", path.display())))?;
    Ok(config.package_key)
}

/// API keys injected into partner drivers.
#[derive(Debug, Clone, Default)]
pub struct PartnerKeys {
    /// Bose audio notification app key.
    pub bose: Option<SecretString>,
    /// Sonos API key.
    pub sonos: Option<SecretString>,
}

impl PartnerKeys {
    fn for_package(&self, package_key: &str) -> Option<&SecretString> {
        match package_key {
            BOSE_PACKAGE => self.bose.as_ref(),
            SONOS_PACKAGE => self.sonos.as_ref(),
            _ => None,
        }
    }
}

/// Writes the partner key into the driver's `src/app_key.lua`, replacing the
/// file. Returns `true` if a key was written.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn inject_app_key(driver_dir: &Path, package_key: &str, keys: &PartnerKeys) -> Result<bool> {
    let Some(key) = keys.for_package(package_key) else {
        return Ok(false);
    };
    let path = driver_dir.join(APP_KEY_FILE);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::operation("write_app_key", format!("{}: {e}", parent.display())))?;
    }
    std::fs::write(&path, format!("return \"{}\"\n", key.expose_secret()))
        .map_err(|e| Error::operation("write_app_key", format!("{}: {e}", path.display())))?;
    info!(package_key, "wrote partner app key");
    Ok(true)
}

/// Path of the archive built for `driver_dir`.
#[must_use]
pub fn archive_path(driver_dir: &Path) -> PathBuf {
    let name = driver_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    driver_dir.with_file_name(format!("{name}.zip"))
}

/// Builds the driver archive, trying up to `attempts` times.
///
/// Returns the archive path, or `None` if no attempt produced it.
///
/// # Errors
///
/// Returns an error if the shell cannot be spawned.
pub fn build_archive(
    driver_dir: &Path,
    runner: &dyn CommandRunner,
    attempts: u32,
) -> Result<Option<PathBuf>> {
    let archive = archive_path(driver_dir);
    let file_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let command = format!("zip -r '../{file_name}' {ZIP_SELECTION}");

    let mut tries = 0;
    while !archive.exists() && tries < attempts {
        tries += 1;
        let output = runner.run("sh", &["-c".to_string(), command.clone()], driver_dir)?;
        if !output.success {
            warn!(
                driver = %driver_dir.display(),
                attempt = tries,
                stderr = %output.stderr.trim(),
                "zip failed"
            );
        }
    }

    Ok(archive.exists().then_some(archive))
}

/// Deletes the archive, logging instead of failing.
pub fn remove_archive(archive: &Path) {
    if let Err(e) = std::fs::remove_file(archive) {
        warn!(archive = %archive.display(), error = %e, "could not remove archive");
    }
}
