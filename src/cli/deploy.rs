//! `deploy` command.

use crate::config::DeploySettings;
use crate::deploy::{ChannelApi, DeployEnvironment, DeployPipeline, DeployReport, HttpChannelClient};
use crate::process::CommandRunner;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Deploys the changed drivers described by the CI environment.
///
/// Exits 0 without doing anything when no environment URL or channel is
/// configured, and 1 when any driver upload failed.
///
/// # Errors
///
/// Returns an error if required settings are missing, the bulk update is
/// rejected, or a step fails outright.
pub fn cmd_deploy(
    repo_root: &Path,
    settings: &DeploySettings,
    runner: &dyn CommandRunner,
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let environment = DeployEnvironment::from_env();
    let Some(target) = environment.target()? else {
        return Ok(ExitCode::SUCCESS);
    };
    info!(url = %target.url, branch = ?environment.branch, "deploying drivers");

    let client = HttpChannelClient::new(target.url.clone(), target.token.clone(), settings)?;
    deploy_with(
        repo_root,
        &environment,
        &target.channel_id,
        &client,
        runner,
        settings,
        &std::thread::sleep,
        out,
    )
}

#[allow(clippy::too_many_arguments)]
fn deploy_with(
    repo_root: &Path,
    environment: &DeployEnvironment,
    channel_id: &str,
    api: &dyn ChannelApi,
    runner: &dyn CommandRunner,
    settings: &DeploySettings,
    sleep: &dyn Fn(Duration),
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let pipeline = DeployPipeline {
        repo_root,
        environment,
        channel_id,
        api,
        runner,
        settings,
        sleep,
    };
    let report = pipeline.run()?;
    print_report(&report, out)?;

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &DeployReport, out: &mut dyn Write) -> Result<()> {
    let write_error = |e| Error::operation("write_output", e);
    writeln!(out, "Update drivers:").map_err(write_error)?;
    for driver in &report.updated {
        writeln!(out, "  {driver}").map_err(write_error)?;
    }
    if !report.skipped.is_empty() {
        writeln!(out, "Skipped drivers:").map_err(write_error)?;
        for driver in &report.skipped {
            writeln!(out, "  {driver}").map_err(write_error)?;
        }
    }
    if !report.failed.is_empty() {
        writeln!(out, "Failed drivers:").map_err(write_error)?;
        for driver in &report.failed {
            writeln!(out, "  {driver}").map_err(write_error)?;
        }
    }
    writeln!(out, "\nDrivers currently deployed:").map_err(write_error)?;
    for package_key in report.deployed.keys() {
        writeln!(out, "  {package_key}").map_err(write_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DriverVersion;
    use crate::deploy::client::MockChannelApi;
    use crate::process::{CommandOutput, MockRunner};
    use std::fs;

    fn write_driver(root: &Path, name: &str, package_key: &str) {
        let driver = root.join("drivers/SmartThings").join(name);
        fs::create_dir_all(driver.join("src")).expect("create");
        fs::write(driver.join("config.yml"), format!("packageKey: {package_key}\n")).expect("write");
    }

    fn zip_runner() -> MockRunner {
        MockRunner::new(|call| {
            let command = call.args.last().cloned().unwrap_or_default();
            if let Some(name) = command.split('\'').nth(1) {
                let _ = fs::write(call.cwd.join(name), b"zip");
            }
            CommandOutput::ok("")
        })
    }

    #[test]
    fn test_prints_updated_and_deployed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_driver(dir.path(), "zigbee-switch", "zigbee-switch");
        let environment = DeployEnvironment {
            changed_drivers: vec!["zigbee-switch".to_string()],
            ..DeployEnvironment::default()
        };
        let api = MockChannelApi::new();
        api.push_upload(
            200,
            r#"{"driverId": "d-1", "version": "2024-01-01", "packageKey": "zigbee-switch"}"#,
        );

        let mut out = Vec::new();
        let code = deploy_with(
            dir.path(),
            &environment,
            "channel-1",
            &api,
            &zip_runner(),
            &DeploySettings::default(),
            &|_| {},
            &mut out,
        )
        .expect("deploy");
        assert_eq!(code, ExitCode::SUCCESS);

        let console = String::from_utf8(out).expect("utf8");
        assert!(console.starts_with("Update drivers:\n  zigbee-switch\n"));
        assert!(console.contains("Drivers currently deployed:\n  zigbee-switch\n"));
        assert_eq!(
            api.assigned.lock().expect("lock").first(),
            Some(&DriverVersion {
                driver_id: "d-1".to_string(),
                version: "2024-01-01".to_string(),
            })
        );
    }

    #[test]
    fn test_terminal_upload_failure_exits_nonzero() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_driver(dir.path(), "zwave-lock", "zwave-lock");
        let environment = DeployEnvironment {
            drivers_override: vec!["zwave-lock".to_string()],
            ..DeployEnvironment::default()
        };
        let api = MockChannelApi::new();
        api.push_upload(400, r#"{"error": "bad package"}"#);

        let mut out = Vec::new();
        let code = deploy_with(
            dir.path(),
            &environment,
            "channel-1",
            &api,
            &zip_runner(),
            &DeploySettings::default(),
            &|_| {},
            &mut out,
        )
        .expect("deploy");
        assert_eq!(code, ExitCode::FAILURE);
        assert!(
            String::from_utf8(out)
                .expect("utf8")
                .contains("Failed drivers:\n  zwave-lock\n")
        );
    }
}
