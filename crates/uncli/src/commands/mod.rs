//! Command handlers and the plumbing they share.

pub mod config_cmd;
pub mod devices;
pub mod kv;

use tracing::{debug, info};

use uncli_api::Session;
use uncli_config::{Overrides, Settings};
use uncli_core::{ApplyReport, DeviceFormat};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Command-line flags as the top configuration layer.
fn overrides(global: &GlobalOpts) -> Overrides {
    Overrides {
        endpoint: global.endpoint.clone(),
        username: global.username.clone(),
        site: global.site.clone(),
        timeout: global.timeout,
        insecure: global.insecure.then_some(true),
    }
}

/// Merge defaults, config file, environment and flags.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    Ok(Settings::load(global.config.as_deref(), &overrides(global))?)
}

/// Build a session and log in. No request is made before `login`.
pub async fn connect(settings: &Settings) -> Result<Session, CliError> {
    let config = settings.session_config()?;
    let endpoint = config.endpoint.clone();

    let mut session = Session::new(config).map_err(|source| CliError::SessionSetup {
        endpoint: endpoint.clone(),
        source,
    })?;
    session
        .login()
        .await
        .map_err(|source| CliError::AuthFailed { endpoint, source })?;

    debug!(site = session.site(), "logged in");
    Ok(session)
}

pub fn device_format(format: OutputFormat) -> DeviceFormat {
    match format {
        OutputFormat::Plain => DeviceFormat::Plain,
        OutputFormat::Json => DeviceFormat::Json,
    }
}

/// Per-device failures were already printed; add a tally and carry on.
pub fn summarize(report: &ApplyReport) {
    info!(
        devices = report.devices,
        matched = report.matched,
        succeeded = report.succeeded,
        "batch finished"
    );
    if !report.is_clean() {
        eprintln!(
            "{} of {} device actions failed",
            report.failures.len(),
            report.matched
        );
    }
}
