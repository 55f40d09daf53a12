// ── Operation dispatch ──
//
// A CLI verb becomes one or more operations: a matcher selecting devices
// and an action to run on each match. `apply` fetches the device list
// once and runs every operation against it, in order.

use std::io::{self, Stderr, Stdout, Write};

use tracing::{debug, info, warn};
use uncli_api::{Device, Session, SessionError};

use crate::error::CoreError;

// ── Device control seam ──────────────────────────────────────────────

/// The controller calls the dispatcher needs. [`Session`] is the real
/// implementation; tests substitute a recorder.
#[allow(async_fn_in_trait)]
pub trait DeviceControl {
    async fn list_devices(&mut self) -> Result<Vec<Device>, SessionError>;
    async fn block(&mut self, mac: &str) -> Result<String, SessionError>;
    async fn unblock(&mut self, mac: &str) -> Result<String, SessionError>;
    async fn kick(&mut self, mac: &str) -> Result<String, SessionError>;
}

impl DeviceControl for Session {
    async fn list_devices(&mut self) -> Result<Vec<Device>, SessionError> {
        Session::list_devices(self).await
    }

    async fn block(&mut self, mac: &str) -> Result<String, SessionError> {
        Session::block(self, mac).await
    }

    async fn unblock(&mut self, mac: &str) -> Result<String, SessionError> {
        Session::unblock(self, mac).await
    }

    async fn kick(&mut self, mac: &str) -> Result<String, SessionError> {
        Session::kick(self, mac).await
    }
}

// ── Matching ─────────────────────────────────────────────────────────

/// What an empty term list selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// No terms: every device.
    Greedy,
    /// No terms: nothing.
    NonGreedy,
}

/// Selects devices whose name or hostname contains any of the terms
/// (case-sensitive substring).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    mode: MatchMode,
    terms: Vec<String>,
}

impl Matcher {
    pub fn greedy(terms: Vec<String>) -> Self {
        Self {
            mode: MatchMode::Greedy,
            terms,
        }
    }

    pub fn non_greedy(terms: Vec<String>) -> Self {
        Self {
            mode: MatchMode::NonGreedy,
            terms,
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        if self.terms.is_empty() {
            return self.mode == MatchMode::Greedy;
        }

        let name = device.name.as_deref().unwrap_or_default();
        let hostname = device.hostname.as_deref().unwrap_or_default();
        self.terms
            .iter()
            .any(|term| name.contains(term.as_str()) || hostname.contains(term.as_str()))
    }
}

// ── Actions & operations ─────────────────────────────────────────────

/// What happens to each matched device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Print the device; no controller call.
    Display,
    Block,
    Unblock,
    Kick,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Display => "list",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Kick => "kick",
        }
    }

    /// Run a mutating action. `Display` has nothing to send and yields `None`.
    async fn invoke<C: DeviceControl>(
        self,
        control: &mut C,
        mac: &str,
    ) -> Option<Result<String, SessionError>> {
        let result = match self {
            Self::Display => return None,
            Self::Block => control.block(mac).await,
            Self::Unblock => control.unblock(mac).await,
            Self::Kick => control.kick(mac).await,
        };
        Some(result)
    }
}

/// A matcher paired with the action to run on its matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub matcher: Matcher,
    pub action: Action,
}

impl Operation {
    pub fn new(matcher: Matcher, action: Action) -> Self {
        Self { matcher, action }
    }
}

/// A direct CLI verb: one greedy operation over the given terms.
pub fn plan(action: Action, terms: Vec<String>) -> Vec<Operation> {
    vec![Operation::new(Matcher::greedy(terms), action)]
}

// ── Console ──────────────────────────────────────────────────────────

/// How `Display` renders a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceFormat {
    /// The fixed-width `Device` line.
    #[default]
    Plain,
    /// One compact JSON object per line.
    Json,
}

/// Where dispatch results and per-device failures are written.
pub struct Console<O: Write, E: Write> {
    pub out: O,
    pub err: E,
    pub format: DeviceFormat,
}

impl Console<Stdout, Stderr> {
    pub fn stdio(format: DeviceFormat) -> Self {
        Self {
            out: io::stdout(),
            err: io::stderr(),
            format,
        }
    }
}

impl<O: Write, E: Write> Console<O, E> {
    fn device(&mut self, device: &Device) -> Result<(), CoreError> {
        match self.format {
            DeviceFormat::Plain => writeln!(self.out, "{device}")?,
            DeviceFormat::Json => {
                serde_json::to_writer(&mut self.out, device)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    fn outcome(&mut self, device: &Device, result: &str) -> Result<(), CoreError> {
        writeln!(self.out, "{}:", device.display_name())?;
        for line in result.lines() {
            writeln!(self.out, "  {line}")?;
        }
        Ok(())
    }

    fn failure(&mut self, device: &Device, error: &SessionError) -> Result<(), CoreError> {
        writeln!(self.err, "{}: {error}", device.display_name())?;
        Ok(())
    }
}

// ── Apply ────────────────────────────────────────────────────────────

/// A device action that failed and was skipped.
#[derive(Debug, Clone)]
pub struct DeviceFailure {
    pub device: String,
    pub mac: String,
    pub action: Action,
    pub error: SessionError,
}

/// Tally of one `apply` run.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Devices returned by the controller.
    pub devices: usize,
    /// Device/operation pairs that matched.
    pub matched: usize,
    pub succeeded: usize,
    pub failures: Vec<DeviceFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch the device list once, then run every operation against it.
///
/// A failing device action is written to the console's error stream and
/// recorded in the report; the batch carries on. Only a failure to list
/// devices (or to write output) aborts.
pub async fn apply<C, O, E>(
    control: &mut C,
    operations: &[Operation],
    console: &mut Console<O, E>,
) -> Result<ApplyReport, CoreError>
where
    C: DeviceControl,
    O: Write,
    E: Write,
{
    let devices = control.list_devices().await?;
    let mut report = ApplyReport {
        devices: devices.len(),
        ..ApplyReport::default()
    };
    debug!(
        devices = devices.len(),
        operations = operations.len(),
        "applying operations"
    );

    for operation in operations {
        for device in devices.iter().filter(|d| operation.matcher.matches(d)) {
            report.matched += 1;

            match operation.action.invoke(control, &device.mac).await {
                None => console.device(device)?,
                Some(Ok(result)) => {
                    info!(mac = %device.mac, action = operation.action.as_str(), "device updated");
                    console.outcome(device, &result)?;
                }
                Some(Err(error)) => {
                    warn!(
                        mac = %device.mac,
                        action = operation.action.as_str(),
                        "device action failed"
                    );
                    console.failure(device, &error)?;
                    report.failures.push(DeviceFailure {
                        device: device.display_name().to_owned(),
                        mac: device.mac.clone(),
                        action: operation.action,
                        error,
                    });
                    continue;
                }
            }
            report.succeeded += 1;
        }
    }

    Ok(report)
}

// ── Test support ─────────────────────────────────────────────────────
