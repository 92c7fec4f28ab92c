//! Service readiness gate
//!
//! Every manager operation first makes sure the virtual machine management
//! service is running, nudging it out of stopped or paused states when
//! needed:
//!
//! | Observed          | Action                                               |
//! |-------------------|------------------------------------------------------|
//! | `Running`         | none                                                 |
//! | `StartPending`    | wait for `Running`                                   |
//! | `ContinuePending` | wait for `Running`                                   |
//! | `StopPending`     | wait for `Stopped`, then handle as `Stopped`         |
//! | `Stopped`         | start, wait for `Running`                            |
//! | `PausePending`    | wait for `Paused`, then handle as `Paused`           |
//! | `Paused`          | resume, wait for `Running`                           |

use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result, ServiceError};
use crate::powershell::run_script;

/// Default name of the Hyper-V virtual machine management service.
pub const DEFAULT_SERVICE_NAME: &str = "vmms";

/// Default bound on each status transition wait.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(3);

/// Default polling interval while waiting for a status.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Status of an OS service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

impl ServiceStatus {
    /// Parse a status name as printed by `Get-Service` (case-insensitive).
    pub fn parse(s: &str) -> std::result::Result<Self, ServiceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stopped" => Ok(ServiceStatus::Stopped),
            "startpending" => Ok(ServiceStatus::StartPending),
            "stoppending" => Ok(ServiceStatus::StopPending),
            "running" => Ok(ServiceStatus::Running),
            "continuepending" => Ok(ServiceStatus::ContinuePending),
            "pausepending" => Ok(ServiceStatus::PausePending),
            "paused" => Ok(ServiceStatus::Paused),
            _ => Err(ServiceError::UnknownStatus(s.trim().to_string())),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::StartPending => "StartPending",
            ServiceStatus::StopPending => "StopPending",
            ServiceStatus::Running => "Running",
            ServiceStatus::ContinuePending => "ContinuePending",
            ServiceStatus::PausePending => "PausePending",
            ServiceStatus::Paused => "Paused",
        };
        write!(f, "{}", s)
    }
}

/// Controls the management service.
pub trait ServiceController: Send + Sync {
    fn status(&self) -> std::result::Result<ServiceStatus, ServiceError>;

    fn start(&self) -> std::result::Result<(), ServiceError>;

    fn resume(&self) -> std::result::Result<(), ServiceError>;

    /// Block until the service reports `target`. Returns `false` when
    /// `timeout` elapses first.
    fn wait_for_status(
        &self,
        target: ServiceStatus,
        timeout: Duration,
    ) -> std::result::Result<bool, ServiceError>;
}

/// Precondition check run before every manager operation.
#[derive(Clone)]
pub struct ServiceGate {
    controller: Arc<dyn ServiceController>,
    service_name: String,
    timeout: Duration,
}

impl fmt::Debug for ServiceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceGate")
            .field("service_name", &self.service_name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ServiceGate {
    pub fn new(
        controller: Arc<dyn ServiceController>,
        service_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            controller,
            service_name: service_name.into(),
            timeout,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return once the service is observed running.
    ///
    /// Any controller failure or transition timeout is reported as
    /// [`Error::ServiceUnavailable`].
    pub fn ensure_running(&self) -> Result<()> {
        self.drive_to_running().map_err(|source| {
            tracing::error!(service = %self.service_name, error = %source, "management service unavailable");
            Error::ServiceUnavailable {
                service: self.service_name.clone(),
                source,
            }
        })
    }

    fn drive_to_running(&self) -> std::result::Result<(), ServiceError> {
        let status = self.controller.status()?;
        match status {
            ServiceStatus::Running => Ok(()),
            ServiceStatus::StartPending | ServiceStatus::ContinuePending => {
                self.wait(ServiceStatus::Running)
            }
            ServiceStatus::StopPending => {
                self.wait(ServiceStatus::Stopped)?;
                self.start()
            }
            ServiceStatus::Stopped => self.start(),
            ServiceStatus::PausePending => {
                self.wait(ServiceStatus::Paused)?;
                self.resume()
            }
            ServiceStatus::Paused => self.resume(),
        }
    }

    fn start(&self) -> std::result::Result<(), ServiceError> {
        tracing::info!(service = %self.service_name, "starting management service");
        self.controller.start()?;
        self.wait(ServiceStatus::Running)
    }

    fn resume(&self) -> std::result::Result<(), ServiceError> {
        tracing::info!(service = %self.service_name, "resuming management service");
        self.controller.resume()?;
        self.wait(ServiceStatus::Running)
    }

    fn wait(&self, target: ServiceStatus) -> std::result::Result<(), ServiceError> {
        tracing::debug!(service = %self.service_name, %target, "waiting for service status");
        if self.controller.wait_for_status(target, self.timeout)? {
            Ok(())
        } else {
            Err(ServiceError::Timeout {
                target,
                timeout: self.timeout,
            })
        }
    }
}

/// Controls a Windows service through `Get-Service`, `Start-Service` and
/// `Resume-Service`.
#[derive(Debug, Clone)]
pub struct PowerShellServiceController {
    program: String,
    service_name: String,
    poll_interval: Duration,
}

impl PowerShellServiceController {
    pub fn new(program: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            service_name: service_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the polling interval used by `wait_for_status`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn run(&self, script: &str) -> std::result::Result<String, ServiceError> {
        let output = run_script(&self.program, script)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Command(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn quoted_name(&self) -> String {
        format!("'{}'", self.service_name.replace('\'', "''"))
    }
}

impl ServiceController for PowerShellServiceController {
    fn status(&self) -> std::result::Result<ServiceStatus, ServiceError> {
        let out = self.run(&format!(
            "(Get-Service -Name {} -ErrorAction Stop).Status.ToString()",
            self.quoted_name()
        ))?;
        ServiceStatus::parse(&out)
    }

    fn start(&self) -> std::result::Result<(), ServiceError> {
        self.run(&format!(
            "Start-Service -Name {} -ErrorAction Stop",
            self.quoted_name()
        ))
        .map(|_| ())
    }

    fn resume(&self) -> std::result::Result<(), ServiceError> {
        self.run(&format!(
            "Resume-Service -Name {} -ErrorAction Stop",
            self.quoted_name()
        ))
        .map(|_| ())
    }

    fn wait_for_status(
        &self,
        target: ServiceStatus,
        timeout: Duration,
    ) -> std::result::Result<bool, ServiceError> {
        let start = Instant::now();
        loop {
            if self.status()? == target {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Walks through a fixed list of observed statuses.
    struct ScriptedController {
        statuses: Mutex<Vec<ServiceStatus>>,
        calls: Mutex<Vec<String>>,
        wait_succeeds: bool,
    }

    impl ScriptedController {
        fn new(initial: ServiceStatus, wait_succeeds: bool) -> Self {
            Self {
                statuses: Mutex::new(vec![initial]),
                calls: Mutex::new(Vec::new()),
                wait_succeeds,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl ServiceController for ScriptedController {
        fn status(&self) -> std::result::Result<ServiceStatus, ServiceError> {
            self.calls.lock().push("status".into());
            Ok(*self.statuses.lock().last().unwrap())
        }

        fn start(&self) -> std::result::Result<(), ServiceError> {
            self.calls.lock().push("start".into());
            Ok(())
        }

        fn resume(&self) -> std::result::Result<(), ServiceError> {
            self.calls.lock().push("resume".into());
            Ok(())
        }

        fn wait_for_status(
            &self,
            target: ServiceStatus,
            _timeout: Duration,
        ) -> std::result::Result<bool, ServiceError> {
            self.calls.lock().push(format!("wait {target}"));
            if self.wait_succeeds {
                self.statuses.lock().push(target);
            }
            Ok(self.wait_succeeds)
        }
    }

    fn gate(controller: Arc<ScriptedController>) -> ServiceGate {
        ServiceGate::new(controller, "vmms", Duration::from_millis(10))
    }

    #[test]
    fn test_service_status_parse() {
        assert_eq!(ServiceStatus::parse("Running").unwrap(), ServiceStatus::Running);
        assert_eq!(
            ServiceStatus::parse(" startpending\r\n").unwrap(),
            ServiceStatus::StartPending
        );
        assert!(matches!(
            ServiceStatus::parse("Exploded"),
            Err(ServiceError::UnknownStatus(s)) if s == "Exploded"
        ));
    }

    #[test]
    fn test_running_is_noop() {
        let controller = Arc::new(ScriptedController::new(ServiceStatus::Running, true));
        gate(controller.clone()).ensure_running().unwrap();
        assert_eq!(controller.calls(), vec!["status"]);
    }

    #[test]
    fn test_transition_sequences() {
        let cases = [
            (ServiceStatus::StartPending, vec!["status", "wait Running"]),
            (ServiceStatus::ContinuePending, vec!["status", "wait Running"]),
            (ServiceStatus::Stopped, vec!["status", "start", "wait Running"]),
            (
                ServiceStatus::StopPending,
                vec!["status", "wait Stopped", "start", "wait Running"],
            ),
            (ServiceStatus::Paused, vec!["status", "resume", "wait Running"]),
            (
                ServiceStatus::PausePending,
                vec!["status", "wait Paused", "resume", "wait Running"],
            ),
        ];
        for (initial, expected) in cases {
            let controller = Arc::new(ScriptedController::new(initial, true));
            gate(controller.clone()).ensure_running().unwrap();
            assert_eq!(controller.calls(), expected, "from {initial}");
        }
    }

    #[test]
    fn test_wait_timeout_is_service_unavailable() {
        let controller = Arc::new(ScriptedController::new(ServiceStatus::StopPending, false));
        let err = gate(controller.clone()).ensure_running().unwrap_err();
        match err {
            Error::ServiceUnavailable { service, source } => {
                assert_eq!(service, "vmms");
                assert!(matches!(
                    source,
                    ServiceError::Timeout {
                        target: ServiceStatus::Stopped,
                        ..
                    }
                ));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // no start attempted after the failed wait
        assert_eq!(controller.calls(), vec!["status", "wait Stopped"]);
    }

    #[test]
    fn test_controller_failure_is_service_unavailable() {
        struct Broken;
        impl ServiceController for Broken {
            fn status(&self) -> std::result::Result<ServiceStatus, ServiceError> {
                Err(ServiceError::Command("Cannot find any service with service name 'vmms'".into()))
            }
            fn start(&self) -> std::result::Result<(), ServiceError> {
                Ok(())
            }
            fn resume(&self) -> std::result::Result<(), ServiceError> {
                Ok(())
            }
            fn wait_for_status(
                &self,
                _target: ServiceStatus,
                _timeout: Duration,
            ) -> std::result::Result<bool, ServiceError> {
                Ok(true)
            }
        }

        let gate = ServiceGate::new(Arc::new(Broken), "vmms", DEFAULT_TRANSITION_TIMEOUT);
        let err = gate.ensure_running().unwrap_err();
        assert!(err.is_service_unavailable());
        assert!(err.to_string().contains("Cannot find any service"));
    }
}
