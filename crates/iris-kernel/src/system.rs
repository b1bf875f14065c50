//! [`GateArmSystem`] – process-wide gate arm kill switch.
//!
//! The system starts **disabled** on every boot; an operator must verify the
//! physical state of the arms and call [`GateArmSystem::enable`].  Any
//! component may call [`GateArmSystem::disable`] to force every arm and
//! array into the `SYSTEM_DISABLE` interlock on the next dependency sweep.
//!
//! # Config-enable file
//!
//! When an enable file is configured, the system can only be enabled while
//! that file exists and is writable.  [`GateArmSystem::disable`] deletes the
//! file, so re-enabling requires deliberate action on the server host.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use iris_types::{AlertSink, GateArmError};
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Why the system was last disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableRecord {
    /// Device or component that triggered the disable.
    pub name: String,
    pub reason: String,
}

#[derive(Debug)]
struct SystemState {
    enabled: bool,
    /// Cleared when the enable file could not be removed.
    config_flag: bool,
    last_disable: Option<DisableRecord>,
}

/// Global enable flag for the gate arm subsystem.
pub struct GateArmSystem {
    enable_file: Option<PathBuf>,
    state: Mutex<SystemState>,
    alerts: Arc<dyn AlertSink>,
}

impl GateArmSystem {
    /// Create a disabled system.  `enable_file` of `None` skips the file check.
    pub fn new(enable_file: Option<PathBuf>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            enable_file,
            state: Mutex::new(SystemState {
                enabled: false,
                config_flag: true,
                last_disable: Some(DisableRecord {
                    name: "system".to_string(),
                    reason: "startup".to_string(),
                }),
            }),
            alerts,
        }
    }

    /// Test whether gate arm configuration is enabled on this host.
    pub fn is_config_enabled(&self) -> bool {
        if !self.state.lock().config_flag {
            return false;
        }
        match &self.enable_file {
            None => true,
            Some(path) => fs::metadata(path)
                .map(|m| m.is_file() && !m.permissions().readonly())
                .unwrap_or(false),
        }
    }

    /// Test whether the gate arm system is enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled && self.is_config_enabled()
    }

    /// Re-enable the system after an operator has verified every arm.
    ///
    /// # Errors
    ///
    /// Returns [`GateArmError::ConfigDisabled`] when the config-enable file
    /// is missing or unwritable.
    pub fn enable(&self) -> Result<(), GateArmError> {
        if !self.is_config_enabled() {
            return Err(GateArmError::ConfigDisabled);
        }
        let mut st = self.state.lock();
        if !st.enabled {
            st.enabled = true;
            st.last_disable = None;
            info!("gate arm system enabled");
        }
        Ok(())
    }

    /// Disable the whole gate arm system.
    ///
    /// Idempotent; an alert is sent only when the system was enabled.
    pub fn disable(&self, name: &str, reason: &str) {
        let was_enabled = {
            let mut st = self.state.lock();
            let was = st.enabled;
            st.enabled = false;
            st.last_disable = Some(DisableRecord {
                name: name.to_string(),
                reason: reason.to_string(),
            });
            was
        };
        self.disable_config();
        if was_enabled {
            warn!(device = name, reason, "gate arm system disabled");
            self.alerts
                .send_alert(&format!("SYSTEM DISABLED: {name}: {reason}"));
        } else {
            info!(device = name, reason, "gate arm system disable (already disabled)");
        }
    }

    /// Reason for the current disabled state, `None` while enabled.
    pub fn disable_reason(&self) -> Option<DisableRecord> {
        self.state.lock().last_disable.clone()
    }

    /// Forward an operator alert.
    pub fn send_alert(&self, message: &str) {
        self.alerts.send_alert(message);
    }

    fn disable_config(&self) {
        let Some(path) = &self.enable_file else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(path) {
            error!(path = %path.display(), error = %e, "could not remove gate arm enable file");
            self.state.lock().config_flag = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Alerts(Mutex<Vec<String>>);

    impl AlertSink for Alerts {
        fn send_alert(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    #[test]
    fn boots_disabled() {
        let sys = GateArmSystem::new(None, Arc::new(Alerts::default()));
        assert!(!sys.is_enabled());
        assert_eq!(sys.disable_reason().map(|r| r.reason), Some("startup".to_string()));
    }

    #[test]
    fn enable_then_disable_alerts_once() {
        let alerts = Arc::new(Alerts::default());
        let sys = GateArmSystem::new(None, alerts.clone());
        sys.enable().unwrap();
        assert!(sys.is_enabled());

        sys.disable("ramp_a", "store failure");
        sys.disable("ramp_a", "store failure");
        assert!(!sys.is_enabled());
        let sent = alerts.0.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("SYSTEM DISABLED: ramp_a"));
    }

    #[test]
    fn enable_file_gates_enable() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("gate_arm_enable");
        let sys = GateArmSystem::new(Some(path.clone()), Arc::new(Alerts::default()));
        assert_eq!(sys.enable(), Err(GateArmError::ConfigDisabled));

        fs::write(&path, b"").expect("create enable file");
        sys.enable().unwrap();
        assert!(sys.is_enabled());
    }

    #[test]
    fn disable_removes_enable_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("gate_arm_enable");
        fs::write(&path, b"").expect("create enable file");
        let sys = GateArmSystem::new(Some(path.clone()), Arc::new(Alerts::default()));
        sys.enable().unwrap();

        sys.disable("comm_link_1", "set timeout_ms");
        assert!(!path.exists());
        assert_eq!(sys.enable(), Err(GateArmError::ConfigDisabled));
    }

    #[test]
    fn removing_enable_file_disables_immediately() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("gate_arm_enable");
        fs::write(&path, b"").expect("create enable file");
        let sys = GateArmSystem::new(Some(path.clone()), Arc::new(Alerts::default()));
        sys.enable().unwrap();
        fs::remove_file(&path).unwrap();
        assert!(!sys.is_enabled());
    }
}
