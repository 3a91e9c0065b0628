//! Device selection
//!
//! Policy: take the last entry of the enumerated roster. Gauge boards are
//! USB CDC devices and tend to enumerate after built-in ports, but platform
//! enumeration order is not a documented contract, so this is a heuristic.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LinkError, LinkResult};
use crate::transport::SerialBackend;

/// Selection policy settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Minimum roster size before a device is picked; 2 skips a lone built-in port
    pub min_candidates: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self { min_candidates: 1 }
    }
}

impl SelectionPolicy {
    /// Pick a device from an enumerated roster
    ///
    /// Pure: the same roster always yields the same identifier.
    pub fn select<'a>(&self, ports: &'a [String]) -> LinkResult<&'a str> {
        let required = self.min_candidates.max(1);
        if ports.len() < required {
            return Err(LinkError::NoDeviceFound {
                found: ports.len(),
                required,
            });
        }

        ports
            .last()
            .map(String::as_str)
            .ok_or(LinkError::NoDeviceFound { found: 0, required })
    }
}

/// Enumerate devices and apply the policy
pub async fn select_device<B>(backend: &B, policy: &SelectionPolicy) -> LinkResult<String>
where
    B: SerialBackend + ?Sized,
{
    let ports = backend
        .available_ports()
        .await
        .map_err(|e| LinkError::EnumerationFailed(e.to_string()))?;

    debug!(backend = backend.name(), ?ports, "Enumerated serial devices");

    policy.select(&ports).map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::mock::MockSerialBackend;

    fn roster(ports: &[&str]) -> Vec<String> {
        ports.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_empty_roster() {
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.select(&[]),
            Err(LinkError::NoDeviceFound {
                found: 0,
                required: 1
            })
        );
    }

    #[test]
    fn test_picks_last_entry() {
        let policy = SelectionPolicy::default();
        let ports = roster(&["COM1", "COM3"]);
        assert_eq!(policy.select(&ports), Ok("COM3"));
        // Same roster, same answer
        assert_eq!(policy.select(&ports), policy.select(&ports));

        let ports = roster(&["COM5"]);
        assert_eq!(policy.select(&ports), Ok("COM5"));
    }

    #[test]
    fn test_min_candidates() {
        let policy = SelectionPolicy { min_candidates: 2 };
        assert_eq!(
            policy.select(&roster(&["COM1"])),
            Err(LinkError::NoDeviceFound {
                found: 1,
                required: 2
            })
        );
        assert_eq!(
            policy.select(&roster(&["COM1", "/dev/ttyACM0"])),
            Ok("/dev/ttyACM0")
        );

        // Zero behaves like one: an empty roster never selects
        let policy = SelectionPolicy { min_candidates: 0 };
        assert!(policy.select(&[]).is_err());
    }

    #[tokio::test]
    async fn test_select_device_does_not_open() {
        let backend = MockSerialBackend::new(Vec::<String>::new());
        let result = select_device(&backend, &SelectionPolicy::default()).await;
        assert!(matches!(result, Err(LinkError::NoDeviceFound { .. })));
        assert!(backend.opened().is_empty());
        assert!(backend.failed_opens().is_empty());
    }

    #[tokio::test]
    async fn test_select_device_enumeration_failure() {
        let backend = MockSerialBackend::new(["COM3"]);
        backend.fail_enumerations(1);

        let result = select_device(&backend, &SelectionPolicy::default()).await;
        assert!(matches!(result, Err(LinkError::EnumerationFailed(_))));

        let result = select_device(&backend, &SelectionPolicy::default()).await;
        assert_eq!(result.unwrap(), "COM3");
    }
}
