//! Inbound commands to the detection service.
//!
//! These represent actions requested by the outside world (bootstrap,
//! provisioning, serial console) that the
//! [`DetectionService`](super::service::DetectionService) interprets and
//! acts upon. Any thread may submit them through
//! [`runtime::send_command`](crate::runtime::send_command).

use crate::beacon::MacAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Request BLE scanning (brings the radio up on first use).
    StartScan,

    /// Request BLE scanning to stop.
    StopScan,

    /// Replace the authorized beacon address and persist it.
    SetAuthorizedMac(MacAddr),
}
