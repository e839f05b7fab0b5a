//! PetFeeder firmware library.
//!
//! Exposes the detection core and its adapters for the binary and for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod beacon;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod lid;
pub mod pins;
pub mod presence;
pub mod runtime;
pub mod status;

// Hardware-facing modules; the simulation stubs inside keep them
// building on the host.
pub mod adapters;
pub mod drivers;
pub mod sensors;
