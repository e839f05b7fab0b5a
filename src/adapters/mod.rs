//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                      | Connects to               |
//! |------------|---------------------------------|---------------------------|
//! | `hardware` | ServoPort, StatusPort, TimerPort| LEDC servo, status board  |
//! | `log_sink` | EventSink                       | Serial log output         |
//! | `nvs`      | ConfigPort, StoragePort         | NVS / in-memory store     |
//! | `radio`    | RadioPort                       | Bluedroid GAP scanner     |
//! | `restart`  | none                            | `esp_restart()`           |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod radio;
pub mod restart;
