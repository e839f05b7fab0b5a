//! Fatal-error restart.
//!
//! - **`target_os = "espidf"`**: logs, waits, then `esp_restart()`.
//! - **`not(target_os = "espidf")`**: logs and waits; the host process
//!   keeps running so the caller decides how to exit.

use core::time::Duration;

use log::error;

use crate::error::Error;

/// Log the fatal error and reboot after `delay`.
#[cfg(target_os = "espidf")]
pub fn restart_after(cause: &Error, delay: Duration) -> ! {
    error!(
        "Fatal error ({}), rebooting in {} seconds..",
        cause,
        delay.as_secs()
    );
    std::thread::sleep(delay);
    // SAFETY: esp_restart never returns and has no preconditions.
    unsafe { esp_idf_svc::sys::esp_restart() }
}

/// Log the fatal error and wait `delay`. Host builds cannot reboot.
#[cfg(not(target_os = "espidf"))]
pub fn restart_after(cause: &Error, delay: Duration) {
    error!(
        "Fatal error ({}), rebooting in {} seconds..",
        cause,
        delay.as_secs()
    );
    std::thread::sleep(delay);
    error!("restart(sim): no reboot on host");
}
