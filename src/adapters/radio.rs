//! BLE scanner adapter.
//!
//! Implements [`RadioPort`] on top of the Bluedroid GAP API. Every
//! operation is asynchronous: the call returns once the stack accepted
//! the request and the result arrives later in the GAP callback, which
//! posts it to [`COMPLETION_CHANNEL`](crate::events::COMPLETION_CHANNEL).
//!
//! The callback also pre-filters scan results: only inquiry results from
//! the authorized address carrying an Eddystone-TLM frame reach
//! [`ADV_CHANNEL`](crate::events::ADV_CHANNEL). Everything else nearby is
//! discarded on the BT task.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid passive scanner via raw `esp_ble_gap_*`.
//! - **all other targets**: the simulation completes every request at once.
//!
//! ## Scan parameters
//!
//! | Field          | Value                        |
//! |----------------|------------------------------|
//! | type           | passive                      |
//! | interval       | 400 × 0.625 ms = 250 ms      |
//! | window         | 400 × 0.625 ms = 250 ms      |
//! | own address    | public                       |
//! | filter policy  | allow all                    |
//! | duplicates     | reported                     |

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;
#[cfg(target_os = "espidf")]
use log::{error, warn};

use crate::app::ports::RadioPort;
use crate::beacon::MacAddr;
use crate::beacon::filter::EDDYSTONE_TLM_HEADER;
use crate::error::RadioError;
#[cfg(not(target_os = "espidf"))]
use crate::events::push_completion;
#[cfg(not(target_os = "espidf"))]
use crate::fsm::ScanCompletion;

pub const SCAN_INTERVAL: u16 = 400;
pub const SCAN_WINDOW: u16 = 400;

// ───────────────────────────────────────────────────────────────
// GAP callback (ESP-IDF)
// ───────────────────────────────────────────────────────────────

/// Address the GAP callback lets through. Written by the runtime thread,
/// read on the Bluedroid task.
static ADDRESS_FILTER: Mutex<CriticalSectionRawMutex, Cell<MacAddr>> =
    Mutex::new(Cell::new(MacAddr::UNSET));

#[cfg(any(target_os = "espidf", test))]
fn address_filter() -> MacAddr {
    ADDRESS_FILTER.lock(Cell::get)
}

/// Whether a scan result should be copied into the channel. Runs on the
/// BT task for every report, so it only compares bytes.
pub fn worth_forwarding(filter: MacAddr, address: MacAddr, payload: &[u8]) -> bool {
    !filter.is_unset() && address == filter && payload.starts_with(&EDDYSTONE_TLM_HEADER)
}

#[cfg(target_os = "espidf")]
fn status_to_result(status: esp_idf_svc::sys::esp_bt_status_t) -> Result<(), i32> {
    if status == esp_idf_svc::sys::esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(status as i32)
    }
}

#[cfg(target_os = "espidf")]
fn forward_completion(done: crate::fsm::ScanCompletion) {
    if !crate::events::push_completion(done) {
        error!("BLE GAP: completion channel full, {:?} dropped", done);
    }
}

/// Runs on the Bluedroid task. Only copies data out and posts it.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use crate::beacon::AdvRecord;
    use crate::fsm::ScanCompletion;
    use esp_idf_svc::sys::*;

    if param.is_null() {
        return;
    }
    // SAFETY: Bluedroid passes a valid parameter block for the duration of
    // the callback; the union member read matches `event`.
    let p = unsafe { &*param };
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            let status = unsafe { p.scan_param_cmpl.status };
            forward_completion(ScanCompletion::ParamsConfigured(status_to_result(status)));
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
            let status = unsafe { p.scan_start_cmpl.status };
            forward_completion(ScanCompletion::Started(status_to_result(status)));
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_STOP_COMPLETE_EVT => {
            let status = unsafe { p.scan_stop_cmpl.status };
            forward_completion(ScanCompletion::Stopped(status_to_result(status)));
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let rst = unsafe { &p.scan_rst };
            if rst.search_evt != esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT {
                return;
            }
            let address = MacAddr::new(rst.bda);
            let len =
                (rst.adv_data_len as usize + rst.scan_rsp_len as usize).min(rst.ble_adv.len());
            let payload = &rst.ble_adv[..len];
            if !worth_forwarding(address_filter(), address, payload) {
                return;
            }
            let rssi = rst.rssi.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
            if !crate::events::push_advertisement(AdvRecord::discovery(address, rssi, payload)) {
                warn!("BLE GAP: advertisement channel full, record dropped");
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Scanner adapter
// ───────────────────────────────────────────────────────────────

pub struct BleScanner {
    stack_up: bool,
}

impl BleScanner {
    pub fn new() -> Self {
        Self { stack_up: false }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_bring_up(&mut self) -> Result<(), RadioError> {
        use esp_idf_svc::sys::*;

        if !self.stack_up {
            // SAFETY: the BT controller and Bluedroid are initialised once
            // from the runtime thread.
            unsafe {
                // Release classic BT memory (BLE-only mode).
                let ret = esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);
                if ret != ESP_OK as i32 {
                    error!("BLE: mem_release failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }

                let mut bt_cfg = esp_bt_controller_config_t::default();
                let ret = esp_bt_controller_init(&mut bt_cfg);
                if ret != ESP_OK as i32 {
                    error!("BLE: bt_controller_init failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }

                let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
                if ret != ESP_OK as i32 {
                    error!("BLE: bt_controller_enable failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }

                let ret = esp_bluedroid_init();
                if ret != ESP_OK as i32 {
                    error!("BLE: bluedroid_init failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }

                let ret = esp_bluedroid_enable();
                if ret != ESP_OK as i32 {
                    error!("BLE: bluedroid_enable failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }

                let ret = esp_ble_gap_register_callback(Some(ble_gap_event_handler));
                if ret != ESP_OK as i32 {
                    error!("BLE: gap_register_callback failed ({})", ret);
                    return Err(RadioError::BringUpFailed(ret));
                }
            }
            self.stack_up = true;
        }

        let mut params = esp_ble_scan_params_t {
            scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_PASSIVE,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
            scan_interval: SCAN_INTERVAL,
            scan_window: SCAN_WINDOW,
            scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
        };
        // SAFETY: Bluedroid copies the parameter block before returning.
        let ret = unsafe { esp_ble_gap_set_scan_params(&mut params) };
        if ret != ESP_OK as i32 {
            error!("BLE: set_scan_params failed ({})", ret);
            return Err(RadioError::ParamsRejected(ret));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), RadioError> {
        // Duration 0 scans until explicitly stopped.
        // SAFETY: the stack is up; only the runtime thread issues requests.
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_start_scanning(0) };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(RadioError::StartFailed(ret));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) -> Result<(), RadioError> {
        // SAFETY: see platform_start.
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_stop_scanning() };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(RadioError::StopFailed(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_bring_up(&mut self) -> Result<(), RadioError> {
        if !self.stack_up {
            info!("BLE (sim): stack up");
            self.stack_up = true;
        }
        Self::sim_complete(ScanCompletion::ParamsConfigured(Ok(())))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), RadioError> {
        Self::sim_complete(ScanCompletion::Started(Ok(())))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) -> Result<(), RadioError> {
        Self::sim_complete(ScanCompletion::Stopped(Ok(())))
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_complete(done: ScanCompletion) -> Result<(), RadioError> {
        if !push_completion(done) {
            log::error!("BLE (sim): completion channel full, {:?} dropped", done);
        }
        Ok(())
    }
}

impl Default for BleScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for BleScanner {
    fn bring_up(&mut self) -> Result<(), RadioError> {
        info!("BLE: bringing up scanner");
        self.platform_bring_up()
    }

    fn start_scan(&mut self) -> Result<(), RadioError> {
        self.platform_start()
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.platform_stop()
    }

    fn set_address_filter(&mut self, mac: MacAddr) {
        ADDRESS_FILTER.lock(|cell| cell.set(mac));
    }
}
