//! One-shot hardware peripheral initialization.
//!
//! Configures the supply-sense ADC, the status LED GPIOs and the servo
//! LEDC timer/channel using raw ESP-IDF sys calls. Called once from
//! `main()` before the runtime thread starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::AdcInitFailed(_) => Self::Init("adc"),
            HwInitError::GpioConfigFailed(_) => Self::Init("gpio"),
            HwInitError::LedcInitFailed(_) => Self::Init("ledc"),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(closed_duty: u32) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the runtime thread exists.
    unsafe {
        init_adc()?;
        init_gpio_outputs()?;
        init_servo_ledc(closed_duty)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_closed_duty: u32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
static mut ADC1_CALI: adc_cali_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(ADC1_HANDLE, pins::VCC_ADC_CHANNEL, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // Calibration is best effort; without it readings are scaled linearly.
    let cali_cfg = adc_cali_line_fitting_config_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
        ..Default::default()
    };
    // SAFETY: ADC1_CALI is only written here, once at boot.
    let ret = unsafe { adc_cali_create_scheme_line_fitting(&cali_cfg, &raw mut ADC1_CALI) };
    if ret == ESP_OK as i32 {
        info!("hw_init: ADC1 CH{} configured (line-fitting calibration)", pins::VCC_ADC_CHANNEL);
    } else {
        warn!("hw_init: ADC calibration unavailable (rc={}), using linear scale", ret);
    }
    Ok(())
}

/// Read the supply-sense channel in millivolts. `None` on a read error.
#[cfg(target_os = "espidf")]
pub fn read_vcc_mv() -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: the handles are written once during init_adc() before the
    // runtime thread, the only caller, is spawned.
    unsafe {
        if adc_oneshot_read(ADC1_HANDLE, pins::VCC_ADC_CHANNEL, &mut raw) != ESP_OK as i32 {
            return None;
        }
        if !ADC1_CALI.is_null() {
            let mut mv: i32 = 0;
            if adc_cali_raw_to_voltage(ADC1_CALI, raw, &mut mv) == ESP_OK as i32 {
                return Some(mv.max(0) as u16);
            }
        }
    }
    Some((raw.max(0) as u32 * pins::VCC_ADC_FULL_SCALE_MV / pins::VCC_ADC_MAX_RAW) as u16)
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for &pin in &[pins::RED_LED_GPIO, pins::BLUE_LED_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: LED outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC PWM (servo) ──────────────────────────────────────────

pub const LEDC_TIMER_SERVO: u32 = 0;
pub const LEDC_CH_SERVO: u32 = 0;

/// Configure a 50 Hz, 20-bit timer driving the servo pin, preload the
/// closed duty and leave the timer paused.
#[cfg(target_os = "espidf")]
unsafe fn init_servo_ledc(closed_duty: u32) -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: LEDC_TIMER_SERVO,
        duty_resolution: pins::SERVO_DUTY_RESOLUTION_BITS,
        freq_hz: pins::SERVO_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_SERVO,
            timer_sel: LEDC_TIMER_SERVO,
            gpio_num: pins::SERVO_PWM_GPIO,
            intr_type: ledc_intr_type_t_LEDC_INTR_DISABLE,
            duty: closed_duty,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe { ledc_timer_pause(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_TIMER_SERVO) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!(
        "hw_init: servo LEDC configured (GPIO{}, {} Hz, {}-bit, paused)",
        pins::SERVO_PWM_GPIO,
        pins::SERVO_PWM_FREQ_HZ,
        pins::SERVO_DUTY_RESOLUTION_BITS
    );
    Ok(())
}
