//! Red/blue status LED driver.
//!
//! Two discrete LEDs on plain GPIO outputs. Red signals battery state;
//! blue is switched off at boot and otherwise unused.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: writes GPIO levels via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Red,
    Blue,
}

impl Led {
    fn gpio(self) -> i32 {
        match self {
            Self::Red => pins::RED_LED_GPIO,
            Self::Blue => pins::BLUE_LED_GPIO,
        }
    }
}

pub struct StatusLeds {
    red: bool,
    blue: bool,
}

impl StatusLeds {
    pub fn new() -> Self {
        Self {
            red: false,
            blue: false,
        }
    }

    pub fn set(&mut self, led: Led, on: bool) {
        hw_init::gpio_write(led.gpio(), on);
        match led {
            Led::Red => self.red = on,
            Led::Blue => self.blue = on,
        }
    }

    pub fn all_off(&mut self) {
        self.set(Led::Red, false);
        self.set(Led::Blue, false);
    }

    pub fn is_on(&self, led: Led) -> bool {
        match led {
            Led::Red => self.red,
            Led::Blue => self.blue,
        }
    }
}

impl Default for StatusLeds {
    fn default() -> Self {
        Self::new()
    }
}
