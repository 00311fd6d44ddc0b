// Two-button input: raw GPIO levels in, debounced release edges out.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ButtonConfig;
use crate::errors::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

impl ButtonState {
    /// Buttons pull the line to ground when pressed.
    pub fn from_level(level: u8) -> Self {
        if level == 0 {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    None,
    GreenReleased,
    RedReleased,
}

/// One sample of both raw electrical levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLevels {
    pub green: u8,
    pub red: u8,
}

impl ButtonLevels {
    pub const IDLE: ButtonLevels = ButtonLevels { green: 1, red: 1 };

    pub fn green(&self) -> ButtonState {
        ButtonState::from_level(self.green)
    }

    pub fn red(&self) -> ButtonState {
        ButtonState::from_level(self.red)
    }
}

pub trait ButtonSource: Send {
    fn read_levels(&mut self) -> Result<ButtonLevels, InputError>;
}

pub struct InputReader {
    source: Box<dyn ButtonSource>,
    tick: Duration,
    green_down: bool,
    red_down: bool,
}

impl InputReader {
    pub fn new(source: Box<dyn ButtonSource>, tick: Duration) -> Self {
        InputReader {
            source,
            tick,
            green_down: false,
            red_down: false,
        }
    }

    /// Sample both buttons once.
    ///
    /// Branches are checked in fixed order (green down, red down, green up,
    /// red up) and only the first match acts, so a single poll never yields
    /// more than one edge. A release clears its own button's flag, which
    /// re-arms that button for the next press.
    pub fn poll(&mut self) -> Result<EdgeEvent, InputError> {
        let levels = self.source.read_levels()?;
        let green = levels.green();
        let red = levels.red();

        if green == ButtonState::Pressed && !self.green_down {
            debug!("green down");
            self.green_down = true;
            Ok(EdgeEvent::None)
        } else if red == ButtonState::Pressed && !self.red_down {
            debug!("red down");
            self.red_down = true;
            Ok(EdgeEvent::None)
        } else if green == ButtonState::Released && self.green_down {
            debug!("green up");
            self.green_down = false;
            Ok(EdgeEvent::GreenReleased)
        } else if red == ButtonState::Released && self.red_down {
            debug!("red up");
            self.red_down = false;
            Ok(EdgeEvent::RedReleased)
        } else {
            Ok(EdgeEvent::None)
        }
    }

    /// Poll on a fixed tick until either button completes a press cycle.
    pub async fn next_event(&mut self) -> Result<EdgeEvent, InputError> {
        loop {
            match self.poll()? {
                EdgeEvent::None => tokio::time::sleep(self.tick).await,
                event => return Ok(event),
            }
        }
    }

    /// Block until the green button is released; red presses are dropped.
    pub async fn wait_for_green(&mut self) -> Result<(), InputError> {
        loop {
            match self.next_event().await? {
                EdgeEvent::GreenReleased => return Ok(()),
                other => debug!("ignoring {:?} while waiting for green", other),
            }
        }
    }
}

/// Buttons read through the kernel's sysfs GPIO interface.
pub struct SysfsButtons {
    green: SysfsPin,
    red: SysfsPin,
}

struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

const GPIO_ROOT: &str = "/sys/class/gpio";

impl SysfsButtons {
    pub fn open(config: &ButtonConfig) -> Result<Self, InputError> {
        info!(
            "Configuring buttons: green on GPIO {}, red on GPIO {}",
            config.green_pin, config.red_pin
        );
        Ok(SysfsButtons {
            green: SysfsPin::open(config.green_pin, config.gpio_base)?,
            red: SysfsPin::open(config.red_pin, config.gpio_base)?,
        })
    }
}

impl SysfsPin {
    fn open(pin: u32, gpio_base: u32) -> Result<Self, InputError> {
        let number = gpio_base + pin;
        let dir = PathBuf::from(GPIO_ROOT).join(format!("gpio{}", number));

        if !dir.exists() {
            std::fs::write(PathBuf::from(GPIO_ROOT).join("export"), number.to_string())
                .map_err(|source| InputError::Export { pin, source })?;
            // udev needs a moment to hand the new node to the gpio group
            std::thread::sleep(Duration::from_millis(100));
        }

        std::fs::write(dir.join("direction"), "in")
            .map_err(|source| InputError::Configure { pin, source })?;

        // sysfs has no bias control; the Pi firmware tool does.
        match std::process::Command::new("pinctrl")
            .args(["set", &pin.to_string(), "ip", "pu"])
            .output()
        {
            Ok(output) if output.status.success() => debug!("Pull-up enabled on GPIO {}", pin),
            Ok(output) => warn!(
                "pinctrl could not enable pull-up on GPIO {}: {}",
                pin,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!("pinctrl unavailable, relying on external pull-up for GPIO {}: {}", pin, e),
        }

        Ok(SysfsPin {
            pin,
            value_path: dir.join("value"),
        })
    }

    fn read(&self) -> Result<u8, InputError> {
        let raw = std::fs::read_to_string(&self.value_path).map_err(|source| InputError::Read {
            pin: self.pin,
            source,
        })?;
        match raw.trim() {
            "0" => Ok(0),
            "1" => Ok(1),
            other => Err(InputError::InvalidLevel {
                pin: self.pin,
                value: other.to_string(),
            }),
        }
    }
}

impl ButtonSource for SysfsButtons {
    fn read_levels(&mut self) -> Result<ButtonLevels, InputError> {
        Ok(ButtonLevels {
            green: self.green.read()?,
            red: self.red.read()?,
        })
    }
}
