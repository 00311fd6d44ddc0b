use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use crate::errors::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub booth: BoothConfig,
    pub screen: ScreenConfig,
    pub camera: CameraConfig,
    pub buttons: ButtonConfig,
    pub timing: TimingConfig,
    pub printer: PrinterConfig,
    pub compositor: CompositorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct BoothConfig {
    pub working_dir: PathBuf,
    pub profile: BoothProfile,
    pub countdown: u32,
    pub sync_script: Option<PathBuf>,
}

/// The full kiosk prints and draws instructional overlays; the simple one
/// only runs the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoothProfile {
    pub printing: bool,
    pub rich_overlays: bool,
}

impl BoothProfile {
    pub const FULL: BoothProfile = BoothProfile {
        printing: true,
        rich_overlays: true,
    };

    pub const SIMPLE: BoothProfile = BoothProfile {
        printing: false,
        rich_overlays: false,
    };
}

impl FromStr for BoothProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(BoothProfile::FULL),
            "simple" | "debug" => Ok(BoothProfile::SIMPLE),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub framebuffer_device: String,
    pub font_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ButtonConfig {
    pub green_pin: u32,
    pub red_pin: u32,
    pub gpio_base: u32,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub countdown_tick: Duration,
    pub capture_pause: Duration,
    pub print_hold: Duration,
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub name: String,
    pub user: String,
    pub use_mock: bool,
}

#[derive(Debug, Clone)]
pub struct CompositorConfig {
    pub program: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            booth: BoothConfig {
                working_dir: PathBuf::from("."),
                profile: BoothProfile::FULL,
                countdown: 3,
                sync_script: None,
            },
            screen: ScreenConfig {
                width: 800,
                height: 480,
                framebuffer_device: "/dev/fb0".to_string(),
                font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
            },
            camera: CameraConfig {
                width: 640,
                height: 480,
            },
            buttons: ButtonConfig {
                green_pin: 26,
                red_pin: 16,
                gpio_base: 0,
                poll_interval: Duration::from_millis(20),
            },
            timing: TimingConfig {
                countdown_tick: Duration::from_secs(1),
                capture_pause: Duration::from_secs(1),
                print_hold: Duration::from_secs(5),
            },
            printer: PrinterConfig {
                name: "Canon_SELPHY_CP1300".to_string(),
                user: "pi".to_string(),
                use_mock: false,
            },
            compositor: CompositorConfig {
                program: "montage".to_string(),
            },
            logging: LoggingConfig {
                dir: PathBuf::from("./logs"),
            },
        }
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

fn env_millis(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    env_or(name, default.as_millis() as u64).map(Duration::from_millis)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let working_dir: PathBuf = std::env::var("BOOTH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.booth.working_dir);

        let booth = BoothConfig {
            profile: env_or("BOOTH_PROFILE", defaults.booth.profile)?,
            countdown: env_or("COUNTDOWN", defaults.booth.countdown)?,
            sync_script: std::env::var("SYNC_SCRIPT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            working_dir,
        };

        let screen = ScreenConfig {
            width: env_or("SCREEN_WIDTH", defaults.screen.width)?,
            height: env_or("SCREEN_HEIGHT", defaults.screen.height)?,
            framebuffer_device: std::env::var("FRAMEBUFFER_DEVICE")
                .unwrap_or(defaults.screen.framebuffer_device),
            font_path: std::env::var("FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.screen.font_path),
        };

        let camera = CameraConfig {
            width: env_or("CAMERA_WIDTH", defaults.camera.width)?,
            height: env_or("CAMERA_HEIGHT", defaults.camera.height)?,
        };

        let buttons = ButtonConfig {
            green_pin: env_or("GREEN_BUTTON_PIN", defaults.buttons.green_pin)?,
            red_pin: env_or("RED_BUTTON_PIN", defaults.buttons.red_pin)?,
            gpio_base: env_or("GPIO_BASE", defaults.buttons.gpio_base)?,
            poll_interval: env_millis("POLL_INTERVAL_MS", defaults.buttons.poll_interval)?,
        };

        let timing = TimingConfig {
            countdown_tick: env_millis("COUNTDOWN_TICK_MS", defaults.timing.countdown_tick)?,
            capture_pause: env_millis("CAPTURE_PAUSE_MS", defaults.timing.capture_pause)?,
            print_hold: env_millis("PRINT_HOLD_MS", defaults.timing.print_hold)?,
        };

        let printer = PrinterConfig {
            name: std::env::var("PRINTER_NAME").unwrap_or(defaults.printer.name),
            user: std::env::var("PRINTER_USER").unwrap_or(defaults.printer.user),
            use_mock: std::env::var("USE_MOCK_PRINTER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        let compositor = CompositorConfig {
            program: std::env::var("MONTAGE_PROGRAM").unwrap_or(defaults.compositor.program),
        };

        let logging = LoggingConfig {
            dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.logging.dir),
        };

        let config = Config {
            booth,
            screen,
            camera,
            buttons,
            timing,
            printer,
            compositor,
            logging,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                name: "screen",
                width: self.screen.width,
                height: self.screen.height,
            });
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                name: "camera",
                width: self.camera.width,
                height: self.camera.height,
            });
        }

        if self.booth.countdown == 0 {
            return Err(ConfigError::InvalidCountdown);
        }

        if self.buttons.green_pin == self.buttons.red_pin {
            return Err(ConfigError::DuplicatePin {
                pin: self.buttons.green_pin,
            });
        }

        Ok(())
    }

    pub fn asset_path(&self, file_name: &str) -> PathBuf {
        self.booth.working_dir.join(file_name)
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.booth.working_dir.join("photos")
    }

    pub fn toprint_dir(&self) -> PathBuf {
        self.booth.working_dir.join("toprint")
    }
}
