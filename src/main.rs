// Photo booth kiosk: framebuffer screens, two GPIO buttons, a gphoto2
// camera and a CUPS printer, driven by one session state machine.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use booth_kiosk::assets::Assets;
use booth_kiosk::camera::GPhotoCamera;
use booth_kiosk::cloud_sync::CloudSync;
use booth_kiosk::compositor::MontageCompositor;
use booth_kiosk::controller::release_devices;
use booth_kiosk::display::FramebufferDisplay;
use booth_kiosk::framebuffer::Framebuffer;
use booth_kiosk::input::{InputReader, SysfsButtons};
use booth_kiosk::overlay::OverlayPainter;
use booth_kiosk::{logging, new_printer, AppResult, Config, Devices, SessionController};

// ============================================================================
// Device Acquisition
// ============================================================================

async fn acquire_devices(config: &Config) -> AppResult<Devices> {
    let assets = Assets::load(config)?;
    info!("Assets loaded from {:?}", config.booth.working_dir);

    let framebuffer = Arc::new(Framebuffer::open(&config.screen.framebuffer_device)?);
    let camera_size = (config.camera.width, config.camera.height);
    let painter = OverlayPainter::new(assets.font.clone(), camera_size);
    let mut display = FramebufferDisplay::new(
        assets,
        framebuffer.clone(),
        config.screen.width,
        config.screen.height,
    );

    let mut camera = GPhotoCamera::new(
        config.camera.clone(),
        framebuffer,
        (config.screen.width, config.screen.height),
    );

    // From here on the screen and camera are held; give them back on failure.
    let buttons = match open_camera_and_buttons(config, &camera).await {
        Ok(buttons) => buttons,
        Err(e) => {
            release_devices(&mut camera, &mut display).await;
            return Err(e);
        }
    };
    let input = InputReader::new(Box::new(buttons), config.buttons.poll_interval);

    let printer = new_printer(&config.printer);
    if !config.booth.profile.printing {
        info!("Printing disabled by profile");
    }

    let sync = config.booth.sync_script.as_ref().map(|script| {
        info!("Uploading photos with {:?}", script);
        CloudSync::new(script)
    });

    Ok(Devices {
        input,
        display: Box::new(display),
        camera: Box::new(camera),
        compositor: Box::new(MontageCompositor::new(config.compositor.program.clone())),
        printer,
        painter,
        sync,
    })
}

async fn open_camera_and_buttons(config: &Config, camera: &GPhotoCamera) -> AppResult<SysfsButtons> {
    camera.initialize().await?;
    info!("Camera initialized");
    Ok(SysfsButtons::open(&config.buttons)?)
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ========================================
    // Phase 1: Configuration & Logging
    // ========================================

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().init();
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guards = match logging::init_logging(&config.logging.dir) {
        Ok(guards) => guards,
        Err(e) => {
            tracing_subscriber::fmt().init();
            error!("Logging setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting photo booth");

    // ========================================
    // Phase 2: Hardware Acquisition
    // ========================================

    let devices = match acquire_devices(&config).await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Startup failed ({}): {}", e.error_type(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut controller = SessionController::new(config, devices);

    // ========================================
    // Phase 3: Run Until Shutdown or Failure
    // ========================================

    let outcome = tokio::select! {
        result = controller.run() => result,
        _ = shutdown_signal() => Ok(()),
    };

    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("unhandled error ({}): {}", e.error_type(), e);
            if e.is_hardware() {
                error!("Check the camera and button wiring before restarting");
            }
            ExitCode::FAILURE
        }
    };

    // ========================================
    // Phase 4: Teardown
    // ========================================

    info!("quitting...");
    controller.teardown().await;
    info!("Shutdown complete");
    code
}
