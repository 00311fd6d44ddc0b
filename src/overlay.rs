// Preview overlays: transparent layers drawn over the live camera image.

use image::{Rgba, RgbaImage};
use rusttype::Font;
use std::fmt;
use tracing::debug;

use crate::assets::{draw_lines, TextBlock};
use crate::camera::Camera;
use crate::errors::CameraError;

pub const COUNTDOWN_COLOR: Rgba<u8> = Rgba([32, 178, 170, 210]);
pub const INSTRUCTION_COLOR: Rgba<u8> = Rgba([34, 139, 34, 255]);

/// Layer above the preview the overlay is drawn on.
pub const OVERLAY_LAYER: u8 = 3;
/// Layer-wide opacity applied on top of the per-pixel alpha.
pub const OVERLAY_ALPHA: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayHandle(pub u64);

impl fmt::Display for OverlayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub image: RgbaImage,
    pub layer: u8,
    pub alpha: u8,
}

impl Overlay {
    /// A camera-sized transparent layer with text drawn on it.
    pub fn text(
        font: &Font<'_>,
        size: (u32, u32),
        position: (i32, i32),
        font_size: f32,
        text: &str,
        color: Rgba<u8>,
    ) -> Self {
        let mut image = RgbaImage::from_pixel(size.0, size.1, Rgba([255, 0, 0, 0]));
        draw_lines(
            &mut image,
            font,
            &TextBlock {
                text,
                x: position.0,
                y: position.1,
                size: font_size,
                color,
            },
        );
        Overlay {
            image,
            layer: OVERLAY_LAYER,
            alpha: OVERLAY_ALPHA,
        }
    }

    /// The big countdown digit.
    pub fn countdown(font: &Font<'_>, size: (u32, u32), remaining: u32) -> Self {
        Self::text(
            font,
            size,
            (250, 100),
            240.0,
            &remaining.to_string(),
            COUNTDOWN_COLOR,
        )
    }

    /// Blend this overlay onto a frame, stretching it to the frame's size.
    pub fn blend_onto(&self, frame: &mut RgbaImage) {
        let scaled;
        let layer = if self.image.dimensions() == frame.dimensions() {
            &self.image
        } else {
            scaled = image::imageops::resize(
                &self.image,
                frame.width(),
                frame.height(),
                image::imageops::FilterType::Triangle,
            );
            &scaled
        };

        for (dst, src) in frame.pixels_mut().zip(layer.pixels()) {
            let alpha = src[3] as u32 * self.alpha as u32 / 255;
            if alpha == 0 {
                continue;
            }
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha)) / 255) as u8;
            }
        }
    }
}

/// Renders the booth's overlays at camera resolution.
///
/// Without a font the layers are still produced, only empty, so the
/// session flow is identical on a headless bench.
#[derive(Clone)]
pub struct OverlayPainter {
    font: Option<Font<'static>>,
    size: (u32, u32),
}

impl OverlayPainter {
    pub fn new(font: Font<'static>, size: (u32, u32)) -> Self {
        OverlayPainter {
            font: Some(font),
            size,
        }
    }

    pub fn blank(size: (u32, u32)) -> Self {
        OverlayPainter { font: None, size }
    }

    pub fn countdown(&self, remaining: u32) -> Overlay {
        match &self.font {
            Some(font) => Overlay::countdown(font, self.size, remaining),
            None => self.empty(),
        }
    }

    pub fn instructions(&self) -> Overlay {
        match &self.font {
            Some(font) => Overlay::text(
                font,
                self.size,
                (30, 10),
                38.0,
                "Press the green button\n to take 4 photos!",
                INSTRUCTION_COLOR,
            ),
            None => self.empty(),
        }
    }

    fn empty(&self) -> Overlay {
        Overlay {
            image: RgbaImage::from_pixel(self.size.0, self.size.1, Rgba([0, 0, 0, 0])),
            layer: OVERLAY_LAYER,
            alpha: OVERLAY_ALPHA,
        }
    }
}

/// Holds the one overlay the controller may have on the preview.
///
/// Replacing removes the current overlay from the camera before the new one
/// is added, so the camera never carries more than one of ours.
#[derive(Debug, Default)]
pub struct OverlaySlot {
    current: Option<OverlayHandle>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        OverlaySlot { current: None }
    }

    pub fn current(&self) -> Option<OverlayHandle> {
        self.current
    }

    pub async fn replace(
        &mut self,
        camera: &mut dyn Camera,
        overlay: Overlay,
    ) -> Result<OverlayHandle, CameraError> {
        self.clear(camera).await?;
        let handle = camera.set_overlay(overlay).await?;
        debug!("Attached {}", handle);
        self.current = Some(handle);
        Ok(handle)
    }

    pub async fn clear(&mut self, camera: &mut dyn Camera) -> Result<(), CameraError> {
        if let Some(handle) = self.current.take() {
            debug!("Removing {}", handle);
            camera.remove_overlay(handle).await?;
        }
        Ok(())
    }
}
