// Full-screen kiosk screens rendered onto the framebuffer.

use image::{imageops, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::assets::{draw_lines, Assets, TextBlock, CRIMSON_TRANSLUCENT, GREEN, RED};
use crate::errors::DisplayError;
use crate::framebuffer::Framebuffer;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const HINT_SIZE: f32 = 37.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Home,
    Smile,
    /// The review composite, with the button hints on top. The print hint
    /// is left out when printing is disabled.
    ShowToPrint { review: PathBuf, printing: bool },
    Printing,
    End,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::Smile => "smile",
            Screen::ShowToPrint { .. } => "toprint",
            Screen::Printing => "print",
            Screen::End => "end",
        }
    }
}

/// Transient text drawn over a screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub size: f32,
}

impl Caption {
    pub fn large(text: impl Into<String>) -> Self {
        Caption {
            text: text.into(),
            x: 100,
            y: 380,
            size: 80.0,
        }
    }

    pub fn small(text: impl Into<String>) -> Self {
        Caption {
            text: text.into(),
            x: 40,
            y: 380,
            size: 50.0,
        }
    }
}

pub trait Display: Send {
    /// Paint a screen; returns once the new frame is on the glass.
    fn show(&mut self, screen: &Screen, caption: Option<&Caption>) -> Result<(), DisplayError>;
    fn close(&mut self) -> Result<(), DisplayError>;
}

pub struct FramebufferDisplay {
    assets: Assets,
    framebuffer: Arc<Framebuffer>,
    width: u32,
    height: u32,
}

impl FramebufferDisplay {
    pub fn new(assets: Assets, framebuffer: Arc<Framebuffer>, width: u32, height: u32) -> Self {
        FramebufferDisplay {
            assets,
            framebuffer,
            width,
            height,
        }
    }

    fn render(&self, screen: &Screen, caption: Option<&Caption>) -> Result<RgbaImage, DisplayError> {
        let mut image = match screen {
            Screen::Home => self.assets.home.clone(),
            Screen::Smile => self.assets.smile.clone(),
            Screen::Printing => self.assets.print.clone(),
            Screen::End => self.assets.end.clone(),
            Screen::ShowToPrint { review, printing } => self.review_image(review, *printing)?,
        };

        if let Some(caption) = caption {
            draw_lines(
                &mut image,
                &self.assets.font,
                &TextBlock {
                    text: &caption.text,
                    x: caption.x,
                    y: caption.y,
                    size: caption.size,
                    color: CRIMSON_TRANSLUCENT,
                },
            );
        }

        Ok(center_on_canvas(&image, (self.width, self.height)))
    }

    fn review_image(&self, path: &Path, printing: bool) -> Result<RgbaImage, DisplayError> {
        let review = image::open(path)
            .map_err(|source| DisplayError::ReviewImage {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let mut review = shrink_to_fit(review, (self.width, self.height));

        for (text, y, color) in review_hints(printing) {
            draw_lines(
                &mut review,
                &self.assets.font,
                &TextBlock {
                    text,
                    x: 50,
                    y,
                    size: HINT_SIZE,
                    color,
                },
            );
        }
        Ok(review)
    }
}

impl Display for FramebufferDisplay {
    fn show(&mut self, screen: &Screen, caption: Option<&Caption>) -> Result<(), DisplayError> {
        let frame = self.render(screen, caption)?;
        self.framebuffer.present(&frame)?;
        info!("show {}", screen.name());
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        info!("Closing display");
        self.framebuffer.clear()
    }
}

/// Hint lines drawn over the review composite: text, baseline and colour.
pub fn review_hints(printing: bool) -> Vec<(&'static str, i32, Rgba<u8>)> {
    if printing {
        vec![
            ("GREEN button: print", 150, GREEN),
            ("RED button: home", 300, RED),
        ]
    } else {
        vec![("any button: continue", 300, GREEN)]
    }
}

/// Scale down, keeping the aspect ratio, only if the image is larger than
/// the bounds.
pub fn shrink_to_fit(image: RgbaImage, bounds: (u32, u32)) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w <= bounds.0 && h <= bounds.1 {
        return image;
    }
    let ratio = f64::min(bounds.0 as f64 / w as f64, bounds.1 as f64 / h as f64);
    let new_w = ((w as f64 * ratio) as u32).max(1);
    let new_h = ((h as f64 * ratio) as u32).max(1);
    imageops::resize(&image, new_w, new_h, imageops::FilterType::Lanczos3)
}

/// Place an image at the centre of a black canvas, cropping what overhangs.
pub fn center_on_canvas(image: &RgbaImage, canvas_size: (u32, u32)) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(canvas_size.0, canvas_size.1, BACKGROUND);
    let x = (canvas_size.0 as i64 - image.width() as i64) / 2;
    let y = (canvas_size.1 as i64 - image.height() as i64) / 2;
    imageops::overlay(&mut canvas, image, x, y);
    canvas
}

/// Scale an image to fill as much of the canvas as its aspect allows, then
/// centre it. Used for live view frames, which may be smaller than the screen.
pub fn fit_to_canvas(image: &RgbaImage, canvas_size: (u32, u32)) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return RgbaImage::from_pixel(canvas_size.0, canvas_size.1, BACKGROUND);
    }
    let ratio = f64::min(
        canvas_size.0 as f64 / w as f64,
        canvas_size.1 as f64 / h as f64,
    );
    let new_w = ((w as f64 * ratio) as u32).max(1);
    let new_h = ((h as f64 * ratio) as u32).max(1);
    let scaled = if (new_w, new_h) == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle)
    };
    center_on_canvas(&scaled, canvas_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shrink_keeps_small_images() {
        let img = RgbaImage::new(100, 50);
        assert_eq!(shrink_to_fit(img, (800, 480)).dimensions(), (100, 50));
    }

    #[test]
    fn test_shrink_preserves_aspect() {
        let img = RgbaImage::new(1600, 1200);
        assert_eq!(shrink_to_fit(img, (800, 480)).dimensions(), (640, 480));
    }

    #[test]
    fn test_center_on_canvas() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let canvas = center_on_canvas(&img, (4, 4));
        assert_eq!(canvas.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(3, 3), &BACKGROUND);
    }

    #[test]
    fn test_fit_to_canvas_letterboxes() {
        let img = RgbaImage::from_pixel(320, 240, Rgba([9, 9, 9, 255]));
        let canvas = fit_to_canvas(&img, (800, 480));
        assert_eq!(canvas.dimensions(), (800, 480));
        // 640 wide after scaling, so 80 px bars left and right
        assert_eq!(canvas.get_pixel(10, 240), &BACKGROUND);
        assert_eq!(canvas.get_pixel(400, 240), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_review_hints_follow_printing() {
        let with_print: Vec<&str> = review_hints(true).iter().map(|h| h.0).collect();
        assert_eq!(with_print, vec!["GREEN button: print", "RED button: home"]);

        let without_print = review_hints(false);
        assert_eq!(without_print.len(), 1);
        assert!(!without_print[0].0.contains("print"));
    }

    #[test]
    fn test_caption_presets() {
        assert_eq!(Caption::large("photo 1 / 4 !").size, 80.0);
        assert_eq!(Caption::small("One moment...").x, 40);
    }
}
