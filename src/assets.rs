// Screen artwork and the caption font, loaded once at startup.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::errors::AssetError;

pub const GREEN: Rgba<u8> = Rgba([0, 128, 0, 255]);
pub const RED: Rgba<u8> = Rgba([255, 51, 51, 255]);
pub const CRIMSON: Rgba<u8> = Rgba([220, 20, 60, 255]);
pub const CRIMSON_TRANSLUCENT: Rgba<u8> = Rgba([220, 20, 60, 200]);

const HOME_IMAGE: &str = "booth0.png";
const SMILE_IMAGE: &str = "booth1.png";
const END_IMAGE: &str = "end.png";
const PRINT_IMAGE: &str = "print.png";

const BANNER_SIZE: f32 = 37.0;

/// Text drawn at a position with a pixel height.
#[derive(Debug, Clone)]
pub struct TextBlock<'a> {
    pub text: &'a str,
    pub x: i32,
    pub y: i32,
    pub size: f32,
    pub color: Rgba<u8>,
}

pub struct Assets {
    pub home: RgbaImage,
    pub smile: RgbaImage,
    pub end: RgbaImage,
    pub print: RgbaImage,
    pub font: Font<'static>,
}

impl Assets {
    /// Load every screen image from the working directory and bake in the
    /// static banner text. Any missing file is fatal.
    pub fn load(config: &Config) -> Result<Self, AssetError> {
        info!("Loading screen assets from {:?}", config.booth.working_dir);
        let font = load_font(&config.screen.font_path)?;

        let mut home = load_image(&config.asset_path(HOME_IMAGE))?;
        draw_lines(
            &mut home,
            &font,
            &TextBlock {
                text: "Press the GREEN button\n      to start!",
                x: 80,
                y: 340,
                size: BANNER_SIZE,
                color: GREEN,
            },
        );

        let smile = load_image(&config.asset_path(SMILE_IMAGE))?;

        let mut end = load_image(&config.asset_path(END_IMAGE))?;
        draw_lines(
            &mut end,
            &font,
            &TextBlock {
                text: "Thanks for stopping by!",
                x: 40,
                y: 15,
                size: BANNER_SIZE,
                color: CRIMSON,
            },
        );
        draw_lines(
            &mut end,
            &font,
            &TextBlock {
                text: "GREEN button to continue.",
                x: 120,
                y: 390,
                size: BANNER_SIZE,
                color: GREEN,
            },
        );

        let mut print = load_image(&config.asset_path(PRINT_IMAGE))?;
        draw_lines(
            &mut print,
            &font,
            &TextBlock {
                text: "Your photos are being\n   printed.....",
                x: 50,
                y: 380,
                size: BANNER_SIZE,
                color: CRIMSON,
            },
        );

        Ok(Assets {
            home,
            smile,
            end,
            print,
            font,
        })
    }
}

pub fn load_font(path: &Path) -> Result<Font<'static>, AssetError> {
    let data = std::fs::read(path).map_err(|_| AssetError::NotFound {
        path: path.to_path_buf(),
    })?;
    Font::try_from_vec(data)
        .ok_or_else(|| AssetError::FontError(format!("Failed to parse font {:?}", path)))
}

pub fn load_image(path: &Path) -> Result<RgbaImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| AssetError::ImageLoadError {
            path: path.to_path_buf(),
            source,
        })
}

/// Draw possibly multi-line text; each `\n` starts a new line one text
/// height further down.
pub fn draw_lines(canvas: &mut RgbaImage, font: &Font<'_>, block: &TextBlock<'_>) {
    let scale = Scale::uniform(block.size);
    let line_height = (block.size * 1.1).round() as i32;

    for (i, line) in block.text.lines().enumerate() {
        draw_text_mut(
            canvas,
            block.color,
            block.x,
            block.y + i as i32 * line_height,
            scale,
            font,
            line,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_image(&dir.path().join("booth0.png"));
        assert!(matches!(result, Err(AssetError::NotFound { .. })));
    }

    #[test]
    fn test_load_image_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("end.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([9, 9, 9]))
            .save(&path)
            .unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_garbage_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(load_font(&path), Err(AssetError::FontError(_))));
    }

    #[test]
    fn test_load_fails_without_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.booth.working_dir = dir.path().to_path_buf();
        config.screen.font_path = dir.path().join("missing.ttf");
        assert!(Assets::load(&config).is_err());
    }
}
