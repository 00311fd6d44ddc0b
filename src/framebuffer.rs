// Linux framebuffer output shared by the screen renderer and the camera preview.

use image::RgbaImage;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::errors::DisplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb565,
    Bgr888,
    Bgra8888,
}

impl PixelFormat {
    pub fn from_bits(bits: u32) -> Result<Self, DisplayError> {
        match bits {
            16 => Ok(PixelFormat::Rgb565),
            24 => Ok(PixelFormat::Bgr888),
            32 => Ok(PixelFormat::Bgra8888),
            bits => Err(DisplayError::UnsupportedDepth { bits }),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Bgr888 => 3,
            PixelFormat::Bgra8888 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
}

pub struct Framebuffer {
    device: String,
    info: FramebufferInfo,
    file: Mutex<File>,
}

impl Framebuffer {
    pub fn open(device: &str) -> Result<Self, DisplayError> {
        let info = read_info(device)?;
        info!(
            "Opening framebuffer {} ({}x{}, {:?}, stride {})",
            device, info.width, info.height, info.format, info.stride
        );

        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|source| DisplayError::FramebufferOpen {
                device: device.to_string(),
                source,
            })?;

        Ok(Framebuffer {
            device: device.to_string(),
            info,
            file: Mutex::new(file),
        })
    }

    pub fn info(&self) -> FramebufferInfo {
        self.info
    }

    /// Write an image at the top-left corner, clipped to the visible area.
    pub fn present(&self, image: &RgbaImage) -> Result<(), DisplayError> {
        let rows = encode_rows(image, &self.info);
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (y, row) in rows.iter().enumerate() {
            file.seek(SeekFrom::Start((y * self.info.stride) as u64))?;
            file.write_all(row)?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), DisplayError> {
        debug!("Clearing framebuffer {}", self.device);
        let black = RgbaImage::from_pixel(
            self.info.width,
            self.info.height,
            image::Rgba([0, 0, 0, 255]),
        );
        self.present(&black)
    }
}

fn read_info(device: &str) -> Result<FramebufferInfo, DisplayError> {
    let name = Path::new(device)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("fb0");
    let sys = Path::new("/sys/class/graphics").join(name);

    let attribute = |attr: &str| -> Result<String, DisplayError> {
        std::fs::read_to_string(sys.join(attr))
            .map(|s| s.trim().to_string())
            .map_err(|e| DisplayError::Attribute {
                attribute: attr.to_string(),
                details: e.to_string(),
            })
    };

    let parse = |attr: &str, value: &str| -> Result<u32, DisplayError> {
        value.parse().map_err(|_| DisplayError::Attribute {
            attribute: attr.to_string(),
            details: format!("not a number: {:?}", value),
        })
    };

    let size = attribute("virtual_size")?;
    let (w, h) = size.split_once(',').ok_or_else(|| DisplayError::Attribute {
        attribute: "virtual_size".to_string(),
        details: format!("unexpected format: {:?}", size),
    })?;
    let width = parse("virtual_size", w)?;
    let height = parse("virtual_size", h)?;
    let format = PixelFormat::from_bits(parse("bits_per_pixel", &attribute("bits_per_pixel")?)?)?;
    let stride = parse("stride", &attribute("stride")?)? as usize;

    Ok(FramebufferInfo {
        width,
        height,
        stride,
        format,
    })
}

/// Convert an RGBA image into framebuffer rows, clipped to the screen.
pub fn encode_rows(image: &RgbaImage, info: &FramebufferInfo) -> Vec<Vec<u8>> {
    let width = image.width().min(info.width);
    let height = image.height().min(info.height);
    let bpp = info.format.bytes_per_pixel();

    (0..height)
        .map(|y| {
            let mut row = Vec::with_capacity(width as usize * bpp);
            for x in 0..width {
                let [r, g, b, _] = image.get_pixel(x, y).0;
                match info.format {
                    PixelFormat::Rgb565 => {
                        let rgb565 =
                            (((r as u16) >> 3) << 11) | (((g as u16) >> 2) << 5) | ((b as u16) >> 3);
                        row.extend_from_slice(&rgb565.to_le_bytes());
                    }
                    PixelFormat::Bgr888 => row.extend_from_slice(&[b, g, r]),
                    PixelFormat::Bgra8888 => row.extend_from_slice(&[b, g, r, 255]),
                }
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn info(format: PixelFormat) -> FramebufferInfo {
        FramebufferInfo {
            width: 4,
            height: 2,
            stride: 4 * format.bytes_per_pixel(),
            format,
        }
    }

    #[test]
    fn test_rgb565_encoding() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let rows = encode_rows(&image, &info(PixelFormat::Rgb565));
        assert_eq!(rows, vec![vec![0x00, 0xF8]]);

        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255]));
        let rows = encode_rows(&image, &info(PixelFormat::Rgb565));
        assert_eq!(rows, vec![vec![0xE0, 0x07]]);
    }

    #[test]
    fn test_bgra_encoding() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 0]));
        let rows = encode_rows(&image, &info(PixelFormat::Bgra8888));
        assert_eq!(rows, vec![vec![30, 20, 10, 255]]);
    }

    #[test]
    fn test_clipping_to_screen() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let rows = encode_rows(&image, &info(PixelFormat::Bgr888));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 4 * 3));
    }

    #[test]
    fn test_unsupported_depth() {
        assert!(matches!(
            PixelFormat::from_bits(8),
            Err(DisplayError::UnsupportedDepth { bits: 8 })
        ));
    }
}
