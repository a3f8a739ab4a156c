//! Screenshot capture
//!
//! Composites a camera frame with the rendered overlay layer and encodes the
//! result as PNG. The overlay layer is drawn in display space, so the video
//! frame is flipped first when the view is mirrored. A text watermark goes
//! on last.

use image::imageops::{self, FilterType};
use image::{ImageOutputFormat, Rgba, RgbaImage};
use rusttype::{point, Font, Point, Scale};
use std::fmt;
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CaptureConfig;
use crate::error::CaptureError;

/// Searched in order when no font is configured
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Watermark ink: white at half opacity
const INK: [u8; 3] = [255, 255, 255];
const INK_OPACITY: f32 = 0.5;

/// A finished screenshot
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// `sunglasses-tryon-<unix millis>.png`
pub fn screenshot_filename(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("sunglasses-tryon-{}.png", millis)
}

/// Wrap a raw RGBA8 buffer
pub fn from_raw_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbaImage, CaptureError> {
    let expected = width as usize * height as usize * 4;
    let actual = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or(CaptureError::FrameSize { expected, actual })
}

/// Decode an encoded image (PNG)
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, CaptureError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| CaptureError::Decode(e.to_string()))
}

/// Video frame (mirrored if requested) with the overlay layer stretched over it
pub fn compose(video: &RgbaImage, overlay: Option<&RgbaImage>, mirrored: bool) -> RgbaImage {
    let mut canvas = if mirrored {
        imageops::flip_horizontal(video)
    } else {
        video.clone()
    };

    if let Some(layer) = overlay {
        let (width, height) = canvas.dimensions();
        if layer.dimensions() == (width, height) {
            imageops::overlay(&mut canvas, layer, 0, 0);
        } else {
            let scaled = imageops::resize(layer, width, height, FilterType::Triangle);
            imageops::overlay(&mut canvas, &scaled, 0, 0);
        }
    }

    canvas
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Text stamped right-aligned into the bottom-right corner
pub struct Watermark {
    font: Font<'static>,
    text: String,
    scale: Scale,
    margin: u32,
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watermark")
            .field("text", &self.text)
            .field("size", &self.scale.y)
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}

impl Watermark {
    pub fn from_bytes(bytes: Vec<u8>, text: &str, size: f32, margin: u32) -> Result<Self, CaptureError> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| CaptureError::Font("not a TrueType or OpenType font".to_string()))?;

        Ok(Self {
            font,
            text: text.to_string(),
            scale: Scale::uniform(size),
            margin,
        })
    }

    /// `None` when the watermark is disabled or no system font could be found.
    /// A configured font that cannot be read is an error.
    pub fn from_config(config: &CaptureConfig) -> Result<Option<Self>, CaptureError> {
        if !config.watermark {
            return Ok(None);
        }

        let load = |bytes| Self::from_bytes(bytes, &config.watermark_text, config.font_size, config.margin);

        if let Some(ref path) = config.font_path {
            let bytes = std::fs::read(path)
                .map_err(|e| CaptureError::Font(format!("{}: {}", path.display(), e)))?;
            return load(bytes).map(Some);
        }

        for path in FONT_CANDIDATES {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            match load(bytes) {
                Ok(watermark) => {
                    tracing::debug!("Watermark font: {}", path);
                    return Ok(Some(watermark));
                }
                Err(e) => tracing::debug!("Skipping font {}: {}", path, e),
            }
        }

        tracing::warn!("No watermark font found, screenshots will not be watermarked");
        Ok(None)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Advance width of the laid-out text
    pub fn text_width(&self) -> f32 {
        self.font
            .layout(&self.text, self.scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    pub fn draw(&self, image: &mut RgbaImage) {
        let (width, height) = image.dimensions();
        let origin = text_origin(width, height, self.text_width(), self.margin);

        for glyph in self.font.layout(&self.text, self.scale, origin) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32;
                let y = bb.min.y + gy as i32;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    blend_ink(image.get_pixel_mut(x as u32, y as u32), coverage * INK_OPACITY);
                }
            });
        }
    }
}

/// Baseline start of right-aligned text ending `margin` px from the right and bottom edges
pub fn text_origin(width: u32, height: u32, text_width: f32, margin: u32) -> Point<f32> {
    point(
        width as f32 - margin as f32 - text_width,
        height as f32 - margin as f32,
    )
}

fn blend_ink(pixel: &mut Rgba<u8>, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    for (channel, ink) in pixel.0.iter_mut().zip(INK) {
        *channel = (*channel as f32 + (ink as f32 - *channel as f32) * alpha).round() as u8;
    }
    let a = pixel.0[3] as f32;
    pixel.0[3] = (a + (255.0 - a) * alpha).round() as u8;
}

/// Take a screenshot. Refused when no face is currently detected.
pub fn capture(
    face_detected: bool,
    video: &RgbaImage,
    overlay: Option<&RgbaImage>,
    mirrored: bool,
    watermark: Option<&Watermark>,
    at: SystemTime,
) -> Result<Screenshot, CaptureError> {
    if !face_detected {
        return Err(CaptureError::NoFace);
    }

    let mut composed = compose(video, overlay, mirrored);
    if let Some(watermark) = watermark {
        watermark.draw(&mut composed);
    }
    let png = encode_png(&composed)?;

    Ok(Screenshot {
        filename: screenshot_filename(at),
        width: composed.width(),
        height: composed.height(),
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn two_tone(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_filename() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(screenshot_filename(at), "sunglasses-tryon-1700000000123.png");
    }

    #[test]
    fn test_mirror_flips_video() {
        let out = compose(&two_tone(4, 2), None, true);
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(3, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_overlay_drawn_on_top() {
        let mut layer = RgbaImage::new(4, 2);
        layer.put_pixel(1, 1, Rgba([0, 255, 0, 255]));

        let out = compose(&two_tone(4, 2), Some(&layer), false);
        assert_eq!(out.get_pixel(1, 1), &Rgba([0, 255, 0, 255]));
        // Transparent overlay pixels leave the video untouched
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_overlay_resized_to_video() {
        let layer = RgbaImage::from_pixel(2, 1, Rgba([0, 255, 0, 255]));
        let out = compose(&two_tone(8, 4), Some(&layer), false);
        assert_eq!(out.dimensions(), (8, 4));
        assert_eq!(out.get_pixel(4, 2), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_capture_requires_face() {
        let err = capture(false, &two_tone(4, 2), None, true, None, SystemTime::now()).unwrap_err();
        assert_eq!(err, CaptureError::NoFace);
    }

    #[test]
    fn test_capture_png_decodes() {
        let shot = capture(true, &two_tone(4, 2), None, false, None, SystemTime::now()).unwrap();
        assert!(shot.filename.starts_with("sunglasses-tryon-"));
        let back = decode(&shot.png).unwrap();
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(back.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_raw_size_mismatch() {
        let err = from_raw_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, CaptureError::FrameSize { expected: 16, actual: 15 });
    }

    #[test]
    fn test_text_origin_bottom_right() {
        let origin = text_origin(640, 480, 100.0, 20);
        assert_eq!((origin.x, origin.y), (520.0, 460.0));
    }

    #[test]
    fn test_ink_blends_at_half_opacity() {
        let mut pixel = Rgba([0, 0, 0, 255]);
        blend_ink(&mut pixel, INK_OPACITY);
        assert_eq!(pixel, Rgba([128, 128, 128, 255]));

        let mut clear = Rgba([10, 20, 30, 255]);
        blend_ink(&mut clear, 0.0);
        assert_eq!(clear, Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_invalid_font_rejected() {
        let err = Watermark::from_bytes(vec![0; 64], "Virtual Try-On", 16.0, 20).unwrap_err();
        assert!(matches!(err, CaptureError::Font(_)));
    }

    #[test]
    fn test_watermark_config() {
        let disabled = CaptureConfig {
            watermark: false,
            ..Default::default()
        };
        assert!(Watermark::from_config(&disabled).unwrap().is_none());

        let missing = CaptureConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..Default::default()
        };
        assert!(matches!(
            Watermark::from_config(&missing),
            Err(CaptureError::Font(_))
        ));
    }

    #[test]
    fn test_watermark_drawn_in_corner() {
        // Needs a system font; nothing to check without one
        let Some(watermark) = Watermark::from_config(&CaptureConfig::default()).unwrap() else {
            return;
        };
        assert_eq!(watermark.text(), "Virtual Try-On");
        assert!(watermark.text_width() > 0.0);

        let black = RgbaImage::from_pixel(320, 120, Rgba([0, 0, 0, 255]));
        let mut stamped = black.clone();
        watermark.draw(&mut stamped);

        let changed: Vec<_> = stamped
            .enumerate_pixels()
            .filter(|(x, y, p)| *p != black.get_pixel(*x, *y))
            .collect();
        assert!(!changed.is_empty());
        for (x, y, p) in changed {
            assert!(x >= 160 && x < 302, "ink at x={}", x);
            assert!(y >= 60, "ink at y={}", y);
            assert!(p.0[0] <= 128 && p.0[3] == 255);
        }
    }
}
