//
// window.rs
// seriesnav
//
// Maps numeric frames into 8-bit display buffers under window/level settings, plus the orthogonal zoom/resize stage.
//

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::Array2;

use crate::instance::Frame;

/// Windowing strategy selected per render call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NormalizationMode {
    /// Clip range taken from the frame's own observed minimum and maximum.
    #[default]
    AutoWindow,
    /// Explicit window width/level pair.
    Explicit { width: f32, level: f32 },
    /// No rescaling; values are clamped into 0-255 as-is. Intended for
    /// frames that were already normalized at extraction time.
    RawPassthrough,
}

impl NormalizationMode {
    pub fn from_window(window: Option<(f32, f32)>) -> Self {
        match window {
            Some((width, level)) => NormalizationMode::Explicit { width, level },
            None => NormalizationMode::AutoWindow,
        }
    }

    pub fn apply(&self, frame: &Frame) -> Array2<u8> {
        match self {
            NormalizationMode::AutoWindow => normalize(frame, None, None),
            NormalizationMode::Explicit { width, level } => {
                normalize(frame, Some(*width), Some(*level))
            }
            NormalizationMode::RawPassthrough => frame.mapv(|v| v.clamp(0.0, 255.0) as u8),
        }
    }
}

/// Window a frame into an 8-bit buffer.
///
/// With both parameters present the clip range is
/// `[level - width/2, level + width/2]`; otherwise the frame's own min/max
/// is used. Values are clipped into range and linearly rescaled to 0-255.
/// A zero-width range degrades to a shift by the lower bound instead of a
/// division. Pure: identical inputs always produce identical output.
pub fn normalize(frame: &Frame, width: Option<f32>, level: Option<f32>) -> Array2<u8> {
    let (low, high) = match (width, level) {
        (Some(ww), Some(wl)) => (wl - ww / 2.0, wl + ww / 2.0),
        _ => observed_range(frame),
    };
    // A negative window width arrives here unchecked from the API; reorder
    // the bounds instead of handing `clamp` an inverted range.
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    let range = high - low;

    frame.mapv(|v| {
        let clipped = v.clamp(low, high);
        let scaled = if range > 0.0 {
            (clipped - low) / range
        } else {
            clipped - low
        };
        (scaled * 255.0).clamp(0.0, 255.0) as u8
    })
}

fn observed_range(frame: &Frame) -> (f32, f32) {
    let min = frame.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = frame.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 0.0)
    }
}

/// Wrap an 8-bit buffer as a grayscale image for encoding or resizing.
pub fn to_gray_image(buffer: &Array2<u8>) -> GrayImage {
    let (rows, cols) = buffer.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([buffer[(y as usize, x as usize)]])
    })
}

/// Resampling quality for the resize stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeQuality {
    /// Nearest-neighbor, for interactive feedback.
    Fast,
    /// Triangle filtering, for the final image.
    Smooth,
}

/// Spatially resample an image for display: apply the zoom factor, then cap
/// the larger dimension at `max_dimension` preserving aspect ratio. Pixel
/// values are never altered, only sampling.
pub fn resize_for_display(
    image: &GrayImage,
    zoom_percent: u32,
    max_dimension: u32,
    quality: ResizeQuality,
) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let zoom = zoom_percent.max(1) as f64 / 100.0;
    let mut target_w = (width as f64 * zoom).round().max(1.0);
    let mut target_h = (height as f64 * zoom).round().max(1.0);

    let largest = target_w.max(target_h);
    if max_dimension > 0 && largest > max_dimension as f64 {
        let shrink = max_dimension as f64 / largest;
        target_w = (target_w * shrink).round().max(1.0);
        target_h = (target_h * shrink).round().max(1.0);
    }

    if target_w as u32 == width && target_h as u32 == height {
        return image.clone();
    }

    let filter = match quality {
        ResizeQuality::Fast => FilterType::Nearest,
        ResizeQuality::Smooth => FilterType::Triangle,
    };
    imageops::resize(image, target_w as u32, target_h as u32, filter)
}
