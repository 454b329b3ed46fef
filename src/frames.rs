//
// frames.rs
// seriesnav
//
// Splits a decoded pixel payload into ordered 2-D frames, handling MONOCHROME1 inversion and N-D reshaping.
//

use ndarray::{ArrayD, Axis, Ix2};

use crate::instance::{Frame, Instance};

/// Selects the value range frames are returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameValueMode {
    /// Frames keep their native numeric range; windowing happens later.
    #[default]
    Native,
    /// Each frame is min-max stretched to 0-255 at extraction time, for
    /// callers that will not apply window/level afterwards.
    AutoNormalized,
}

/// Extract the ordered 2-D frames of an instance's payload.
///
/// An instance without pixel data yields an empty list. MONOCHROME1 payloads
/// are inverted against the global maximum of the whole payload before
/// splitting, converting them to standard polarity.
pub fn extract_frames(instance: &Instance, mode: FrameValueMode) -> Vec<Frame> {
    let Some(payload) = instance.pixels.as_ref() else {
        return Vec::new();
    };
    let mut payload = payload.clone();

    if instance.photometric_interpretation == "MONOCHROME1" {
        payload = invert_against_global_max(payload);
    }

    let frames = split_into_frames(payload);
    match mode {
        FrameValueMode::Native => frames,
        FrameValueMode::AutoNormalized => frames.into_iter().map(stretch_to_u8_range).collect(),
    }
}

fn invert_against_global_max(payload: ArrayD<f32>) -> ArrayD<f32> {
    let global_max = payload.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if global_max.is_finite() {
        payload.mapv(|v| global_max - v)
    } else {
        payload
    }
}

/// Dimensionality policy: 2-D is a single frame; 3-D splits along the
/// leading axis (assumed to index frames/slices); higher ranks collapse all
/// leading axes except the final two into one flat frame axis first.
///
/// The leading-axis assumption is a heuristic carried over for compatibility
/// and may misorder true volumetric encodings.
fn split_into_frames(payload: ArrayD<f32>) -> Vec<Frame> {
    let ndim = payload.ndim();
    match ndim {
        0 | 1 => Vec::new(),
        2 => payload
            .into_dimensionality::<Ix2>()
            .map(|frame| vec![frame])
            .unwrap_or_default(),
        3 => payload
            .axis_iter(Axis(0))
            .filter_map(|slice| slice.to_owned().into_dimensionality::<Ix2>().ok())
            .collect(),
        _ => {
            let shape = payload.shape().to_vec();
            let (rows, cols) = (shape[ndim - 2], shape[ndim - 1]);
            let lead: usize = shape[..ndim - 2].iter().product();
            let flat = payload.as_standard_layout().to_owned();
            match flat.into_shape((lead, rows, cols)) {
                Ok(stack) => stack.axis_iter(Axis(0)).map(|s| s.to_owned()).collect(),
                Err(_) => Vec::new(),
            }
        }
    }
}

fn stretch_to_u8_range(frame: Frame) -> Frame {
    let min = frame.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = frame.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    if !min.is_finite() || max <= min {
        return frame.mapv(|_| 0.0);
    }
    frame.mapv(|v| ((v - min) / (max - min) * 255.0).floor())
}
