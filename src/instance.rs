//
// instance.rs
// seriesnav
//
// In-memory representation of one decoded DICOM instance: identifiers, ordering hints, and the raw pixel payload.
//

use ndarray::{Array2, ArrayD};

/// One 2-D numeric image array, the unit of display and caching.
pub type Frame = Array2<f32>;

/// One decoded source payload. Constructed once by the decoder and read-only
/// afterwards; its metadata and frames are absorbed into a `Series` during
/// aggregation.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the entry inside the source archive this instance came from.
    pub source_name: String,
    pub series_uid: Option<String>,
    pub patient_name: String,
    pub patient_id: String,
    pub study_description: String,
    pub series_description: String,
    pub modality: String,
    pub photometric_interpretation: String,
    /// Ordering hints; any of them may be absent from the source dataset.
    pub instance_number: Option<f64>,
    pub image_index: Option<f64>,
    pub acquisition_number: Option<f64>,
    /// `HHMMSS[.ffffff]` string, kept verbatim until sort-key computation.
    pub acquisition_time: Option<String>,
    /// Raw numeric pixel payload in its native value range, shaped like
    /// pydicom's `pixel_array`: 2-D for a single monochrome frame, 3-D for
    /// multi-frame or RGB, higher for exotic encodings. `None` when the
    /// dataset carries no decodable pixel data.
    pub pixels: Option<ArrayD<f32>>,
}
