//
// decode.rs
// seriesnav
//
// Parses raw archive entries as DICOM and decodes pixel data into numeric ndarray payloads shaped for frame splitting.
//

use std::io::Cursor;

use dicom::core::Tag;
use dicom::object::file::ReadPreamble;
use dicom::object::{DefaultDicomObject, OpenFileOptions};
use dicom::pixeldata::PixelDecoder;
use dicom_pixeldata::{DecodedPixelData, PixelRepresentation};
use ndarray::{ArrayD, Axis};
use tracing::{debug, warn};

use crate::dicom_access::ElementAccess;
use crate::instance::Instance;

/// Attempt to decode one archive entry as a DICOM instance.
///
/// Returns `None` when the bytes are not parseable as DICOM at all; such
/// entries are skipped without error. A parseable dataset whose pixel data
/// cannot be decoded still yields an instance, just with no payload, so its
/// metadata can contribute to series grouping.
pub fn decode_instance(name: &str, bytes: &[u8]) -> Option<Instance> {
    let obj: DefaultDicomObject = OpenFileOptions::new()
        .read_preamble(ReadPreamble::Auto)
        .from_reader(Cursor::new(bytes))
        .ok()?;

    let pixels = match decode_payload(&obj) {
        Some(arr) => Some(arr),
        None => {
            debug!(entry = name, "no decodable pixel data");
            None
        }
    };

    Some(Instance {
        source_name: name.to_string(),
        series_uid: obj
            .element_str(Tag(0x0020, 0x000E))
            .filter(|uid| !uid.is_empty()),
        patient_name: obj.element_str(Tag(0x0010, 0x0010)).unwrap_or_default(),
        patient_id: obj.element_str(Tag(0x0010, 0x0020)).unwrap_or_default(),
        study_description: obj.element_str(Tag(0x0008, 0x1030)).unwrap_or_default(),
        series_description: obj.element_str(Tag(0x0008, 0x103E)).unwrap_or_default(),
        modality: obj.element_str(Tag(0x0008, 0x0060)).unwrap_or_default(),
        photometric_interpretation: obj.element_str(Tag(0x0028, 0x0004)).unwrap_or_default(),
        instance_number: obj.element_f64(Tag(0x0020, 0x0013)),
        image_index: obj.element_f64(Tag(0x0054, 0x1330)),
        acquisition_number: obj.element_f64(Tag(0x0020, 0x0012)),
        acquisition_time: obj.element_str(Tag(0x0008, 0x0032)),
        pixels,
    })
}

/// Decode pixel data and convert it to `f32`, picking the intermediate
/// integer type from Bits Allocated and Pixel Representation.
fn decode_payload(obj: &DefaultDicomObject) -> Option<ArrayD<f32>> {
    let decoded = match obj.decode_pixel_data() {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "pixel data decoding failed");
            return None;
        }
    };
    let arr = to_f32_array(&decoded)?;
    Some(squeeze_payload(arr))
}

fn to_f32_array(decoded: &DecodedPixelData<'_>) -> Option<ArrayD<f32>> {
    let bits_allocated = decoded.bits_allocated();
    let arr = if decoded.pixel_representation() == PixelRepresentation::Unsigned {
        if bits_allocated <= 8 {
            decoded.to_ndarray::<u8>().ok()?.mapv(|v| v as f32)
        } else if bits_allocated <= 16 {
            decoded.to_ndarray::<u16>().ok()?.mapv(|v| v as f32)
        } else {
            decoded.to_ndarray::<u32>().ok()?.mapv(|v| v as f32)
        }
    } else if bits_allocated <= 8 {
        decoded.to_ndarray::<i8>().ok()?.mapv(|v| v as f32)
    } else if bits_allocated <= 16 {
        decoded.to_ndarray::<i16>().ok()?.mapv(|v| v as f32)
    } else {
        decoded.to_ndarray::<i32>().ok()?.mapv(|v| v as f32)
    };
    Some(arr.into_dyn())
}

/// The decoder yields `[frames, rows, cols, samples]`. The frame extractor's
/// dimensionality rules are defined over pydicom-style shapes, so a samples
/// axis of 1 and a frames axis of 1 are both squeezed; a 3-sample (RGB)
/// axis is kept.
fn squeeze_payload(mut arr: ArrayD<f32>) -> ArrayD<f32> {
    if arr.ndim() == 4 && arr.shape()[3] == 1 {
        arr = arr.index_axis_move(Axis(3), 0);
    }
    if arr.ndim() >= 3 && arr.shape()[0] == 1 {
        arr = arr.index_axis_move(Axis(0), 0);
    }
    arr
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn dyn_array(shape: &[usize]) -> ArrayD<f32> {
        ArrayD::zeros(ndarray::IxDyn(shape))
    }

    #[test]
    fn squeeze_drops_singleton_sample_and_frame_axes() {
        let arr = squeeze_payload(dyn_array(&[1, 16, 16, 1]));
        assert_eq!(arr.shape(), &[16, 16]);

        let arr = squeeze_payload(dyn_array(&[7, 16, 16, 1]));
        assert_eq!(arr.shape(), &[7, 16, 16]);
    }

    #[test]
    fn squeeze_keeps_rgb_sample_axis() {
        let arr = squeeze_payload(dyn_array(&[1, 16, 16, 3]));
        assert_eq!(arr.shape(), &[16, 16, 3]);
    }

    #[test]
    fn undecodable_bytes_are_skipped() {
        assert!(decode_instance("junk.bin", b"definitely not dicom").is_none());
    }
}
