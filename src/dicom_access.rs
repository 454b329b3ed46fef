use dicom::core::Tag;
use dicom::object::DefaultDicomObject;

/// Small helper trait to pull loosely-typed values out of a DICOM object
/// without propagating per-element errors; a missing or malformed element
/// simply reads as `None`.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_f64(&self, tag: Tag) -> Option<f64>;
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        self.element(tag).ok().and_then(|e| e.to_float64().ok())
    }
}
