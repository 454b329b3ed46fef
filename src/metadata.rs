//
// metadata.rs
// seriesnav
//
// Extracts series-level descriptive metadata from a decoded instance, including person-name formatting.
//

use crate::instance::Instance;
use crate::models::SeriesMetadata;

/// Extract the descriptive metadata record for an instance.
///
/// Returns `None` when the instance carries no usable Series Instance UID;
/// such instances are excluded from every series, silently. All other fields
/// fall back to an empty string.
pub fn extract(instance: &Instance) -> Option<SeriesMetadata> {
    instance.series_uid.as_ref()?;
    Some(SeriesMetadata {
        patient_name: format_person_name(&instance.patient_name),
        patient_id: instance.patient_id.clone(),
        study_description: instance.study_description.clone(),
        series_description: instance.series_description.clone(),
        modality: instance.modality.clone(),
    })
}

/// Render a DICOM PN value for display.
///
/// The structured form is `Family^Given^Middle^Prefix^Suffix`; components are
/// reassembled in reading order. Anything that does not look structured is
/// returned with the delimiters collapsed to spaces, so formatting can never
/// fail.
pub fn format_person_name(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.contains('^') {
        return raw.to_string();
    }

    let mut components = raw.split('^');
    let family = components.next().unwrap_or_default().trim();
    let given = components.next().unwrap_or_default().trim();
    let middle = components.next().unwrap_or_default().trim();
    let prefix = components.next().unwrap_or_default().trim();
    let suffix = components.next().unwrap_or_default().trim();

    let ordered = [prefix, given, middle, family, suffix];
    let formatted = ordered
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    if formatted.is_empty() {
        // Degenerate values like "^^" fall back to the de-delimited literal.
        raw.replace('^', " ").trim().to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn bare_instance(series_uid: Option<&str>) -> Instance {
        Instance {
            source_name: "a.dcm".into(),
            series_uid: series_uid.map(|s| s.to_string()),
            patient_name: "Doe^Jane".into(),
            patient_id: "P1".into(),
            study_description: "Head".into(),
            series_description: "Axial".into(),
            modality: "CT".into(),
            photometric_interpretation: "MONOCHROME2".into(),
            instance_number: None,
            image_index: None,
            acquisition_number: None,
            acquisition_time: None,
            pixels: None,
        }
    }

    #[test]
    fn missing_series_uid_yields_no_metadata() {
        assert!(extract(&bare_instance(None)).is_none());
        let meta = extract(&bare_instance(Some("1.2.3"))).expect("metadata");
        assert_eq!(meta.patient_name, "Jane Doe");
        assert_eq!(meta.modality, "CT");
    }

    #[test]
    fn person_name_components_are_reordered() {
        assert_eq!(format_person_name("Doe^Jane^Q"), "Jane Q Doe");
        assert_eq!(format_person_name("Doe^Jane^Q^Dr^Jr"), "Dr Jane Q Doe Jr");
    }

    #[test]
    fn unstructured_names_pass_through() {
        assert_eq!(format_person_name("Jane Doe"), "Jane Doe");
        assert_eq!(format_person_name(""), "");
    }

    #[test]
    fn degenerate_delimiters_never_fail() {
        assert_eq!(format_person_name("^^"), "");
        assert_eq!(format_person_name("^Jane^"), "Jane");
    }
}
