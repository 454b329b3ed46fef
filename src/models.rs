//
// models.rs
// seriesnav
//
// Defines serializable data structures for series metadata and series listings returned by the CLI and the web API.
//

use serde::{Deserialize, Serialize};

/// Descriptive fields snapshotted from the first instance seen for a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub patient_name: String,
    pub patient_id: String,
    pub study_description: String,
    pub series_description: String,
    pub modality: String,
}

/// Lightweight series entry shown in selection lists and API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub uid: String,
    pub patient_name: String,
    pub patient_id: String,
    pub study_description: String,
    pub series_description: String,
    pub modality: String,
    pub frame_count: usize,
    pub source_names: Vec<String>,
}
