//
// series.rs
// seriesnav
//
// Groups decoded instances into series and establishes the permanent frame order from composite sort keys.
//

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::frames::{extract_frames, FrameValueMode};
use crate::instance::{Frame, Instance};
use crate::metadata;
use crate::models::{SeriesMetadata, SeriesSummary};

/// Sentinel used for missing numeric ordering hints so they sort last.
const MISSING_ORDER_HINT: f64 = 1e12;

/// Composite ordering key for one frame: instance number, image index,
/// acquisition number, acquisition time in seconds, then the frame's index
/// within its owning instance as the tie-break.
type OrderKey = (f64, f64, f64, f64, usize);

/// A clinically grouped, ordered collection of frames sharing one series UID.
///
/// Frame order is load-bearing: it is fixed once by [`Aggregator::finish`]
/// and never re-sorted afterwards.
#[derive(Debug, Clone)]
pub struct Series {
    pub uid: String,
    pub metadata: SeriesMetadata,
    pub frames: Vec<Frame>,
    pub source_names: Vec<String>,
}

impl Series {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            uid: self.uid.clone(),
            patient_name: self.metadata.patient_name.clone(),
            patient_id: self.metadata.patient_id.clone(),
            study_description: self.metadata.study_description.clone(),
            series_description: self.metadata.series_description.clone(),
            modality: self.metadata.modality.clone(),
            frame_count: self.frames.len(),
            source_names: self.source_names.iter().take(5).cloned().collect(),
        }
    }
}

/// Accumulates instances one at a time and produces finalized series.
///
/// Per-instance failures are absorbed: an instance without a series UID is
/// skipped, and one whose frames cannot be extracted still contributes its
/// metadata. One malformed instance never aborts the batch.
#[derive(Debug, Default)]
pub struct Aggregator {
    mode: FrameValueMode,
    pending: BTreeMap<String, PendingSeries>,
}

#[derive(Debug)]
struct PendingSeries {
    metadata: SeriesMetadata,
    keyed_frames: Vec<(OrderKey, Frame)>,
    source_names: Vec<String>,
}

impl Aggregator {
    pub fn new(mode: FrameValueMode) -> Self {
        Self {
            mode,
            pending: BTreeMap::new(),
        }
    }

    pub fn absorb(&mut self, instance: &Instance) {
        let Some(meta) = metadata::extract(instance) else {
            warn!(entry = %instance.source_name, "instance has no series UID, skipping");
            return;
        };
        let uid = instance
            .series_uid
            .clone()
            .unwrap_or_default();

        // Descriptive metadata is snapshotted from the first instance seen
        // for this UID; later instances never overwrite it.
        let entry = self
            .pending
            .entry(uid)
            .or_insert_with(|| PendingSeries {
                metadata: meta,
                keyed_frames: Vec::new(),
                source_names: Vec::new(),
            });
        entry.source_names.push(instance.source_name.clone());

        let frames = extract_frames(instance, self.mode);
        let (a, b, c, d) = instance_order_key(instance);
        for (local_index, frame) in frames.into_iter().enumerate() {
            entry.keyed_frames.push(((a, b, c, d, local_index), frame));
        }
    }

    /// Sort every series' collected frames by composite key and discard the
    /// keys. The resulting order is permanent and independent of the order
    /// instances were absorbed in.
    pub fn finish(self) -> BTreeMap<String, Series> {
        let mut result = BTreeMap::new();
        for (uid, mut pending) in self.pending {
            pending
                .keyed_frames
                .sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let frames: Vec<Frame> = pending.keyed_frames.into_iter().map(|(_, f)| f).collect();
            debug!(series = %uid, frames = frames.len(), "series assembled");
            result.insert(
                uid.clone(),
                Series {
                    uid,
                    metadata: pending.metadata,
                    frames,
                    source_names: pending.source_names,
                },
            );
        }
        result
    }
}

/// Aggregate a batch of instances into finalized series keyed by UID.
pub fn aggregate<'a, I>(instances: I, mode: FrameValueMode) -> BTreeMap<String, Series>
where
    I: IntoIterator<Item = &'a Instance>,
{
    let mut aggregator = Aggregator::new(mode);
    for instance in instances {
        aggregator.absorb(instance);
    }
    aggregator.finish()
}

fn instance_order_key(instance: &Instance) -> (f64, f64, f64, f64) {
    (
        instance.instance_number.unwrap_or(MISSING_ORDER_HINT),
        instance.image_index.unwrap_or(MISSING_ORDER_HINT),
        instance.acquisition_number.unwrap_or(MISSING_ORDER_HINT),
        instance
            .acquisition_time
            .as_deref()
            .map(parse_acquisition_time)
            .unwrap_or(0.0),
    )
}

/// Parse an `HHMMSS[.ffffff]` time string into seconds since midnight.
/// A malformed value degrades to 0.0 as a whole rather than failing the
/// instance; a component that is merely absent reads as zero.
pub fn parse_acquisition_time(raw: &str) -> f64 {
    parse_time_components(raw.trim()).unwrap_or(0.0)
}

fn parse_time_components(raw: &str) -> Option<f64> {
    let hours = numeric_part(raw, 0, Some(2))?;
    let minutes = numeric_part(raw, 2, Some(4))?;
    let seconds = numeric_part(raw, 4, None)?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn numeric_part(raw: &str, start: usize, end: Option<usize>) -> Option<f64> {
    if raw.len() <= start {
        return Some(0.0);
    }
    let end = end.map_or(raw.len(), |e| e.min(raw.len()));
    raw.get(start..end)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn instance(uid: Option<&str>, number: Option<f64>, fill: f32) -> Instance {
        let payload =
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![fill; 4]).expect("shape matches data");
        Instance {
            source_name: format!("inst-{fill}.dcm"),
            series_uid: uid.map(|s| s.to_string()),
            patient_name: "Doe^Jane".into(),
            patient_id: "P1".into(),
            study_description: "Study".into(),
            series_description: "Axial".into(),
            modality: "CT".into(),
            photometric_interpretation: "MONOCHROME2".into(),
            instance_number: number,
            image_index: None,
            acquisition_number: None,
            acquisition_time: None,
            pixels: Some(payload),
        }
    }

    #[test]
    fn frames_sort_by_instance_number_regardless_of_feed_order() {
        let instances = vec![
            instance(Some("S1"), Some(3.0), 30.0),
            instance(Some("S1"), Some(1.0), 10.0),
            instance(Some("S1"), Some(2.0), 20.0),
        ];
        let forward = aggregate(&instances, FrameValueMode::Native);
        let series = &forward["S1"];
        assert_eq!(series.frame_count(), 3);
        let fills: Vec<f32> = series.frames.iter().map(|f| f[(0, 0)]).collect();
        assert_eq!(fills, vec![10.0, 20.0, 30.0]);

        let mut reversed = instances.clone();
        reversed.reverse();
        let backward = aggregate(&reversed, FrameValueMode::Native);
        let fills_rev: Vec<f32> = backward["S1"].frames.iter().map(|f| f[(0, 0)]).collect();
        assert_eq!(fills, fills_rev);
    }

    #[test]
    fn instances_without_uid_contribute_to_no_series() {
        let mut instances = vec![instance(None, Some(1.0), 1.0)];
        for n in 0..10 {
            instances.push(instance(Some("S1"), Some(n as f64), n as f32));
        }
        let series = aggregate(&instances, FrameValueMode::Native);
        assert_eq!(series.len(), 1);
        assert_eq!(series["S1"].frame_count(), 10);
    }

    #[test]
    fn missing_ordering_hints_sort_last() {
        let instances = vec![
            instance(Some("S1"), None, 99.0),
            instance(Some("S1"), Some(5.0), 5.0),
        ];
        let series = aggregate(&instances, FrameValueMode::Native);
        let fills: Vec<f32> = series["S1"].frames.iter().map(|f| f[(0, 0)]).collect();
        assert_eq!(fills, vec![5.0, 99.0]);
    }

    #[test]
    fn metadata_snapshot_comes_from_first_instance() {
        let mut first = instance(Some("S1"), Some(1.0), 1.0);
        first.series_description = "First".into();
        let mut second = instance(Some("S1"), Some(2.0), 2.0);
        second.series_description = "Second".into();

        let series = aggregate([&first, &second], FrameValueMode::Native);
        assert_eq!(series["S1"].metadata.series_description, "First");
    }

    #[test]
    fn instance_without_pixels_contributes_metadata_only() {
        let mut hollow = instance(Some("S2"), Some(1.0), 0.0);
        hollow.pixels = None;
        let series = aggregate([&hollow], FrameValueMode::Native);
        assert_eq!(series["S2"].frame_count(), 0);
        assert_eq!(series["S2"].metadata.patient_id, "P1");
    }

    #[test]
    fn acquisition_time_parsing_is_total() {
        assert_eq!(parse_acquisition_time("010203"), 3723.0);
        assert_eq!(parse_acquisition_time("010203.500000"), 3723.5);
        assert_eq!(parse_acquisition_time(""), 0.0);
        assert_eq!(parse_acquisition_time("garbage"), 0.0);
        assert_eq!(parse_acquisition_time("12"), 43200.0);
        // One bad component poisons the whole value, not just that field.
        assert_eq!(parse_acquisition_time("12xx34"), 0.0);
        assert_eq!(parse_acquisition_time("12x"), 0.0);
    }

    #[test]
    fn acquisition_time_breaks_ties_between_instances() {
        let mut early = instance(Some("S1"), None, 1.0);
        early.acquisition_time = Some("080000".into());
        let mut late = instance(Some("S1"), None, 2.0);
        late.acquisition_time = Some("090000".into());

        let series = aggregate([&late, &early], FrameValueMode::Native);
        let fills: Vec<f32> = series["S1"].frames.iter().map(|f| f[(0, 0)]).collect();
        assert_eq!(fills, vec![1.0, 2.0]);
    }
}
