//
// render.rs
// seriesnav
//
// Render requests, the bounded memoizing cache, two-speed rendering, neighbor prefetch, and frame sub-sampling.
//

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use image::GrayImage;
use rayon::prelude::*;
use tracing::debug;

use crate::series::Series;
use crate::window::{self, NormalizationMode, ResizeQuality};

/// Which rendering path produced (or should produce) a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTier {
    /// Cheap min-max stretch and nearest-neighbor resize, for slider drags.
    Instant,
    /// Full windowing and smooth resampling.
    Final,
}

/// A render request, evaluated on demand and used by value as the cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub series_uid: String,
    pub frame_index: usize,
    /// `(width, level)`; `None` selects auto-windowing from the frame range.
    pub window: Option<(f32, f32)>,
    pub zoom_percent: u32,
    pub max_dimension: u32,
    pub tier: RenderTier,
}

impl RenderRequest {
    fn key(&self) -> RenderKey {
        RenderKey {
            series_uid: self.series_uid.clone(),
            frame_index: self.frame_index,
            // Float parameters are keyed by bit pattern so equality is exact.
            window_bits: self.window.map(|(w, l)| (w.to_bits(), l.to_bits())),
            zoom_percent: self.zoom_percent,
            max_dimension: self.max_dimension,
            tier: self.tier,
        }
    }

    fn with_tier(&self, tier: RenderTier) -> RenderRequest {
        RenderRequest {
            tier,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RenderKey {
    series_uid: String,
    frame_index: usize,
    window_bits: Option<(u32, u32)>,
    zoom_percent: u32,
    max_dimension: u32,
    tier: RenderTier,
}

/// A ready-to-display 8-bit buffer plus the request that produced it.
#[derive(Debug)]
pub struct RenderedView {
    pub request: RenderRequest,
    pub image: GrayImage,
}

impl RenderedView {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Instant views are deliberately coarse; their resolution is capped below
/// whatever the request asked for.
const INSTANT_MAX_DIMENSION: u32 = 256;

const FINAL_CACHE_CAPACITY: usize = 256;
const INSTANT_CACHE_CAPACITY: usize = 64;

/// Bounded memoizing cache for rendered views, one shard per tier.
///
/// Inserts are insert-if-absent: concurrent identical requests may both
/// compute the value, but the first writer wins and nothing is lost. Eviction
/// is FIFO at a fixed capacity; there is no time-based expiry.
pub struct RenderCache {
    final_shard: Mutex<CacheShard>,
    instant_shard: Mutex<CacheShard>,
}

struct CacheShard {
    entries: HashMap<RenderKey, Arc<RenderedView>>,
    order: VecDeque<RenderKey>,
    capacity: usize,
}

impl CacheShard {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &RenderKey) -> Option<Arc<RenderedView>> {
        self.entries.get(key).cloned()
    }

    fn insert_if_absent(&mut self, key: RenderKey, view: Arc<RenderedView>) -> Arc<RenderedView> {
        if let Some(existing) = self.entries.get(&key) {
            return existing.clone();
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(key.clone(), view.clone());
        self.order.push_back(key);
        view
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self {
            final_shard: Mutex::new(CacheShard::new(FINAL_CACHE_CAPACITY)),
            instant_shard: Mutex::new(CacheShard::new(INSTANT_CACHE_CAPACITY)),
        }
    }

    fn shard(&self, tier: RenderTier) -> &Mutex<CacheShard> {
        match tier {
            RenderTier::Final => &self.final_shard,
            RenderTier::Instant => &self.instant_shard,
        }
    }

    fn lookup(&self, request: &RenderRequest) -> Option<Arc<RenderedView>> {
        // A finished final view supersedes the instant one for the same
        // request, so probe the final shard regardless of the asked tier.
        let final_key = request.with_tier(RenderTier::Final).key();
        if let Ok(shard) = self.shard(RenderTier::Final).lock() {
            if let Some(view) = shard.get(&final_key) {
                return Some(view);
            }
        }
        if request.tier == RenderTier::Instant {
            if let Ok(shard) = self.shard(RenderTier::Instant).lock() {
                return shard.get(&request.key());
            }
        }
        None
    }

    fn store(&self, request: &RenderRequest, view: RenderedView) -> Arc<RenderedView> {
        match self.shard(request.tier).lock() {
            Ok(mut shard) => shard.insert_if_absent(request.key(), Arc::new(view)),
            // A poisoned shard only costs memoization, never correctness.
            Err(_) => Arc::new(view),
        }
    }

    #[cfg(test)]
    fn len(&self, tier: RenderTier) -> usize {
        self.shard(tier).lock().map(|s| s.entries.len()).unwrap_or(0)
    }
}

/// Renders frames of finalized series through the cache.
pub struct Renderer {
    cache: RenderCache,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            cache: RenderCache::new(),
        }
    }

    /// Produce the view for a request, serving from cache when possible.
    /// Returns `None` when the frame index is out of range.
    pub fn render(&self, series: &Series, request: &RenderRequest) -> Option<Arc<RenderedView>> {
        if request.frame_index >= series.frames.len() {
            return None;
        }
        if let Some(cached) = self.cache.lookup(request) {
            return Some(cached);
        }

        let frame = &series.frames[request.frame_index];
        let image = match request.tier {
            RenderTier::Instant => {
                // Unwindowed min-max stretch at reduced resolution.
                let stretched = window::normalize(frame, None, None);
                window::resize_for_display(
                    &window::to_gray_image(&stretched),
                    request.zoom_percent,
                    request.max_dimension.min(INSTANT_MAX_DIMENSION),
                    ResizeQuality::Fast,
                )
            }
            RenderTier::Final => {
                let windowed = NormalizationMode::from_window(request.window).apply(frame);
                window::resize_for_display(
                    &window::to_gray_image(&windowed),
                    request.zoom_percent,
                    request.max_dimension,
                    ResizeQuality::Smooth,
                )
            }
        };

        debug!(
            series = %request.series_uid,
            frame = request.frame_index,
            tier = ?request.tier,
            "rendered view"
        );
        Some(self.cache.store(
            request,
            RenderedView {
                request: request.clone(),
                image,
            },
        ))
    }

    /// Render a bounded window of adjacent frames ahead of request so
    /// scrolling stays responsive. Work is capped by the radius.
    pub fn prefetch_neighbors(&self, series: &Series, request: &RenderRequest, radius: usize) {
        if series.frames.is_empty() {
            return;
        }
        let center = request.frame_index;
        let lo = center.saturating_sub(radius);
        let hi = (center + radius).min(series.frames.len() - 1);

        let indices: Vec<usize> = (lo..=hi).filter(|&i| i != center).collect();
        indices.par_iter().for_each(|&index| {
            let neighbor = RenderRequest {
                frame_index: index,
                ..request.clone()
            };
            self.render(series, &neighbor);
        });
    }
}

/// Uniform sub-sample of frame indices for oversized series.
///
/// Returns exactly `min(total, max_sampled)` evenly spaced indices, always
/// starting at 0 and always including the last frame.
pub fn sample_indices(total: usize, max_sampled: usize) -> Vec<usize> {
    if total == 0 || max_sampled == 0 {
        return Vec::new();
    }
    if total <= max_sampled {
        return (0..total).collect();
    }
    if max_sampled == 1 {
        return vec![total - 1];
    }
    (0..max_sampled)
        .map(|i| ((i * (total - 1)) as f64 / (max_sampled - 1) as f64).round() as usize)
        .collect()
}

/// Back-compute the 1-based true frame number for a sampled index, so
/// user-facing numbering stays meaningful relative to the full series.
pub fn actual_frame_number(sampled_index: usize, total: usize, sampled_count: usize) -> usize {
    if total == 0 {
        return 0;
    }
    if sampled_count <= 1 {
        return 1;
    }
    let position = (sampled_index * (total - 1)) as f64 / (sampled_count - 1) as f64;
    position.round() as usize + 1
}

/// Progressive alternative to sub-sampling: only a bounded contiguous range
/// of frame indices around the current position is materialized. Navigating
/// outside the range recenters it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWindow {
    total: usize,
    capacity: usize,
    start: usize,
}

impl FrameWindow {
    pub fn new(total: usize, capacity: usize) -> Self {
        let mut window = Self {
            total,
            capacity: capacity.max(1),
            start: 0,
        };
        window.recenter(0);
        window
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }

    fn end(&self) -> usize {
        (self.start + self.capacity).min(self.total)
    }

    /// Ensure `index` is materialized, recentering the range around it when
    /// it falls outside. Returns true when the range moved.
    pub fn navigate_to(&mut self, index: usize) -> bool {
        if self.contains(index) {
            return false;
        }
        self.recenter(index);
        true
    }

    fn recenter(&mut self, index: usize) {
        let half = self.capacity / 2;
        let max_start = self.total.saturating_sub(self.capacity);
        self.start = index.saturating_sub(half).min(max_start);
    }
}
