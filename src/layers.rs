//! Layer Index
//!
//! Segments grouped by print Z, in the order layers first appeared, plus a
//! cursor a viewer moves through them with.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::machine::{ArcPath, Motion, Vec2, Vec4};

/// One straight move, as seen by a viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub from: Vec4,
    pub to: Vec4,
    pub feedrate: f64,
    pub extruding: bool,
    /// Seconds; only computed when duration tracking is on
    pub duration: Option<f64>,
    pub layer_z: f64,
}

impl Segment {
    pub fn new(motion: &Motion, duration: Option<f64>) -> Self {
        Self {
            from: motion.from,
            to: motion.to,
            feedrate: motion.feedrate,
            extruding: motion.extruding,
            duration,
            layer_z: motion.layer_z,
        }
    }
}

/// A G2/G3 move kept as its circle rather than as points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArcSegment {
    pub from: Vec4,
    pub to: Vec4,
    pub center: Vec2,
    pub clockwise: bool,
    pub feedrate: f64,
    pub extruding: bool,
    /// Seconds along the chord; only computed when duration tracking is on
    pub duration: Option<f64>,
    pub layer_z: f64,
}

impl ArcSegment {
    pub fn new(motion: &Motion, path: ArcPath, duration: Option<f64>) -> Self {
        Self {
            from: motion.from,
            to: motion.to,
            center: path.center,
            clockwise: path.clockwise,
            feedrate: motion.feedrate,
            extruding: motion.extruding,
            duration,
            layer_z: motion.layer_z,
        }
    }
}

/// Z value usable as an ordered map key
#[derive(Debug, Clone, Copy)]
struct LayerKey(f64);

impl PartialEq for LayerKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LayerKey {}

impl PartialOrd for LayerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LayerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// -0.0 and 0.0 are the same layer
fn normalize(z: f64) -> f64 {
    if z == 0.0 { 0.0 } else { z }
}

#[derive(Debug, Clone, Default)]
struct Layer {
    segments: Vec<Segment>,
    arcs: Vec<ArcSegment>,
    duration: f64,
}

/// Where an inserted segment landed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerInsert {
    /// Key of the layer that received the segment
    pub z: f64,
    pub new_layer: bool,
}

/// A layer yielded by [`LayerIndex::active_view`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerView<'a> {
    pub z: f64,
    pub segments: &'a [Segment],
    pub arcs: &'a [ArcSegment],
    /// 1.0 for the active layer, fading towards 0 for older ones
    pub intensity: f64,
}

#[derive(Debug, Clone)]
pub struct LayerIndex {
    order: Vec<f64>,
    by_z: BTreeMap<LayerKey, Layer>,
    cursor: Option<usize>,
    show_all: bool,
    fade_window: usize,
    tolerance: f64,
}

impl Default for LayerIndex {
    fn default() -> Self {
        Self::new(6, 0.0)
    }
}

impl LayerIndex {
    pub fn new(fade_window: usize, tolerance: f64) -> Self {
        Self {
            order: Vec::new(),
            by_z: BTreeMap::new(),
            cursor: None,
            show_all: false,
            fade_window,
            tolerance,
        }
    }

    /// Existing key `z` belongs to, honouring the tolerance
    fn resolve(&self, z: f64) -> Option<LayerKey> {
        let z = normalize(z);
        if self.by_z.contains_key(&LayerKey(z)) {
            return Some(LayerKey(z));
        }
        if self.tolerance <= 0.0 {
            return None;
        }

        let low = LayerKey(z - self.tolerance);
        let high = LayerKey(z + self.tolerance);
        self.by_z
            .range(low..=high)
            .map(|(key, _)| *key)
            .min_by(|a, b| (a.0 - z).abs().total_cmp(&(b.0 - z).abs()))
    }

    /// Layer `z` lands in, opening a new one if needed
    fn entry(&mut self, z: f64) -> (&mut Layer, LayerInsert) {
        let z = normalize(z);
        let (key, new_layer) = match self.resolve(z) {
            Some(key) => (key, false),
            None => {
                self.order.push(z);
                if self.cursor.is_none() {
                    self.cursor = Some(0);
                }
                (LayerKey(z), true)
            }
        };

        let landed = LayerInsert {
            z: key.0,
            new_layer,
        };
        (self.by_z.entry(key).or_default(), landed)
    }

    pub fn insert(&mut self, z: f64, segment: Segment) -> LayerInsert {
        let (layer, landed) = self.entry(z);
        layer.duration += segment.duration.unwrap_or(0.0);
        layer.segments.push(segment);
        landed
    }

    pub fn insert_arc(&mut self, z: f64, arc: ArcSegment) -> LayerInsert {
        let (layer, landed) = self.entry(z);
        layer.duration += arc.duration.unwrap_or(0.0);
        layer.arcs.push(arc);
        landed
    }

    /// Layer Zs in the order they first appeared
    pub fn layers(&self) -> &[f64] {
        &self.order
    }

    pub fn contains_layer(&self, z: f64) -> bool {
        self.resolve(z).is_some()
    }

    pub fn segments_at(&self, z: f64) -> &[Segment] {
        self.resolve(z)
            .and_then(|key| self.by_z.get(&key))
            .map(|layer| layer.segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn arcs_at(&self, z: f64) -> &[ArcSegment] {
        self.resolve(z)
            .and_then(|key| self.by_z.get(&key))
            .map(|layer| layer.arcs.as_slice())
            .unwrap_or(&[])
    }

    /// Summed segment and arc durations; zero unless durations are computed
    pub fn layer_duration(&self, z: f64) -> Option<f64> {
        self.resolve(z)
            .and_then(|key| self.by_z.get(&key))
            .map(|layer| layer.duration)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.by_z.values().map(|layer| layer.segments.len()).sum()
    }

    pub fn arc_count(&self) -> usize {
        self.by_z.values().map(|layer| layer.arcs.len()).sum()
    }

    /// `(z, segments)` in layer order
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[Segment])> + '_ {
        self.order.iter().map(|&z| (z, self.segments_at(z)))
    }

    pub fn active_layer(&self) -> Option<f64> {
        self.cursor.map(|idx| self.order[idx])
    }

    pub fn cursor_up(&mut self) {
        if let Some(idx) = self.cursor {
            self.cursor = Some((idx + 1).min(self.order.len() - 1));
        }
    }

    pub fn cursor_down(&mut self) {
        if let Some(idx) = self.cursor {
            self.cursor = Some(idx.saturating_sub(1));
        }
    }

    /// Jump to the layer at `z` and leave show-all mode
    pub fn set_layer(&mut self, z: f64) -> bool {
        let Some(key) = self.resolve(z) else {
            return false;
        };
        let Some(idx) = self.order.iter().position(|&layer| LayerKey(layer) == key) else {
            return false;
        };
        self.cursor = Some(idx);
        self.show_all = false;
        true
    }

    pub fn show_all(&mut self, show: bool) {
        self.show_all = show;
    }

    pub fn is_show_all(&self) -> bool {
        self.show_all
    }

    /// Layers to paint, oldest first, the active layer last
    pub fn active_view(&self) -> impl Iterator<Item = LayerView<'_>> + '_ {
        let range = match (self.show_all, self.cursor) {
            (true, _) => 0..self.order.len(),
            (false, Some(cursor)) => cursor.saturating_sub(self.fade_window)..cursor + 1,
            (false, None) => 0..0,
        };
        let cursor = self.cursor.unwrap_or(0);
        let steps = (self.fade_window + 1) as f64;

        range.map(move |idx| {
            let z = self.order[idx];
            let intensity = if self.show_all {
                1.0
            } else {
                let behind = cursor - idx;
                (steps - behind as f64) / steps
            };
            LayerView {
                z,
                segments: self.segments_at(z),
                arcs: self.arcs_at(z),
                intensity,
            }
        })
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.by_z.clear();
        self.cursor = None;
        self.show_all = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(z: f64) -> Segment {
        Segment {
            from: Vec4::new(0.0, 0.0, z, 0.0),
            to: Vec4::new(1.0, 0.0, z, 1.0),
            feedrate: 1200.0,
            extruding: true,
            duration: Some(0.5),
            layer_z: z,
        }
    }

    fn index_with(zs: &[f64], fade_window: usize) -> LayerIndex {
        let mut index = LayerIndex::new(fade_window, 0.0);
        for &z in zs {
            index.insert(z, segment(z));
        }
        index
    }

    #[test]
    fn test_insert_tracks_order() {
        let mut index = LayerIndex::default();
        assert_eq!(
            index.insert(0.2, segment(0.2)),
            LayerInsert {
                z: 0.2,
                new_layer: true
            }
        );
        assert!(!index.insert(0.2, segment(0.2)).new_layer);
        index.insert(0.4, segment(0.4));

        assert_eq!(index.layers(), &[0.2, 0.4]);
        assert_eq!(index.segments_at(0.2).len(), 2);
        assert_eq!(index.segment_count(), 3);
        assert_eq!(index.layer_duration(0.2), Some(1.0));
        assert!(index.segments_at(9.0).is_empty());
    }

    #[test]
    fn test_arcs_share_layers_with_segments() {
        let arc = ArcSegment {
            from: Vec4::new(0.0, 0.0, 0.2, 1.0),
            to: Vec4::new(2.0, 0.0, 0.2, 2.0),
            center: Vec2::new(1.0, 0.0),
            clockwise: true,
            feedrate: 1200.0,
            extruding: true,
            duration: Some(0.25),
            layer_z: 0.2,
        };

        let mut index = LayerIndex::default();
        assert!(index.insert_arc(0.2, arc).new_layer);
        assert!(!index.insert(0.2, segment(0.2)).new_layer);

        assert_eq!(index.layers(), &[0.2]);
        assert_eq!(index.arcs_at(0.2), &[arc]);
        assert_eq!(index.arc_count(), 1);
        assert_eq!(index.segment_count(), 1);
        assert_eq!(index.layer_duration(0.2), Some(0.75));
        assert!(index.arcs_at(0.4).is_empty());

        let view: Vec<LayerView<'_>> = index.active_view().collect();
        assert_eq!(view[0].arcs.len(), 1);
    }

    #[test]
    fn test_order_is_first_appearance_not_sorted() {
        let index = index_with(&[0.4, 0.2, 0.4], 6);
        assert_eq!(index.layers(), &[0.4, 0.2]);
    }

    #[test]
    fn test_tolerance_merges_near_layers() {
        let mut index = LayerIndex::new(6, 0.001);
        index.insert(0.2, segment(0.2));
        let landed = index.insert(0.2004, segment(0.2004));

        assert_eq!(landed.z, 0.2);
        assert!(!landed.new_layer);
        assert_eq!(index.len(), 1);
        assert!(index.contains_layer(0.1995));
        assert!(!index.contains_layer(0.21));
    }

    #[test]
    fn test_cursor_saturates() {
        let mut index = LayerIndex::default();
        index.cursor_up();
        assert_eq!(index.active_layer(), None);

        let mut index = index_with(&[0.2, 0.4, 0.6], 6);
        assert_eq!(index.active_layer(), Some(0.2));
        index.cursor_down();
        assert_eq!(index.active_layer(), Some(0.2));
        for _ in 0..5 {
            index.cursor_up();
        }
        assert_eq!(index.active_layer(), Some(0.6));
    }

    #[test]
    fn test_active_view_fades_older_layers() {
        let mut index = index_with(&[0.2, 0.4, 0.6, 0.8], 2);
        assert!(index.set_layer(0.8));

        let view: Vec<(f64, f64)> = index.active_view().map(|v| (v.z, v.intensity)).collect();
        assert_eq!(view, vec![(0.4, 1.0 / 3.0), (0.6, 2.0 / 3.0), (0.8, 1.0)]);
    }

    #[test]
    fn test_show_all_paints_everything() {
        let mut index = index_with(&[0.2, 0.4, 0.6], 0);
        index.show_all(true);

        let view: Vec<LayerView<'_>> = index.active_view().collect();
        assert_eq!(view.len(), 3);
        assert!(view.iter().all(|v| v.intensity == 1.0));

        assert!(index.set_layer(0.4));
        assert!(!index.is_show_all());
        assert_eq!(index.active_view().count(), 1);
        assert!(!index.set_layer(1.0));
    }

    #[test]
    fn test_signed_zero_is_one_layer() {
        let mut index = LayerIndex::default();
        index.insert(0.0, segment(0.0));
        assert!(!index.insert(-0.0, segment(-0.0)).new_layer);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut index = index_with(&[0.2, 0.4], 6);
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.active_layer(), None);
        assert_eq!(index.active_view().count(), 0);
        assert_eq!(index.iter().count(), 0);
    }
}
