use crate::csi::SubcarrierRange;
use crate::support::{ErrorKind, PlkgError, PlkgResult};
use std::collections::HashMap;
use std::collections::VecDeque;

/// Frames shorter than this after modal filtering cannot support a profile.
const MIN_FRAMES: usize = 10;

/// Frame lengths above this carry per-subcarrier magnitudes directly (HT40
/// firmware path); at or below it entries are interleaved I/Q pairs.
const MAGNITUDE_LENGTH_THRESHOLD: usize = 64;

/// Accumulates parsed CSI frames for one endpoint and reduces them to a
/// per-subcarrier mean amplitude profile. Written only by the listen task;
/// read between stages.
pub struct Aggregator {
    window: usize,
    frames: VecDeque<Vec<i32>>,
    received: usize,
}

impl Aggregator {
    /// `window` bounds the number of most recent frames retained.
    pub fn new(window: usize) -> Aggregator {
        Aggregator {
            window,
            frames: VecDeque::with_capacity(window),
            received: 0,
        }
    }

    /// Appends a frame, evicting the oldest once the window is full.
    pub fn push(&mut self, frame: Vec<i32>) {
        if self.frames.len() == self.window {
            self.frames.pop_front();
        }

        self.frames.push_back(frame);
        self.received += 1;
    }

    /// Total frames ever pushed.
    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Frames currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Reduces the window to the channel mean vector:
    /// keep only frames of the modal length, convert each to an amplitude
    /// profile, slice out the valid subcarrier ranges (clipped to the
    /// profile width) and take column-wise means.
    pub fn mean_profile(&self, ranges: &[SubcarrierRange]) -> PlkgResult<Vec<f64>> {
        let modal_len = self.modal_length().ok_or(PlkgError::Fatal(ErrorKind::InsufficientData))?;

        let retained: Vec<&Vec<i32>> =
            self.frames.iter().filter(|f| f.len() == modal_len).collect();

        if retained.len() < MIN_FRAMES {
            return Err(PlkgError::Fatal(ErrorKind::InsufficientData));
        }

        let profiles: Vec<Vec<f64>> = if modal_len > MAGNITUDE_LENGTH_THRESHOLD {
            // HT40 firmware delivers scalar magnitudes.
            retained
                .iter()
                .map(|frame| frame.iter().map(|&v| f64::from(v).abs()).collect())
                .collect()
        } else {
            // Short frames carry interleaved I/Q pairs. An odd modal length
            // cannot be paired, which drops every frame.
            if modal_len % 2 != 0 {
                return Err(PlkgError::Fatal(ErrorKind::InsufficientData));
            }

            retained
                .iter()
                .map(|frame| {
                    frame
                        .chunks(2)
                        .map(|iq| f64::from(iq[0]).hypot(f64::from(iq[1])))
                        .collect()
                })
                .collect()
        };

        let width = profiles[0].len();

        let mut columns: Vec<usize> = Vec::new();
        for range in ranges {
            if range.start >= width {
                continue;
            }

            columns.extend(range.start..range.end.min(width));
        }

        if columns.is_empty() {
            return Err(PlkgError::Fatal(ErrorKind::NoValidSubcarriers));
        }

        let count = profiles.len() as f64;
        let mean = columns
            .iter()
            .map(|&col| profiles.iter().map(|p| p[col]).sum::<f64>() / count)
            .collect();

        Ok(mean)
    }

    /// Most frequent frame length in the window; ties go to the higher count
    /// first, then to the shorter length, so the result is deterministic.
    fn modal_length(&self) -> Option<usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();

        for frame in &self.frames {
            *counts.entry(frame.len()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .max_by(|(len_a, count_a), (len_b, count_b)| {
                count_a.cmp(count_b).then(len_b.cmp(len_a))
            })
            .map(|(len, _)| len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csi::default_ranges;

    fn fill(aggregator: &mut Aggregator, frame: Vec<i32>, copies: usize) {
        for _ in 0..copies {
            aggregator.push(frame.clone());
        }
    }

    #[test]
    fn test_empty_window_is_insufficient() {
        let aggregator = Aggregator::new(200);

        assert_eq!(
            aggregator.mean_profile(&default_ranges()),
            Err(PlkgError::Fatal(ErrorKind::InsufficientData))
        );
    }

    #[test]
    fn test_too_few_modal_frames_is_insufficient() {
        let mut aggregator = Aggregator::new(200);

        fill(&mut aggregator, vec![1; 128], 9);
        fill(&mut aggregator, vec![1; 120], 3);

        assert_eq!(
            aggregator.mean_profile(&default_ranges()),
            Err(PlkgError::Fatal(ErrorKind::InsufficientData))
        );
    }

    #[test]
    fn test_magnitude_path_slices_and_averages() {
        let mut aggregator = Aggregator::new(200);

        // 128-entry frames: magnitudes directly, negative values folded.
        let frame: Vec<i32> = (0..128).map(|i| if i % 2 == 0 { i } else { -i }).collect();
        fill(&mut aggregator, frame, 12);

        let mean = aggregator.mean_profile(&default_ranges()).unwrap();

        // [10,60) and [70,118) survive in full.
        assert_eq!(mean.len(), 98);
        assert_eq!(mean[0], 10.0);
        assert_eq!(mean[49], 59.0);
        assert_eq!(mean[50], 70.0);
        assert_eq!(mean[97], 117.0);
    }

    #[test]
    fn test_iq_path_computes_magnitudes() {
        let mut aggregator = Aggregator::new(200);

        // 8 entries = 4 subcarriers of (3,4) → magnitude 5.
        fill(&mut aggregator, vec![3, 4, 3, -4, -3, 4, -3, -4], 10);

        let ranges = [SubcarrierRange::new(0, 4)];
        let mean = aggregator.mean_profile(&ranges).unwrap();

        assert_eq!(mean, vec![5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_iq_ranges_clip_to_profile_width() {
        let mut aggregator = Aggregator::new(200);

        // 64 entries → 32 subcarriers; the default [10,60) clips to [10,32)
        // and [70,118) vanishes.
        fill(&mut aggregator, vec![1; 64], 10);

        let mean = aggregator.mean_profile(&default_ranges()).unwrap();

        assert_eq!(mean.len(), 22);
    }

    #[test]
    fn test_all_ranges_outside_profile() {
        let mut aggregator = Aggregator::new(200);

        fill(&mut aggregator, vec![1, 2, 3, 4], 10);

        let ranges = [SubcarrierRange::new(8, 16)];

        assert_eq!(
            aggregator.mean_profile(&ranges),
            Err(PlkgError::Fatal(ErrorKind::NoValidSubcarriers))
        );
    }

    #[test]
    fn test_modal_filter_drops_minority_lengths() {
        let mut aggregator = Aggregator::new(200);

        fill(&mut aggregator, vec![10, 0, 10, 0], 12);
        fill(&mut aggregator, vec![90; 6], 5);

        let ranges = [SubcarrierRange::new(0, 2)];
        let mean = aggregator.mean_profile(&ranges).unwrap();

        // Only the 12 four-entry frames count: subcarriers (10,0) twice.
        assert_eq!(mean, vec![10.0, 10.0]);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut aggregator = Aggregator::new(10);

        fill(&mut aggregator, vec![1, 0, 1, 0], 10);
        fill(&mut aggregator, vec![2, 0, 2, 0], 10);

        let ranges = [SubcarrierRange::new(0, 2)];
        let mean = aggregator.mean_profile(&ranges).unwrap();

        assert_eq!(aggregator.len(), 10);
        assert_eq!(aggregator.received(), 20);
        assert_eq!(mean, vec![2.0, 2.0]);
    }

    #[test]
    fn test_odd_iq_length_is_insufficient() {
        let mut aggregator = Aggregator::new(200);

        fill(&mut aggregator, vec![1, 2, 3], 10);

        assert_eq!(
            aggregator.mean_profile(&default_ranges()),
            Err(PlkgError::Fatal(ErrorKind::InsufficientData))
        );
    }
}
