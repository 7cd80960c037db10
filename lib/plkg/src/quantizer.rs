use crate::key::BitKey;
use crate::support::{ErrorKind, PlkgError, PlkgResult};

/// Number of sampling anchors taken across the profile.
pub const DEFAULT_K_MAIN: usize = 16;
/// Half-width of the majority-vote window around each anchor.
pub const DEFAULT_NEIGHBORS: usize = 2;

/// Quartile thresholds of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Thresholds {
    q25: f64,
    q50: f64,
    q75: f64,
}

/// Deterministically maps a mean amplitude profile to a bit string: two
/// Gray-coded bits per anchor, the anchor's quartile bin decided by majority
/// vote over its neighborhood window.
pub fn quantize(profile: &[f64], k_main: usize, m_neighbors: usize) -> PlkgResult<BitKey> {
    let len = profile.len();

    if len < 2 * m_neighbors + 1 {
        return Err(PlkgError::Fatal(ErrorKind::InsufficientProfile));
    }

    let thresholds = thresholds(profile);

    let step = ((len - 2 * m_neighbors) / k_main).max(1);

    let mut bits = Vec::with_capacity(2 * k_main);
    for i in 0..k_main {
        let anchor = m_neighbors + i * step;

        if anchor + m_neighbors >= len {
            break;
        }

        let window = &profile[anchor - m_neighbors..=anchor + m_neighbors];
        let bin = vote(window, thresholds);

        bits.push((bin >> 1) & 1);
        bits.push(bin & 1);
    }

    Ok(BitKey::from_bits(bits))
}

/// Quartile bin of a single sample. Bins 2 and 3 are swapped relative to
/// amplitude order so that adjacent tiers differ in exactly one dibit bit:
/// tier order low→high emits 00, 01, 11, 10.
#[inline]
fn bin(value: f64, thresholds: Thresholds) -> u8 {
    if value < thresholds.q25 {
        0
    } else if value < thresholds.q50 {
        1
    } else if value < thresholds.q75 {
        3
    } else {
        2
    }
}

/// Modal bin of a window; ties go to the smallest bin value.
fn vote(window: &[f64], thresholds: Thresholds) -> u8 {
    let mut counts = [0usize; 4];

    for &value in window {
        counts[bin(value, thresholds) as usize] += 1;
    }

    let mut winner = 0;
    for candidate in 1..4 {
        if counts[candidate] > counts[winner] {
            winner = candidate;
        }
    }

    winner as u8
}

/// 25th/50th/75th percentiles with linear interpolation between order
/// statistics.
fn thresholds(profile: &[f64]) -> Thresholds {
    let mut sorted = profile.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN amplitude"));

    Thresholds {
        q25: percentile(&sorted, 0.25),
        q50: percentile(&sorted, 0.50),
        q75: percentile(&sorted, 0.75),
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![0.0, 10.0, 20.0, 30.0];

        assert_eq!(percentile(&sorted, 0.25), 7.5);
        assert_eq!(percentile(&sorted, 0.50), 15.0);
        assert_eq!(percentile(&sorted, 0.75), 22.5);
        assert_eq!(percentile(&sorted, 0.0), 0.0);
        assert_eq!(percentile(&sorted, 1.0), 30.0);
    }

    #[test]
    fn test_bin_gray_ordering() {
        let thresholds = Thresholds { q25: 10.0, q50: 20.0, q75: 30.0 };

        let tiers = [5.0, 15.0, 25.0, 35.0].map(|v| bin(v, thresholds));

        assert_eq!(tiers, [0, 1, 3, 2]);

        // Adjacent amplitude tiers differ in exactly one bit of the dibit.
        for pair in tiers.windows(2) {
            let delta = pair[0] ^ pair[1];
            assert_eq!(delta.count_ones(), 1);
        }
    }

    #[test]
    fn test_vote_majority_and_tie_break() {
        let thresholds = Thresholds { q25: 10.0, q50: 20.0, q75: 30.0 };

        assert_eq!(vote(&[5.0, 15.0, 15.0], thresholds), 1);
        // One sample per bin: the smallest bin value wins the tie.
        assert_eq!(vote(&[5.0, 15.0, 35.0], thresholds), 0);
        assert_eq!(vote(&[15.0, 25.0, 35.0], thresholds), 1);
    }

    #[test]
    fn test_quantize_known_profile() {
        let profile = vec![
            0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 30.0, 30.0, 30.0,
        ];

        let key = quantize(&profile, 4, 1).unwrap();

        // Anchors 1,3,5,7: windows vote bins 0,1,1,3 → 00 01 01 11.
        assert_eq!(key.len(), 8);
        assert_eq!(key.to_bytes(), vec![0b0001_0111]);
    }

    #[test]
    fn test_quantize_is_deterministic() {
        let profile: Vec<f64> = (0..100).map(|i| ((i * 37) % 61) as f64).collect();

        let first = quantize(&profile, DEFAULT_K_MAIN, DEFAULT_NEIGHBORS).unwrap();
        let second = quantize(&profile, DEFAULT_K_MAIN, DEFAULT_NEIGHBORS).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2 * DEFAULT_K_MAIN);
    }

    #[test]
    fn test_quantize_underflow() {
        let profile = vec![1.0, 2.0, 3.0, 4.0];

        assert_eq!(
            quantize(&profile, 16, 2),
            Err(PlkgError::Fatal(ErrorKind::InsufficientProfile))
        );
    }

    #[test]
    fn test_quantize_truncates_overflowing_anchors() {
        // 6 samples, m=1, k=8: step=1, anchors 1..=4 survive (a+m < 6).
        let profile = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];

        let key = quantize(&profile, 8, 1).unwrap();

        assert_eq!(key.len(), 8);
    }
}
