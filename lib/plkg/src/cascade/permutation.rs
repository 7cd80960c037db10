use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The shared per-pass shuffle. Both endpoints must derive the identical
/// ordering from the pass index alone, so the generator is pinned to
/// ChaCha8 seeded with the pass and the shuffle is an explicit Fisher–Yates
/// rather than a library routine whose sequence may change between releases.
pub fn permutation(pass: u32, len: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(u64::from(pass));

    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }

    indices
}

/// Block size at a pass: `max(2, ⌊initial · 1.5^pass⌋)`.
pub fn block_size(pass: u32, initial: usize) -> usize {
    let scaled = initial as f64 * 1.5f64.powi(pass as i32);

    (scaled.floor() as usize).max(2)
}

/// Contiguous partition of `[0, len)` into `(start, length)` windows of the
/// given size; the last window may be short.
pub fn blocks(len: usize, size: usize) -> Vec<(usize, usize)> {
    (0..len)
        .step_by(size)
        .map(|start| (start, size.min(len - start)))
        .collect()
}
