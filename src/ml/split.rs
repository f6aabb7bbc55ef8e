//! Held-out split used to score a freshly trained model.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed for the shuffle, so repeated runs over the same data agree.
pub const SPLIT_SEED: u64 = 42;

/// Fraction of records held out: `min(0.2, max(1/n, 0.1))`.
pub fn test_fraction(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (1.0 / n as f64).max(0.1).min(0.2)
}

/// Number of held-out records, `ceil(test_fraction(n) * n)`.
pub fn test_count(n: usize) -> usize {
    // Nudge below the next integer so 0.2 * 5 stays 1 despite rounding error.
    ((test_fraction(n) * n as f64) - 1e-9).ceil().max(0.0) as usize
}

/// Shuffle `0..n` deterministically and split into (train, test) indices.
pub fn train_test_split(n: usize) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let test = indices.split_off(n - test_count(n).min(n));
    (indices, test)
}
