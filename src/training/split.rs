//! Seeded train/test partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows for `n` samples: `ceil(test_size * n)`
pub fn test_count(n: usize, test_size: f64) -> usize {
    ((test_size * n as f64).ceil() as usize).min(n)
}

/// Shuffle `0..n` with a seeded RNG and cut off the test partition
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> anyhow::Result<Split> {
    let n_test = test_count(n, test_size);
    let n_train = n - n_test;
    if n_test == 0 || n_train == 0 {
        anyhow::bail!(
            "test_size={} with {} samples leaves an empty partition ({} train, {} test)",
            test_size,
            n,
            n_train,
            n_test
        );
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_rows_at_twenty_percent() {
        let split = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let split = train_test_split(37, 0.3, 1).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_is_deterministic() {
        assert_eq!(
            train_test_split(50, 0.2, 42).unwrap(),
            train_test_split(50, 0.2, 42).unwrap()
        );
        assert_ne!(
            train_test_split(50, 0.2, 42).unwrap(),
            train_test_split(50, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn test_rounds_test_partition_up() {
        assert_eq!(test_count(50, 0.25), 13);
        assert_eq!(test_count(10, 0.1), 1);
    }

    #[test]
    fn test_empty_partition_rejected() {
        assert!(train_test_split(1, 0.2, 42).is_err());
    }
}
