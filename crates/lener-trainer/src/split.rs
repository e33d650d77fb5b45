//! Partitioning of training sequences into folds.

use oorandom::Rand32;

use crate::config::SplitStrategy;

/// One train/validation partition, as indices into the training sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Partition `n` sequences according to `strategy`.
///
/// Cross-validation shuffles the indices with `seed` and deals them into
/// `min(k, n)` folds. Fewer than two sequences, or `Single`, yield one fold
/// that trains on everything.
pub fn partition(n: usize, strategy: SplitStrategy, seed: u64) -> Vec<Fold> {
    let k = match strategy {
        SplitStrategy::CrossValidation { k } => k.min(n),
        SplitStrategy::Single => 1,
    };
    if k < 2 {
        return vec![Fold {
            train: (0..n).collect(),
            validation: Vec::new(),
        }];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Rand32::new(seed);
    for i in (1..indices.len()).rev() {
        let j = rng.rand_range(0..(i as u32 + 1)) as usize;
        indices.swap(i, j);
    }

    (0..k)
        .map(|fold| {
            let (validation, train): (Vec<_>, Vec<_>) = indices
                .iter()
                .enumerate()
                .partition(|(pos, _)| pos % k == fold);
            Fold {
                train: sorted(train.into_iter().map(|(_, &i)| i).collect()),
                validation: sorted(validation.into_iter().map(|(_, &i)| i).collect()),
            }
        })
        .collect()
}

fn sorted(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v
}
