use anyhow::Result;
use rand::Rng;

use crate::data::dataset::LabeledDataset;

/// Corrupt a dataset's labels at the given mislabeling ratio.
///
/// For each example a uniform draw `u` marks it "keep" when
/// `u > mislabeling_ratio`. A corrupted example gets a replacement class
/// drawn uniformly from the other `C - 1` classes, so a flipped label
/// always differs from the original one. The whole mask is drawn in one
/// pass before any flip, so the RNG consumption per trial is fixed.
///
/// Returns the relabeled dataset plus the ascending indices of the
/// corrupted examples. An empty index set (no example corrupted) is a
/// defined outcome, not an error.
pub fn build_noisy_training_dataset(
    dataset: &LabeledDataset,
    mislabeling_ratio: f64,
    rng: &mut impl Rng,
) -> Result<(LabeledDataset, Vec<usize>)> {
    let n = dataset.len();
    let n_classes = dataset.n_classes();

    // true = keep the original label
    let keep_mask: Vec<bool> = (0..n).map(|_| rng.gen::<f64>() > mislabeling_ratio).collect();

    let mut classes: Vec<usize> = (0..n).map(|i| dataset.label_class(i)).collect();
    let mut noisy_indexes = Vec::new();
    for i in 0..n {
        if keep_mask[i] {
            continue;
        }
        let mut pick = rng.gen_range(0..n_classes - 1);
        if pick >= classes[i] {
            pick += 1;
        }
        classes[i] = pick;
        noisy_indexes.push(i);
    }

    let noisy = dataset.with_label_classes(&classes)?;
    Ok((noisy, noisy_indexes))
}
