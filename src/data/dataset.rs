use anyhow::{ensure, Result};
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::Rng;

/// An ordered, finite collection of (input, one-hot label) pairs. The
/// cardinality is known up front and the collection is read-only once
/// built; relabeling produces a new dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    inputs: Vec<Vec<f64>>,
    labels: Vec<Vec<f64>>,
    n_classes: usize,
}

impl LabeledDataset {
    pub fn new(inputs: Vec<Vec<f64>>, labels: Vec<Vec<f64>>) -> Result<Self> {
        ensure!(!inputs.is_empty(), "dataset must not be empty");
        ensure!(
            inputs.len() == labels.len(),
            "inputs/labels length mismatch: {} vs {}",
            inputs.len(),
            labels.len()
        );
        let n_features = inputs[0].len();
        for (i, row) in inputs.iter().enumerate() {
            ensure!(
                row.len() == n_features,
                "input row {} has {} features, expected {}",
                i,
                row.len(),
                n_features
            );
        }
        let n_classes = labels[0].len();
        ensure!(n_classes >= 2, "need at least 2 classes, got {}", n_classes);
        for (i, row) in labels.iter().enumerate() {
            ensure!(
                row.len() == n_classes,
                "label row {} has width {}, expected {}",
                i,
                row.len(),
                n_classes
            );
            let ones = row.iter().filter(|&&v| v == 1.0).count();
            let zeros = row.iter().filter(|&&v| v == 0.0).count();
            ensure!(
                ones == 1 && zeros == n_classes - 1,
                "label row {} is not one-hot",
                i
            );
        }
        Ok(Self {
            inputs,
            labels,
            n_classes,
        })
    }

    /// Build from plain class indices, one-hot encoding the labels.
    pub fn from_class_indices(
        inputs: Vec<Vec<f64>>,
        classes: &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        ensure!(
            inputs.len() == classes.len(),
            "inputs/classes length mismatch: {} vs {}",
            inputs.len(),
            classes.len()
        );
        let labels = classes
            .iter()
            .map(|&c| {
                ensure!(c < n_classes, "class index {} out of range 0..{}", c, n_classes);
                let mut row = vec![0.0; n_classes];
                row[c] = 1.0;
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(inputs, labels)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn input(&self, i: usize) -> &[f64] {
        &self.inputs[i]
    }

    pub fn label(&self, i: usize) -> &[f64] {
        &self.labels[i]
    }

    /// Class index of example `i` (argmax of the one-hot row).
    pub fn label_class(&self, i: usize) -> usize {
        self.labels[i]
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| OrderedFloat(**v))
            .map(|(c, _)| c)
            .unwrap_or(0)
    }

    /// Copy of the dataset with every label replaced by the given class
    /// indices. Inputs are shared data, cloned as-is.
    pub(crate) fn with_label_classes(&self, classes: &[usize]) -> Result<Self> {
        Self::from_class_indices(self.inputs.clone(), classes, self.n_classes)
    }

    /// Identity-order batched view: batch k holds examples
    /// [k*batch_size, (k+1)*batch_size).
    pub fn batched(&self, batch_size: usize) -> BatchedView<'_> {
        assert!(batch_size > 0, "batch_size must be positive");
        BatchedView {
            data: self,
            order: (0..self.len()).collect(),
            batch_size,
        }
    }

    /// Shuffled-then-batched view, e.g. for influence calculator construction.
    pub fn shuffled_batched(&self, batch_size: usize, rng: &mut impl Rng) -> BatchedView<'_> {
        assert!(batch_size > 0, "batch_size must be positive");
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        BatchedView {
            data: self,
            order,
            batch_size,
        }
    }
}

/// A borrowed, ordered, batched view over a dataset. The underlying
/// dataset is never copied or mutated.
pub struct BatchedView<'a> {
    data: &'a LabeledDataset,
    order: Vec<usize>,
    batch_size: usize,
}

impl<'a> BatchedView<'a> {
    pub fn dataset(&self) -> &'a LabeledDataset {
        self.data
    }

    pub fn n_examples(&self) -> usize {
        self.order.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Example indices in view order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn batches<'s>(&'s self) -> impl Iterator<Item = Batch<'s>> + 's {
        let data = self.data;
        self.order
            .chunks(self.batch_size)
            .map(move |chunk| Batch {
                data,
                indices: chunk,
            })
    }
}

/// One batch of a `BatchedView`: the dataset borrow plus the example
/// indices belonging to the batch.
pub struct Batch<'v> {
    data: &'v LabeledDataset,
    indices: &'v [usize],
}

impl<'v> Batch<'v> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        self.indices
    }

    /// Iterate (dataset index, input, one-hot label) triples.
    pub fn examples(&self) -> impl Iterator<Item = (usize, &'v [f64], &'v [f64])> + 'v {
        let data = self.data;
        let indices = self.indices;
        indices.iter().map(move |&i| (i, data.input(i), data.label(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy(n: usize, n_classes: usize) -> LabeledDataset {
        let inputs: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, 1.0]).collect();
        let classes: Vec<usize> = (0..n).map(|i| i % n_classes).collect();
        LabeledDataset::from_class_indices(inputs, &classes, n_classes).unwrap()
    }

    #[test]
    fn one_hot_roundtrip() {
        let data = toy(7, 3);
        assert_eq!(data.len(), 7);
        assert_eq!(data.n_classes(), 3);
        for i in 0..7 {
            assert_eq!(data.label_class(i), i % 3);
            assert_eq!(data.label(i)[i % 3], 1.0);
        }
    }

    #[test]
    fn rejects_ragged_and_non_one_hot_labels() {
        assert!(LabeledDataset::new(vec![vec![0.0]], vec![vec![1.0, 0.0, 1.0]]).is_err());
        assert!(LabeledDataset::new(vec![vec![0.0]], vec![vec![0.5, 0.5]]).is_err());
        assert!(LabeledDataset::new(
            vec![vec![0.0], vec![1.0]],
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]
        )
        .is_err());
        assert!(LabeledDataset::new(vec![], vec![]).is_err());
    }

    #[test]
    fn batched_view_covers_every_index_in_order() {
        let data = toy(10, 2);
        let view = data.batched(3);
        let sizes: Vec<usize> = view.batches().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        let flat: Vec<usize> = view.batches().flat_map(|b| b.indices().to_vec()).collect();
        assert_eq!(flat, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_view_is_a_permutation() {
        let data = toy(20, 4);
        let mut rng = StdRng::seed_from_u64(7);
        let view = data.shuffled_batched(6, &mut rng);
        let mut seen: Vec<usize> = view.order().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());

        let mut rng2 = StdRng::seed_from_u64(7);
        let view2 = data.shuffled_batched(6, &mut rng2);
        assert_eq!(view.order(), view2.order());
    }
}
