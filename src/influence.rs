use anyhow::Result;

use crate::data::dataset::BatchedView;

/// Computes a self-influence score for every example of a batched view,
/// one score per example in view order.
pub trait InfluenceCalculator {
    fn self_influence(&self, batched: &BatchedView<'_>) -> Result<Vec<f64>>;
}

/// Builds a calculator bound to a trained model and the artifacts its
/// training run produced (e.g. checkpoint history).
pub trait InfluenceCalculatorFactory<M, A> {
    fn build(
        &self,
        batched: &BatchedView<'_>,
        model: &M,
        artifacts: &A,
    ) -> Result<Box<dyn InfluenceCalculator>>;
}
