pub mod config;

pub mod data {
    pub mod dataset;
    pub mod noise;
}

pub mod metrics {
    pub mod curve;
}

pub mod train;
pub mod influence;
pub mod bench;
pub mod report;
pub mod store;
pub mod baselines;
