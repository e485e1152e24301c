use std::env;
use std::path::Path;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use influence_bench::baselines::{
    synthetic_blobs, CheckpointSelfInfluenceFactory, LossSelfInfluenceFactory, SoftmaxModel,
    SoftmaxProcedure,
};
use influence_bench::bench::MislabelingDetectorEvaluator;
use influence_bench::config::EvaluatorConfig;
use influence_bench::influence::InfluenceCalculatorFactory;
use influence_bench::store::save_results_sqlite;
use influence_bench::train::CheckpointRecorder;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: influence_bench <bench> [out_dir]");
        return Ok(());
    }

    match args[1].as_str() {
        "bench" => run_bench(args.get(2).map(String::as_str).unwrap_or("bench_out"))?,
        _ => println!("Unknown command. Use 'bench'."),
    }

    Ok(())
}

/// Benchmark the two reference influence calculators on synthetic blobs.
fn run_bench(out_dir: &str) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let training = synthetic_blobs(600, 5, 4, 0.4, &mut rng)?;
    let test = synthetic_blobs(200, 5, 4, 0.4, &mut rng)?;

    let procedure = SoftmaxProcedure {
        epochs: 30,
        learning_rate: 0.5,
        epochs_to_save: vec![9, 19, 29],
    };
    let config = EvaluatorConfig::new(0.1, 32, 32, None)?;
    let evaluator = MislabelingDetectorEvaluator::new(&training, &test, procedure, config);

    let factories: Vec<(
        String,
        Box<dyn InfluenceCalculatorFactory<SoftmaxModel, CheckpointRecorder<SoftmaxModel>>>,
    )> = vec![
        ("loss".to_string(), Box::new(LossSelfInfluenceFactory)),
        (
            "checkpoint".to_string(),
            Box::new(CheckpointSelfInfluenceFactory),
        ),
    ];

    println!("[INFO] Running benchmark ...");
    let result = evaluator.bench(&factories, 3, Path::new(out_dir), 0, true, false)?;

    let db_path = format!("{}/results.db", out_dir);
    save_results_sqlite(&result, &db_path)?;
    println!("[INFO] Saved results to {}", db_path);
    Ok(())
}
