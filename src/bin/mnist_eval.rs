use std::env;
use std::process;
use std::sync::Arc;

use mnist_knn::{load_files, BatchEvaluator, ConsoleReporter, KnnClassifier, Metric};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "usage: {} <train-images> <train-labels> <test-images> <test-labels> [k] [metric] [workers]",
            args[0]
        );
        process::exit(2);
    }

    let k = parse_count(&args, 5, 20, "k");
    let metric = match args.get(6) {
        Some(s) => s.parse().unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(2)
        }),
        None => Metric::Taxicab,
    };
    let workers = parse_count(&args, 7, 4, "workers");

    if let Err(e) = run(&args[1..5], k, metric, workers) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn parse_count(args: &[String], index: usize, default: usize, name: &str) -> usize {
    match args.get(index) {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("{name} must be a positive integer, got '{s}'");
            process::exit(2)
        }),
    }
}

fn run(paths: &[String], k: usize, metric: Metric, workers: usize) -> mnist_knn::Result<()> {
    let training = Arc::new(load_files(&paths[0], &paths[1])?);
    let test = load_files(&paths[2], &paths[3])?;
    println!(
        "loaded {} training and {} test images",
        training.len(),
        test.len()
    );

    let classifier = KnnClassifier::new(k, metric, training)?;

    // Recognize a single image before measuring the whole set.
    if let Some(first) = test.first() {
        println!("selected digit: {}", first.label());
        println!("recognized digit: {}", classifier.predict(first)?);
    }

    let evaluation = BatchEvaluator::new(classifier).evaluate_with(
        &test,
        workers,
        &mut ConsoleReporter::stdout(),
    )?;

    for shard in evaluation.failed_shards() {
        eprintln!(
            "worker {} failed after {}/{} images: {}",
            shard.worker,
            shard.classified,
            shard.len,
            shard.fault.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
