use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use mnist_knn::{KnnClassifier, LabeledImage, Metric};

fn random_image(rng: &mut impl Rng, label: u8) -> LabeledImage {
    let pixels: Vec<u8> = (0..28 * 28).map(|_| rng.gen()).collect();
    LabeledImage::new(28, 28, pixels, label).unwrap()
}

fn bench_predict(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let training: Vec<LabeledImage> = (0..1000)
        .map(|i| random_image(&mut rng, (i % 10) as u8))
        .collect();
    let query = random_image(&mut rng, 0);

    let mut group = c.benchmark_group("predict");
    for metric in [Metric::Taxicab, Metric::Euclidean] {
        let knn = KnnClassifier::new(5, metric, Arc::new(training.clone())).unwrap();
        group.bench_function(metric.to_string(), |b| {
            b.iter(|| knn.predict(black_box(&query)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
