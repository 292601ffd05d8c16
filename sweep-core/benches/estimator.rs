use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_complex::Complex;
use rf_sweep::aggregate::merge_max_hold;
use rf_sweep::{estimate, SpectrumEstimator, SweepRecord};

fn criterion_benchmark(c: &mut Criterion) {
    let samples: Vec<Complex<f32>> = (0..1024)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * 0.123 * i as f32;
            Complex::new(phase.cos(), phase.sin())
        })
        .collect();
    
    c.bench_function("estimate (planned per call)", |b| {
        b.iter(|| estimate(black_box(&samples), 1024))
    });
    
    let mut estimator = SpectrumEstimator::new(1024).unwrap();
    c.bench_function("estimate (reused plan)", |b| {
        b.iter(|| estimator.estimate(black_box(&samples)))
    });
    
    // 470-608 MHz at 1 MHz steps
    let freqs: Vec<f64> = (0..138).map(|i| 470e6 + i as f64 * 1e6).collect();
    let powers: Vec<f64> = (0..138).map(|i| (i % 17) as f64).collect();
    let record = SweepRecord::new(chrono::Utc::now(), freqs.clone(), powers, None, None).unwrap();
    let prior: Vec<(f64, f64)> = freqs.iter().map(|&f| (f, 8.0)).collect();
    
    c.bench_function("update_max_hold", |b| {
        b.iter(|| merge_max_hold(black_box(&prior), black_box(&record)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
