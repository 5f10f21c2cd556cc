use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use stimkit::{
    BatchConfig, HeadlessHost, HostConfig, KeyChoice, StimulusContent, Timing, TrialSpec,
    build_trial_specs,
};

fn spec(deadline_ms: i64) -> TrialSpec {
    let mut spec = TrialSpec::new(StimulusContent::Image("cat.png".into()));
    spec.choices = KeyChoice::from_keys(["f", "j"]);
    spec.stimulus_duration = Timing::from_millis(300);
    spec.response_deadline = Timing::from_millis(deadline_ms);
    spec
}

/// One full trial on a virtual clock: render, arm, resolve, tear down.
pub fn bench_run_trial(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_trial");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    group.bench_function("key_press", |b| {
        b.iter_batched(
            || HeadlessHost::virtual_time(HostConfig::default()),
            |host| {
                host.press_after(Duration::from_millis(450), "f");
                black_box(host.run_trial(spec(1000)).ok());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("deadline", |b| {
        b.iter_batched(
            || HeadlessHost::virtual_time(HostConfig::default()),
            |host| black_box(host.run_trial(spec(1000)).ok()),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Expanding a 500-trial batch with per-trial deadlines.
pub fn bench_build_specs(c: &mut Criterion) {
    let stimuli: Vec<String> = (0..500).map(|i| format!("img/{i}.png")).collect();
    let deadlines: Vec<Timing> = (0..500).map(|i| Timing::from_millis(500 + i)).collect();
    let config = BatchConfig::new(stimuli)
        .choices(KeyChoice::from_keys(["f", "j"]))
        .timing_response(stimkit::Param::PerTrial(deadlines));

    c.bench_function("build_trial_specs_500", |b| {
        b.iter(|| black_box(build_trial_specs(black_box(&config)).ok()));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .confidence_level(0.95)
        .noise_threshold(0.02)
        .significance_level(0.05);
    targets = bench_run_trial, bench_build_specs
}

criterion_main!(benches);
