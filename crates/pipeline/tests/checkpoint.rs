//! Interrupting a run with a checkpoint must not change its output.

mod common;

use common::{all_specs, config, init_tracing, synthetic_stream};
use tickbar_core::{BarFeatureRow, PipelineConfig, RawTick};
use tickbar_pipeline::Pipeline;

fn run_with_checkpoint(cfg: PipelineConfig, ticks: &[RawTick], cut: usize) -> Vec<BarFeatureRow> {
    let mut first = Pipeline::new(cfg.clone()).unwrap();
    let mut rows = Vec::new();
    for tick in &ticks[..cut] {
        if let Ok(ready) = first.process_tick(tick) {
            rows.extend(ready);
        }
    }
    let json = first.checkpoint().unwrap();
    drop(first);

    let mut resumed = Pipeline::resume(&cfg, &json).unwrap();
    for tick in &ticks[cut..] {
        if let Ok(ready) = resumed.process_tick(tick) {
            rows.extend(ready);
        }
    }
    rows.extend(resumed.finish());
    rows
}

#[test]
fn resume_matches_uninterrupted_run() {
    init_tracing();
    let ticks = synthetic_stream(99, 2_500);
    for spec in all_specs() {
        let cfg = config(spec.clone());
        let uninterrupted = tickbar_pipeline::run(cfg.clone(), &ticks).unwrap();
        for cut in [0, 1, 137, 1_250, 2_499, 2_500] {
            let resumed = run_with_checkpoint(cfg.clone(), &ticks, cut);
            assert_eq!(uninterrupted, resumed, "{spec:?} cut at {cut}");
        }
    }
}

#[test]
fn resume_preserves_reorder_buffer() {
    init_tracing();
    let mut cfg = config(common::all_specs()[2].clone());
    cfg.out_of_order_tolerance_us = 100_000;

    // Swap neighbours so the reorder buffer is non-empty at every cut.
    let mut ticks = synthetic_stream(3, 800);
    for pair in ticks.chunks_mut(2) {
        if pair.len() == 2 {
            pair.swap(0, 1);
        }
    }

    let uninterrupted = tickbar_pipeline::run(cfg.clone(), &ticks).unwrap();
    for cut in [2, 401, 799] {
        assert_eq!(uninterrupted, run_with_checkpoint(cfg.clone(), &ticks, cut));
    }
}

#[test]
fn checkpoint_carries_stats() {
    init_tracing();
    let ticks = synthetic_stream(1, 200);
    let mut pipeline = Pipeline::new(config(all_specs()[3].clone())).unwrap();
    for tick in &ticks {
        let _ = pipeline.process_tick(tick);
    }
    let restored = Pipeline::from_checkpoint(&pipeline.checkpoint().unwrap()).unwrap();
    assert_eq!(restored.stats(), pipeline.stats());
    assert_eq!(
        restored.builder().bars_emitted(),
        pipeline.builder().bars_emitted()
    );
}

#[test]
fn corrupt_checkpoint_is_an_error() {
    assert!(Pipeline::from_checkpoint("{\"version\":1}").is_err());
    assert!(Pipeline::from_checkpoint("not json").is_err());
}
