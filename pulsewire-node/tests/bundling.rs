//! Exercises grid scheduling and source sampling together the way
//! `main`'s loop composes them, without any socket I/O.

use std::sync::atomic::AtomicBool;

use pulsewire_node::grid::SampleGrid;
use pulsewire_node::source::{SampleSource, SyntheticPulse};
use pulsewire_wire::{PpgBundle, DEFAULT_BUNDLE_SIZE, SAMPLE_MAX, SAMPLE_MIN};

fn collect_bundles(ticks: usize, bundle_size: usize) -> Vec<PpgBundle> {
    let mut grid = SampleGrid::new(20);
    let mut source = SyntheticPulse::new(50, 75.0, 800.0);
    let running = AtomicBool::new(true);
    let mut pending: Vec<(i64, u16)> = Vec::new();
    let mut bundles = Vec::new();

    for _ in 0..ticks {
        let (_, timestamp_ms) = grid.next_tick(&running).expect("grid running");
        let raw = source.read();
        pending.push((timestamp_ms, raw));
        if pending.len() == bundle_size {
            let first_timestamp_ms = pending[0].0;
            let samples: Vec<u16> = pending.iter().map(|&(_, v)| v).collect();
            bundles.push(PpgBundle::new(0, first_timestamp_ms, samples));
            pending.clear();
        }
    }
    bundles
}

#[test]
fn bundles_carry_the_scheduled_timestamp_of_their_first_sample() {
    let bundles = collect_bundles(DEFAULT_BUNDLE_SIZE * 4, DEFAULT_BUNDLE_SIZE);
    assert_eq!(bundles.len(), 4);
    for (i, bundle) in bundles.iter().enumerate() {
        let expected_timestamp_ms = (i * DEFAULT_BUNDLE_SIZE) as i64 * 20;
        assert_eq!(bundle.first_sample_timestamp_ms, expected_timestamp_ms);
        assert_eq!(bundle.samples.len(), DEFAULT_BUNDLE_SIZE);
    }
}

#[test]
fn bundles_round_trip_through_the_wire_codec() {
    let bundles = collect_bundles(DEFAULT_BUNDLE_SIZE, DEFAULT_BUNDLE_SIZE);
    let bundle = &bundles[0];
    let encoded = bundle.encode();
    let decoded = PpgBundle::decode(&encoded, DEFAULT_BUNDLE_SIZE).expect("valid bundle decodes");
    assert_eq!(&decoded, bundle);
    for &sample in &decoded.samples {
        assert!(sample as i32 >= SAMPLE_MIN && sample as i32 <= SAMPLE_MAX);
    }
}

#[test]
fn expanded_samples_form_an_even_grid_matching_the_sample_interval() {
    let bundles = collect_bundles(DEFAULT_BUNDLE_SIZE, DEFAULT_BUNDLE_SIZE);
    let expanded = bundles[0].expand(20);
    for pair in expanded.windows(2) {
        assert_eq!(pair[1].0 - pair[0].0, 20);
    }
}
