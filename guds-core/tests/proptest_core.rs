//! Property-Based Tests for GUDS Core
//!
//! Budget admission, bearing classification and aggregate rebuilds under
//! random inputs.

use proptest::prelude::*;

use guds_core::bank::{AudioCue, BankCollection, BankData, GudAction, GudLine, LoadedAsset};
use guds_core::budget::MemoryReport;
use guds_core::config::DirectionalConfig;
use guds_core::selection::direction::{classify, Direction};
use guds_core::types::{ActionId, BankSlot, GameTime};
use vek::Vec3;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_report() -> impl Strategy<Value = MemoryReport> {
    (0u64..1_000_000, 0u64..1_000_000, 0u64..2_000_000, 0usize..64).prop_map(
        |(used, in_flight, budget, loaded_slots)| MemoryReport {
            used,
            in_flight,
            budget,
            loaded_slots,
        },
    )
}

/// A variety with `n` voiced lines, all under action 0.
fn arb_variety() -> impl Strategy<Value = BankData> {
    (1usize..6, 0u32..1000).prop_map(|(n, tag)| BankData {
        lines: (0..n)
            .map(|i| GudLine {
                audio: Some(AudioCue {
                    id: format!("v{tag}_{i}"),
                    duration: 1.0,
                }),
                ..GudLine::default()
            })
            .collect(),
        actions: vec![GudAction {
            lines: (0..n).collect(),
            ..GudAction::default()
        }],
        side_asset: None,
    })
}

fn root() -> BankData {
    BankData {
        lines: vec![GudLine::default(), GudLine::default()],
        actions: vec![GudAction::default()],
        side_asset: None,
    }
}

// ---------------------------------------------------------------------------
// Property: an admitted variety never overshoots the budget once it lands
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn admission_never_overshoots(report in arb_report(), size in 0u64..500_000) {
        if report.admits(size) {
            prop_assert!(size > 0);
            prop_assert!(report.used + report.in_flight + size <= report.budget);
        }
        prop_assert!(!report.admits(0));
    }
}

// ---------------------------------------------------------------------------
// Property: bearing classes agree with the half-planes they name
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn bearing_classes_match_geometry(
        x in -100.0..100.0f32,
        y in -100.0..100.0f32,
        z in -100.0..100.0f32,
    ) {
        let thresholds = DirectionalConfig::default();
        let direction = classify(Vec3::zero(), Vec3::unit_x(), Vec3::new(x, y, z), &thresholds);
        match direction {
            Direction::Behind => prop_assert!(x < 0.0),
            Direction::Above => prop_assert!(z > 0.0),
            Direction::Below => prop_assert!(z <= 0.0),
            Direction::Ahead => prop_assert!(x > 0.0),
            Direction::Left => prop_assert!(y > 0.0),
            Direction::Right => prop_assert!(y <= 0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the aggregate is exactly root plus what is loaded
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn aggregate_tracks_loaded_varieties(
        varieties in prop::collection::vec(arb_variety(), 1..5),
        unload_mask in prop::collection::vec(any::<bool>(), 5),
    ) {
        let mut collection = BankCollection::new(varieties.len() + 1);
        collection.insert(BankSlot::Root, LoadedAsset { data: root(), loaded_at: GameTime(0.0) });
        for (v, data) in varieties.iter().enumerate() {
            collection.insert(
                BankSlot::Variety(v),
                LoadedAsset { data: data.clone(), loaded_at: GameTime(v as f64) },
            );
        }

        let longest = varieties.iter().map(|d| d.lines.len()).max().unwrap_or(0);
        prop_assert_eq!(
            collection.aggregate().line_pool(ActionId(0), false).len(),
            longest
        );

        for (v, unload) in unload_mask.iter().take(varieties.len()).enumerate() {
            if *unload {
                prop_assert!(collection.remove_variety(v).is_some());
            }
        }
        let kept: Vec<usize> = (0..varieties.len())
            .filter(|v| !unload_mask[*v])
            .collect();
        prop_assert_eq!(collection.loaded_varieties(), kept.clone());

        // The first kept variety supplies the silent root lines.
        let aggregate = collection.aggregate();
        match kept.first() {
            Some(&first) => prop_assert_eq!(
                aggregate.lines[0].audio_id(),
                varieties[first].lines[0].audio_id()
            ),
            None => prop_assert_eq!(aggregate, &root()),
        }
    }
}
