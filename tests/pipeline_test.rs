//! End-to-end resolution tests: Arrow input table → grouping →
//! regression → Chow testing → selection → output table.

use arrow::array::{Array, Float64Builder, Int64Array, Int64Builder, ListBuilder, RecordBatch};
use gamma_consensus::grouping::canonicalize_entry_ids;
use gamma_consensus::model::{GroupKind, MixtureKey, MixtureRecord};
use gamma_consensus::table::{
    failures_to_batch, mixture_schema, read_mixtures, resolutions_to_batch,
};
use gamma_consensus::{ConsensusResolver, PartitionKey, ResolverConfig};
use std::sync::Arc;

/// One measurement: (original_index, ref_id, temperature, gamma).
type Point = (i64, i64, f64, f64);

fn input_batch(rows: &[(MixtureKey, Vec<Point>)]) -> RecordBatch {
    let mut il = Int64Builder::new();
    let mut solute = Int64Builder::new();
    let mut ref_ids = ListBuilder::new(Int64Builder::new());
    let mut indices = ListBuilder::new(Int64Builder::new());
    let mut temps = ListBuilder::new(Float64Builder::new());
    let mut gammas = ListBuilder::new(Float64Builder::new());

    for (key, points) in rows {
        il.append_value(key.il_id);
        solute.append_value(key.solute_id);
        for &(idx, rid, t, g) in points {
            indices.values().append_value(idx);
            ref_ids.values().append_value(rid);
            temps.values().append_value(t);
            gammas.values().append_value(g);
        }
        ref_ids.append(true);
        indices.append(true);
        temps.append(true);
        gammas.append(true);
    }

    RecordBatch::try_new(
        Arc::new(mixture_schema(false)),
        vec![
            Arc::new(il.finish()),
            Arc::new(solute.finish()),
            Arc::new(ref_ids.finish()),
            Arc::new(indices.finish()),
            Arc::new(temps.finish()),
            Arc::new(gammas.finish()),
        ],
    )
    .unwrap()
}

/// Input batch carrying the optional `entry_id` list column; `None`
/// leaves a mixture's entry cell null.
fn entry_input_batch(rows: &[(MixtureKey, Vec<Point>, Option<Vec<i64>>)]) -> RecordBatch {
    let mut il = Int64Builder::new();
    let mut solute = Int64Builder::new();
    let mut ref_ids = ListBuilder::new(Int64Builder::new());
    let mut entries = ListBuilder::new(Int64Builder::new());
    let mut indices = ListBuilder::new(Int64Builder::new());
    let mut temps = ListBuilder::new(Float64Builder::new());
    let mut gammas = ListBuilder::new(Float64Builder::new());

    for (key, points, entry_ids) in rows {
        il.append_value(key.il_id);
        solute.append_value(key.solute_id);
        for &(idx, rid, t, g) in points {
            indices.values().append_value(idx);
            ref_ids.values().append_value(rid);
            temps.values().append_value(t);
            gammas.values().append_value(g);
        }
        ref_ids.append(true);
        indices.append(true);
        temps.append(true);
        gammas.append(true);
        match entry_ids {
            Some(ids) => {
                for &e in ids {
                    entries.values().append_value(e);
                }
                entries.append(true);
            }
            None => entries.append(false),
        }
    }

    RecordBatch::try_new(
        Arc::new(mixture_schema(true)),
        vec![
            Arc::new(il.finish()),
            Arc::new(solute.finish()),
            Arc::new(ref_ids.finish()),
            Arc::new(entries.finish()),
            Arc::new(indices.finish()),
            Arc::new(temps.finish()),
            Arc::new(gammas.finish()),
        ],
    )
    .unwrap()
}

/// Points tracing ln(gamma) = intercept + slope / T with per-point noise.
fn series(ref_id: i64, start: i64, slope: f64, intercept: f64, noise: &[f64]) -> Vec<Point> {
    noise
        .iter()
        .enumerate()
        .map(|(i, &eps)| {
            let t = 280.0 + 5.0 * i as f64;
            (start + i as i64, ref_id, t, (intercept + slope / t + eps).exp())
        })
        .collect()
}

const NOISE_A: [f64; 10] = [
    0.009, -0.006, 0.004, -0.010, 0.007, -0.002, 0.008, -0.009, 0.003, -0.005,
];
const NOISE_B: [f64; 4] = [-0.012, 0.011, -0.004, 0.008];
const NOISE_C: [f64; 6] = [0.005, -0.007, 0.009, -0.003, 0.006, -0.010];

fn resolver(min_group_size: usize) -> ConsensusResolver {
    let config = ResolverConfig::builder()
        .min_group_size(min_group_size)
        .build()
        .unwrap();
    ConsensusResolver::new(config, PartitionKey::Reference).unwrap()
}

/// Three groups, sample counts [10, 4, 6]: groups 0 and 1 trace the same
/// physical line, group 2 a different one. Agreement lands at
/// {0: 1, 1: 1, 2: 0} and the 0/1 tie resolves through the cascade.
#[test]
fn test_three_group_consensus_scenario() {
    let mut points = series(10, 0, 800.0, 0.5, &NOISE_A);
    // Same trend, noisier (4 samples): agrees with group 0
    points.extend(series(20, 100, 800.0, 0.5, &NOISE_B));
    // Distinct trend (6 samples): disagrees with both
    points.extend(series(30, 200, -1500.0, 6.0, &NOISE_C));

    let batch = input_batch(&[(MixtureKey::new(1, 2), points)]);
    let (mixtures, failures) = read_mixtures(&batch).unwrap();
    assert!(failures.is_empty());

    let outcome = resolver(3).resolve_all(&mixtures);
    assert_eq!(outcome.resolutions.len(), 1);
    let resolution = &outcome.resolutions[0];

    assert_eq!(resolution.groups.group_count(), 3);
    assert_eq!(resolution.selection.agreement, vec![1, 1, 0]);
    // Group 0 has the cleanest fit and the most samples
    assert_eq!(resolution.selection.selected, Some(0));
}

/// A mixture with exactly one source has no testable pair; the general
/// fit's R² gate arbitrates, and the sole eligible group short-circuits.
#[test]
fn test_single_reference_gate_pass() {
    let points = series(10, 0, 800.0, 0.5, &NOISE_C);
    let batch = input_batch(&[(MixtureKey::new(3, 4), points)]);
    let (mixtures, _) = read_mixtures(&batch).unwrap();

    let outcome = resolver(5).resolve_all(&mixtures);
    let resolution = &outcome.resolutions[0];
    // Uniform (zero) agreement across the board
    assert!(resolution.selection.agreement.iter().all(|&c| c == 0));
    assert_eq!(resolution.selection.selected, Some(0));
}

/// Same shape but data that does not follow the physical model: the
/// general R² fails the gate and the mixture is marked "no consensus"
/// while remaining in the output.
#[test]
fn test_single_reference_gate_fail() {
    // Saw-tooth gammas: no linear trend in 1/T
    let points: Vec<Point> = (0..6)
        .map(|i| {
            let t = 280.0 + 5.0 * f64::from(i);
            let gamma = if i % 2 == 0 { 5.0 } else { 0.2 };
            (i64::from(i), 10, t, gamma)
        })
        .collect();
    let batch = input_batch(&[(MixtureKey::new(5, 6), points)]);
    let (mixtures, _) = read_mixtures(&batch).unwrap();

    let outcome = resolver(5).resolve_all(&mixtures);
    assert_eq!(outcome.resolutions.len(), 1);
    assert_eq!(outcome.resolutions[0].selection.selected, None);
    assert_eq!(outcome.summary.no_consensus, 1);
}

/// Identical inputs resolve identically no matter how the batch is
/// ordered or scheduled.
#[test]
fn test_determinism_across_orderings() {
    let mixtures: Vec<MixtureRecord> = (0..16)
        .map(|i| {
            let mut points = series(10, 0, 800.0, 0.5, &NOISE_A);
            points.extend(series(20, 100, 800.0, 0.5, &NOISE_A));
            let batch = input_batch(&[(MixtureKey::new(i, i + 50), points)]);
            read_mixtures(&batch).unwrap().0.remove(0)
        })
        .collect();

    let resolver = resolver(5);
    let forward = resolver.resolve_all(&mixtures);

    let mut reversed_input = mixtures.clone();
    reversed_input.reverse();
    let reversed = resolver.resolve_all(&reversed_input);

    for resolution in &forward.resolutions {
        let twin = reversed
            .resolutions
            .iter()
            .find(|r| r.key == resolution.key)
            .unwrap();
        assert_eq!(resolution.selection, twin.selection);
        assert_eq!(resolution.fits, twin.fits);
    }
}

/// Every selected index must come from that mixture's general group.
#[test]
fn test_selected_indices_trace_back_to_general_group() {
    let mut points = series(10, 0, 800.0, 0.5, &NOISE_A);
    points.extend(series(20, 100, -900.0, 4.0, &NOISE_C));
    let batch = input_batch(&[(MixtureKey::new(9, 9), points)]);
    let (mixtures, _) = read_mixtures(&batch).unwrap();

    let outcome = resolver(5).resolve_all(&mixtures);
    for resolution in &outcome.resolutions {
        if let Some(indices) = resolution.selected_indices() {
            let general = resolution.groups.general.original_indices();
            for idx in indices {
                assert!(general.contains(&idx), "index {idx} not in general group");
            }
        }
    }
}

/// The within-source class end to end: ingest the `entry_id` list
/// column, canonicalize raw entry ids to 1-based codes, and resolve
/// with entry-keyed partitioning. A mixture whose entry cell is null
/// fails at partition time instead of poisoning the batch.
#[test]
fn test_entry_keyed_ingestion_end_to_end() {
    // One source, two internally consistent entry runs on distinct lines
    let mut points = series(10, 0, 800.0, 0.5, &NOISE_A[..5]);
    points.extend(series(10, 100, -1500.0, 6.0, &NOISE_C[..5]));
    let entries: Vec<i64> = std::iter::repeat(900)
        .take(5)
        .chain(std::iter::repeat(55).take(5))
        .collect();
    let keyed = (MixtureKey::new(1, 2), points, Some(entries));
    let unkeyed = (
        MixtureKey::new(3, 4),
        series(10, 200, 800.0, 0.5, &NOISE_C),
        None,
    );

    let batch = entry_input_batch(&[keyed, unkeyed]);
    let (mut mixtures, parse_failures) = read_mixtures(&batch).unwrap();
    assert!(parse_failures.is_empty());
    assert_eq!(mixtures[0].measurements[0].entry_id, Some(900));
    assert_eq!(mixtures[0].measurements[5].entry_id, Some(55));
    assert_eq!(mixtures[1].measurements[0].entry_id, None);

    // Raw ids 900 and 55 become codes 2 and 1 (codes ordered by raw id)
    let raw = canonicalize_entry_ids(&mut mixtures);
    assert_eq!(raw, vec![55, 900]);
    assert_eq!(mixtures[0].measurements[0].entry_id, Some(2));
    assert_eq!(mixtures[0].measurements[5].entry_id, Some(1));

    let resolver =
        ConsensusResolver::new(ResolverConfig::default(), PartitionKey::Entry).unwrap();
    let outcome = resolver.resolve_all(&mixtures);
    assert_eq!(outcome.resolutions.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, MixtureKey::new(3, 4));
    assert!(outcome.failures[0].reason.contains("entry_id"));

    let resolution = &outcome.resolutions[0];
    assert_eq!(resolution.groups.group_count(), 2);
    // First-encounter order: code 2 (raw 900) appears first in the data
    assert_eq!(resolution.groups.groups[0].kind, GroupKind::PerSource(2));
    assert_eq!(resolution.groups.groups[1].kind, GroupKind::PerSource(1));
    // The two runs trace opposite trends: the pair is significant
    assert_eq!(resolution.selection.agreement, vec![0, 0]);
    // Mixed general fit fails the gate: no consensus within this source
    assert_eq!(resolution.selection.selected, None);
}

/// Non-positive values fail their mixture into the failure artifact
/// without touching the rest of the batch.
#[test]
fn test_failure_artifact_round_trip() {
    let good = (MixtureKey::new(1, 2), series(10, 0, 800.0, 0.5, &NOISE_C));
    let mut bad_points = series(20, 100, 800.0, 0.5, &NOISE_C);
    bad_points[2].2 = 0.0; // zero Kelvin
    let bad = (MixtureKey::new(3, 4), bad_points);

    let batch = input_batch(&[good, bad]);
    let (mixtures, parse_failures) = read_mixtures(&batch).unwrap();
    assert!(parse_failures.is_empty());

    let outcome = resolver(5).resolve_all(&mixtures);
    assert_eq!(outcome.resolutions.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, MixtureKey::new(3, 4));

    let artifact = failures_to_batch(&outcome.failures).unwrap();
    assert_eq!(artifact.num_rows(), 1);
    // Context survives: all five original temperatures, including the bad one
    let temps = artifact
        .column_by_name("temperature")
        .unwrap()
        .as_any()
        .downcast_ref::<arrow::array::ListArray>()
        .unwrap()
        .value(0);
    assert_eq!(temps.len(), 6);
}

/// The output table exposes the selection per mixture.
#[test]
fn test_output_table_selected_group_column() {
    let mut points = series(10, 0, 800.0, 0.5, &NOISE_A);
    points.extend(series(20, 100, 800.0, 0.5, &NOISE_B));
    let batch = input_batch(&[(MixtureKey::new(1, 2), points)]);
    let (mixtures, _) = read_mixtures(&batch).unwrap();

    let outcome = resolver(3).resolve_all(&mixtures);
    let output = resolutions_to_batch(&outcome.resolutions).unwrap();

    let selected = output
        .column_by_name("selected_group")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert!(!selected.is_null(0));
    let expected = outcome.resolutions[0].selection.selected.unwrap() as i64;
    assert_eq!(selected.value(0), expected);
}
