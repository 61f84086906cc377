//! Arrow-backed table layer
//!
//! The input table carries one row per mixture with genuine array-typed
//! columns (no stringified lists): `IL_id`, `solute_id`, `ref_id[]`,
//! optional `entry_id[]`, `original_index[]`, `temperature[]`,
//! `gamma[]`. Missing columns or wrong column types are batch-fatal;
//! ragged or null array cells fail only their own mixture.
//!
//! The output table materializes every group slot up to the widest
//! mixture in the batch: member arrays, regression fields, pairwise Chow
//! columns, agreement tallies, and the selected group. Group identity
//! lives in explicit integer-indexed slots, never parsed back out of
//! column names.

use crate::chow::ChowOutcome;
use crate::model::{ActivityRow, MeasurementRecord, MixtureKey, MixtureRecord};
use crate::pipeline::{MixtureFailure, MixtureResolution};
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanBuilder, Float64Array, Float64Builder, Int64Array, Int64Builder,
    ListArray, ListBuilder, RecordBatch, StringBuilder, UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Schema of the per-mixture input table.
///
/// `with_entry_id` adds the optional `entry_id` list column used by the
/// within-source conflict class.
#[must_use]
pub fn mixture_schema(with_entry_id: bool) -> Schema {
    let mut fields = vec![
        Field::new("IL_id", DataType::Int64, false),
        Field::new("solute_id", DataType::Int64, false),
        int64_list_field("ref_id"),
    ];
    if with_entry_id {
        fields.push(int64_list_field("entry_id"));
    }
    fields.extend([
        int64_list_field("original_index"),
        float64_list_field("temperature"),
        float64_list_field("gamma"),
    ]);
    Schema::new(fields)
}

fn int64_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Int64, true))),
        true,
    )
}

fn float64_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        true,
    )
}

/// Parse mixtures out of an input batch.
///
/// Returns the well-formed mixtures plus per-mixture failures (ragged or
/// null array cells). Structural problems — a missing column or a wrong
/// column type — are batch-fatal instead.
///
/// # Errors
///
/// Returns [`Error::Schema`] before any per-mixture work when the batch
/// does not match [`mixture_schema`].
pub fn read_mixtures(batch: &RecordBatch) -> Result<(Vec<MixtureRecord>, Vec<MixtureFailure>)> {
    let il = int64_column(batch, "IL_id")?;
    let solute = int64_column(batch, "solute_id")?;
    let ref_ids = list_column(batch, "ref_id", &DataType::Int64)?;
    let entry_ids = optional_list_column(batch, "entry_id", &DataType::Int64)?;
    let original = list_column(batch, "original_index", &DataType::Int64)?;
    let temperature = list_column(batch, "temperature", &DataType::Float64)?;
    let gamma = list_column(batch, "gamma", &DataType::Float64)?;

    let mut mixtures = Vec::with_capacity(batch.num_rows());
    let mut failures = Vec::new();

    for row in 0..batch.num_rows() {
        let key = MixtureKey::new(il.value(row), solute.value(row));
        match read_row(
            key,
            row,
            ref_ids,
            entry_ids,
            original,
            temperature,
            gamma,
        ) {
            Ok(mixture) => mixtures.push(mixture),
            Err(err) => failures.push(MixtureFailure {
                key,
                reason: err.to_string(),
                measurements: Vec::new(),
            }),
        }
    }

    Ok((mixtures, failures))
}

#[allow(clippy::too_many_arguments)]
fn read_row(
    key: MixtureKey,
    row: usize,
    ref_ids: &ListArray,
    entry_ids: Option<&ListArray>,
    original: &ListArray,
    temperature: &ListArray,
    gamma: &ListArray,
) -> Result<MixtureRecord> {
    let refs = int64_cell(key, ref_ids, row, "ref_id")?;
    let indices = int64_cell(key, original, row, "original_index")?;
    let temps = float64_cell(key, temperature, row, "temperature")?;
    let gammas = float64_cell(key, gamma, row, "gamma")?;
    let entries = match entry_ids {
        Some(col) if !col.is_null(row) => Some(int64_cell(key, col, row, "entry_id")?),
        _ => None,
    };

    let n = refs.len();
    let lengths_ok = indices.len() == n
        && temps.len() == n
        && gammas.len() == n
        && entries.as_ref().map_or(true, |e| e.len() == n);
    if !lengths_ok {
        return Err(Error::RaggedMixture {
            il_id: key.il_id,
            solute_id: key.solute_id,
            detail: format!(
                "ref_id={}, original_index={}, temperature={}, gamma={}{}",
                n,
                indices.len(),
                temps.len(),
                gammas.len(),
                entries
                    .as_ref()
                    .map_or_else(String::new, |e| format!(", entry_id={}", e.len())),
            ),
        });
    }

    let measurements = (0..n)
        .map(|i| {
            let mut m = MeasurementRecord::new(indices[i], refs[i], temps[i], gammas[i]);
            if let Some(entries) = &entries {
                m = m.with_entry_id(entries[i]);
            }
            m
        })
        .collect();
    Ok(MixtureRecord::new(key, measurements))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| Error::Schema(format!("column '{name}' must be Int64")))
}

fn list_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    inner: &DataType,
) -> Result<&'a ListArray> {
    optional_list_column(batch, name, inner)?
        .ok_or_else(|| Error::Schema(format!("missing column '{name}'")))
}

fn optional_list_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    inner: &DataType,
) -> Result<Option<&'a ListArray>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let list = column
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| Error::Schema(format!("column '{name}' must be a List")))?;
    match list.data_type() {
        DataType::List(field) if field.data_type() == inner => Ok(Some(list)),
        other => Err(Error::Schema(format!(
            "column '{name}' must be List<{inner}>, got {other}"
        ))),
    }
}

fn int64_cell(key: MixtureKey, list: &ListArray, row: usize, name: &str) -> Result<Vec<i64>> {
    let values = cell_values(key, list, row, name)?;
    let array = values
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| Error::Schema(format!("column '{name}' must be List<Int64>")))?;
    collect_non_null(key, array.iter(), name)
}

fn float64_cell(key: MixtureKey, list: &ListArray, row: usize, name: &str) -> Result<Vec<f64>> {
    let values = cell_values(key, list, row, name)?;
    let array = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Schema(format!("column '{name}' must be List<Float64>")))?;
    collect_non_null(key, array.iter(), name)
}

fn cell_values(key: MixtureKey, list: &ListArray, row: usize, name: &str) -> Result<ArrayRef> {
    if list.is_null(row) {
        return Err(Error::RaggedMixture {
            il_id: key.il_id,
            solute_id: key.solute_id,
            detail: format!("'{name}' cell is null"),
        });
    }
    Ok(list.value(row))
}

fn collect_non_null<T>(
    key: MixtureKey,
    iter: impl Iterator<Item = Option<T>>,
    name: &str,
) -> Result<Vec<T>> {
    iter.collect::<Option<Vec<T>>>()
        .ok_or_else(|| Error::RaggedMixture {
            il_id: key.il_id,
            solute_id: key.solute_id,
            detail: format!("'{name}' cell contains a null element"),
        })
}

/// Build the output batch: one row per resolution, group slots up to the
/// widest mixture, pairwise Chow columns, agreement tallies, and
/// `selected_group`.
///
/// # Errors
///
/// Returns [`Error::Arrow`] if batch assembly fails (schema/column
/// mismatch would be a bug in this module).
pub fn resolutions_to_batch(resolutions: &[MixtureResolution]) -> Result<RecordBatch> {
    let max_groups = resolutions
        .iter()
        .map(|r| r.groups.group_count())
        .max()
        .unwrap_or(0);

    let mut fields: Vec<Field> = vec![
        Field::new("IL_id", DataType::Int64, false),
        Field::new("solute_id", DataType::Int64, false),
    ];

    let mut il = Int64Builder::new();
    let mut solute = Int64Builder::new();
    for r in resolutions {
        il.append_value(r.key.il_id);
        solute.append_value(r.key.solute_id);
    }
    let mut columns: Vec<ArrayRef> = vec![Arc::new(il.finish()), Arc::new(solute.finish())];

    // Per-group member arrays and regression fields.
    for g in 0..max_groups {
        let mut ref_ids = ListBuilder::new(Int64Builder::new());
        let mut indices = ListBuilder::new(Int64Builder::new());
        let mut temps = ListBuilder::new(Float64Builder::new());
        let mut gammas = ListBuilder::new(Float64Builder::new());
        let mut slope = Float64Builder::new();
        let mut intercept = Float64Builder::new();
        let mut r2 = Float64Builder::new();

        for r in resolutions {
            match r.groups.groups.get(g) {
                Some(group) => {
                    for m in &group.members {
                        ref_ids.values().append_value(m.reference_id);
                        indices.values().append_value(m.original_index);
                        temps.values().append_value(m.temperature);
                        gammas.values().append_value(m.property_value);
                    }
                    ref_ids.append(true);
                    indices.append(true);
                    temps.append(true);
                    gammas.append(true);
                    let fit = r.fits[g];
                    slope.append_option(fit.map(|f| f.slope));
                    intercept.append_option(fit.map(|f| f.intercept));
                    r2.append_option(fit.map(|f| f.r_squared));
                }
                None => {
                    ref_ids.append(false);
                    indices.append(false);
                    temps.append(false);
                    gammas.append(false);
                    slope.append_null();
                    intercept.append_null();
                    r2.append_null();
                }
            }
        }

        fields.extend([
            int64_list_field(&format!("ref_id_group_{g}")),
            int64_list_field(&format!("original_index_group_{g}")),
            float64_list_field(&format!("temperature_group_{g}")),
            float64_list_field(&format!("gamma_group_{g}")),
            Field::new(format!("slope_group_{g}"), DataType::Float64, true),
            Field::new(format!("intercept_group_{g}"), DataType::Float64, true),
            Field::new(format!("r2_group_{g}"), DataType::Float64, true),
        ]);
        columns.extend([
            Arc::new(ref_ids.finish()) as ArrayRef,
            Arc::new(indices.finish()) as ArrayRef,
            Arc::new(temps.finish()) as ArrayRef,
            Arc::new(gammas.finish()) as ArrayRef,
            Arc::new(slope.finish()) as ArrayRef,
            Arc::new(intercept.finish()) as ArrayRef,
            Arc::new(r2.finish()) as ArrayRef,
        ]);
    }

    // Pairwise Chow columns.
    for g1 in 0..max_groups {
        for g2 in (g1 + 1)..max_groups {
            let mut f_stat = Float64Builder::new();
            let mut p_value = Float64Builder::new();
            let mut significant = BooleanBuilder::new();

            for r in resolutions {
                let outcome = pair_outcome(r, g1, g2);
                f_stat.append_option(outcome.map(|o| o.f_statistic));
                p_value.append_option(outcome.map(|o| o.p_value));
                significant.append_option(outcome.map(|o| o.significant));
            }

            fields.extend([
                Field::new(format!("F_group_{g1}_{g2}"), DataType::Float64, true),
                Field::new(format!("p_group_{g1}_{g2}"), DataType::Float64, true),
                Field::new(
                    format!("significant_group_{g1}_{g2}"),
                    DataType::Boolean,
                    true,
                ),
            ]);
            columns.extend([
                Arc::new(f_stat.finish()) as ArrayRef,
                Arc::new(p_value.finish()) as ArrayRef,
                Arc::new(significant.finish()) as ArrayRef,
            ]);
        }
    }

    // Agreement tallies and the selection.
    for g in 0..max_groups {
        let mut agreement = UInt32Builder::new();
        for r in resolutions {
            agreement.append_option(r.selection.agreement.get(g).copied());
        }
        fields.push(Field::new(
            format!("agreement_count_group_{g}"),
            DataType::UInt32,
            true,
        ));
        columns.push(Arc::new(agreement.finish()) as ArrayRef);
    }

    let mut selected = Int64Builder::new();
    for r in resolutions {
        selected.append_option(r.selection.selected.map(|g| g as i64));
    }
    fields.push(Field::new("selected_group", DataType::Int64, true));
    columns.push(Arc::new(selected.finish()) as ArrayRef);

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Error::Arrow)
}

fn pair_outcome(r: &MixtureResolution, g1: usize, g2: usize) -> Option<ChowOutcome> {
    r.verdicts
        .iter()
        .find(|v| v.g1 == g1 && v.g2 == g2)
        .and_then(|v| v.outcome)
}

/// Build the failure artifact: one row per excluded mixture with its key,
/// the rendered reason, and the original measurement arrays.
///
/// # Errors
///
/// Returns [`Error::Arrow`] if batch assembly fails.
pub fn failures_to_batch(failures: &[MixtureFailure]) -> Result<RecordBatch> {
    let mut il = Int64Builder::new();
    let mut solute = Int64Builder::new();
    let mut reason = StringBuilder::new();
    let mut ref_ids = ListBuilder::new(Int64Builder::new());
    let mut indices = ListBuilder::new(Int64Builder::new());
    let mut temps = ListBuilder::new(Float64Builder::new());
    let mut gammas = ListBuilder::new(Float64Builder::new());

    for f in failures {
        il.append_value(f.key.il_id);
        solute.append_value(f.key.solute_id);
        reason.append_value(&f.reason);
        for m in &f.measurements {
            ref_ids.values().append_value(m.reference_id);
            indices.values().append_value(m.original_index);
            temps.values().append_value(m.temperature);
            gammas.values().append_value(m.property_value);
        }
        ref_ids.append(true);
        indices.append(true);
        temps.append(true);
        gammas.append(true);
    }

    let schema = Schema::new(vec![
        Field::new("IL_id", DataType::Int64, false),
        Field::new("solute_id", DataType::Int64, false),
        Field::new("reason", DataType::Utf8, false),
        int64_list_field("ref_id"),
        int64_list_field("original_index"),
        float64_list_field("temperature"),
        float64_list_field("gamma"),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(il.finish()),
            Arc::new(solute.finish()),
            Arc::new(reason.finish()),
            Arc::new(ref_ids.finish()),
            Arc::new(indices.finish()),
            Arc::new(temps.finish()),
            Arc::new(gammas.finish()),
        ],
    )
    .map_err(Error::Arrow)
}

/// Parse the row-level activity table consumed by the index reconciler.
///
/// # Errors
///
/// Returns [`Error::Schema`] when a required column is missing or
/// wrongly typed.
pub fn read_activity_rows(batch: &RecordBatch) -> Result<Vec<ActivityRow>> {
    let original = int64_column(batch, "original_index")?;
    let il = int64_column(batch, "IL_id")?;
    let solute = int64_column(batch, "solute_id")?;
    let reference = int64_column(batch, "ref_id")?;
    let temperature = float64_column(batch, "temperature")?;
    let gamma = float64_column(batch, "gamma")?;

    Ok((0..batch.num_rows())
        .map(|i| ActivityRow {
            original_index: original.value(i),
            il_id: il.value(i),
            solute_id: solute.value(i),
            reference_id: reference.value(i),
            temperature: temperature.value(i),
            property_value: gamma.value(i),
        })
        .collect())
}

fn float64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Schema(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Schema(format!("column '{name}' must be Float64")))
}

/// Serialize the reconciled row-level table back to a batch.
///
/// # Errors
///
/// Returns [`Error::Arrow`] if batch assembly fails.
pub fn activity_rows_to_batch(rows: &[ActivityRow]) -> Result<RecordBatch> {
    let mut original = Int64Builder::new();
    let mut il = Int64Builder::new();
    let mut solute = Int64Builder::new();
    let mut reference = Int64Builder::new();
    let mut temperature = Float64Builder::new();
    let mut gamma = Float64Builder::new();
    for r in rows {
        original.append_value(r.original_index);
        il.append_value(r.il_id);
        solute.append_value(r.solute_id);
        reference.append_value(r.reference_id);
        temperature.append_value(r.temperature);
        gamma.append_value(r.property_value);
    }
    let schema = Schema::new(vec![
        Field::new("original_index", DataType::Int64, false),
        Field::new("IL_id", DataType::Int64, false),
        Field::new("solute_id", DataType::Int64, false),
        Field::new("ref_id", DataType::Int64, false),
        Field::new("temperature", DataType::Float64, false),
        Field::new("gamma", DataType::Float64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(original.finish()),
            Arc::new(il.finish()),
            Arc::new(solute.finish()),
            Arc::new(reference.finish()),
            Arc::new(temperature.finish()),
            Arc::new(gamma.finish()),
        ],
    )
    .map_err(Error::Arrow)
}

/// Load record batches from a Parquet file.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the file cannot be read or parsed.
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path.as_ref())
        .map_err(|e| Error::Storage(format!("Failed to open Parquet file: {e}")))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Storage(format!("Failed to parse Parquet file: {e}")))?;
    let reader = builder
        .build()
        .map_err(|e| Error::Storage(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Storage(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }
    Ok(batches)
}

/// Write record batches to a Parquet file.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the file cannot be written.
pub fn write_parquet<P: AsRef<Path>>(path: P, batches: &[RecordBatch]) -> Result<()> {
    use parquet::arrow::ArrowWriter;
    use std::fs::File;

    let Some(first) = batches.first() else {
        return Err(Error::Storage("no batches to write".to_string()));
    };
    let file = File::create(path.as_ref())
        .map_err(|e| Error::Storage(format!("Failed to create Parquet file: {e}")))?;
    let mut writer = ArrowWriter::try_new(file, first.schema(), None)
        .map_err(|e| Error::Storage(format!("Failed to create Parquet writer: {e}")))?;
    for batch in batches {
        writer
            .write(batch)
            .map_err(|e| Error::Storage(format!("Failed to write record batch: {e}")))?;
    }
    writer
        .close()
        .map_err(|e| Error::Storage(format!("Failed to close Parquet writer: {e}")))?;
    Ok(())
}
