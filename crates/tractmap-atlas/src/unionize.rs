// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Unionized measurement rows and per-experiment measurement tables.

A unionize row summarises one experiment's signal inside one structure and
hemisphere: the structure volume covered, the coordinates of the voxel with
maximal signal, and any number of named projection metrics.

## CSV layout

```text
structure_id,hemisphere_id,is_injection,volume,max_voxel_x,max_voxel_y,max_voxel_z,<metric>...
```

Metric columns are dynamic. When reading, every extra column with a numeric
value becomes a metric; identifier columns and unnamed index columns written by
dataframe exports are skipped.
*/

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{AtlasError, AtlasResult};
use crate::types::{ExperimentId, Hemisphere, StructureId};

const FIXED_COLUMNS: [&str; 7] = [
    "structure_id",
    "hemisphere_id",
    "is_injection",
    "volume",
    "max_voxel_x",
    "max_voxel_y",
    "max_voxel_z",
];

const IGNORED_COLUMNS: [&str; 3] = ["id", "section_data_set_id", "experiment_id"];

/// One unionize record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionizeRow {
    pub structure_id: StructureId,
    pub hemisphere: Hemisphere,
    pub is_injection: bool,
    pub volume: f64,
    pub max_voxel_x: f64,
    pub max_voxel_y: f64,
    pub max_voxel_z: f64,
    pub metrics: BTreeMap<String, f64>,
}

impl UnionizeRow {
    pub fn new(structure_id: StructureId, hemisphere: Hemisphere) -> Self {
        Self {
            structure_id,
            hemisphere,
            is_injection: false,
            volume: 0.0,
            max_voxel_x: 0.0,
            max_voxel_y: 0.0,
            max_voxel_z: 0.0,
            metrics: BTreeMap::new(),
        }
    }

    pub fn injection(mut self, is_injection: bool) -> Self {
        self.is_injection = is_injection;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_max_voxel(mut self, x: f64, y: f64, z: f64) -> Self {
        self.max_voxel_x = x;
        self.max_voxel_y = y;
        self.max_voxel_z = z;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// All unionize rows returned for one experiment query
///
/// Holds at most one row per `(structure_id, hemisphere)`.
#[derive(Debug, Clone)]
pub struct MeasurementTable {
    experiment_id: ExperimentId,
    rows: Vec<UnionizeRow>,
    index: AHashMap<(StructureId, Hemisphere), usize>,
}

impl PartialEq for MeasurementTable {
    fn eq(&self, other: &Self) -> bool {
        self.experiment_id == other.experiment_id && self.rows == other.rows
    }
}

impl MeasurementTable {
    /// Build a table, rejecting duplicate `(structure_id, hemisphere)` rows
    pub fn from_rows(experiment_id: ExperimentId, rows: Vec<UnionizeRow>) -> AtlasResult<Self> {
        let mut index = AHashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            if index.insert((row.structure_id, row.hemisphere), position).is_some() {
                return Err(AtlasError::DuplicateRow {
                    experiment_id,
                    structure_id: row.structure_id,
                    hemisphere: row.hemisphere,
                });
            }
        }
        Ok(Self {
            experiment_id,
            rows,
            index,
        })
    }

    pub fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    pub fn rows(&self) -> &[UnionizeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, structure_id: StructureId, hemisphere: Hemisphere) -> Option<&UnionizeRow> {
        self.index
            .get(&(structure_id, hemisphere))
            .map(|&position| &self.rows[position])
    }

    /// Like [`row`](Self::row) but a missing row is an error
    pub fn require_row(
        &self,
        structure_id: StructureId,
        hemisphere: Hemisphere,
    ) -> AtlasResult<&UnionizeRow> {
        self.row(structure_id, hemisphere)
            .ok_or(AtlasError::MissingRow {
                experiment_id: self.experiment_id,
                structure_id,
                hemisphere,
            })
    }

    /// Rows of one structure in table order
    pub fn rows_for_structure(
        &self,
        structure_id: StructureId,
    ) -> impl Iterator<Item = &UnionizeRow> + '_ {
        self.rows
            .iter()
            .filter(move |row| row.structure_id == structure_id)
    }

    /// Metric value of a specific row; missing row or metric is an error
    pub fn metric(
        &self,
        structure_id: StructureId,
        hemisphere: Hemisphere,
        metric: &str,
    ) -> AtlasResult<f64> {
        self.require_row(structure_id, hemisphere)?
            .metric(metric)
            .ok_or_else(|| AtlasError::MissingMetric {
                experiment_id: self.experiment_id,
                structure_id,
                metric: metric.to_string(),
            })
    }

    pub fn read_csv(path: &Path, experiment_id: ExperimentId) -> AtlasResult<Self> {
        let file = File::open(path)?;
        Self::from_rows(experiment_id, read_rows(file)?)
    }

    pub fn write_csv(&self, path: &Path) -> AtlasResult<()> {
        let file = File::create(path)?;
        write_rows(&self.rows, file)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Some(true),
        "false" | "0" | "f" | "no" | "" => Some(false),
        _ => None,
    }
}

fn parse_number(field: &str, value: &str, line: u64) -> AtlasResult<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        AtlasError::Format(format!("line {}: column '{}' is not a number: '{}'", line, field, value))
    })
}

fn is_ignored_column(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.starts_with("Unnamed") || IGNORED_COLUMNS.contains(&name)
}

/// Read unionize rows from CSV
pub fn read_rows<R: Read>(reader: R) -> AtlasResult<Vec<UnionizeRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let structure_col = position("structure_id")
        .ok_or_else(|| AtlasError::Format("missing column 'structure_id'".to_string()))?;
    let hemisphere_col = position("hemisphere_id")
        .ok_or_else(|| AtlasError::Format("missing column 'hemisphere_id'".to_string()))?;
    let injection_col = position("is_injection");
    let volume_col = position("volume");
    let voxel_cols = [
        position("max_voxel_x"),
        position("max_voxel_y"),
        position("max_voxel_z"),
    ];

    let metric_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !FIXED_COLUMNS.contains(&name.trim()) && !is_ignored_column(name))
        .map(|(col, name)| (col, name.trim().to_string()))
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |col: usize| record.get(col).unwrap_or("");

        let structure_id = field(structure_col).trim().parse::<StructureId>().map_err(|_| {
            AtlasError::Format(format!("line {}: invalid structure_id '{}'", line, field(structure_col)))
        })?;
        let hemisphere_id = field(hemisphere_col).trim().parse::<u8>().map_err(|_| {
            AtlasError::Format(format!("line {}: invalid hemisphere_id '{}'", line, field(hemisphere_col)))
        })?;

        let mut row = UnionizeRow::new(structure_id, Hemisphere::from_id(hemisphere_id)?);

        if let Some(col) = injection_col {
            row.is_injection = parse_bool(field(col)).ok_or_else(|| {
                AtlasError::Format(format!("line {}: invalid is_injection '{}'", line, field(col)))
            })?;
        }
        if let Some(col) = volume_col {
            row.volume = parse_number("volume", field(col), line)?;
        }
        let [x_col, y_col, z_col] = voxel_cols;
        if let Some(col) = x_col {
            row.max_voxel_x = parse_number("max_voxel_x", field(col), line)?;
        }
        if let Some(col) = y_col {
            row.max_voxel_y = parse_number("max_voxel_y", field(col), line)?;
        }
        if let Some(col) = z_col {
            row.max_voxel_z = parse_number("max_voxel_z", field(col), line)?;
        }

        for (col, name) in &metric_cols {
            // Non-numeric extras (names, timestamps) are not metrics
            if let Ok(value) = field(*col).trim().parse::<f64>() {
                row.metrics.insert(name.clone(), value);
            }
        }

        rows.push(row);
    }

    Ok(rows)
}

/// Write unionize rows as CSV, metric columns sorted by name
pub fn write_rows<W: Write>(rows: &[UnionizeRow], writer: W) -> AtlasResult<()> {
    let metric_names: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.metrics.keys().map(String::as_str))
        .collect();

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
    header.extend(metric_names.iter().copied());
    csv_writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.structure_id.to_string(),
            row.hemisphere.id().to_string(),
            row.is_injection.to_string(),
            row.volume.to_string(),
            row.max_voxel_x.to_string(),
            row.max_voxel_y.to_string(),
            row.max_voxel_z.to_string(),
        ];
        for name in &metric_names {
            record.push(row.metric(name).map(|v| v.to_string()).unwrap_or_default());
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
