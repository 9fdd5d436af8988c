// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

//! Injection hemisphere derivation

use tractmap_atlas::{Hemisphere, MeasurementTable, StructureId, UnionizeRow};

/// Row of `structure_id` with the largest volume; the first one wins ties
pub fn dominant_row(table: &MeasurementTable, structure_id: StructureId) -> Option<&UnionizeRow> {
    let mut best: Option<&UnionizeRow> = None;
    for row in table.rows_for_structure(structure_id) {
        match best {
            Some(current) if row.volume <= current.volume || row.volume.is_nan() => {}
            _ => best = Some(row),
        }
    }
    best
}

/// Hemisphere of the injection peak at `structure_id`
///
/// Uses the z coordinate of the dominant row. No rows at the structure gives
/// [`Hemisphere::None`].
pub fn derive_hemisphere(table: &MeasurementTable, structure_id: StructureId, midline_z: f64) -> Hemisphere {
    match dominant_row(table, structure_id) {
        Some(row) => Hemisphere::from_z(row.max_voxel_z, midline_z),
        None => Hemisphere::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tractmap_atlas::HEMISPHERE_MIDLINE_Z;

    fn row(hemisphere: Hemisphere, volume: f64, z: f64) -> UnionizeRow {
        UnionizeRow::new(385, hemisphere)
            .injection(true)
            .with_volume(volume)
            .with_max_voxel(0.0, 0.0, z)
    }

    #[test]
    fn test_largest_volume_decides() {
        let table = MeasurementTable::from_rows(
            1,
            vec![
                row(Hemisphere::Left, 0.1, 8000.0),
                row(Hemisphere::Right, 0.7, 3000.0),
                row(Hemisphere::Both, 0.5, 9000.0),
            ],
        )
        .unwrap();
        assert_eq!(derive_hemisphere(&table, 385, HEMISPHERE_MIDLINE_Z), Hemisphere::Left);
    }

    #[test]
    fn test_first_row_wins_ties() {
        let table = MeasurementTable::from_rows(
            1,
            vec![row(Hemisphere::Left, 0.5, 6000.0), row(Hemisphere::Right, 0.5, 100.0)],
        )
        .unwrap();
        assert_eq!(dominant_row(&table, 385).unwrap().hemisphere, Hemisphere::Left);
        assert_eq!(derive_hemisphere(&table, 385, HEMISPHERE_MIDLINE_Z), Hemisphere::Right);
    }

    #[test]
    fn test_midline_and_missing_structure() {
        let table = MeasurementTable::from_rows(1, vec![row(Hemisphere::Right, 0.2, 5700.0)]).unwrap();
        assert_eq!(derive_hemisphere(&table, 385, HEMISPHERE_MIDLINE_Z), Hemisphere::Right);
        assert_eq!(derive_hemisphere(&table, 999, HEMISPHERE_MIDLINE_Z), Hemisphere::None);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let table = MeasurementTable::from_rows(
            1,
            vec![row(Hemisphere::Left, 0.3, 5000.0), row(Hemisphere::Right, 0.3, 7000.0)],
        )
        .unwrap();
        let first = derive_hemisphere(&table, 385, HEMISPHERE_MIDLINE_Z);
        for _ in 0..10 {
            assert_eq!(derive_hemisphere(&table, 385, HEMISPHERE_MIDLINE_Z), first);
        }
    }
}
