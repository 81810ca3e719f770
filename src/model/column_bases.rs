use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::titers::Titers;

// ---------------------------------------------------------------------------
// ColumnBases – per-serum normalization scalars
// ---------------------------------------------------------------------------

/// Per-serum normalization scalars in log2 units, one per serum. Either
/// supplied verbatim by the source file ("forced") or computed from the
/// titer matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBases(Vec<f64>);

impl ColumnBases {
    pub fn new(bases: Vec<f64>) -> Self {
        ColumnBases(bases)
    }

    /// Basis for one serum.
    ///
    /// # Panics
    ///
    /// Panics if `serum >= self.size()`; validation against the serum list
    /// happens when the chart is built, so an index out of range here is a
    /// caller bug, not bad input data.
    pub fn column_basis(&self, serum: usize) -> f64 {
        self.0[serum]
    }

    /// Non-panicking lookup for callers with unchecked indices.
    pub fn get(&self, serum: usize) -> Option<f64> {
        self.0.get(serum).copied()
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Minimum column basis
// ---------------------------------------------------------------------------

/// Floor applied to every computed column basis, in log2 units. The default
/// (0, i.e. titer 10) means "no floor".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MinimumColumnBasis(f64);

impl MinimumColumnBasis {
    pub fn none() -> Self {
        MinimumColumnBasis(0.0)
    }

    /// Floor expressed as a titer value, e.g. 1280 → log2(128) = 7.
    pub fn from_titer(titer: u32) -> Self {
        MinimumColumnBasis((f64::from(titer) / 10.0).log2())
    }

    pub fn logged(&self) -> f64 {
        self.0
    }

    /// Stable cache key for the per-chart computed-bases cache.
    pub(crate) fn key(&self) -> u64 {
        self.0.to_bits()
    }
}

impl From<f64> for MinimumColumnBasis {
    fn from(logged: f64) -> Self {
        MinimumColumnBasis(logged)
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute column bases from the matrix: per serum, the strongest
/// (highest-log2) reading observed against any antigen, floored at
/// `minimum`. Walks the lazy non-DontCare iterator, so sparse matrices cost
/// O(measured cells), not O(antigens × sera). Monotonic: adding measured
/// cells can only raise a basis.
pub fn computed_column_bases(titers: &Titers, minimum: MinimumColumnBasis) -> Result<ColumnBases> {
    let mut bases = vec![minimum.logged(); titers.number_of_sera()];
    for (_, serum, titer) in titers.non_dont_cares() {
        let logged = titer.logged_for_column_bases()?;
        if logged > bases[serum] {
            bases[serum] = logged;
        }
    }
    Ok(ColumnBases::new(bases))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::titers::TiterData;
    use crate::titer::Titer;

    fn t(s: &str) -> Titer {
        Titer::new(s)
    }

    fn fixture() -> Titers {
        Titers::new(TiterData::Dense(vec![
            vec![t("40"), t("<10"), t("*"), t(">1280")],
            vec![t("1280"), t("20"), t("*"), t("~320")],
        ]))
    }

    #[test]
    fn strongest_reading_per_serum() {
        let bases = computed_column_bases(&fixture(), MinimumColumnBasis::none()).unwrap();
        assert_eq!(bases.size(), 4);
        assert_eq!(bases.column_basis(0), 7.0); // 1280
        assert_eq!(bases.column_basis(1), 1.0); // 20
        assert_eq!(bases.column_basis(2), 0.0); // untested → floor
        assert_eq!(bases.column_basis(3), 8.0); // >1280 counts one above
    }

    #[test]
    fn floor_applies_to_weak_columns_only() {
        let bases = computed_column_bases(&fixture(), MinimumColumnBasis::from_titer(1280)).unwrap();
        assert_eq!(bases.column_basis(0), 7.0);
        assert_eq!(bases.column_basis(1), 7.0);
        assert_eq!(bases.column_basis(2), 7.0);
        assert_eq!(bases.column_basis(3), 8.0);
    }

    #[test]
    fn adding_a_cell_never_lowers_a_basis() {
        let titers = fixture();
        let before = computed_column_bases(&titers, MinimumColumnBasis::none()).unwrap();
        let mut rows = titers.dense_rows().unwrap().to_vec();
        rows[0][2] = t("10"); // fill the untested cell with the weakest titer
        let after = computed_column_bases(
            &Titers::new(TiterData::Dense(rows)),
            MinimumColumnBasis::none(),
        )
        .unwrap();
        for sr in 0..before.size() {
            assert!(after.column_basis(sr) >= before.column_basis(sr), "serum {sr}");
        }
    }

    #[test]
    fn out_of_range_serum_is_a_caller_bug() {
        let bases = ColumnBases::new(vec![7.0, 6.0]);
        assert_eq!(bases.get(1), Some(6.0));
        assert_eq!(bases.get(2), None);
    }

    #[test]
    #[should_panic]
    fn indexed_lookup_panics_out_of_range() {
        ColumnBases::new(vec![7.0]).column_basis(1);
    }

    #[test]
    fn dodgy_readings_do_not_contribute() {
        let titers = Titers::new(TiterData::Dense(vec![vec![t("~2560")]]));
        let bases = computed_column_bases(&titers, MinimumColumnBasis::none()).unwrap();
        assert_eq!(bases.column_basis(0), 0.0);
    }
}
