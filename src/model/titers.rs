use std::collections::BTreeMap;

use crate::error::{ChartError, Result};
use crate::titer::Titer;

// ---------------------------------------------------------------------------
// Physical encodings
// ---------------------------------------------------------------------------

/// One sparse matrix row: `(serum index, titer)` pairs sorted by index, only
/// non-DontCare cells present. Serum indices are decoded from the formats'
/// stringified keys at the adapter boundary; string keys never reach here.
pub type SparseRow = Vec<(usize, Titer)>;

/// One physical titer table: every cell present, or only measured cells.
#[derive(Debug, Clone, PartialEq)]
pub enum TiterData {
    Dense(Vec<Vec<Titer>>),
    Sparse(Vec<SparseRow>),
}

impl TiterData {
    fn number_of_antigens(&self) -> usize {
        match self {
            TiterData::Dense(rows) => rows.len(),
            TiterData::Sparse(rows) => rows.len(),
        }
    }

    /// Widest column index span the rows cover. For sparse rows this is
    /// `max(index) + 1`; trailing all-DontCare columns leave no trace.
    fn column_span(&self) -> usize {
        match self {
            TiterData::Dense(rows) => rows.iter().map(Vec::len).max().unwrap_or(0),
            TiterData::Sparse(rows) => rows
                .iter()
                .filter_map(|row| row.last().map(|(sr, _)| sr + 1))
                .max()
                .unwrap_or(0),
        }
    }

    fn titer(&self, antigen: usize, serum: usize) -> Titer {
        match self {
            TiterData::Dense(rows) => rows
                .get(antigen)
                .and_then(|row| row.get(serum))
                .cloned()
                .unwrap_or(Titer::DontCare),
            TiterData::Sparse(rows) => rows
                .get(antigen)
                .and_then(|row| {
                    row.binary_search_by_key(&serum, |(sr, _)| *sr)
                        .ok()
                        .map(|pos| row[pos].1.clone())
                })
                .unwrap_or(Titer::DontCare),
        }
    }

    fn number_of_non_dont_cares(&self) -> usize {
        match self {
            // dense: every cell is stored, count the measured ones
            TiterData::Dense(rows) => rows
                .iter()
                .map(|row| row.iter().filter(|t| !t.is_dont_care()).count())
                .sum(),
            // sparse: only measured cells are stored
            TiterData::Sparse(rows) => rows.iter().map(Vec::len).sum(),
        }
    }

    fn non_dont_cares(&self) -> NonDontCares<'_> {
        NonDontCares {
            data: self,
            row: 0,
            col: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Titers – the logical matrix
// ---------------------------------------------------------------------------

/// The `antigens × sera` titer matrix. One canonical table plus, for charts
/// merged from several source tables, the per-source layers it was merged
/// from. `titer(ag, sr)` behaves identically whichever physical encoding the
/// source format used.
#[derive(Debug, Clone)]
pub struct Titers {
    data: TiterData,
    layers: Vec<TiterData>,
    /// False for formats whose tree shape cannot carry layers (LISPMDS).
    layers_supported: bool,
    number_of_sera: usize,
}

impl Titers {
    pub fn new(data: TiterData) -> Self {
        let number_of_sera = data.column_span();
        Titers {
            data,
            layers: Vec::new(),
            layers_supported: true,
            number_of_sera,
        }
    }

    pub fn with_layers(data: TiterData, layers: Vec<TiterData>) -> Self {
        let mut titers = Titers::new(data);
        titers.layers = layers;
        titers
    }

    /// Mark the chart format as unable to represent layers at all; layer
    /// accessors then fail with "not supported" instead of "no layers".
    pub fn without_layer_support(mut self) -> Self {
        self.layers_supported = false;
        self
    }

    /// Check the matrix against the antigen/serum lists of the owning chart
    /// and widen the serum count to the serum list length (sparse encodings
    /// cannot see trailing unmeasured columns).
    pub(crate) fn reconcile(&mut self, antigens: usize, sera: usize) -> Result<()> {
        if self.data.number_of_antigens() != antigens {
            return Err(ChartError::Validation(format!(
                "titer row count {} does not match antigen count {antigens}",
                self.data.number_of_antigens()
            )));
        }
        if self.number_of_sera > sera {
            return Err(ChartError::Validation(format!(
                "titer columns span {} sera but the chart lists {sera}",
                self.number_of_sera
            )));
        }
        self.number_of_sera = sera;
        for (no, layer) in self.layers.iter().enumerate() {
            if layer.number_of_antigens() != antigens || layer.column_span() > sera {
                return Err(ChartError::Validation(format!(
                    "layer {no} shape does not fit the {antigens}x{sera} chart"
                )));
            }
        }
        Ok(())
    }

    pub fn number_of_antigens(&self) -> usize {
        self.data.number_of_antigens()
    }

    pub fn number_of_sera(&self) -> usize {
        self.number_of_sera
    }

    pub fn number_of_layers(&self) -> usize {
        self.layers.len()
    }

    /// The canonical titer for a cell, whatever the physical encoding.
    pub fn titer(&self, antigen: usize, serum: usize) -> Result<Titer> {
        self.check_cell(antigen, serum)?;
        Ok(self.data.titer(antigen, serum))
    }

    /// The reading one source table contributed to a cell.
    pub fn titer_of_layer(&self, layer: usize, antigen: usize, serum: usize) -> Result<Titer> {
        if !self.layers_supported {
            return Err(ChartError::Validation(
                "titer layers are not supported by this chart format".into(),
            ));
        }
        self.check_cell(antigen, serum)?;
        match self.layers.get(layer) {
            Some(data) => Ok(data.titer(antigen, serum)),
            None => Err(ChartError::Validation(format!(
                "layer {layer} out of range: chart has {} layer(s)",
                self.layers.len()
            ))),
        }
    }

    /// Count of measured cells: O(rows) for sparse, O(rows×cols) for dense.
    pub fn number_of_non_dont_cares(&self) -> usize {
        self.data.number_of_non_dont_cares()
    }

    /// Lazy forward iterator over measured `(antigen, serum, titer)` triples.
    pub fn non_dont_cares(&self) -> NonDontCares<'_> {
        self.data.non_dont_cares()
    }

    /// The dense rows, when the chart was stored dense.
    pub fn dense_rows(&self) -> Result<&[Vec<Titer>]> {
        match &self.data {
            TiterData::Dense(rows) => Ok(rows),
            TiterData::Sparse(_) => Err(ChartError::NotAvailable(
                "chart titers are stored sparse, not dense".into(),
            )),
        }
    }

    /// The sparse rows, when the chart was stored sparse.
    pub fn sparse_rows(&self) -> Result<&[SparseRow]> {
        match &self.data {
            TiterData::Sparse(rows) => Ok(rows),
            TiterData::Dense(_) => Err(ChartError::NotAvailable(
                "chart titers are stored dense, not sparse".into(),
            )),
        }
    }

    /// For every cell with at least `min_layers` contributing layer readings,
    /// the readings together with the stored canonical titer. Feeds the merge
    /// verifier.
    pub fn layer_merge_records(&self, min_layers: usize) -> Result<Vec<MergeRecord>> {
        if !self.layers_supported {
            return Err(ChartError::Validation(
                "titer layers are not supported by this chart format".into(),
            ));
        }
        if self.layers.is_empty() {
            return Err(ChartError::NotAvailable("chart has no titer layers".into()));
        }
        let mut per_cell: BTreeMap<(usize, usize), Vec<Titer>> = BTreeMap::new();
        for layer in &self.layers {
            for (ag, sr, titer) in layer.non_dont_cares() {
                per_cell.entry((ag, sr)).or_default().push(titer.clone());
            }
        }
        Ok(per_cell
            .into_iter()
            .filter(|(_, readings)| readings.len() >= min_layers)
            .map(|((antigen, serum), layer_titers)| MergeRecord {
                antigen,
                serum,
                merged: self.data.titer(antigen, serum),
                layer_titers,
            })
            .collect())
    }

    fn check_cell(&self, antigen: usize, serum: usize) -> Result<()> {
        if antigen >= self.number_of_antigens() {
            return Err(ChartError::Validation(format!(
                "antigen index {antigen} out of range ({} antigens)",
                self.number_of_antigens()
            )));
        }
        if serum >= self.number_of_sera {
            return Err(ChartError::Validation(format!(
                "serum index {serum} out of range ({} sera)",
                self.number_of_sera
            )));
        }
        Ok(())
    }
}

/// Per-cell provenance of a layered chart: the independent layer readings
/// and the canonical titer they were merged into.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    pub antigen: usize,
    pub serum: usize,
    pub layer_titers: Vec<Titer>,
    pub merged: Titer,
}

// ---------------------------------------------------------------------------
// Lazy non-DontCare iterator
// ---------------------------------------------------------------------------

/// Forward iterator over measured cells, in row-major order. O(stored cells)
/// for sparse encodings.
pub struct NonDontCares<'a> {
    data: &'a TiterData,
    row: usize,
    col: usize,
}

impl<'a> Iterator for NonDontCares<'a> {
    type Item = (usize, usize, &'a Titer);

    fn next(&mut self) -> Option<Self::Item> {
        match self.data {
            TiterData::Dense(rows) => {
                while self.row < rows.len() {
                    let row = &rows[self.row];
                    while self.col < row.len() {
                        let col = self.col;
                        self.col += 1;
                        if !row[col].is_dont_care() {
                            return Some((self.row, col, &row[col]));
                        }
                    }
                    self.row += 1;
                    self.col = 0;
                }
                None
            }
            TiterData::Sparse(rows) => {
                while self.row < rows.len() {
                    if let Some((serum, titer)) = rows[self.row].get(self.col) {
                        self.col += 1;
                        return Some((self.row, *serum, titer));
                    }
                    self.row += 1;
                    self.col = 0;
                }
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
