/// Canonical, format-agnostic chart model.
///
/// ```text
///  .ace / .acd1 / .lispmds
///        │
///        ▼
///   ┌───────────┐
///   │  format    │  detect + adapt tree → canonical pieces
///   └───────────┘
///        │
///        ▼
///   ┌───────────┐
///   │   Chart    │  Info, Antigens, Sera, Titers, ColumnBases
///   └───────────┘
///        │
///        ▼
///   column bases · cross-layer merge · downstream optimizers
/// ```
pub mod column_bases;
pub mod titers;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ChartError, Result};
use crate::format::ChartBackend;

pub use column_bases::{computed_column_bases, ColumnBases, MinimumColumnBasis};
pub use titers::{MergeRecord, NonDontCares, SparseRow, TiterData, Titers};

// ---------------------------------------------------------------------------
// Info – table metadata
// ---------------------------------------------------------------------------

/// Table metadata. A chart merged from several physical tables carries one
/// nested `Info` per source in `sources`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    pub virus: String,
    pub virus_type: String,
    pub subset: String,
    pub assay: String,
    pub date: String,
    pub lab: String,
    pub rbc_species: String,
    pub sources: Vec<Info>,
}

impl Info {
    /// Display name: the explicit name when present, otherwise assembled
    /// from lab, virus type, assay and date.
    pub fn make_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        let mut parts: Vec<&str> = [&self.lab, &self.virus_type, &self.subset, &self.assay]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect();
        let date = self.date_or_source_range();
        if !date.is_empty() {
            parts.push(&date);
        }
        parts.join(" ")
    }

    /// The table date; for a merged chart with dated sources, the range
    /// `first-last`.
    fn date_or_source_range(&self) -> String {
        if !self.date.is_empty() || self.sources.is_empty() {
            return self.date.clone();
        }
        let mut dates: Vec<&str> = self
            .sources
            .iter()
            .map(|src| src.date.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        dates.sort_unstable();
        match (dates.first(), dates.last()) {
            (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
            (Some(first), _) => (*first).to_string(),
            (None, _) => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Antigens and sera
// ---------------------------------------------------------------------------

/// One antigen row of the table. Immutable once constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Antigen {
    pub name: String,
    pub date: String,
    pub passage: String,
    pub reassortant: String,
    pub lineage: String,
    pub annotations: Vec<String>,
    pub lab_ids: Vec<String>,
}

impl Antigen {
    /// Name with annotations and reassortant, the form used in reports.
    pub fn full_name(&self) -> String {
        join_name_parts(&self.name, &self.reassortant, &self.annotations, &self.passage)
    }
}

/// One serum column of the table. `homologous` holds the indices of the
/// antigens this serum was raised against, resolved against the sibling
/// antigen list by the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Serum {
    pub name: String,
    pub passage: String,
    pub reassortant: String,
    pub lineage: String,
    pub annotations: Vec<String>,
    pub serum_id: String,
    pub serum_species: String,
    pub homologous: Vec<usize>,
}

impl Serum {
    pub fn full_name(&self) -> String {
        join_name_parts(&self.name, &self.reassortant, &self.annotations, &self.serum_id)
    }
}

fn join_name_parts(name: &str, reassortant: &str, annotations: &[String], tail: &str) -> String {
    let mut parts: Vec<&str> = vec![name];
    if !reassortant.is_empty() {
        parts.push(reassortant);
    }
    parts.extend(annotations.iter().map(String::as_str));
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Projections and plot spec – opaque pass-through
// ---------------------------------------------------------------------------

/// One stored point layout. The core never interprets layouts; the raw
/// subtree is passed through for downstream optimizers, with only the
/// comment and stress lifted out for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub comment: Option<String>,
    pub stress: Option<f64>,
    pub raw: JsonValue,
}

// ---------------------------------------------------------------------------
// Chart – the aggregate root
// ---------------------------------------------------------------------------

/// The canonical chart: one titration table (possibly merged from several
/// sources), whichever legacy format it came from. Owns all sub-collections
/// for its lifetime.
///
/// The computed-column-bases cache makes `Chart` single-owner: it is
/// `!Sync` and must be wrapped by the caller if shared across threads.
#[derive(Debug)]
pub struct Chart {
    info: Info,
    antigens: Vec<Antigen>,
    sera: Vec<Serum>,
    titers: Titers,
    forced_column_bases: Option<Rc<ColumnBases>>,
    projections: Vec<Projection>,
    plot_spec: Option<JsonValue>,
    warnings: Vec<String>,
    // computed column bases per distinct minimum floor, keyed by its bits
    computed_bases: RefCell<BTreeMap<u64, Rc<ColumnBases>>>,
}

impl Chart {
    /// Materialize the canonical chart from a format backend. Validation
    /// failures never yield a partial chart.
    pub fn from_backend(backend: &dyn ChartBackend, warnings: Vec<String>) -> Result<Chart> {
        let info = backend.info()?;
        let antigens = backend.antigens()?;
        let sera = backend.sera()?;
        let mut titers = backend.titers()?;

        if antigens.is_empty() {
            return Err(ChartError::Validation("chart has no antigens".into()));
        }
        if sera.is_empty() {
            return Err(ChartError::Validation("chart has no sera".into()));
        }
        titers.reconcile(antigens.len(), sera.len())?;

        for serum in &sera {
            if let Some(&bad) = serum.homologous.iter().find(|&&ag| ag >= antigens.len()) {
                return Err(ChartError::Validation(format!(
                    "serum {:?} names homologous antigen {bad}, chart has {}",
                    serum.name,
                    antigens.len()
                )));
            }
        }

        let forced_column_bases = match backend.forced_column_bases()? {
            Some(bases) if bases.size() != sera.len() => {
                return Err(ChartError::Validation(format!(
                    "forced column bases size {} does not match serum count {}",
                    bases.size(),
                    sera.len()
                )));
            }
            Some(bases) => Some(Rc::new(bases)),
            None => None,
        };

        log::debug!(
            "chart: {} antigens, {} sera, {} measured titers, {} layer(s)",
            antigens.len(),
            sera.len(),
            titers.number_of_non_dont_cares(),
            titers.number_of_layers()
        );

        Ok(Chart {
            info,
            antigens,
            sera,
            titers,
            forced_column_bases,
            projections: backend.projections()?,
            plot_spec: backend.plot_spec()?,
            warnings,
            computed_bases: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn antigens(&self) -> &[Antigen] {
        &self.antigens
    }

    pub fn sera(&self) -> &[Serum] {
        &self.sera
    }

    pub fn titers(&self) -> &Titers {
        &self.titers
    }

    pub fn number_of_antigens(&self) -> usize {
        self.antigens.len()
    }

    pub fn number_of_sera(&self) -> usize {
        self.sera.len()
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn plot_spec(&self) -> Option<&JsonValue> {
        self.plot_spec.as_ref()
    }

    /// Non-fatal diagnostics collected while parsing; also emitted through
    /// `log::warn!` as they occur.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Column bases supplied verbatim by the source file, if any.
    pub fn forced_column_bases(&self) -> Option<&ColumnBases> {
        self.forced_column_bases.as_deref()
    }

    /// Column bases for the given floor. Forced bases always win and are
    /// returned verbatim; computed bases are cached per distinct floor.
    pub fn column_bases(&self, minimum: MinimumColumnBasis) -> Result<Rc<ColumnBases>> {
        if let Some(forced) = &self.forced_column_bases {
            return Ok(Rc::clone(forced));
        }
        if let Some(cached) = self.computed_bases.borrow().get(&minimum.key()) {
            return Ok(Rc::clone(cached));
        }
        let bases = Rc::new(computed_column_bases(&self.titers, minimum)?);
        self.computed_bases
            .borrow_mut()
            .insert(minimum.key(), Rc::clone(&bases));
        Ok(bases)
    }

    /// Drop all cached computed column bases.
    pub fn invalidate_column_bases(&self) {
        self.computed_bases.borrow_mut().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_name_prefers_explicit_name() {
        let info = Info {
            name: "TABLE 1".into(),
            lab: "CDC".into(),
            ..Info::default()
        };
        assert_eq!(info.make_name(), "TABLE 1");
    }

    #[test]
    fn make_name_assembles_from_parts() {
        let info = Info {
            lab: "CDC".into(),
            virus_type: "A(H3N2)".into(),
            assay: "HI".into(),
            date: "2016-04-12".into(),
            ..Info::default()
        };
        assert_eq!(info.make_name(), "CDC A(H3N2) HI 2016-04-12");
    }

    #[test]
    fn merged_chart_name_uses_source_date_range() {
        let info = Info {
            lab: "NIMR".into(),
            sources: vec![
                Info {
                    date: "2016-02-01".into(),
                    ..Info::default()
                },
                Info {
                    date: "2016-03-01".into(),
                    ..Info::default()
                },
            ],
            ..Info::default()
        };
        assert_eq!(info.make_name(), "NIMR 2016-02-01-2016-03-01");
    }

    #[test]
    fn antigen_full_name_joins_parts() {
        let antigen = Antigen {
            name: "A/HANOI/EL134/2008".into(),
            reassortant: "NYMC-X157".into(),
            annotations: vec!["NEW".into()],
            passage: "MDCK2".into(),
            ..Antigen::default()
        };
        assert_eq!(
            antigen.full_name(),
            "A/HANOI/EL134/2008 NYMC-X157 NEW MDCK2"
        );
    }
}
