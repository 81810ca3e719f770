use serde_json::Value as JsonValue;

use crate::error::{ChartError, Result};
use crate::format::ChartBackend;
use crate::model::titers::{TiterData, Titers};
use crate::model::{Antigen, ColumnBases, Info, Projection, Serum};
use crate::titer::Titer;
use crate::tree::lispmds::{self, keyword_value, Sexp};

/// The `:HI-IN` table: antigen names, serum names, titer rows, and an
/// optional table name.
const HI_IN: &str = "HI-IN";

// ---------------------------------------------------------------------------
// LispmdsBackend
// ---------------------------------------------------------------------------

/// Chart backend over a parsed `(MAKE-MASTER-MDS-WINDOW …)` form. The tree
/// shape is positional/keyword rather than named objects, so this adapter
/// stands apart from the JSON ones; it exposes the same accessor contract
/// but cannot carry titer layers.
pub struct LispmdsBackend {
    window: Vec<Sexp>,
}

impl LispmdsBackend {
    pub fn new(text: &str) -> Result<Self> {
        let window = match lispmds::parse(text)? {
            Sexp::List(items) => items,
            _ => return Err(ChartError::Parse("LISPMDS: top form is not a list".into())),
        };
        Ok(LispmdsBackend { window })
    }

    fn hi_in(&self) -> Result<&[Sexp]> {
        keyword_value(&self.window, HI_IN)
            .map_err(|_| ChartError::Validation("LISPMDS: no :HI-IN table".into()))?
            .as_list()
    }

    fn name_list(&self, position: usize, what: &str) -> Result<Vec<String>> {
        let table = self.hi_in()?;
        let names = table
            .get(position)
            .ok_or_else(|| {
                ChartError::Validation(format!("LISPMDS: :HI-IN has no {what} name list"))
            })?
            .as_list()?;
        names
            .iter()
            .map(|name| name.as_text().map(str::to_string))
            .collect()
    }

    /// A titer cell: a raw titer number, a `<`/`>`-prefixed symbol, or a
    /// `*` / `DONT-CARE` marker.
    fn cell(&self, cell: &Sexp, antigen: usize, serum: usize) -> Result<Titer> {
        match cell {
            Sexp::Number(n) => {
                if n.fract() != 0.0 || *n < 0.0 {
                    return Err(ChartError::Parse(format!(
                        "LISPMDS: cell ({antigen}, {serum}): {n} is not a whole titer"
                    )));
                }
                Ok(Titer::Regular(*n as u32))
            }
            Sexp::Symbol(s) if s == "*" || s.eq_ignore_ascii_case("DONT-CARE") => {
                Ok(Titer::DontCare)
            }
            Sexp::Symbol(s) | Sexp::String(s) => match Titer::new(s) {
                Titer::Invalid(_) => Err(ChartError::Parse(format!(
                    "LISPMDS: cell ({antigen}, {serum}): unrecognized titer {s:?}"
                ))),
                titer => Ok(titer),
            },
            other => Err(ChartError::Parse(format!(
                "LISPMDS: cell ({antigen}, {serum}): unexpected {other}"
            ))),
        }
    }
}

impl ChartBackend for LispmdsBackend {
    fn info(&self) -> Result<Info> {
        // the fourth :HI-IN element, when present, names the table
        let name = match self.hi_in()?.get(3) {
            Some(Sexp::Symbol(s)) | Some(Sexp::String(s)) => s.clone(),
            _ => String::new(),
        };
        Ok(Info {
            name,
            ..Info::default()
        })
    }

    fn antigens(&self) -> Result<Vec<Antigen>> {
        Ok(self
            .name_list(0, "antigen")?
            .into_iter()
            .map(|name| Antigen {
                name,
                ..Antigen::default()
            })
            .collect())
    }

    fn sera(&self) -> Result<Vec<Serum>> {
        Ok(self
            .name_list(1, "serum")?
            .into_iter()
            .map(|name| Serum {
                name,
                ..Serum::default()
            })
            .collect())
    }

    fn titers(&self) -> Result<Titers> {
        let table = self.hi_in()?;
        let rows = table
            .get(2)
            .ok_or_else(|| ChartError::Validation("LISPMDS: :HI-IN has no titer rows".into()))?
            .as_list()?;
        let mut dense: Vec<Vec<Titer>> = Vec::with_capacity(rows.len());
        for (antigen, row) in rows.iter().enumerate() {
            let cells = row.as_list()?;
            let row = cells
                .iter()
                .enumerate()
                .map(|(serum, cell)| self.cell(cell, antigen, serum))
                .collect::<Result<Vec<Titer>>>()?;
            dense.push(row);
        }
        Ok(Titers::new(TiterData::Dense(dense)).without_layer_support())
    }

    // the :HI-IN table carries neither forced column bases nor projections
    fn forced_column_bases(&self) -> Result<Option<ColumnBases>> {
        Ok(None)
    }

    fn projections(&self) -> Result<Vec<Projection>> {
        Ok(Vec::new())
    }

    fn plot_spec(&self) -> Result<Option<JsonValue>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
