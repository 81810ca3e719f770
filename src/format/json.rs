use serde_json::{Map, Value as JsonValue};

use crate::error::{ChartError, Result};
use crate::format::keys::{Keys, ACD1_KEYS, ACE_KEYS};
use crate::format::ChartBackend;
use crate::model::titers::{SparseRow, TiterData, Titers};
use crate::model::{Antigen, ColumnBases, Info, Projection, Serum};
use crate::titer::Titer;
use crate::tree::acd1;

// ---------------------------------------------------------------------------
// JsonBackend – one implementation, two field-name tables
// ---------------------------------------------------------------------------

/// Chart backend over a JSON tree; serves both ACE and ACD1 through an
/// injected [`Keys`] table resolved once at construction.
pub struct JsonBackend {
    chart: JsonValue,
    keys: &'static Keys,
}

impl JsonBackend {
    /// ACE: the payload is already standard JSON.
    pub fn ace(text: &str) -> Result<(Self, Vec<String>)> {
        let root: JsonValue = serde_json::from_str(text)
            .map_err(|err| ChartError::Parse(format!("ACE: invalid JSON: {err}")))?;
        let backend = JsonBackend::over(root, &ACE_KEYS)?;
        Ok((backend, Vec::new()))
    }

    /// ACD1: rewrite the Python dict literal into JSON first.
    pub fn acd1(text: &str) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let root = acd1::parse(text, &mut warnings)?;
        let backend = JsonBackend::over(root, &ACD1_KEYS)?;
        Ok((backend, warnings))
    }

    fn over(root: JsonValue, keys: &'static Keys) -> Result<Self> {
        let doc = match root {
            JsonValue::Object(doc) => doc,
            _ => {
                return Err(ChartError::Parse(format!(
                    "{}: document root is not an object",
                    keys.format_name
                )))
            }
        };
        let chart = doc
            .get(keys.chart)
            .or_else(|| keys.chart_fallback.and_then(|name| doc.get(name)))
            .cloned()
            .ok_or_else(|| {
                ChartError::Validation(format!(
                    "{}: no {:?} chart object in document",
                    keys.format_name, keys.chart
                ))
            })?;
        if !chart.is_object() {
            return Err(ChartError::Validation(format!(
                "{}: chart entry is not an object",
                keys.format_name
            )));
        }
        Ok(JsonBackend { chart, keys })
    }

    fn section(&self, key: &str, what: &str) -> Result<&JsonValue> {
        self.chart.get(key).ok_or_else(|| {
            ChartError::Validation(format!(
                "{}: missing {what} section ({key:?})",
                self.keys.format_name
            ))
        })
    }

    fn parse_info(&self, obj: &Map<String, JsonValue>) -> Result<Info> {
        let k = &self.keys.info_fields;
        let sources = match obj.get(k.sources) {
            None => Vec::new(),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::Object(src) => self.parse_info(src),
                    other => Err(self.type_error("info source", other)),
                })
                .collect::<Result<_>>()?,
            Some(other) => return Err(self.type_error("info sources", other)),
        };
        Ok(Info {
            name: self.text(obj, k.name)?,
            virus: self.text(obj, k.virus)?,
            virus_type: self.text(obj, k.virus_type)?,
            subset: self.text(obj, k.subset)?,
            assay: self.text(obj, k.assay)?,
            date: self.text(obj, k.date)?,
            lab: self.text(obj, k.lab)?,
            rbc_species: self.text(obj, k.rbc_species)?,
            sources,
        })
    }

    fn parse_antigen(&self, value: &JsonValue) -> Result<Antigen> {
        let obj = self.object(value, "antigen")?;
        let k = &self.keys.antigen;
        Ok(Antigen {
            name: self.text(obj, k.name)?,
            date: self.text(obj, k.date)?,
            passage: self.text(obj, k.passage)?,
            reassortant: self.text(obj, k.reassortant)?,
            lineage: self.text(obj, k.lineage)?,
            annotations: self.text_list(obj, k.annotations)?,
            lab_ids: self.text_list(obj, k.lab_ids)?,
        })
    }

    fn parse_serum(&self, value: &JsonValue) -> Result<Serum> {
        let obj = self.object(value, "serum")?;
        let k = &self.keys.serum;
        let homologous = match obj.get(k.homologous) {
            None => Vec::new(),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| self.index(item, "homologous antigen"))
                .collect::<Result<_>>()?,
            Some(other) => return Err(self.type_error("homologous list", other)),
        };
        Ok(Serum {
            name: self.text(obj, k.name)?,
            passage: self.text(obj, k.passage)?,
            reassortant: self.text(obj, k.reassortant)?,
            lineage: self.text(obj, k.lineage)?,
            annotations: self.text_list(obj, k.annotations)?,
            serum_id: self.text(obj, k.serum_id)?,
            serum_species: self.text(obj, k.serum_species)?,
            homologous,
        })
    }

    /// Parse one titer table in either row shape: a list of lists (dense) or
    /// a list of dicts keyed by stringified serum index (sparse).
    fn parse_table(&self, rows: &[JsonValue], what: &str) -> Result<TiterData> {
        let dense = matches!(rows.first(), Some(JsonValue::Array(_)) | None);
        if dense {
            let rows = rows
                .iter()
                .map(|row| match row {
                    JsonValue::Array(cells) => {
                        cells.iter().map(|cell| self.titer(cell, what)).collect()
                    }
                    other => Err(self.type_error(what, other)),
                })
                .collect::<Result<Vec<Vec<Titer>>>>()?;
            Ok(TiterData::Dense(rows))
        } else {
            let rows = rows
                .iter()
                .map(|row| match row {
                    JsonValue::Object(cells) => self.sparse_row(cells, what),
                    other => Err(self.type_error(what, other)),
                })
                .collect::<Result<Vec<SparseRow>>>()?;
            Ok(TiterData::Sparse(rows))
        }
    }

    /// Decode a sparse row's stringified serum indices into integers; the
    /// string keys do not leak past this adapter.
    fn sparse_row(&self, cells: &Map<String, JsonValue>, what: &str) -> Result<SparseRow> {
        let mut row: SparseRow = Vec::with_capacity(cells.len());
        for (key, cell) in cells {
            let serum: usize = key.parse().map_err(|_| {
                ChartError::Validation(format!(
                    "{}: {what}: serum index key {key:?} is not an integer",
                    self.keys.format_name
                ))
            })?;
            let titer = self.titer(cell, what)?;
            if !titer.is_dont_care() {
                row.push((serum, titer));
            }
        }
        row.sort_unstable_by_key(|(serum, _)| *serum);
        Ok(row)
    }

    // -- small field extractors --

    fn titer(&self, cell: &JsonValue, what: &str) -> Result<Titer> {
        match cell {
            JsonValue::String(s) => Ok(Titer::new(s)),
            // some legacy tables carry plain numbers
            JsonValue::Number(n) => Ok(Titer::new(&n.to_string())),
            other => Err(self.type_error(what, other)),
        }
    }

    fn object<'a>(&self, value: &'a JsonValue, what: &str) -> Result<&'a Map<String, JsonValue>> {
        value
            .as_object()
            .ok_or_else(|| self.type_error(what, value))
    }

    /// String field; absent means empty. ACD1 wraps some fields in a
    /// one-level dict repeating the field name, which is unwrapped here.
    fn text(&self, obj: &Map<String, JsonValue>, key: &str) -> Result<String> {
        match obj.get(key) {
            None | Some(JsonValue::Null) => Ok(String::new()),
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(JsonValue::Object(nested)) => match nested.get(key) {
                Some(JsonValue::String(s)) => Ok(s.clone()),
                _ => Err(ChartError::Validation(format!(
                    "{}: field {key:?} is an object without a nested {key:?} string",
                    self.keys.format_name
                ))),
            },
            Some(other) => Err(self.type_error(key, other)),
        }
    }

    fn text_list(&self, obj: &Map<String, JsonValue>, key: &str) -> Result<Vec<String>> {
        match obj.get(key) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => Ok(s.clone()),
                    other => Err(self.type_error(key, other)),
                })
                .collect(),
            // a lone string is accepted as a one-element list
            Some(JsonValue::String(s)) => Ok(vec![s.clone()]),
            Some(other) => Err(self.type_error(key, other)),
        }
    }

    fn index(&self, value: &JsonValue, what: &str) -> Result<usize> {
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| self.type_error(what, value))
    }

    fn number(&self, value: &JsonValue, what: &str) -> Result<f64> {
        value.as_f64().ok_or_else(|| self.type_error(what, value))
    }

    fn type_error(&self, what: &str, value: &JsonValue) -> ChartError {
        let full = value.to_string();
        let snippet = if full.chars().count() > 60 {
            format!("{}…", full.chars().take(60).collect::<String>())
        } else {
            full
        };
        ChartError::Validation(format!(
            "{}: unexpected value for {what}: {snippet}",
            self.keys.format_name
        ))
    }
}

impl ChartBackend for JsonBackend {
    /// Info is metadata; legacy tables may omit the section entirely.
    fn info(&self) -> Result<Info> {
        match self.chart.get(self.keys.info) {
            None | Some(JsonValue::Null) => Ok(Info::default()),
            Some(value) => {
                let obj = self.object(value, "info")?;
                self.parse_info(obj)
            }
        }
    }

    fn antigens(&self) -> Result<Vec<Antigen>> {
        match self.section(self.keys.antigens, "antigens")? {
            JsonValue::Array(items) => items.iter().map(|a| self.parse_antigen(a)).collect(),
            other => Err(self.type_error("antigens", other)),
        }
    }

    fn sera(&self) -> Result<Vec<Serum>> {
        match self.section(self.keys.sera, "sera")? {
            JsonValue::Array(items) => items.iter().map(|s| self.parse_serum(s)).collect(),
            other => Err(self.type_error("sera", other)),
        }
    }

    fn titers(&self) -> Result<Titers> {
        let value = self.section(self.keys.titers, "titers")?;
        let obj = self.object(value, "titers")?;
        let tk = &self.keys.titer_keys;

        let data = if let Some(JsonValue::Array(rows)) = obj.get(tk.dense) {
            self.parse_table(rows, "dense titer row")?
        } else if let Some(JsonValue::Array(rows)) = obj.get(tk.sparse) {
            self.parse_table(rows, "sparse titer row")?
        } else {
            return Err(ChartError::Validation(format!(
                "{}: titers carry neither {:?} nor {:?}",
                self.keys.format_name, tk.dense, tk.sparse
            )));
        };

        let layers = match obj.get(tk.layers) {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(layers)) => layers
                .iter()
                .map(|layer| match layer {
                    JsonValue::Array(rows) => self.parse_table(rows, "layer titer row"),
                    other => Err(self.type_error("titer layer", other)),
                })
                .collect::<Result<_>>()?,
            Some(other) => return Err(self.type_error("titer layers", other)),
        };

        Ok(Titers::with_layers(data, layers))
    }

    fn forced_column_bases(&self) -> Result<Option<ColumnBases>> {
        match self.chart.get(self.keys.column_bases) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => {
                let bases = items
                    .iter()
                    .map(|v| self.number(v, "column basis"))
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Some(ColumnBases::new(bases)))
            }
            Some(other) => Err(self.type_error("forced column bases", other)),
        }
    }

    fn projections(&self) -> Result<Vec<Projection>> {
        let pk = &self.keys.projection;
        match self.chart.get(self.keys.projections) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => Ok(items
                .iter()
                .map(|raw| Projection {
                    comment: raw.get(pk.comment).and_then(JsonValue::as_str).map(String::from),
                    stress: raw.get(pk.stress).and_then(JsonValue::as_f64),
                    raw: raw.clone(),
                })
                .collect()),
            Some(other) => Err(self.type_error("projections", other)),
        }
    }

    fn plot_spec(&self) -> Result<Option<JsonValue>> {
        Ok(self.chart.get(self.keys.plot_spec).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ace_backend(chart: serde_json::Value) -> JsonBackend {
        let doc = serde_json::json!({"  version": "acmacs-ace-v1", "c": chart});
        JsonBackend::ace(&doc.to_string()).unwrap().0
    }

    #[test]
    fn sparse_rows_decode_and_sort_indices() {
        let backend = ace_backend(serde_json::json!({
            "t": {"d": [{"2": "160", "0": "40"}, {"1": "<10"}]}
        }));
        let titers = backend.titers().unwrap();
        let rows = titers.sparse_rows().unwrap();
        assert_eq!(rows[0], vec![(0, Titer::new("40")), (2, Titer::new("160"))]);
        assert_eq!(titers.number_of_sera(), 3);
    }

    #[test]
    fn sparse_dont_care_cells_are_dropped() {
        let backend = ace_backend(serde_json::json!({
            "t": {"d": [{"0": "40", "1": "*"}]}
        }));
        let titers = backend.titers().unwrap();
        assert_eq!(titers.number_of_non_dont_cares(), 1);
    }

    #[test]
    fn bad_sparse_key_is_a_validation_error() {
        let backend = ace_backend(serde_json::json!({
            "t": {"d": [{"x": "40"}]}
        }));
        assert!(matches!(
            backend.titers(),
            Err(ChartError::Validation(_))
        ));
    }

    #[test]
    fn missing_titers_section_is_a_validation_error() {
        let backend = ace_backend(serde_json::json!({"a": [], "s": []}));
        let err = backend.titers().unwrap_err();
        assert!(err.to_string().contains("titers"), "{err}");
    }

    #[test]
    fn missing_info_section_yields_empty_info() {
        let backend = ace_backend(serde_json::json!({
            "a": [{"N": "A/X/1/99"}],
            "s": [{"N": "A/X/1/99 S1"}],
            "t": {"l": [["40"]]},
        }));
        let info = backend.info().unwrap();
        assert_eq!(info, Info::default());
        assert_eq!(info.make_name(), "");
    }

    #[test]
    fn acd1_nested_passage_dict_is_unwrapped() {
        let text = "data = {'chart': {'antigens': [{'name': 'A/X/1/99', \
                    'passage': {'passage': 'MDCK2'}}]}}";
        let (backend, warnings) = JsonBackend::acd1(text).unwrap();
        assert!(warnings.is_empty());
        let antigens = backend.antigens().unwrap();
        assert_eq!(antigens[0].passage, "MDCK2");
    }

    #[test]
    fn layers_parse_in_either_row_shape() {
        let backend = ace_backend(serde_json::json!({
            "t": {
                "l": [["57", "*"]],
                "L": [[{"0": "40"}], [["80", "*"]]],
            }
        }));
        let titers = backend.titers().unwrap();
        assert_eq!(titers.number_of_layers(), 2);
        assert_eq!(titers.titer_of_layer(0, 0, 0).unwrap(), Titer::new("40"));
        assert_eq!(titers.titer_of_layer(1, 0, 0).unwrap(), Titer::new("80"));
    }
}
