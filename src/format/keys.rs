//! Per-format field-name tables for the two JSON-based formats.
//!
//! ACE and ACD1 store the same logical fields under different physical key
//! names (single letters vs. long names). One table per format is resolved
//! once at backend construction; the shared backend implementation never
//! mentions a concrete key.

pub struct InfoKeys {
    pub name: &'static str,
    pub virus: &'static str,
    pub virus_type: &'static str,
    pub subset: &'static str,
    pub assay: &'static str,
    pub date: &'static str,
    pub lab: &'static str,
    pub rbc_species: &'static str,
    pub sources: &'static str,
}

pub struct AntigenKeys {
    pub name: &'static str,
    pub date: &'static str,
    pub passage: &'static str,
    pub reassortant: &'static str,
    pub lineage: &'static str,
    pub annotations: &'static str,
    pub lab_ids: &'static str,
}

pub struct SerumKeys {
    pub name: &'static str,
    pub passage: &'static str,
    pub reassortant: &'static str,
    pub lineage: &'static str,
    pub annotations: &'static str,
    pub serum_id: &'static str,
    pub serum_species: &'static str,
    pub homologous: &'static str,
}

pub struct TiterKeys {
    /// List of lists: every cell present.
    pub dense: &'static str,
    /// List of dicts keyed by stringified serum index: measured cells only.
    pub sparse: &'static str,
    /// List of per-source sub-tables, each in either row shape.
    pub layers: &'static str,
}

pub struct ProjectionKeys {
    pub comment: &'static str,
    pub stress: &'static str,
    pub layout: &'static str,
}

pub struct Keys {
    pub format_name: &'static str,
    /// Key of the chart object inside the document root.
    pub chart: &'static str,
    /// Older files of a format may nest the chart under a second name.
    pub chart_fallback: Option<&'static str>,
    pub info: &'static str,
    pub info_fields: InfoKeys,
    pub antigens: &'static str,
    pub sera: &'static str,
    pub antigen: AntigenKeys,
    pub serum: SerumKeys,
    pub titers: &'static str,
    pub titer_keys: TiterKeys,
    pub column_bases: &'static str,
    pub projections: &'static str,
    pub projection: ProjectionKeys,
    pub plot_spec: &'static str,
}

/// ACE: single-letter keys.
pub static ACE_KEYS: Keys = Keys {
    format_name: "ACE",
    chart: "c",
    chart_fallback: None,
    info: "i",
    info_fields: InfoKeys {
        name: "N",
        virus: "v",
        virus_type: "V",
        subset: "s",
        assay: "A",
        date: "D",
        lab: "l",
        rbc_species: "r",
        sources: "S",
    },
    antigens: "a",
    sera: "s",
    antigen: AntigenKeys {
        name: "N",
        date: "D",
        passage: "P",
        reassortant: "R",
        lineage: "L",
        annotations: "a",
        lab_ids: "l",
    },
    serum: SerumKeys {
        name: "N",
        passage: "P",
        reassortant: "R",
        lineage: "L",
        annotations: "a",
        serum_id: "I",
        serum_species: "s",
        homologous: "h",
    },
    titers: "t",
    titer_keys: TiterKeys {
        dense: "l",
        sparse: "d",
        layers: "L",
    },
    column_bases: "C",
    projections: "P",
    projection: ProjectionKeys {
        comment: "c",
        stress: "s",
        layout: "l",
    },
    plot_spec: "p",
};

/// ACD1: long names.
pub static ACD1_KEYS: Keys = Keys {
    format_name: "ACD1",
    chart: "chart",
    chart_fallback: Some("table"),
    info: "info",
    info_fields: InfoKeys {
        name: "name",
        virus: "virus",
        virus_type: "virus_type",
        subset: "subset",
        assay: "assay",
        date: "date",
        lab: "lab",
        rbc_species: "rbc_species",
        sources: "sources",
    },
    antigens: "antigens",
    sera: "sera",
    antigen: AntigenKeys {
        name: "name",
        date: "date",
        passage: "passage",
        reassortant: "reassortant",
        lineage: "lineage",
        annotations: "annotations",
        lab_ids: "lab_id",
    },
    serum: SerumKeys {
        name: "name",
        passage: "passage",
        reassortant: "reassortant",
        lineage: "lineage",
        annotations: "annotations",
        serum_id: "serum_id",
        serum_species: "serum_species",
        homologous: "homologous",
    },
    titers: "titers",
    titer_keys: TiterKeys {
        dense: "titers_list_of_list",
        sparse: "titers_list_of_dict",
        layers: "layers_dict_for_antigen",
    },
    column_bases: "column_bases",
    projections: "projections",
    projection: ProjectionKeys {
        comment: "comment",
        stress: "stress",
        layout: "layout",
    },
    plot_spec: "plot_spec",
};
