//! Canonical data model for legacy serological titration charts.
//!
//! Three incompatible legacy text formats store antigens × sera tables of
//! dilution titers: ACE (JSON), ACD1 (a Python dict literal) and LISPMDS
//! (a Lisp form). This crate parses all three into one format-agnostic
//! [`Chart`], and implements the two computations downstream tooling relies
//! on: per-serum column bases and the deterministic merge of per-source
//! titer readings.
//!
//! ```
//! use serochart::{detect_format, parse, Format, MinimumColumnBasis};
//!
//! let text = "(MAKE-MASTER-MDS-WINDOW
//!  :HI-IN '((AG/ONE AG/TWO) (SR-A SR-B) ((40 <10) (* 80)) TABLE-1))";
//! assert_eq!(detect_format(text), Format::Lispmds);
//!
//! let chart = parse(text, Format::Lispmds)?;
//! assert_eq!(chart.number_of_antigens(), 2);
//! assert_eq!(chart.titers().titer(0, 0)?.to_string(), "40");
//!
//! let bases = chart.column_bases(MinimumColumnBasis::none())?;
//! assert_eq!(bases.column_basis(0), 2.0); // log2(40/10)
//! # Ok::<(), serochart::ChartError>(())
//! ```
//!
//! The core is synchronous and I/O-free: callers hand in already-decompressed
//! text and receive either a complete `Chart` or a structured error, never a
//! partial one. Non-fatal findings are collected on the chart
//! ([`Chart::warnings`]) and logged through the `log` facade.

pub mod error;
pub mod format;
pub mod merge;
pub mod model;
pub mod titer;
pub mod tree;

pub use error::{ChartError, Result};
pub use format::{detect_format, parse, parse_auto, ChartBackend, Format};
pub use merge::{merge_layers, verify_merged, MergeSettings, MoreThanHandling, TiterMerger};
pub use model::{
    computed_column_bases, Antigen, Chart, ColumnBases, Info, MergeRecord, MinimumColumnBasis,
    Projection, Serum, TiterData, Titers,
};
pub use titer::Titer;
