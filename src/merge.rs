use std::collections::BTreeSet;

use crate::error::{ChartError, Result};
use crate::model::titers::Titers;
use crate::titer::Titer;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// What to do with a cell whose layer readings are all MoreThan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoreThanHandling {
    /// Discard the group: the merged titer is DontCare.
    #[default]
    Ignore,
    /// Keep the widest bound as a numeric `>` titer.
    Adjust,
}

/// Tunables of the cross-layer merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeSettings {
    /// Readings whose logged values scatter wider than this (log2 units) are
    /// considered irreconcilable and merge to DontCare.
    pub sd_threshold: f64,
    pub more_than: MoreThanHandling,
}

impl Default for MergeSettings {
    fn default() -> Self {
        MergeSettings {
            sd_threshold: 1.0,
            more_than: MoreThanHandling::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TiterMerger
// ---------------------------------------------------------------------------

/// Deterministic merge of several independently-measured readings of the
/// same cell, one per source-table layer. Pure and order-independent: the
/// input is treated as a multiset.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiterMerger {
    settings: MergeSettings,
}

impl TiterMerger {
    pub fn new(settings: MergeSettings) -> Self {
        TiterMerger { settings }
    }

    /// Merge the layer readings of one cell into its canonical titer.
    ///
    /// Classification, first match wins:
    /// 1. no readings → DontCare;
    /// 2. any reading without a definite value (Invalid, DontCare, Dodgy)
    ///    is an error;
    /// 3. both LessThan and MoreThan present → DontCare (ambiguous);
    /// 4. all LessThan → the least upper bound;
    /// 5. all MoreThan → per [`MoreThanHandling`];
    /// 6. scatter of the thresholded-adjusted logs above the threshold →
    ///    DontCare (disagreement too large);
    /// 7. LessThan mixed with regular → the tightest still-informative
    ///    upper bound above the regular maximum;
    /// 8. MoreThan mixed with regular → symmetric lower bound;
    /// 9. all regular → antilog of the mean log.
    pub fn merge(&self, layers: &[Titer]) -> Result<Titer> {
        if layers.is_empty() {
            return Ok(Titer::DontCare);
        }

        let mut less: Vec<f64> = Vec::new();
        let mut more: Vec<f64> = Vec::new();
        let mut regular: Vec<f64> = Vec::new();
        for titer in layers {
            match titer {
                Titer::LessThan(_) => less.push(titer.logged()?),
                Titer::MoreThan(_) => more.push(titer.logged()?),
                Titer::Regular(_) => regular.push(titer.logged()?),
                _ => {
                    return Err(ChartError::invalid_titer(
                        titer,
                        "a layer must supply a definite reading",
                    ))
                }
            }
        }

        if !less.is_empty() && !more.is_empty() {
            return Ok(Titer::DontCare); // both-thresholded: ambiguous
        }

        if regular.is_empty() && more.is_empty() {
            // all LessThan: the least of the upper bounds
            return Ok(Titer::from_logged(fold_min(&less), "<"));
        }

        if regular.is_empty() && less.is_empty() {
            // all MoreThan
            return Ok(match self.settings.more_than {
                MoreThanHandling::Ignore => Titer::DontCare,
                MoreThanHandling::Adjust => Titer::from_logged(fold_max(&more), ">"),
            });
        }

        let adjusted: Vec<f64> = layers
            .iter()
            .map(Titer::logged_with_thresholded)
            .collect::<Result<_>>()?;
        let (_, sd) = mean_and_sd(&adjusted);
        if sd > self.settings.sd_threshold {
            return Ok(Titer::DontCare); // disagreement too large
        }

        if !less.is_empty() {
            // LessThan mixed with regular readings
            let regular_max = fold_max(&regular);
            let informative: Vec<f64> = less
                .iter()
                .copied()
                .filter(|bound| bound + 1.0 > regular_max)
                .collect();
            return Ok(if informative.is_empty() {
                Titer::from_logged(regular_max + 1.0, "<")
            } else {
                Titer::from_logged(fold_min(&informative), "<")
            });
        }

        if !more.is_empty() {
            // MoreThan mixed with regular readings, mirrored
            let regular_min = fold_min(&regular);
            let informative: Vec<f64> = more
                .iter()
                .copied()
                .filter(|bound| bound - 1.0 < regular_min)
                .collect();
            return Ok(if informative.is_empty() {
                Titer::from_logged(regular_min - 1.0, ">")
            } else {
                Titer::from_logged(fold_max(&informative), ">")
            });
        }

        let (mean, _) = mean_and_sd(&regular);
        Ok(Titer::from_logged(mean, ""))
    }
}

/// Merge with the default settings; standalone entry point for auditing.
pub fn merge_layers(layers: &[Titer]) -> Result<Titer> {
    TiterMerger::default().merge(layers)
}

// ---------------------------------------------------------------------------
// Merge verifier
// ---------------------------------------------------------------------------

/// Re-run the merge for every layered cell of a chart and report cells whose
/// stored canonical titer differs from the recomputed one, plus measured
/// cells no layer accounts for. Mismatches are warnings (also logged), never
/// changes to the chart.
pub fn verify_merged(titers: &Titers, merger: &TiterMerger) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let mut covered = BTreeSet::new();

    for record in titers.layer_merge_records(1)? {
        covered.insert((record.antigen, record.serum));
        match merger.merge(&record.layer_titers) {
            Ok(expected) if expected != record.merged => {
                let msg = format!(
                    "cell ({}, {}): stored merged titer {} but layers {:?} merge to {}",
                    record.antigen,
                    record.serum,
                    record.merged,
                    record
                        .layer_titers
                        .iter()
                        .map(Titer::to_string)
                        .collect::<Vec<_>>(),
                    expected
                );
                log::warn!("{msg}");
                warnings.push(msg);
            }
            Ok(_) => {}
            Err(err) => {
                let msg = format!(
                    "cell ({}, {}): layer readings not mergeable: {err}",
                    record.antigen, record.serum
                );
                log::warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    for (antigen, serum, titer) in titers.non_dont_cares() {
        if !covered.contains(&(antigen, serum)) {
            let msg = format!(
                "cell ({antigen}, {serum}): measured titer {titer} has no contributing layer reading"
            );
            log::warn!("{msg}");
            warnings.push(msg);
        }
    }

    Ok(warnings)
}

// ---------------------------------------------------------------------------
// Small numeric helpers
// ---------------------------------------------------------------------------

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Mean and population standard deviation.
fn mean_and_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
