//! Picking one controller out of the tied best-fit individuals and writing it out.

use fitgrid_core::{FitnessTracker, IndividualRef, SelectionError, non_empty};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::ProgressUpdater;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("failed to write controller file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The chosen individual with its expression text frozen at selection time.
#[derive(Clone)]
pub struct ExportCandidate {
    pub individual: IndividualRef,
    pub exprs: Vec<String>,
    pub size: f64,
}

impl std::fmt::Debug for ExportCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCandidate")
            .field("position", &self.individual.position())
            .field("exprs", &self.exprs)
            .field("size", &self.size)
            .finish()
    }
}

/// Euclidean norm of the per-dimension text lengths.
#[must_use]
pub fn expression_size(exprs: &[String]) -> f64 {
    exprs
        .iter()
        .map(|text| {
            let len = text.chars().count() as f64;
            len * len
        })
        .sum::<f64>()
        .sqrt()
}

/// The winner with the shortest expressions; the earliest one on equal size.
pub fn select_smallest(
    winners: &[IndividualRef],
    progress: Option<&ProgressUpdater>,
) -> Result<ExportCandidate, SelectionError> {
    winners
        .par_iter()
        .enumerate()
        .map(|(idx, individual)| {
            let exprs = individual.expr_text();
            let size = expression_size(&exprs);
            if let Some(progress) = progress {
                progress.update();
            }
            (idx, ExportCandidate {
                individual: individual.clone(),
                exprs,
                size,
            })
        })
        .min_by_key(|(idx, candidate)| (OrderedFloat(candidate.size), *idx))
        .map(|(_, candidate)| candidate)
        .ok_or(SelectionError::EmptySelection)
}

/// Controller file contents: the fitness percentage, then one line per dimension.
#[must_use]
pub fn format_controller(candidate: &ExportCandidate) -> String {
    let percent = candidate.individual.fitness().actual_or_zero() * 100.0;
    let mut out = format!("Controller's fitness: {percent:05.2}%\n");
    for (idx, expr) in candidate.exprs.iter().enumerate() {
        let _ = writeln!(out, "Dof #{idx}: {expr}");
    }
    out
}

pub fn write_controller(path: &Path, candidate: &ExportCandidate) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, format_controller(candidate)).map_err(io_err)
}

/// Select the best-fit individuals, pick the smallest and write it to `path`.
pub fn export_best_fit(
    tracker: &FitnessTracker,
    path: &Path,
    progress: Option<&ProgressUpdater>,
) -> Result<ExportCandidate, ExportError> {
    let winners = non_empty(tracker.get_best_fit_ind())?;
    info!(candidates = winners.len(), "selecting the smallest best-fit individual");
    let candidate = select_smallest(&winners, progress)?;
    write_controller(path, &candidate)?;
    info!(
        path = %path.display(),
        pos = %candidate.individual.position(),
        fitness = %candidate.individual.fitness(),
        size = candidate.size,
        "saved symbolic controller"
    );
    Ok(candidate)
}
