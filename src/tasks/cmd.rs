/* ********************************************************************** **
**  This file is part of kdots.                                           **
**                                                                        **
**  kdots is free software: you can redistribute it and/or modify it      **
**  under the terms of the GNU General Public License as published by the **
**  Free Software Foundation, either version 3 of the License, or (at     **
**  your option) any later version.                                       **
**                                                                        **
**      http://www.gnu.org/licenses/                                      **
**                                                                        **
** Do note that, while the whole of kdots is licensed under the GPL, many **
** parts of it are licensed under more permissive terms.                  **
** ********************************************************************** */

use crate::FailResult;

use kdots_gauge::{fix_all, DirStore, DumpSource, GaugeFixer, GaugeReport};
use kdots_mesh::MeshTopology;
use kdots_overlap::{BlochPhaseSource, LogProgress, OverlapEngine, PointPhaseTable, ResultStore, UniformPhase};
use kdots_tasks_config::{Settings, ValidatedSettings, YamlRead};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GAUGE_REPORT_FILENAME: &str = "gauge-report.json";
pub const FAILED_EDGES_FILENAME: &str = "failed-edges.json";

// mirrored blocks are exact conjugates; anything past rounding is a bug
const HERMITIAN_TOL: f64 = 1e-12;

/// Read and validate a settings file.
pub fn read_settings(path: impl AsRef<Path>) -> FailResult<ValidatedSettings> {
    let path = path.as_ref();
    let settings = Settings::from_reader(kdots_fs_util::open_text(path)?)
        .map_err(|e| format_err!("{}: {}", path.display(), e))?;
    Ok(settings.validate()?)
}

fn build_pool(settings: &ValidatedSettings) -> FailResult<rayon::ThreadPool> {
    let threads = settings.threads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("kdots-worker-{}", i))
        .build()
        .map_err(|e| format_err!("could not start {} worker threads: {}", threads, e))
}

//=================================================================

/// Fix the gauge of every wavefunction in a solver dump, writing one file
/// per field into `output`, along with the gauge report.
pub fn run_gauge_fix(
    settings: &ValidatedSettings,
    dump: &Path,
    output: &Path,
) -> FailResult<GaugeReport> {
    let dims = settings.dims();
    let mode = settings.spinor();
    let pool = build_pool(settings)?;

    info!("Reading wavefunctions from '{}'", dump.display());
    let source = DumpSource::load(dump, dims, mode)?;
    let sink = DirStore::create(output, mode)?;

    let fixer = {
        GaugeFixer::new(settings.reference_point(), mode)
            .with_threshold(settings.gauge().threshold)
    };
    let report = fix_all(&fixer, &dims, &source, &sink, settings.gauge().on_ambiguous, &pool)?;

    let report_path = output.join(GAUGE_REPORT_FILENAME);
    kdots_fs_util::write_then_rename(&report_path, |w| -> FailResult<()> {
        serde_json::to_writer_pretty(&mut *w, &report)?;
        writeln!(w)?;
        Ok(())
    })?;
    info!("Gauge report written to '{}'", report_path.display());

    Ok(report)
}

//=================================================================

/// Paths read by [`run_overlaps`].
#[derive(Debug, Clone)]
pub struct OverlapInputs {
    /// `(N, D)` integer table; `-1` where there is no neighbor.
    pub neighbors: PathBuf,
    /// `(nr, N)` complex table of per-point Bloch phases.
    ///
    /// When absent, the phase is taken to be one everywhere.
    pub phase: Option<PathBuf>,
    /// Directory written by [`run_gauge_fix`].
    pub wavefunctions: PathBuf,
}

/// Compute the overlap tensor and save it into `output`.
///
/// Nothing is written unless the whole computation succeeds.
pub fn run_overlaps(
    settings: &ValidatedSettings,
    inputs: &OverlapInputs,
    output: &Path,
) -> FailResult<ResultStore> {
    let dims = settings.dims();
    let mode = settings.spinor();

    let mesh = MeshTopology::load(&inputs.neighbors)?;
    mesh.check_dims(&dims)?;

    let phases: Box<dyn BlochPhaseSource> = match &inputs.phase {
        Some(path) => {
            let table = PointPhaseTable::load(path)?;
            table.check_dims(&dims)?;
            Box::new(table)
        },
        None => {
            warn!("No Bloch phase table given; using a phase of one everywhere");
            Box::new(UniformPhase { grid_points: dims.grid_points })
        },
    };
    let wavefunctions = DirStore::open(&inputs.wavefunctions, mode)?;

    let pool = build_pool(settings)?;
    let progress = LogProgress::new(mesh.edges().len());
    let result = {
        OverlapEngine::new(&mesh, &wavefunctions, &*phases, dims, mode)
            .on_missing(settings.overlap().on_missing, settings.fill_value())
            .progress(&progress)
            .run(&pool)?
    };
    result.check_hermitian(&mesh, HERMITIAN_TOL)?;

    kdots_fs_util::create_dir_all(output)?;
    result.save(output)?;
    if !result.failed_edges().is_empty() {
        write_failed_edges(&result, &output.join(FAILED_EDGES_FILENAME))?;
    }
    Ok(result)
}

fn write_failed_edges(result: &ResultStore, path: &Path) -> FailResult<()> {
    let edges = result.failed_edges().iter().map(|edge| json!({
        "point": edge.point,
        "direction": edge.direction,
        "neighbor": edge.neighbor,
        "reverse": edge.reverse,
    })).collect::<Vec<_>>();

    kdots_fs_util::write_then_rename(path, |w| -> FailResult<()> {
        serde_json::to_writer_pretty(&mut *w, &edges)?;
        writeln!(w)?;
        Ok(())
    })?;
    warn!("The filled edges are listed in '{}'", path.display());
    Ok(())
}
