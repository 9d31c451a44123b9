use kdots_core::{Complex64, Error};
use kdots_tasks::{read_settings, run_gauge_fix, run_overlaps, OverlapInputs};
use kdots_tasks::{FAILED_EDGES_FILENAME, GAUGE_REPORT_FILENAME};

mod shared;
use self::shared::{real, Scenario};

const BASE: &str = "\
threads: 1
points: 3
directions: 2
bands: 1
grid-points: 2
reference-point: 0
";

// a line of three k-points
const NEIGHBORS: [i64; 6] = [1, -1, 2, 0, -1, 1];

// the wavefunction of k-point 1 vanishes at the reference point
fn fields() -> Vec<Vec<Complex64>> {
    vec![real(&[1.0, 0.5]), real(&[0.0, 1.0]), real(&[2.0, -1.0])]
}

fn kdots_error(e: &failure::Error) -> &Error {
    e.downcast_ref::<Error>().unwrap_or_else(|| panic!("unexpected error: {}", e))
}

#[test]
fn ambiguous_gauge_aborts() {
    let scenario = Scenario::new();
    let settings = read_settings(scenario.write_config(BASE)).unwrap();
    let dump = scenario.write_dump(&fields());
    let wfc = scenario.path("wfc");

    let err = run_gauge_fix(&settings, &dump, &wfc).unwrap_err();
    match kdots_error(&err) {
        Error::GaugeAmbiguous { point: 1, band: 0, .. } => {},
        e => panic!("unexpected error: {}", e),
    }
    assert!(!wfc.join(GAUGE_REPORT_FILENAME).exists());
    let written = std::fs::read_dir(&wfc).map(|dir| dir.count()).unwrap_or(0);
    assert_eq!(written, 0);
}

fn skip_gauge(scenario: &Scenario, overlap: &str) -> Result<kdots_overlap::ResultStore, failure::Error> {
    let config = format!("{}gauge:\n  on-ambiguous: skip\n{}", BASE, overlap);
    let settings = read_settings(scenario.write_config(&config)).unwrap();
    let dump = scenario.write_dump(&fields());
    let wfc = scenario.path("wfc");

    let report = run_gauge_fix(&settings, &dump, &wfc).unwrap();
    assert_eq!(report.skipped().map(|r| r.point).collect::<Vec<_>>(), vec![1]);

    let inputs = OverlapInputs {
        neighbors: scenario.write_neighbors(3, &NEIGHBORS),
        phase: None,
        wavefunctions: wfc,
    };
    run_overlaps(&settings, &inputs, &scenario.path("out"))
}

#[test]
fn skipped_wavefunction_aborts_overlaps() {
    let scenario = Scenario::new();
    let err = skip_gauge(&scenario, "").unwrap_err();
    match kdots_error(&err) {
        Error::MissingArtifact(what) => assert!(what.contains("k-point 1"), "{}", what),
        e => panic!("unexpected error: {}", e),
    }
    assert!(!scenario.path("out").exists());
}

#[test]
fn skipped_wavefunction_is_filled() {
    let scenario = Scenario::new();
    let result = skip_gauge(&scenario, "overlap:\n  on-missing: fill\n").unwrap();

    assert_eq!(result.failed_edges().len(), 2);
    for &(point, direction) in &[(0, 0), (1, 1), (1, 0), (2, 1)] {
        let z = result.dpc(point, direction, 0, 0).unwrap();
        assert!(z.re.is_nan() && z.im.is_nan(), "{:?}", (point, direction, z));
        assert!(result.dp(point, direction, 0, 0).unwrap().is_nan());
    }
    for &(point, direction) in &[(0, 1), (2, 0)] {
        assert_eq!(result.dpc(point, direction, 0, 0).unwrap(), Complex64::new(0.0, 0.0));
    }
    assert!(scenario.path("out").join(FAILED_EDGES_FILENAME).exists());
}
