use std::ffi::OsStr;
use std::path::Path;

use platecal_core::error::PlatecalError;
use platecal_core::solver::{ExternalSolver, PlateSolver, SolveOutcome};

#[test]
fn test_placeholder_becomes_single_argument() {
    let solver = ExternalSolver::new(
        "astap",
        vec!["-f".into(), "{file}".into(), "-update".into()],
    );
    let path = Path::new("/data/night one/MN M31 00000001.fits");
    let cmd = solver.command(path);
    let args: Vec<&OsStr> = cmd.get_args().collect();
    assert_eq!(
        args,
        vec![
            OsStr::new("-f"),
            OsStr::new("/data/night one/MN M31 00000001.fits"),
            OsStr::new("-update"),
        ]
    );
    assert_eq!(cmd.get_program(), "astap");
}

#[test]
fn test_name_is_executable_stem() {
    let solver = ExternalSolver::new("/opt/astap/astap_cli", vec!["{file}".into()]);
    assert_eq!(solver.name(), "astap_cli");
}

#[test]
fn test_missing_executable_is_solver_error() {
    let solver = ExternalSolver::new(
        "/nonexistent/platecal-test-solver",
        vec!["{file}".into()],
    );
    let result = solver.solve(Path::new("frame.fits"));
    assert!(matches!(result, Err(PlatecalError::Solver(_))));
}

#[cfg(unix)]
#[test]
fn test_exit_status_decides_outcome() {
    let ok = ExternalSolver::new("true", vec!["{file}".into()]);
    assert_eq!(
        ok.solve(Path::new("frame.fits")).unwrap(),
        SolveOutcome::Solved
    );

    let failing = ExternalSolver::new("false", vec!["{file}".into()]);
    let outcome = failing.solve(Path::new("frame.fits")).unwrap();
    assert_eq!(outcome, SolveOutcome::Failed { code: Some(1) });
    assert!(!outcome.is_solved());
}
