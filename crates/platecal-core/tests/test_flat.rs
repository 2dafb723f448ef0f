#[allow(dead_code)]
mod common;

use platecal_core::calibration::{CalibrationError, FlatMatcher};
use platecal_core::io::fits::HeaderValue;

use common::{flat_cards, text, uniform, write_fits};

#[test]
fn test_filter_prefix_and_binning() {
    let dir = tempfile::tempdir().unwrap();
    write_fits(&dir.path().join("F_Ha_bin2.fits"), uniform(1.0), &flat_cards("Ha 7nm", 2));
    write_fits(&dir.path().join("F_Ha_bin1.fits"), uniform(2.0), &flat_cards("Ha 7nm", 1));
    write_fits(&dir.path().join("F_OIII.fits"), uniform(3.0), &flat_cards("OIII", 1));

    let matcher = FlatMatcher::new(dir.path(), "F", "fits");

    let flat = matcher.find("Ha", 1).unwrap().unwrap();
    assert!(flat.path.ends_with("F_Ha_bin1.fits"));
    assert_eq!(flat.filter, "Ha 7nm");
    assert_eq!(flat.binning, 1);
    assert!((flat.data[[0, 0]] - 2.0 / 65535.0).abs() < 1e-9);

    let flat = matcher.find("Ha", 2).unwrap().unwrap();
    assert!(flat.path.ends_with("F_Ha_bin2.fits"));

    assert!(matcher.find("OIII", 2).unwrap().is_none());
    assert!(matcher.find("SII", 1).unwrap().is_none());
}

#[test]
fn test_first_match_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_fits(&dir.path().join("F_b.fits"), uniform(2.0), &flat_cards("L", 1));
    write_fits(&dir.path().join("F_a.fits"), uniform(1.0), &flat_cards("L", 1));

    let matcher = FlatMatcher::new(dir.path(), "F", "fits");
    let flat = matcher.find("L", 1).unwrap().unwrap();
    assert!(flat.path.ends_with("F_a.fits"));
}

#[test]
fn test_non_flats_and_foreign_names_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    // Right filter, wrong frame type.
    write_fits(
        &dir.path().join("F_dark.fits"),
        uniform(1.0),
        &[("IMAGETYP", text("DARK")), ("FILTER", text("Ha"))],
    );
    // No FILTER at all.
    write_fits(
        &dir.path().join("F_nofilter.fits"),
        uniform(1.0),
        &[("IMAGETYP", text("FLAT"))],
    );
    // Missing name prefix.
    write_fits(&dir.path().join("Ha_flat.fits"), uniform(1.0), &flat_cards("Ha", 1));
    // Wrong extension, and not a FITS file.
    std::fs::write(dir.path().join("F_notes.txt"), "flat notes").unwrap();

    let matcher = FlatMatcher::new(dir.path(), "F", ".fits");
    assert!(matcher.find("Ha", 1).unwrap().is_none());
}

#[test]
fn test_extension_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    write_fits(&dir.path().join("F_L.FITS"), uniform(1.0), &flat_cards("L", 1));
    let matcher = FlatMatcher::new(dir.path(), "F", "fits");
    assert!(matcher.find("L", 1).unwrap().is_some());
}

#[test]
fn test_missing_binning_means_one() {
    let dir = tempfile::tempdir().unwrap();
    write_fits(
        &dir.path().join("F_L.fits"),
        uniform(1.0),
        &[("IMAGETYP", text("Flat Field")), ("FILTER", text("L"))],
    );
    let matcher = FlatMatcher::new(dir.path(), "F", "fits");
    assert!(matcher.find("L", 1).unwrap().is_some());
    assert!(matcher.find("L", 2).unwrap().is_none());
}

#[test]
fn test_corrupt_candidate_is_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("F_broken.fits"), vec![b' '; 2880]).unwrap();
    let matcher = FlatMatcher::new(dir.path(), "F", "fits");
    assert!(matches!(
        matcher.find("L", 1),
        Err(CalibrationError::FlatLoadFailure { .. })
    ));
}

#[test]
fn test_missing_directory_is_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let matcher = FlatMatcher::new(dir.path().join("FLATS"), "F", "fits");
    let err = matcher.find("L", 1).unwrap_err();
    assert!(matches!(err, CalibrationError::FlatLoadFailure { .. }));
}

#[test]
fn test_binning_keyword_as_float() {
    let dir = tempfile::tempdir().unwrap();
    write_fits(
        &dir.path().join("F_L.fits"),
        uniform(1.0),
        &[
            ("IMAGETYP", text("FLAT")),
            ("FILTER", text("L")),
            ("XBINNING", HeaderValue::Float(2.0)),
        ],
    );
    let matcher = FlatMatcher::new(dir.path(), "F", "fits");
    assert!(matcher.find("L", 2).unwrap().is_some());
}
