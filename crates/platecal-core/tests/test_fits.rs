#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use platecal_core::error::PlatecalError;
use platecal_core::frame::ImageKind;
use platecal_core::io::fits::{write_calibrated, FitsHeader, FitsImage, HeaderValue};

use common::{file_names, text, write_fits, write_raw};

const BLOCK_SIZE: u64 = 2880;

fn i16_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn calstat() -> Vec<(&'static str, HeaderValue)> {
    vec![("CALSTAT", text("BDF"))]
}

#[test]
fn test_read_16bit_with_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("offset.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    2",
            "NAXIS2  =                    2",
            "BZERO   =                32768",
            "BSCALE  =                    1",
        ],
        &i16_bytes(&[-32768, -32668, 0, 32767]),
    );
    let image = FitsImage::open(&path).unwrap();
    assert_eq!(image.bitpix, 16);
    assert_eq!(image.width(), 2);
    assert_eq!(image.height(), 2);
    assert_eq!(image.data[[0, 0]], 0.0);
    assert_eq!(image.data[[0, 1]], 100.0);
    assert_eq!(image.data[[1, 0]], 32768.0);
    assert_eq!(image.data[[1, 1]], 65535.0);
    assert_abs_diff_eq!(image.normalized()[[1, 1]], 1.0, epsilon = 1e-6);
}

#[test]
fn test_read_8bit_and_double() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("bytes.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    3",
            "NAXIS2  =                    1",
        ],
        &[0, 128, 255],
    );
    let image = FitsImage::open(&path).unwrap();
    assert_eq!(image.bitpix, 8);
    assert_eq!(image.data.as_slice().unwrap(), &[0.0, 128.0, 255.0]);

    let data: Vec<u8> = [1.5f64, -2.25].iter().flat_map(|v| v.to_be_bytes()).collect();
    let path = write_raw(
        &dir.path().join("double.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =                    2",
            "NAXIS2  =                    1",
        ],
        &data,
    );
    let image = FitsImage::open(&path).unwrap();
    assert_eq!(image.bitpix, -64);
    assert_eq!(image.data.as_slice().unwrap(), &[1.5, -2.25]);
}

#[test]
fn test_calibrated_output_keeps_header_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("solved.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    1",
            "NAXIS2  =                    1",
            "CRVAL1  =        10.6847083333 / RA of reference point",
            "COMMENT solved by astap",
            "HISTORY frame captured at -10C",
            "IMAGETYP= 'LIGHT   '",
        ],
        &i16_bytes(&[500]),
    );

    let normalized = Array2::from_elem((1, 1), 500.0 / 65535.0);
    write_calibrated(&path, &path, &normalized, &calstat()).unwrap();

    let saved = std::fs::read(&path).unwrap();
    let text = String::from_utf8_lossy(&saved);
    assert!(text.contains("CRVAL1  =        10.6847083333 / RA of reference point"));
    assert!(text.contains("COMMENT solved by astap"));
    assert!(text.contains("HISTORY frame captured at -10C"));
    assert_eq!(saved.len() as u64 % BLOCK_SIZE, 0);

    let reopened = FitsImage::open(&path).unwrap();
    assert_eq!(reopened.bitpix, 16);
    assert_eq!(reopened.info().kind, ImageKind::Light);
    assert_eq!(reopened.info().calibration_status.as_deref(), Some("BDF"));
    assert_eq!(reopened.data[[0, 0]], 500.0);

    let mut header = FitsHeader::read(&path).unwrap();
    assert_eq!(header.get_f64("CRVAL1"), Some(10.6847083333));
    assert_eq!(header.get_i64("BZERO"), Some(32768));
    assert_eq!(header.get_i64("BSCALE"), Some(1));
}

#[test]
fn test_offset_u16_requantization() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("light.fits");
    write_fits(&template, Array2::zeros((1, 4)), &[("IMAGETYP", text("LIGHT"))]);

    let out = dir.path().join("out.fits");
    let normalized = Array2::from_shape_vec((1, 4), vec![-0.2, 0.5, 1.7, f32::NAN]).unwrap();
    write_calibrated(&template, &out, &normalized, &calstat()).unwrap();

    let reopened = FitsImage::open(&out).unwrap();
    assert_eq!(reopened.bitpix, 16);
    assert_eq!(reopened.data.as_slice().unwrap(), &[0.0, 32768.0, 65535.0, 0.0]);
    assert_eq!(reopened.info().kind, ImageKind::Light);
}

#[test]
fn test_existing_keyword_is_replaced_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("light.fits");
    write_fits(&path, Array2::zeros((2, 2)), &[("CALSTAT", text("B"))]);

    write_calibrated(&path, &path, &Array2::zeros((2, 2)), &calstat()).unwrap();

    let saved = std::fs::read(&path).unwrap();
    let occurrences = saved.windows(8).filter(|w| *w == b"CALSTAT ").count();
    assert_eq!(occurrences, 1);
    let mut header = FitsHeader::read(&path).unwrap();
    assert_eq!(header.get_str("CALSTAT").as_deref(), Some("BDF"));
}

#[test]
fn test_non_ascii_record_is_dropped_without_shifting_others() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("observer.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    1",
            "NAXIS2  =                    1",
            "COMMENT observer J\u{e9}r\u{f4}me",
            "CRVAL1  =        10.6847083333 / RA of reference point",
            "IMAGETYP= 'LIGHT   '",
        ],
        &i16_bytes(&[500]),
    );

    let out = dir.path().join("out.fits");
    write_calibrated(&path, &out, &Array2::zeros((1, 1)), &calstat()).unwrap();

    let saved = std::fs::read(&out).unwrap();
    assert_eq!(saved.len() as u64 % BLOCK_SIZE, 0);
    let header_end = saved
        .chunks(80)
        .position(|card| card.starts_with(b"END "))
        .unwrap();
    assert!(saved[..header_end * 80].is_ascii());
    assert!(saved[..header_end * 80]
        .chunks(80)
        .any(|card| card.starts_with(b"CRVAL1  =        10.6847083333")));

    let mut header = FitsHeader::read(&out).unwrap();
    assert_eq!(header.get_f64("CRVAL1"), Some(10.6847083333));
    assert_eq!(header.get_str("IMAGETYP").as_deref(), Some("LIGHT"));
}

#[test]
fn test_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.fits");
    write_fits(&path, Array2::from_elem((3, 3), 1234.0), &[]);

    assert_eq!(file_names(dir.path()), vec!["frame.fits"]);
    assert_eq!(std::fs::metadata(&path).unwrap().len() % BLOCK_SIZE, 0);
    assert_eq!(FitsImage::open(&path).unwrap().data[[2, 2]], 1234.0);
}

#[test]
fn test_header_only_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.fits");
    write_fits(
        &path,
        Array2::zeros((2, 2)),
        &[("FILTER", text("O'III")), ("XBINNING", HeaderValue::Integer(2))],
    );
    let mut header = FitsHeader::read(&path).unwrap();
    assert_eq!(header.get_str("FILTER").as_deref(), Some("O'III"));
    assert_eq!(header.get_i64("XBINNING"), Some(2));
    assert!(header.contains("FILTER"));
    assert!(!header.contains("EXPTIME"));
    assert!(header.record_count().unwrap() >= 7);
}

#[test]
fn test_negative_axis_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("negative.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                   -1",
            "NAXIS2  =                    4",
        ],
        &[],
    );
    assert!(FitsImage::open(&path).is_err());
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("truncated.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                 2000",
            "NAXIS2  =                    2",
        ],
        &[],
    );
    assert!(FitsImage::open(&path).is_err());
}

#[test]
fn test_missing_simple_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("nosimple.fits"),
        &["BITPIX  =                   16"],
        &[],
    );
    assert!(matches!(FitsImage::open(&path), Err(PlatecalError::Fits(_))));
}

#[test]
fn test_unsupported_bitpix() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw(
        &dir.path().join("bitpix24.fits"),
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                   24",
            "NAXIS   =                    2",
            "NAXIS1  =                    1",
            "NAXIS2  =                    1",
        ],
        &[0, 0, 0],
    );
    assert!(matches!(FitsImage::open(&path), Err(PlatecalError::Fits(_))));
}

#[test]
fn test_small_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.fits");
    std::fs::write(&path, b"SIMPLE  =                    T").unwrap();
    assert!(FitsHeader::read(&path).is_err());
}
