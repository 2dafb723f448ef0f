use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;

use platecal_core::error::{PlatecalError, Result};
use platecal_core::io::fits::{write_float_image, FitsImage, HeaderValue};
use platecal_core::solver::{PlateSolver, SolveOutcome};

pub const BIAS_ADU: f32 = 100.0;
pub const DARK_SIGNAL_ADU: f32 = 50.0;
pub const DARK_EXPOSURE: f64 = 60.0;
pub const FLAT_SIGNAL_ADU: f32 = 1000.0;
pub const SIZE: (usize, usize) = (4, 6);

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Write a 32-bit float FITS file holding `data` (ADU) plus extra header cards.
pub fn write_fits(path: &Path, data: Array2<f32>, cards: &[(&str, HeaderValue)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    write_float_image(path, &data, cards).unwrap();
}

pub fn text(s: &str) -> HeaderValue {
    HeaderValue::Text(s.to_string())
}

/// Header cards of a light frame from the capture software.
pub fn light_cards(filter: &str, exposure: f64, binning: i64) -> Vec<(&'static str, HeaderValue)> {
    vec![
        ("IMAGETYP", text("LIGHT")),
        ("FILTER", text(filter)),
        ("EXPTIME", HeaderValue::Float(exposure)),
        ("XBINNING", HeaderValue::Integer(binning)),
        ("SWCREATE", text("N.I.N.A. 3.1.2.9001")),
    ]
}

pub fn flat_cards(filter: &str, binning: i64) -> Vec<(&'static str, HeaderValue)> {
    vec![
        ("IMAGETYP", text("FLAT")),
        ("FILTER", text(filter)),
        ("EXPTIME", HeaderValue::Float(2.5)),
        ("XBINNING", HeaderValue::Integer(binning)),
    ]
}

pub fn uniform(value: f32) -> Array2<f32> {
    Array2::from_elem(SIZE, value)
}

/// Master dark, master bias and one "Ha" flat under the default layout.
///
/// Dark = bias + 50 ADU at 60 s, flat = bias + 1000 ADU, so an unscaled
/// calibration of a uniform light `L` yields `L - 150` ADU.
pub fn write_masters(input: &Path) {
    write_fits(
        &input.join("DARK").join("Dark_Master-c.fits"),
        uniform(BIAS_ADU + DARK_SIGNAL_ADU),
        &[
            ("IMAGETYP", text("DARK")),
            ("EXPTIME", HeaderValue::Float(DARK_EXPOSURE)),
            ("XBINNING", HeaderValue::Integer(1)),
        ],
    );
    write_fits(
        &input.join("BIAS").join("Bias_Master-c.fits"),
        uniform(BIAS_ADU),
        &[("IMAGETYP", text("BIAS"))],
    );
    write_fits(
        &input.join("FLATS").join("F_Ha.fits"),
        uniform(BIAS_ADU + FLAT_SIGNAL_ADU),
        &flat_cards("Ha 7nm", 1),
    );
}

/// A uniform light frame in the input directory.
pub fn write_light(input: &Path, name: &str, adu: f32) -> PathBuf {
    let path = input.join(name);
    write_fits(&path, uniform(adu), &light_cards("Ha", DARK_EXPOSURE, 1));
    path
}

/// Physical pixel values of a FITS file.
pub fn read_pixels(path: &Path) -> Array2<f32> {
    FitsImage::open(path).unwrap().data
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Build a FITS file from raw header cards and big-endian data bytes.
/// Cards are padded byte-wise, so non-ASCII text keeps every card at 80 bytes.
pub fn raw_fits(cards: &[&str], data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    for card in cards.iter().copied().chain(std::iter::once("END")) {
        let mut record = [b' '; CARD_SIZE];
        let bytes = card.as_bytes();
        let n = bytes.len().min(CARD_SIZE);
        record[..n].copy_from_slice(&bytes[..n]);
        buf.extend_from_slice(&record);
    }
    buf.resize(buf.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
    buf.extend_from_slice(data);
    buf.resize(buf.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
    buf
}

/// Write a raw FITS file, see [`raw_fits`].
pub fn write_raw(path: &Path, cards: &[&str], data: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, raw_fits(cards, data)).unwrap();
    path.to_path_buf()
}

/// What a scripted solve attempt does.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Script {
    Solve,
    Fail,
    /// The solver could not be started.
    Unavailable,
}

/// Plate solver double. Writes `.ini` and `.wcs` result files next to the
/// image, like the real solver does, and records every call.
pub struct ScriptedSolver {
    script: Script,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedSolver {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PlateSolver for ScriptedSolver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn solve(&self, path: &Path) -> Result<SolveOutcome> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        match self.script {
            Script::Unavailable => Err(PlatecalError::Solver("not installed".into())),
            Script::Solve => {
                fs::write(path.with_extension("ini"), "PLTSOLVD=T\n")?;
                fs::write(path.with_extension("wcs"), "CRVAL1 = 10.68\n")?;
                Ok(SolveOutcome::Solved)
            }
            Script::Fail => {
                fs::write(path.with_extension("ini"), "PLTSOLVD=F\n")?;
                Ok(SolveOutcome::Failed { code: Some(1) })
            }
        }
    }
}
