use std::ffi::{CStr, CString};
use std::fs;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::{sys, FitsFile};
use ndarray::Array2;
use tracing::debug;

use crate::consts::FULL_SCALE;
use crate::error::{PlatecalError, Result};
use crate::frame::FrameInfo;

/// cfitsio record buffer: 80 columns plus the terminating NUL.
const RECORD_BUFFER_LEN: usize = 81;
const KEYWORD_WIDTH: usize = 8;

/// Keywords describing the data layout of one particular file. They are
/// never carried from a template header into a new file.
const LAYOUT_KEYWORDS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "BZERO", "BSCALE", "CHECKSUM",
    "DATASUM", "END",
];

/// A header value to write.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Primary header of an open FITS file. Values are read on demand.
pub struct FitsHeader {
    file: FitsFile,
    hdu: FitsHdu,
}

impl FitsHeader {
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = FitsFile::open(path)?;
        let hdu = file.primary_hdu()?;
        Ok(Self { file, hdu })
    }

    pub fn get_str(&mut self, key: &str) -> Option<String> {
        self.hdu.read_key::<String>(&mut self.file, key).ok()
    }

    pub fn get_f64(&mut self, key: &str) -> Option<f64> {
        self.hdu.read_key::<f64>(&mut self.file, key).ok()
    }

    /// Integer value. Whole reals such as `2.0` are accepted.
    pub fn get_i64(&mut self, key: &str) -> Option<i64> {
        self.get_f64(key)
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i64)
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.get_str(key).is_some() || self.get_f64(key).is_some()
    }

    /// Number of header records, END excluded.
    pub fn record_count(&mut self) -> Result<usize> {
        Ok(header_records(&mut self.file)?.len())
    }
}

/// Primary image with physical pixel values (BZERO and BSCALE applied).
#[derive(Clone, Debug)]
pub struct FitsImage {
    /// BITPIX of the stored samples.
    pub bitpix: i64,
    /// shape = (NAXIS2, NAXIS1)
    pub data: Array2<f32>,
    info: FrameInfo,
}

impl FitsImage {
    /// Open a FITS file and read its primary image.
    pub fn open(path: &Path) -> Result<Self> {
        let mut header = FitsHeader::read(path)?;
        let bitpix = match &header.hdu.info {
            HduInfo::ImageInfo { shape, image_type } if shape.len() == 2 => bitpix_of(image_type),
            HduInfo::ImageInfo { shape, .. } => {
                return Err(PlatecalError::UnsupportedShape(shape.len() as i64));
            }
            _ => {
                return Err(PlatecalError::InvalidFits(
                    "Primary HDU holds no image".into(),
                ));
            }
        };

        let width = axis_len(&mut header, "NAXIS1")?;
        let height = axis_len(&mut header, "NAXIS2")?;
        let expected = width.checked_mul(height).ok_or_else(|| {
            PlatecalError::InvalidFits(format!("Image {width}x{height} is too large"))
        })?;

        let pixels: Vec<f32> = header.hdu.read_image(&mut header.file)?;
        if pixels.len() != expected {
            return Err(PlatecalError::InvalidFits(format!(
                "Expected {expected} pixels, read {}",
                pixels.len()
            )));
        }
        let data = Array2::from_shape_vec((height, width), pixels)
            .map_err(|e| PlatecalError::InvalidFits(e.to_string()))?;

        let info = FrameInfo::from_header(&mut header);
        Ok(Self { bitpix, data, info })
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    /// Pixel values divided by the 16-bit full scale.
    pub fn normalized(&self) -> Array2<f32> {
        self.data.mapv(|v| v / FULL_SCALE)
    }
}

/// Write `data` as 32-bit float samples with the given keywords.
pub fn write_float_image(
    path: &Path,
    data: &Array2<f32>,
    keys: &[(&str, HeaderValue)],
) -> Result<()> {
    let samples: Vec<f32> = data.iter().copied().collect();
    write_atomically(path, ImageType::Float, data.dim(), |file, hdu| {
        for (key, value) in keys {
            write_value(file, hdu, key, value)?;
        }
        hdu.write_image(file, &samples)?;
        Ok(())
    })
}

/// Write normalized values as unsigned 16-bit samples (BITPIX 16,
/// BZERO 32768, BSCALE 1).
///
/// Every header record of `template` except the layout keywords and `keys`
/// is carried over unchanged. Records holding bytes outside printable ASCII
/// are dropped.
pub fn write_calibrated(
    template: &Path,
    path: &Path,
    normalized: &Array2<f32>,
    keys: &[(&str, HeaderValue)],
) -> Result<()> {
    let carried = {
        let mut source = FitsFile::open(template)?;
        header_records(&mut source)?
    };
    let samples: Vec<u16> = normalized.iter().map(|&v| quantize_u16(v)).collect();

    write_atomically(path, ImageType::UnsignedShort, normalized.dim(), |file, hdu| {
        let existing = header_records(file)?;
        for record in &carried {
            let keyword = record_keyword(record);
            if LAYOUT_KEYWORDS.iter().any(|k| k.as_bytes() == keyword)
                || keys.iter().any(|(k, _)| k.as_bytes().eq_ignore_ascii_case(keyword))
                || existing.contains(record)
            {
                continue;
            }
            if !record.to_bytes().iter().all(|b| (0x20..=0x7e).contains(b)) {
                debug!(keyword = %String::from_utf8_lossy(keyword), "Dropping non-ASCII header record");
                continue;
            }
            append_record(file, record)?;
        }
        for (key, value) in keys {
            write_value(file, hdu, key, value)?;
        }
        hdu.write_image(file, &samples)?;
        Ok(())
    })
}

/// Create the file under a temporary sibling name and rename it into place,
/// so a failed write never leaves a partial file at `path`.
fn write_atomically<F>(
    path: &Path,
    data_type: ImageType,
    (height, width): (usize, usize),
    fill: F,
) -> Result<()>
where
    F: FnOnce(&mut FitsFile, &FitsHdu) -> Result<()>,
{
    let tmp = temp_sibling(path);
    match fs::remove_file(&tmp) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }

    let written = (|| -> Result<()> {
        let description = ImageDescription {
            data_type,
            dimensions: &[height, width],
        };
        let mut file = FitsFile::create(&tmp)
            .with_custom_primary(&description)
            .open()?;
        let hdu = file.primary_hdu()?;
        fill(&mut file, &hdu)
    })();

    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path).map_err(PlatecalError::from)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn write_value(file: &mut FitsFile, hdu: &FitsHdu, key: &str, value: &HeaderValue) -> Result<()> {
    match value {
        HeaderValue::Text(s) => hdu.write_key(file, key, s.clone())?,
        HeaderValue::Integer(v) => hdu.write_key(file, key, *v)?,
        HeaderValue::Float(v) => hdu.write_key(file, key, *v)?,
    }
    Ok(())
}

fn axis_len(header: &mut FitsHeader, key: &'static str) -> Result<usize> {
    let value = header
        .get_i64(key)
        .ok_or(PlatecalError::MissingKeyword(key))?;
    usize::try_from(value)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| PlatecalError::InvalidFits(format!("{key} = {value}")))
}

fn bitpix_of(image_type: &ImageType) -> i64 {
    match image_type {
        ImageType::UnsignedByte | ImageType::Byte => 8,
        ImageType::Short | ImageType::UnsignedShort => 16,
        ImageType::Long | ImageType::UnsignedLong => 32,
        ImageType::LongLong => 64,
        ImageType::Float => -32,
        ImageType::Double => -64,
    }
}

fn quantize_u16(normalized: f32) -> u16 {
    let v = if normalized.is_finite() { normalized } else { 0.0 };
    (v * FULL_SCALE).clamp(0.0, FULL_SCALE).round() as u16
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

fn record_keyword(record: &CStr) -> &[u8] {
    let bytes = record.to_bytes();
    let keyword = &bytes[..bytes.len().min(KEYWORD_WIDTH)];
    let end = keyword.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &keyword[..end]
}

/// Raw primary header records, END excluded.
fn header_records(file: &mut FitsFile) -> Result<Vec<CString>> {
    file.primary_hdu()?;
    let mut status: c_int = 0;
    let mut count: c_int = 0;
    let mut free: c_int = 0;
    let mut records = Vec::new();
    unsafe {
        let fptr = file.as_raw();
        sys::ffghsp(fptr, &mut count, &mut free, &mut status);
        check_status(status, "header size")?;
        for index in 1..=count {
            let mut buf = [0 as c_char; RECORD_BUFFER_LEN];
            sys::ffgrec(fptr, index, buf.as_mut_ptr(), &mut status);
            check_status(status, "header record read")?;
            records.push(CStr::from_ptr(buf.as_ptr()).to_owned());
        }
    }
    Ok(records)
}

fn append_record(file: &mut FitsFile, record: &CStr) -> Result<()> {
    let mut status: c_int = 0;
    unsafe {
        let fptr = file.as_raw();
        sys::ffprec(fptr, record.as_ptr(), &mut status);
    }
    check_status(status, "header record write")
}

fn check_status(status: c_int, operation: &str) -> Result<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(PlatecalError::InvalidFits(format!(
            "cfitsio status {status} during {operation}"
        )))
    }
}
