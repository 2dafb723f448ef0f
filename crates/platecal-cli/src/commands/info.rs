use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use platecal_core::frame::FrameInfo;
use platecal_core::io::fits::FitsHeader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mut header = FitsHeader::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let info = FrameInfo::from_header(&mut header);

    println!("File:        {}", args.file.display());
    if let (Some(w), Some(h)) = (header.get_i64("NAXIS1"), header.get_i64("NAXIS2")) {
        println!("Dimensions:  {}x{}", w, h);
    }
    if let Some(bitpix) = header.get_i64("BITPIX") {
        println!("BITPIX:      {}", bitpix);
    }
    println!("Type:        {}", info.kind);
    println!("Binning:     {}x", info.binning);

    if let Some(ref filter) = info.filter {
        println!("Filter:      {}", filter);
    }
    if let Some(exposure) = info.exposure_secs {
        println!("Exposure:    {} s", exposure);
    }
    if let Some(ref creator) = info.creator {
        println!("Created by:  {}", creator);
    }
    if let Some(ref status) = info.calibration_status {
        println!("Calibrated:  {}", status);
    }
    let solved = header.contains("CRVAL1") && header.contains("CRVAL2");
    println!("WCS:         {}", if solved { "present" } else { "absent" });
    println!("Cards:       {}", header.record_count()?);

    Ok(())
}
