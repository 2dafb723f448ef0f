use std::path::Path;

use console::Style;
use platecal_core::pipeline::config::PipelineConfig;
use platecal_core::pipeline::{Destination, FileState, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    failure: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            failure: Style::new().red(),
        }
    }
}

pub fn print_run_config(input: &Path, config: &PipelineConfig) {
    let s = Styles::new();
    let layout = &config.layout;

    println!();
    println!("  {}", s.title.apply_to("Plate Calibration"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(17)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Solver"),
        s.method.apply_to(config.solver.executable.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Solved"),
        s.path.apply_to(layout.success_dir(input).display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Failed"),
        s.path.apply_to(layout.failure_dir(input).display())
    );
    println!();

    let profile = &config.calibration;
    println!("  {}", s.header.apply_to("Calibration"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Dark"),
        s.path.apply_to(layout.dark_path(input).display())
    );
    match profile.synthetic_bias_adu {
        Some(adu) => println!(
            "    {:<14}{}",
            s.label.apply_to("Bias"),
            s.value.apply_to(format!("{adu} ADU (synthetic)"))
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Bias"),
            s.path.apply_to(layout.bias_path(input).display())
        ),
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Flats"),
        s.path.apply_to(layout.flats_dir(input).display())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Scaling"),
        s.method.apply_to(profile.scaling)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Tolerance"),
        s.value.apply_to(format!("{} s", profile.exposure_tolerance_secs))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Hot pixels"),
        s.value.apply_to(format!("{} ADU", profile.hot_pixel_adu))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Clip fill"),
        s.method.apply_to(profile.clip_fill)
    );
    println!();

    if !config.naming.delete_unmatched {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Unmatched"),
            s.disabled.apply_to("kept")
        );
        println!();
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Results"));
    let rows = [
        ("Files", summary.records.len()),
        ("Renamed", summary.renamed()),
        ("Solved", summary.solved()),
        ("Calibrated", summary.calibrated()),
        ("Solved dir", summary.routed_to(Destination::Success)),
        ("Failed dir", summary.routed_to(Destination::Failure)),
        ("Deleted", summary.deleted()),
    ];
    for (label, count) in rows {
        println!(
            "    {:<14}{}",
            s.label.apply_to(label),
            s.value.apply_to(count)
        );
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Sequence"),
        s.value.apply_to(format!(
            "{} -> {}",
            summary.initial_sequence, summary.final_sequence
        ))
    );
    println!();

    if summary.with_errors() == 0 {
        return;
    }
    println!("  {}", s.header.apply_to("Problems"));
    for record in &summary.records {
        let Some(ref err) = record.error else {
            continue;
        };
        let state = match record.state {
            FileState::Routed(_) | FileState::Deleted | FileState::Skipped => {
                record.state.to_string()
            }
            other => format!("stopped at {other}"),
        };
        println!(
            "    {} {}",
            s.failure.apply_to(&record.original_name),
            s.label.apply_to(format!("({state})"))
        );
        println!("      {}", err);
    }
    println!();
}
