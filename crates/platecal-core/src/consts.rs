/// Minimum pixel count (h*w) to use Rayon parallelism for per-pixel arithmetic.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Full-scale value of the 16-bit source encoding. Buffers are normalized by it.
pub const FULL_SCALE: f32 = 65535.0;

/// CALSTAT value marking bias, dark and flat correction.
pub const CALSTAT_BDF: &str = "BDF";

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Width of the zero-padded sequence token embedded in renamed files.
pub const SEQUENCE_DIGITS: usize = 8;

/// Default exposure difference (seconds) above which the dark is rescaled.
pub const DEFAULT_EXPOSURE_TOLERANCE_SECS: f32 = 20.0;

/// Default hot-pixel threshold in raw ADU. Dark pixels at or above it are not rescaled.
pub const DEFAULT_HOT_PIXEL_ADU: f32 = 2024.0;

/// Exposure tolerance used by the legacy profile.
pub const LEGACY_EXPOSURE_TOLERANCE_SECS: f32 = 40.0;

/// Hot-pixel threshold used by the legacy profile.
pub const LEGACY_HOT_PIXEL_ADU: f32 = 1024.0;

/// Per-second dark gain used by the legacy linear scaling.
pub const LEGACY_LINEAR_GAIN_PER_SEC: f32 = 0.01;

/// Fraction of the difference-image median used to fill non-positive pixels.
pub const CLIP_MEDIAN_FRACTION: f32 = 0.25;

/// Value of SWCREATE written by the capture software whose files get renumbered.
pub const DEFAULT_INSTRUMENT_TAG: &str = "N.I.N.A.";

/// Default path of the ASTAP solver executable.
#[cfg(windows)]
pub const DEFAULT_SOLVER_PATH: &str = "C:\\Program Files\\astap\\astap.exe";

/// Default path of the ASTAP solver executable.
#[cfg(not(windows))]
pub const DEFAULT_SOLVER_PATH: &str = "astap";
