pub mod calibration;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod sequence;
pub mod solver;
