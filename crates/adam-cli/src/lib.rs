//! Library side of the `adam` binary: logging setup and file-level pipeline.

pub mod logging;
pub mod pipeline;
