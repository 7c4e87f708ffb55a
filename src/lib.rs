//! # xbcarve
//!
//! Carves structured game assets (textures, audio, models, scripts, archives,
//! UI binaries, executables) out of opaque Xbox 360 process memory dumps.
//!
//! The pipeline maps the dump read-only, streams overlapping windows through a
//! multi-pattern signature matcher, validates and sizes each candidate with a
//! per-format header parser, and extracts the survivors in parallel while a
//! shared manifest accumulates one entry per written file.

pub mod boundary;
pub mod cli;
pub mod convert;
pub mod extract;
pub mod formats;
pub mod logging;
pub mod manifest;
pub mod matcher;
pub mod pathext;
pub mod pipeline;
pub mod pool;
pub mod reader;
pub mod registry;
pub mod util;
pub mod writer;
