//! # optipix
//!
//! Content-adaptive PNG recompression driven by a single optimization dial,
//! with a lossy WebP sibling for every input.
//!
//! A PNG goes through color analysis, palette size selection, one of three
//! quantizers (Wu, median cut, NeuQuant), frequency-ordered palettes, an
//! exhaustive five-filter encode search and optional budgeted
//! recompression. The result is never larger than the input and never
//! changes pixel dimensions.
//!
//! ## Features
//!
//! - `parallel`: batch processing on a bounded rayon pool, plus parallel
//!   adaptive row filtering
//! - `oxipng`: lossless [`recompress::OxipngRecompressor`]
//! - `cli`: the `optipix` binary (default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use optipix::{InputFile, NativeCodec, Optimizer};
//!
//! let bytes = std::fs::read("logo.png").unwrap();
//! let optimizer = Optimizer::new(NativeCodec::default());
//! let result = optimizer
//!     .process_file(&InputFile::new("logo.png", bytes), 80, 70)
//!     .unwrap();
//! assert!(result.optimized_size <= result.original_size);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analyze;
pub mod codec;
pub mod color;
pub mod error;
pub mod events;
pub mod palette;
pub mod pipeline;
pub mod png;
pub mod policy;
pub mod quantize;
pub mod recompress;
pub mod resize;
pub mod search;

pub use analyze::ColorStats;
pub use codec::{EncodeParams, ImageFormat, NativeCodec, RasterCodec};
pub use color::{PixelBuffer, Rgba};
pub use error::{Error, Result};
pub use events::{EventSink, LogSink, NullSink, Stage, StageEvent};
pub use palette::Palette;
pub use pipeline::{
    is_supported_input, webp_name, CancelToken, InputFile, OptimizationResult, Optimizer, Outcome,
    Progress,
};
pub use policy::{PolicyTable, QuantAlgorithm};
pub use recompress::{DownscaleRecompressor, Drift, RecompressionController, Recompressor};
