//! Per-file orchestration and batch processing.
//!
//! Each file walks `Decoding → Analyzing → Quantizing → Encoding →
//! Recompressing → Comparing`, ending in `Done`, `Fallback` or `Failed`.
//! Every stage has one success transition and one fallback transition; the
//! only user-visible failures are an undecodable source and a failed WebP
//! encode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::analyze::analyze;
use crate::codec::{EncodeParams, ImageFormat, RasterCodec};
use crate::color::PixelBuffer;
use crate::error::{Error, Result};
use crate::events::{EventSink, LogSink, Stage, StageEvent};
use crate::policy::PolicyTable;
use crate::quantize::QuantizationEngine;
use crate::recompress::{RecompressionController, Recompressor};
use crate::search::FilterSearchEncoder;

/// Highest accepted quality and optimization level.
const MAX_DIAL: u8 = 100;

/// One input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// File name, used for output naming.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Declared MIME type, if any.
    pub mime: Option<String>,
}

impl InputFile {
    /// File with no declared MIME type.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime: None,
        }
    }

    /// Attach a declared MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// How the optimized artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Quantized, filter-searched (and possibly recompressed) PNG.
    Optimized,
    /// Direct lossless re-encode after a quantization or encoding failure.
    Fallback,
    /// The original bytes, verbatim.
    Original,
}

/// Output for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationResult {
    /// Input name.
    pub original_name: String,
    /// Input size in bytes.
    pub original_size: usize,
    /// Name for the optimized artifact (same as the input).
    pub optimized_name: String,
    /// Optimized artifact; never larger than the input.
    pub optimized_bytes: Vec<u8>,
    /// `optimized_bytes.len()`.
    pub optimized_size: usize,
    /// Name for the WebP sibling.
    pub webp_name: String,
    /// WebP sibling encoded from the decoded pixels.
    pub webp_bytes: Vec<u8>,
    /// `webp_bytes.len()`.
    pub webp_size: usize,
    /// Decoded source dimensions.
    pub original_dims: (u32, u32),
    /// Dimensions of the optimized artifact.
    pub optimized_dims: (u32, u32),
    /// Dimensions of the WebP sibling.
    pub webp_dims: (u32, u32),
    /// Path that produced `optimized_bytes`.
    pub outcome: Outcome,
}

impl OptimizationResult {
    /// Fraction of the original size saved by the optimized artifact.
    pub fn savings(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.optimized_size as f64 / self.original_size as f64
    }
}

/// Batch progress, reported in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the file.
    pub index: usize,
    /// Files in the batch.
    pub total: usize,
    /// File name.
    pub name: String,
}

/// Cooperative cancellation flag, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Name of the WebP sibling: the last extension replaced by `.webp`.
///
/// An extension is a `.` followed by at least one character, none of them
/// `/` or `.`. Names without one get `.webp` appended.
pub fn webp_name(name: &str) -> String {
    if let Some(pos) = name.rfind('.') {
        let ext = &name[pos + 1..];
        if !ext.is_empty() && !ext.contains('/') {
            return format!("{}.webp", &name[..pos]);
        }
    }
    format!("{name}.webp")
}

/// Whether a file should enter the pipeline: PNG or JPEG by declared MIME
/// type or by extension, either one sufficing.
pub fn is_supported_input(name: &str, mime: Option<&str>) -> bool {
    let by_mime = mime.is_some_and(|m| {
        matches!(
            m.to_ascii_lowercase().as_str(),
            "image/png" | "image/jpeg" | "image/jpg"
        )
    });
    let by_ext = name.rsplit_once('.').is_some_and(|(_, ext)| {
        matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg")
    });
    by_mime || by_ext
}

/// The optimization pipeline, bound to a codec.
pub struct Optimizer<C> {
    codec: C,
    policy: PolicyTable,
    engine: QuantizationEngine,
    recompressor: Option<Box<dyn Recompressor>>,
    sink: Box<dyn EventSink>,
    cancel: CancelToken,
}

impl<C: RasterCodec> Optimizer<C> {
    /// Optimizer with the default policy, no recompressor and a [`LogSink`].
    pub fn new(codec: C) -> Self {
        let policy = PolicyTable::default();
        Self {
            codec,
            engine: QuantizationEngine::new(policy.clone()),
            policy,
            recompressor: None,
            sink: Box::new(LogSink),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the policy table.
    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.engine = QuantizationEngine::new(policy.clone());
        self.policy = policy;
        self
    }

    /// Enable budgeted recompression.
    pub fn with_recompressor(mut self, recompressor: Box<dyn Recompressor>) -> Self {
        self.recompressor = Some(recompressor);
        self
    }

    /// Route stage events to `sink`.
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Observe `token` between stages and between files.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Policy in use.
    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Optimize one file.
    ///
    /// Fails only when the source cannot be decoded, the WebP sibling cannot
    /// be encoded, an argument is out of range, or processing was cancelled.
    pub fn process_file(
        &self,
        file: &InputFile,
        quality: u8,
        level: u8,
    ) -> Result<OptimizationResult> {
        if quality > MAX_DIAL {
            return Err(Error::InvalidQuality(quality));
        }
        if level > MAX_DIAL {
            return Err(Error::InvalidLevel(level));
        }
        self.check_cancel()?;

        let original_size = file.size();
        let started = Instant::now();
        let decoded = self.codec.decode(&file.bytes);
        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                self.emit(file, Stage::Failed, started, original_size, 0);
                return Err(e);
            }
        };
        self.emit(file, Stage::Decoding, started, original_size, image.data().len());
        let original_dims = image.dimensions();

        let (optimized, outcome) = match ImageFormat::sniff(&file.bytes) {
            Some(ImageFormat::Png) => self.optimize_png(file, &image, level)?,
            // Only PNG is re-encoded; other formats keep their bytes.
            _ => (file.bytes.clone(), Outcome::Original),
        };

        let started = Instant::now();
        let (optimized, outcome) = if optimized.len() >= original_size {
            (file.bytes.clone(), Outcome::Original)
        } else {
            (optimized, outcome)
        };
        self.emit(file, Stage::Comparing, started, original_size, optimized.len());

        self.check_cancel()?;
        let started = Instant::now();
        let webp = self.codec.encode(
            &image,
            &EncodeParams::WebP {
                quality: quality as f32 / 100.0,
            },
        )?;
        if webp.is_empty() {
            return Err(Error::Encoding("webp encoder returned no data".to_string()));
        }
        self.emit(file, Stage::WebP, started, image.data().len(), webp.len());

        let optimized_dims = match outcome {
            Outcome::Original => original_dims,
            _ => self.codec.dimensions(&optimized).unwrap_or(original_dims),
        };
        let webp_dims = self.codec.dimensions(&webp).unwrap_or(original_dims);

        log::info!(
            "{}: {} -> {} bytes ({:?}), webp {} bytes",
            file.name,
            original_size,
            optimized.len(),
            outcome,
            webp.len()
        );
        self.emit(file, Stage::Done, Instant::now(), original_size, optimized.len());

        Ok(OptimizationResult {
            original_name: file.name.clone(),
            original_size,
            optimized_name: file.name.clone(),
            optimized_size: optimized.len(),
            optimized_bytes: optimized,
            webp_name: webp_name(&file.name),
            webp_size: webp.len(),
            webp_bytes: webp,
            original_dims,
            optimized_dims,
            webp_dims,
            outcome,
        })
    }

    /// PNG path with its fallbacks. Only cancellation escapes.
    fn optimize_png(
        &self,
        file: &InputFile,
        image: &PixelBuffer,
        level: u8,
    ) -> Result<(Vec<u8>, Outcome)> {
        match self.quantize_and_encode(file, image, level) {
            Ok(bytes) => return Ok((bytes, Outcome::Optimized)),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => log::warn!("{}: {e}; falling back to a direct re-encode", file.name),
        }

        let started = Instant::now();
        let direct = self.codec.encode(
            image,
            &EncodeParams::Png {
                filter: None,
                palette: None,
            },
        );
        match direct {
            Ok(bytes) if !bytes.is_empty() => {
                self.emit(file, Stage::Fallback, started, image.data().len(), bytes.len());
                Ok((bytes, Outcome::Fallback))
            }
            Ok(_) | Err(_) => {
                log::warn!("{}: direct re-encode failed, keeping original", file.name);
                self.emit(file, Stage::Fallback, started, image.data().len(), file.size());
                Ok((file.bytes.clone(), Outcome::Original))
            }
        }
    }

    fn quantize_and_encode(
        &self,
        file: &InputFile,
        image: &PixelBuffer,
        level: u8,
    ) -> Result<Vec<u8>> {
        let original_size = file.size();

        self.check_cancel()?;
        let started = Instant::now();
        let stats = analyze(image, &self.policy);
        self.emit(file, Stage::Analyzing, started, image.data().len(), image.data().len());
        log::debug!(
            "{}: {} colors, alpha: {}, gradients: {}",
            file.name,
            stats.unique_colors,
            stats.has_alpha,
            stats.has_gradients
        );

        self.check_cancel()?;
        let started = Instant::now();
        let target = self.policy.palette_size(level, stats.unique_colors);
        let quantized = self.engine.quantize(image, target, &stats, level)?;
        let palette = quantized.palette.sorted_by_frequency(&quantized.image);
        self.emit(
            file,
            Stage::Quantizing,
            started,
            image.data().len(),
            quantized.image.data().len(),
        );

        self.check_cancel()?;
        let started = Instant::now();
        let codec: &dyn RasterCodec = &self.codec;
        let controller = self
            .recompressor
            .as_deref()
            .map(|r| RecompressionController::new(r, codec, &self.policy.recompression));
        let mut search = FilterSearchEncoder::new(codec);
        if let Some(controller) = controller.as_ref() {
            search = search.with_fallback_recompression(
                controller,
                self.policy.recompression.default_reduction,
            );
        }
        let encoded = search.encode(&quantized.image, &palette, original_size)?;
        self.emit(
            file,
            Stage::Encoding,
            started,
            quantized.image.data().len(),
            encoded.bytes.len(),
        );

        let Some(controller) = controller else {
            return Ok(encoded.bytes);
        };
        self.check_cancel()?;
        let started = Instant::now();
        let reduction = level as f64 / 100.0;
        let recompressed =
            controller.run(&encoded.bytes, original_size, reduction, image.dimensions());
        self.emit(
            file,
            Stage::Recompressing,
            started,
            encoded.bytes.len(),
            recompressed.bytes.len(),
        );
        Ok(recompressed.bytes)
    }

    /// Optimize files one at a time, in order.
    ///
    /// `on_progress` sees each file before it is processed. Failed files are
    /// logged and omitted; cancellation stops before the next file.
    pub fn process_batch(
        &self,
        files: &[InputFile],
        quality: u8,
        level: u8,
        mut on_progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Vec<OptimizationResult> {
        let total = files.len();
        let mut results = Vec::with_capacity(total);
        for (i, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::info!("batch cancelled after {i} of {total} files");
                break;
            }
            if let Some(cb) = on_progress.as_mut() {
                cb(Progress {
                    index: i + 1,
                    total,
                    name: file.name.clone(),
                });
            }
            match self.process_file(file, quality, level) {
                Ok(result) => results.push(result),
                Err(Error::Cancelled) => break,
                Err(e) => log::warn!("skipping {}: {e}", file.name),
            }
        }
        results
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn emit(
        &self,
        file: &InputFile,
        stage: Stage,
        started: Instant,
        bytes_in: usize,
        bytes_out: usize,
    ) {
        self.sink.record(&StageEvent {
            file: file.name.clone(),
            stage,
            duration: started.elapsed(),
            bytes_in,
            bytes_out,
        });
    }
}

#[cfg(feature = "parallel")]
impl<C: RasterCodec> Optimizer<C> {
    /// Optimize files on a pool of at most `jobs` workers.
    ///
    /// Results come back in input order with failures omitted. Progress is
    /// reported in file order as each prefix of the batch completes.
    pub fn process_batch_parallel(
        &self,
        files: &[InputFile],
        quality: u8,
        level: u8,
        jobs: usize,
        mut on_progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Vec<OptimizationResult> {
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build() {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("worker pool unavailable ({e}), processing sequentially");
                return self.process_batch(files, quality, level, on_progress);
            }
        };

        let total = files.len();
        let mut slots: Vec<Option<Result<OptimizationResult>>> = (0..total).map(|_| None).collect();
        let (tx, rx) = std::sync::mpsc::channel();

        pool.in_place_scope(|scope| {
            for (i, file) in files.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = self.process_file(file, quality, level);
                    // The receiver outlives the scope.
                    let _ = tx.send((i, result));
                });
            }
            drop(tx);

            let mut next = 0;
            for (i, result) in rx {
                slots[i] = Some(result);
                while next < total && slots[next].is_some() {
                    if let Some(cb) = on_progress.as_mut() {
                        cb(Progress {
                            index: next + 1,
                            total,
                            name: files[next].name.clone(),
                        });
                    }
                    next += 1;
                }
            }
        });

        let mut results = Vec::with_capacity(total);
        for (file, slot) in files.iter().zip(slots) {
            match slot {
                Some(Ok(result)) => results.push(result),
                Some(Err(Error::Cancelled)) | None => {}
                Some(Err(e)) => log::warn!("skipping {}: {e}", file.name),
            }
        }
        results
    }
}
