//! Benchmarks for the quantizers, the filter search and the whole pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use optipix::analyze::analyze;
use optipix::png::filter::apply_filters;
use optipix::png::FilterType;
use optipix::quantize::{
    DistanceFormula, DitherMode, NeuQuant, PaletteApplier, PaletteBuilder, QuantizationEngine,
    Remapper, RgbQuant, WuQuant,
};
use optipix::search::FilterSearchEncoder;
use optipix::{
    EncodeParams, InputFile, NativeCodec, Optimizer, Palette, PixelBuffer, PolicyTable, RasterCodec,
};

fn gradient_image(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let mut seed = 0x1234_5678u32;
    for y in 0..height {
        for x in 0..width {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            let jitter = (seed >> 28) as u8;
            let r = ((x * 255) / width) as u8;
            let g = ((y * 255) / height) as u8;
            let b = (((x + y) * 127) / (width + height)) as u8;
            data.extend_from_slice(&[r.saturating_add(jitter), g, b, 255]);
        }
    }
    PixelBuffer::new(width, height, data).unwrap()
}

fn bench_palette_builders(c: &mut Criterion) {
    let image = gradient_image(256, 256);
    let formula = DistanceFormula::select(false, true);
    let (wu, rgb, neu) = (WuQuant, RgbQuant::default(), NeuQuant::default());
    let builders: [(&str, &dyn PaletteBuilder); 3] =
        [("wu", &wu), ("rgbquant", &rgb), ("neuquant", &neu)];

    let mut group = c.benchmark_group("palette_build");
    group.throughput(Throughput::Elements(image.pixel_count() as u64));
    group.sample_size(20);
    for (name, builder) in builders {
        for colors in [64usize, 256] {
            group.bench_with_input(BenchmarkId::new(name, colors), &colors, |b, &colors| {
                b.iter(|| builder.build(black_box(&image), colors, formula))
            });
        }
    }
    group.finish();
}

fn bench_remap(c: &mut Criterion) {
    let image = gradient_image(256, 256);
    let formula = DistanceFormula::select(false, true);
    let palette = Palette::new(WuQuant.build(&image, 128, formula)).unwrap();

    let mut group = c.benchmark_group("remap");
    group.throughput(Throughput::Elements(image.pixel_count() as u64));
    for (name, mode) in [
        ("nearest", DitherMode::Nearest),
        ("floyd_steinberg", DitherMode::FloydSteinberg),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| Remapper.apply(black_box(&image), &palette, mode, formula))
        });
    }
    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let image = gradient_image(512, 512);
    let row_bytes = 512 * 4;

    let mut group = c.benchmark_group("png_filters");
    group.throughput(Throughput::Bytes(image.data().len() as u64));
    for filter in FilterType::ALL {
        group.bench_function(format!("{filter:?}"), |b| {
            b.iter(|| apply_filters(black_box(image.data()), row_bytes, 512, 4, Some(filter)))
        });
    }
    group.bench_function("adaptive", |b| {
        b.iter(|| apply_filters(black_box(image.data()), row_bytes, 512, 4, None))
    });
    group.finish();
}

fn bench_filter_search(c: &mut Criterion) {
    let image = gradient_image(256, 256);
    let policy = PolicyTable::default();
    let stats = analyze(&image, &policy);
    let quantized = QuantizationEngine::new(policy)
        .quantize(&image, 128, &stats, 70)
        .unwrap();
    let palette = quantized.palette.sorted_by_frequency(&quantized.image);
    let codec = NativeCodec::default();

    let mut group = c.benchmark_group("filter_search");
    group.sample_size(10);
    group.bench_function("five_filters_256", |b| {
        let search = FilterSearchEncoder::new(&codec);
        b.iter(|| search.encode(black_box(&quantized.image), &palette, 1 << 20))
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let image = gradient_image(256, 256);
    let codec = NativeCodec::new(6);
    let bytes = codec
        .encode(
            &image,
            &EncodeParams::Png {
                filter: Some(FilterType::None),
                palette: None,
            },
        )
        .unwrap();
    let file = InputFile::new("bench.png", bytes);
    let optimizer = Optimizer::new(codec);

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    for level in [20u8, 45, 60, 85] {
        group.bench_with_input(BenchmarkId::new("level", level), &level, |b, &level| {
            b.iter(|| optimizer.process_file(black_box(&file), 80, level))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_palette_builders,
    bench_remap,
    bench_filters,
    bench_filter_search,
    bench_pipeline
);
criterion_main!(benches);
