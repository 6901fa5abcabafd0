//! Capture pipeline benchmark suite.
//!
//! Benchmarks the snapshot stages on synthetic pages:
//! - Section counts: 10, 100, 1000
//! - Stages: base64 scrub, DOM walk, full pipeline, async capture
//!
//! Run with: cargo bench --bench capture
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use page_bridge::capture::{
    CaptureOptions, CapturePipeline, CaptureSource, scrub_base64_images, walk_dom,
};
use page_bridge::content::StaticPage;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SECTION_COUNTS: &[usize] = &[10, 100, 1000];

/// A 1x1 transparent GIF.
const PIXEL: &str = "R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

// ============================================================================
// Page Generator
// ============================================================================

fn synthetic_page(sections: usize) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Bench</title>\
         <style>.hero { background: url(data:image/png;base64,iVBORw0KGgo=) }</style>\
         <script>window.tracking = true;</script></head><body>",
    );

    for n in 0..sections {
        html.push_str(&format!(
            "<section class=\"s{n}\" id=\"sec-{n}\" style=\"margin: 4px; color: red\">\
             <h2>Section {n}</h2><p>Paragraph {n} with <a href=\"/p/{n}\">a link</a>.</p>\
             <img src=\"data:image/gif;base64,{PIXEL}\" width=\"1\" height=\"1\">\
             <div style=\"display:none\">hidden {n}</div>\
             <noscript>enable scripts</noscript></section>"
        ));
    }

    html.push_str("</body></html>");
    html
}

// ============================================================================
// Benchmark: Stages
// ============================================================================

fn bench_scrub(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrub_base64");

    for &sections in SECTION_COUNTS {
        let page = synthetic_page(sections);
        group.throughput(Throughput::Bytes(page.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &page, |b, page| {
            b.iter(|| scrub_base64_images(black_box(page)));
        });
    }

    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk_dom");

    for &sections in SECTION_COUNTS {
        let page = synthetic_page(sections);
        group.throughput(Throughput::Bytes(page.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &page, |b, page| {
            b.iter(|| walk_dom(black_box(page)));
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");

    for (label, options) in [
        ("scrub_only", CaptureOptions::new()),
        ("with_dom_walk", CaptureOptions::new().with_dom_walk(true)),
    ] {
        let pipeline = CapturePipeline::new(options);
        for &sections in SECTION_COUNTS {
            let page = synthetic_page(sections);
            group.throughput(Throughput::Bytes(page.len() as u64));
            group.bench_with_input(BenchmarkId::new(label, sections), &page, |b, page| {
                b.iter(|| pipeline.sanitize(black_box(page), "Bench", CaptureSource::LiveDom));
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Async Capture
// ============================================================================

fn bench_capture(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("capture");
    let pipeline = CapturePipeline::new(CaptureOptions::new().with_refetch(false));

    for &sections in SECTION_COUNTS {
        let page = Arc::new(StaticPage::new(
            "https://bench.test/",
            "Bench",
            synthetic_page(sections),
        ));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &page, |b, page| {
            b.to_async(&rt)
                .iter(|| async { pipeline.capture(page.as_ref()).await.expect("capture") });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scrub, bench_walk, bench_pipeline, bench_capture);
criterion_main!(benches);
