use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use object_store::memory::InMemory;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use warc_publisher::{
    inject_banner, parse_request, parse_response, upload_key, Config, ObjectStoreSink, Pipeline,
    WarcReader,
};

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn warc_record(content_type: &str, block: &str) -> String {
    format!(
        "WARC/1.0\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}\r\n\r\n",
        content_type,
        block.len(),
        block
    )
}

fn sample_archive(transactions: usize) -> Vec<u8> {
    let page = "<html><body>".to_string() + &"<p>archived</p>".repeat(64) + "</body></html>";
    let mut archive = warc_record("application/warc-fields", "software: bench\r\n");

    for i in 0..transactions {
        archive.push_str(&warc_record(
            "application/http;msgtype=request",
            &format!("GET /page/{i}/ HTTP/1.1\r\nHost: example.com\r\n\r\n"),
        ));
        archive.push_str(&warc_record(
            "application/http;msgtype=response",
            &format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
                page.len(),
                page
            ),
        ));
    }

    archive.into_bytes()
}

// === UNIT BENCHMARKS ===

fn benchmark_upload_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_key");
    configure_fast_group(&mut group);

    let paths = vec!["/", "/docs/", "/assets/css/site.min.css", "/a/very/deep/path/"];

    group.bench_function("derive", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(upload_key(path));
            }
        });
    });

    group.finish();
}

fn benchmark_banner_injection(c: &mut Criterion) {
    let mut group = c.benchmark_group("banner_injection");
    configure_fast_group(&mut group);

    let small = b"<html><body><p>hello</p></body></html>".to_vec();
    let large = ("<html><head>".to_string() + &"<meta>".repeat(10_000) + "</head><body></body></html>")
        .into_bytes();

    group.bench_function("small_page", |b| b.iter(|| black_box(inject_banner(&small))));
    group.bench_function("large_head", |b| b.iter(|| black_box(inject_banner(&large))));

    group.finish();
}

fn benchmark_http_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_parsing");
    configure_fast_group(&mut group);

    let request_block = b"GET /docs/intro.html?lang=en HTTP/1.1\r\nHost: example.com\r\nUser-Agent: crawler\r\nAccept: */*\r\n\r\n";
    let response_block = Bytes::from_static(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    );

    group.bench_function("request", |b| b.iter(|| black_box(parse_request(request_block))));

    let request = parse_request(request_block).unwrap();
    group.bench_function("response_and_body", |b| {
        b.iter(|| {
            let response = parse_response(response_block.clone(), &request).unwrap();
            black_box(response.body.read_all())
        })
    });

    group.finish();
}

fn benchmark_warc_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("warc_reader");
    configure_fast_group(&mut group);

    let archive = sample_archive(200);

    group.bench_function("read_400_records", |b| {
        b.iter(|| {
            let reader = WarcReader::new(Cursor::new(archive.as_slice()));
            black_box(reader.filter_map(Result::ok).count())
        })
    });

    group.finish();
}

// === PIPELINE BENCHMARKS ===

fn benchmark_pipeline_in_memory(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline");
    configure_fast_group(&mut group);

    let archive = sample_archive(200);

    for concurrency in [1, 16] {
        group.bench_function(format!("publish_200_pages_{concurrency}_workers"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let sink = Arc::new(ObjectStoreSink::with_store("bench", Arc::new(InMemory::new())));
                    let config = Config {
                        bucket: Some("bench".to_string()),
                        concurrency,
                        add_banner: true,
                        ..Default::default()
                    };
                    let source = WarcReader::new(Cursor::new(archive.clone()));
                    black_box(Pipeline::new(config, sink).run(source).await.unwrap())
                })
            });
        });
    }

    group.finish();
}

// === BENCHMARK GROUPS ===

criterion_group!(
    unit_benches,
    benchmark_upload_key,
    benchmark_banner_injection,
    benchmark_http_parsing,
    benchmark_warc_reader,
);

criterion_group!(pipeline_benches, benchmark_pipeline_in_memory);

criterion_main!(unit_benches, pipeline_benches);
