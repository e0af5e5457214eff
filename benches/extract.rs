use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use opwarden::core::extract::{decode_body, extract_blocks, strip_blocks};

fn fenced(body: &str) -> String {
    format!("```fileop\n{}\n```", body)
}

fn response_with_blocks(count: usize) -> String {
    let mut text = String::from("Here is the change you asked for.\n\n");
    for i in 0..count {
        text.push_str(&fenced(&format!(
            r#"{{"operation": "WRITE_FILE", "path": "src/File{}.cs", "content": "using System;\nclass File{} {{ }}"}}"#,
            i, i
        )));
        text.push_str("\n\nNext file:\n\n");
    }
    text
}

/// Extraction cost as the number of blocks in a response grows
fn bench_extract_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_blocks");
    for count in [1usize, 10, 50] {
        let text = response_with_blocks(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| {
                let blocks = extract_blocks(black_box(text));
                black_box(strip_blocks(text, &blocks));
            });
        });
    }
    group.finish();
}

/// Per-tier decode cost
fn bench_decode_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_body");

    let strict = r#"{"operation": "write", "path": "a.cs", "content": "line1\nline2"}"#;
    group.bench_function("strict", |b| b.iter(|| decode_body(black_box(strict))));

    let repair = "{\"operation\": \"write\", \"path\": \"a.cs\", \"content\": \"say \"hi\"\nline2\"}";
    group.bench_function("content_repair", |b| b.iter(|| decode_body(black_box(repair))));

    let reconstruct = "{\"operation\": \"write\", \"path\": \"a\\q.cs\", \"content\": \"x\ny\"";
    group.bench_function("field_reconstruction", |b| {
        b.iter(|| decode_body(black_box(reconstruct)))
    });

    group.finish();
}

criterion_group!(benches, bench_extract_blocks, bench_decode_tiers);
criterion_main!(benches);
