use std::hint::black_box;

use arbor_inputs::ChunkedText;
use arbor_parse::Parser;
use arbor_tables::{Language, fixtures};
use arbor_tree::InputEdit;
use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use ropey::Rope;
use text_size::TextSize;

fn statements(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        text.push_str(&format!("{i} + {} + 7;\n", i * 3));
        if i % 10 == 0 {
            text.push_str("# checkpoint\n");
        }
    }
    text
}

fn benchmark_parser(c: &mut Criterion) {
    let language = Language::new(fixtures::statements());
    let inputs = [("Small", statements(10)), ("Medium", statements(200)), ("Large", statements(2000))];

    let mut group = c.benchmark_group("Parser Benchmark");
    for (name, text) in &inputs {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), text, |b, text| {
            let mut parser = Parser::new(language.clone());
            b.iter(|| black_box(parser.parse(text.as_str())));
        });
        group.bench_with_input(BenchmarkId::new("parse_rope", name), text, |b, text| {
            let rope = Rope::from_str(text);
            let mut parser = Parser::new(language.clone());
            b.iter(|| black_box(parser.parse(&rope)));
        });
        group.bench_with_input(BenchmarkId::new("parse_chunked", name), text, |b, text| {
            let chunks = ChunkedText::new(text.as_bytes().chunks(64).map(<[u8]>::to_vec));
            let mut parser = Parser::new(language.clone());
            b.iter(|| black_box(parser.parse(&chunks)));
        });
    }
    group.finish();
}

fn benchmark_reparse(c: &mut Criterion) {
    let language = Language::new(fixtures::statements());
    let inputs = [("Medium", statements(200)), ("Large", statements(2000))];

    let mut group = c.benchmark_group("Reparse Benchmark");
    for (name, text) in &inputs {
        let mut parser = Parser::new(language.clone());
        let Ok(old) = parser.parse(text.as_str()) else { continue };

        // Turn the first `+` in the middle of the text into `+ 1 +`.
        let Some(at) = text[text.len() / 2..].find('+').map(|offset| offset + text.len() / 2)
        else {
            continue;
        };
        let edit = InputEdit::insert(TextSize::new(at as u32), TextSize::new(4));
        let mut new_text = text.clone();
        edit.apply_to(&mut new_text, "+ 1 ");
        let Ok(edited) = old.edit(&edit) else { continue };

        group.throughput(Throughput::Bytes(new_text.len() as u64));
        group.bench_with_input(BenchmarkId::new("full", name), &new_text, |b, new_text| {
            b.iter(|| black_box(parser.parse(new_text.as_str())));
        });
        group.bench_with_input(BenchmarkId::new("incremental", name), &new_text, |b, new_text| {
            b.iter(|| black_box(parser.reparse(&edited, new_text.as_str())));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_parser, benchmark_reparse);
criterion_main!(benches);
