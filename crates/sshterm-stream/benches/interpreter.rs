use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sshterm_stream::{Interpreter, ParserState, SequencePolicy};

/// Colored `ls --color` style listing
fn colored_listing(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        out.extend_from_slice(
            format!(
                "\x1b[0m\x1b[01;34mdir{i}\x1b[0m  \x1b[01;32mscript{i}.sh\x1b[0m  file{i}.txt\r\n"
            )
            .as_bytes(),
        );
    }
    out
}

/// Plain shell output with no sequences
fn plain_output(lines: usize) -> Vec<u8> {
    "total 42 drwxr-xr-x  2 user user 4096 Jan  1 12:00 somewhere\r\n"
        .repeat(lines)
        .into_bytes()
}

/// Prompt-heavy output with private modes and cursor movement
fn prompt_output(lines: usize) -> Vec<u8> {
    "\x1b[?2004h\x1b[32muser@host\x1b[0m:\x1b[34m~/src\x1b[0m$ \x1b[K\x1b[?2004l\r\n"
        .repeat(lines)
        .into_bytes()
}

fn bench_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret");

    for (name, input) in [
        ("plain", plain_output(200)),
        ("colored", colored_listing(200)),
        ("prompt", prompt_output(200)),
    ] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        for policy in [SequencePolicy::Strict, SequencePolicy::AnyFinalByte] {
            let interpreter = Interpreter::new(policy);
            group.bench_with_input(
                BenchmarkId::new(name, format!("{policy:?}")),
                &input,
                |b, input| {
                    b.iter(|| {
                        let (segments, state) =
                            interpreter.interpret(black_box(input.as_slice()), ParserState::new());
                        black_box((segments, state));
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_chunked(c: &mut Criterion) {
    let input = colored_listing(200);
    let interpreter = Interpreter::default();
    let mut group = c.benchmark_group("interpret_chunked");
    group.throughput(Throughput::Bytes(input.len() as u64));

    for chunk_size in [16usize, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut state = ParserState::new();
                    let mut count = 0;
                    for chunk in input.chunks(size) {
                        let (segments, next) = interpreter.interpret(black_box(chunk), state);
                        count += segments.len();
                        state = next;
                    }
                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_interpret, bench_chunked);
criterion_main!(benches);
