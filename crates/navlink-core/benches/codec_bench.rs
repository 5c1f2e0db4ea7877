//! Criterion benchmarks for the navlink frame codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package navlink-core --bench codec_bench
//! ```

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use navlink_core::protocol::{decode_frame, encode_message, split_datagram, Dialect, FieldValue, Message};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn int_params(pairs: &[(&str, i64)]) -> BTreeMap<String, FieldValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Int(*v)))
        .collect()
}

fn make_check_in(dialect: &Dialect) -> Message {
    let def = dialect.by_name("CHECK_IN").unwrap();
    Message::build(
        def,
        &int_params(&[("boot_id", 123), ("msg_seq", 1), ("time_ms", 1000), ("ttl_ms", 5000)]),
    )
    .unwrap()
}

fn make_task_request(dialect: &Dialect) -> Message {
    let def = dialect.by_name("AVAILABLE_TASK_REQUEST").unwrap();
    let mut params = int_params(&[
        ("boot_id", 1),
        ("msg_seq", 2),
        ("time_ms", 3),
        ("ttl_ms", 4),
        ("count", 8),
    ]);
    for name in ["task_id", "task_type"] {
        params.insert(name.to_string(), FieldValue::Text("1,2,3,4,5,6,7,8".to_string()));
    }
    for name in ["lat", "lng", "alt"] {
        params.insert(
            name.to_string(),
            FieldValue::FloatArray(vec![1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5]),
        );
    }
    Message::build(def, &params).unwrap()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let dialect = Dialect::navlink();
    let messages = [
        ("HEARTBEAT", Message::heartbeat()),
        ("CHECK_IN", make_check_in(&dialect)),
        ("AVAILABLE_TASK_REQUEST", make_task_request(&dialect)),
    ];

    let mut group = c.benchmark_group("encode_message");
    for (name, msg) in &messages {
        group.bench_with_input(BenchmarkId::new("msg", name), msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg), black_box(1), 252, 1).unwrap());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let dialect = Dialect::navlink();
    let messages = [
        ("HEARTBEAT", Message::heartbeat()),
        ("CHECK_IN", make_check_in(&dialect)),
        ("AVAILABLE_TASK_REQUEST", make_task_request(&dialect)),
    ];

    let mut group = c.benchmark_group("decode_frame");
    for (name, msg) in &messages {
        let bytes = encode_message(msg, 1, 252, 1).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("msg", name), &bytes, |b, bytes| {
            b.iter(|| {
                let (frame, _) = decode_frame(black_box(bytes), &dialect).unwrap();
                frame.message(&dialect).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_split_datagram(c: &mut Criterion) {
    let dialect = Dialect::navlink();
    let mut datagram = vec![0x00, 0x11, 0x22];
    for seq in 0..4 {
        datagram.extend(encode_message(&Message::heartbeat(), seq, 1, 1).unwrap());
        datagram.extend(encode_message(&make_check_in(&dialect), seq, 252, 1).unwrap());
    }

    c.bench_function("split_datagram_8_frames", |b| {
        b.iter(|| split_datagram(black_box(&datagram), &dialect));
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_split_datagram);
criterion_main!(benches);
