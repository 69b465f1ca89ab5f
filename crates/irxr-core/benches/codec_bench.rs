//! Criterion benchmarks for the IRXR core codecs.
//!
//! Measures the per-message cost of the hot paths the client runs every tick:
//! frame decode on the topic channel, announcement decode on the discovery
//! port, and subnet selection on each reconnect.
//!
//! Run with:
//! ```bash
//! cargo bench --package irxr-core --bench codec_bench
//! ```

use std::net::Ipv4Addr;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use irxr_core::protocol::join_envelope;
use irxr_core::{
    decode_announcement, decode_frame, encode_announcement, encode_frame, select_local_ip, Frame,
    HostInfo, DEFAULT_SUBNET_MASK,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_topic_frame(payload_len: usize) -> Vec<u8> {
    let body = vec![b'x'; payload_len];
    encode_frame(&Frame::last(join_envelope("RigidObjects", &body))).unwrap()
}

fn make_announcement() -> Vec<u8> {
    let mut info = HostInfo::new("sim-server");
    info.add_topic("RigidObjects");
    info.add_topic("SceneUpdate");
    info.add_service("Register");
    info.add_service("LoadScene");
    encode_announcement("SimPub", &info).unwrap()
}

fn make_interfaces() -> Vec<Ipv4Addr> {
    (0..8).map(|i| Ipv4Addr::new(10, i, 0, 5)).collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    for size in [64usize, 1024, 64 * 1024] {
        let bytes = make_topic_frame(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| decode_frame(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn bench_announcement_decode(c: &mut Criterion) {
    let datagram = make_announcement();
    let sender = "192.168.1.10".parse().unwrap();
    c.bench_function("announcement_decode", |b| {
        b.iter(|| decode_announcement(black_box(&datagram), "SimPub", sender).unwrap())
    });
}

fn bench_subnet_select(c: &mut Criterion) {
    let interfaces = make_interfaces();
    c.bench_function("subnet_select_last_of_8", |b| {
        b.iter(|| select_local_ip(black_box("10.7.0.200"), DEFAULT_SUBNET_MASK, &interfaces))
    });
}

criterion_group!(
    benches,
    bench_frame_decode,
    bench_announcement_decode,
    bench_subnet_select
);
criterion_main!(benches);
