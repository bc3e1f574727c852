//! Codec benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hexabus_core::{Codec, Data, DataKind, Packet};
use std::net::SocketAddr;

fn remote() -> SocketAddr {
    "[fe80::50:c4ff:fe04:819a]:61616".parse().unwrap()
}

fn encode_benchmark(c: &mut Criterion) {
    let codec = Codec::new();
    let packet = Packet::info(remote(), Data::uint32(2, 1234));

    c.bench_function("encode_info_uint32", |b| {
        b.iter(|| black_box(codec.encode(&packet).unwrap()))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let codec = Codec::new();
    let encoded = codec
        .encode(&Packet::info(remote(), Data::uint32(2, 1234)))
        .unwrap();

    c.bench_function("decode_info_uint32", |b| {
        b.iter(|| black_box(codec.decode(remote(), &encoded).unwrap()))
    });
}

fn endpoint_info_benchmark(c: &mut Criterion) {
    let codec = Codec::new();
    let packet = Packet::endpoint_info(
        remote(),
        0,
        DataKind::UInt32,
        "Hexabus Socket - Development Version",
    );
    let encoded = codec.encode(&packet).unwrap();

    c.bench_function("roundtrip_endpoint_info", |b| {
        b.iter(|| {
            let frame = codec.encode(black_box(&packet)).unwrap();
            black_box(codec.decode(remote(), &frame))
        })
    });

    c.bench_function("decode_endpoint_info", |b| {
        b.iter(|| black_box(codec.decode(remote(), &encoded).unwrap()))
    });
}

criterion_group!(
    benches,
    encode_benchmark,
    decode_benchmark,
    endpoint_info_benchmark
);
criterion_main!(benches);
