//! Encoding benchmarks
//!
//! Run with: cargo bench --bench encoding

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entity_bridge::entity::{Pose, VirtualEntity};
use entity_bridge::facade::VersionFacade;
use entity_bridge::metrics::Metrics;
use entity_bridge::net::codec::PacketWriter;
use entity_bridge::protocol::ProtocolVersion;
use rand::Rng;

fn bench_var_int(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let values: Vec<i32> = (0..1024).map(|_| rng.gen()).collect();

    let mut group = c.benchmark_group("var_int");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("write_1024", |b| {
        let mut writer = PacketWriter::with_capacity(5 * values.len());
        b.iter(|| {
            writer.reset();
            for value in &values {
                writer.write_var_int(black_box(*value));
            }
            black_box(writer.len())
        })
    });
    group.finish();
}

fn bench_spawn_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_group");

    for version in ProtocolVersion::ALL {
        let facade = VersionFacade::new(version, Arc::new(Metrics::new()));
        let label = facade.new_text_label_entity("Wave 12 - 3 villagers left");
        let npc = facade.new_humanoid_entity();
        let pose = Pose::new(120.5, 64.0, -33.25).with_rotation(135.0, -10.0);

        group.bench_with_input(BenchmarkId::new("text_label", version), &pose, |b, pose| {
            b.iter(|| label.spawn_packets_for(black_box(pose)))
        });
        group.bench_with_input(BenchmarkId::new("humanoid", version), &pose, |b, pose| {
            b.iter(|| npc.spawn_packets_for(black_box(pose)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_var_int, bench_spawn_groups);
criterion_main!(benches);
