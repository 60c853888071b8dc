use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_coupler::coupling::transport::{
    MeshPartition, PartitionRequest, StepMessage, Transport, TransportError,
};
use mesh_coupler::prelude::*;

/// Transport that is never reached; the benchmarks stay in topology setup.
struct Idle;

impl Transport for Idle {
    fn establish_partition(&mut self, _: &PartitionRequest) -> Result<Vec<MeshPartition>, TransportError> {
        Ok(Vec::new())
    }
    fn exchange_initial_data(&mut self, _: MeshId, _: Vec<FieldBuffer>) -> Result<Vec<FieldBuffer>, TransportError> {
        Ok(Vec::new())
    }
    fn send_step_data(&mut self, _: StepMessage) -> Result<(), TransportError> {
        Ok(())
    }
    fn receive_step_data(&mut self) -> Result<StepMessage, TransportError> {
        Err(TransportError::new("idle"))
    }
    fn compute_mapping(&mut self, _: MeshId, _: MeshId) -> Result<(), TransportError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn session(vertices: usize) -> (CouplingSession<Idle>, MeshId, DataId, Vec<VertexId>) {
    let scheme = SchemeConfig::new(SchemeOrder::Parallel, SchemeKind::Explicit, "Fluid", "Solid", 0.1)
        .with_max_time_windows(1)
        .with_exchange("Force", "FluidMesh", "Fluid", "Solid", false);
    let config = CouplingConfig::new(3, scheme)
        .with_mesh("FluidMesh")
        .with_data("Force", Arity::Vector)
        .with_participant(ParticipantConfig::new("Fluid").provides("FluidMesh").writes("Force", "FluidMesh"))
        .with_participant(ParticipantConfig::new("Solid").receives("FluidMesh", "Fluid").reads("Force", "FluidMesh"));
    let mut s = CouplingSession::new("Fluid", config, 0, 1, Idle).expect("valid config");
    let mesh = s.mesh_id("FluidMesh").expect("mesh");
    let coords: Vec<f64> = (0..vertices)
        .flat_map(|i| {
            let t = i as f64;
            [t.cos(), t.sin(), t * 1e-3]
        })
        .collect();
    let v = s.create_vertices(mesh, &coords).expect("vertices");
    let force = s.data_id("Force", mesh).expect("data");
    (s, mesh, force, v)
}

fn bench_data_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_store");

    for &n in &[1_000usize, 10_000usize] {
        let (mut s, mesh, force, v) = session(n);
        let values: Vec<f64> = (0..n * 3).map(|k| k as f64).collect();

        group.bench_with_input(BenchmarkId::new("write_block_vector", n), &n, |b, _| {
            b.iter(|| {
                s.write_block_vector(force, &v, black_box(&values)).expect("write");
            });
        });

        group.bench_with_input(BenchmarkId::new("read_block_vector", n), &n, |b, _| {
            b.iter(|| {
                let out = s.read_block_vector(force, &v).expect("read");
                black_box(out);
            });
        });

        let probes: Vec<f64> = values.iter().take(300).map(|x| x * 1e-4).collect();
        group.bench_with_input(BenchmarkId::new("lookup_vertex_ids", n), &n, |b, _| {
            b.iter(|| {
                let out = s.lookup_vertex_ids(mesh, black_box(&probes)).expect("lookup");
                black_box(out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_data_store);
criterion_main!(benches);
