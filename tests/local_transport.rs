mod util;

use std::thread;
use std::time::Duration;

use mesh_coupler::prelude::*;
use util::two_way_config;

const FLUID_COORDS: [f64; 6] = [0.0, 0.0, 1.0, 0.0, 2.0, 0.5];

/// Per coupling round: window and iteration computed, whether the window
/// completed, and the partner values read afterwards.
type Trace = Vec<(u64, u32, bool, Vec<f64>)>;

fn run_fluid(config: CouplingConfig, transport: LocalTransport) -> Result<Trace, CouplingError> {
    let mut s = CouplingSession::new("Fluid", config, 0, 1, transport)?;
    let mesh = s.mesh_id("FluidMesh")?;
    let v = s.create_vertices(mesh, &FLUID_COORDS)?;
    let force = s.data_id("Force", mesh)?;
    let displacement = s.data_id("Displacement", mesh)?;
    let mut dt = s.initialize()?;
    let mut trace = Vec::new();
    while s.is_coupling_ongoing()? {
        acknowledge(&mut s)?;
        let w = s.time_window() as f64;
        s.write_block_vector(force, &v, &[w; 6])?;
        let at = (s.time_window(), s.iteration());
        dt = s.advance(dt)?;
        trace.push((at.0, at.1, s.is_time_window_complete()?, s.read_block_scalar(displacement, &v)?));
    }
    s.finalize()?;
    Ok(trace)
}

fn run_solid(config: CouplingConfig, transport: LocalTransport) -> Result<(Trace, Vec<f64>), CouplingError> {
    let mut s = CouplingSession::new("Solid", config, 0, 1, transport)?;
    let mesh = s.mesh_id("FluidMesh")?;
    let force = s.data_id("Force", mesh)?;
    let displacement = s.data_id("Displacement", mesh)?;
    let mut dt = s.initialize()?;
    let (v, coords) = s.mesh_vertices(mesh)?;
    let mut trace = Vec::new();
    while s.is_coupling_ongoing()? {
        acknowledge(&mut s)?;
        let w = s.time_window() as f64;
        s.write_block_scalar(displacement, &v, &vec![10.0 * w; v.len()])?;
        let at = (s.time_window(), s.iteration());
        // the solid subcycles with two half-window steps
        let rest = s.advance(dt / 2.0)?;
        assert!(!s.is_time_window_complete()?);
        dt = s.advance(rest)?;
        trace.push((at.0, at.1, s.is_time_window_complete()?, s.read_block_vector(force, &v)?));
    }
    s.finalize()?;
    Ok((trace, coords))
}

fn acknowledge<T: Transport>(s: &mut CouplingSession<T>) -> Result<(), CouplingError> {
    for action in [RequiredAction::WriteIterationCheckpoint, RequiredAction::ReadIterationCheckpoint] {
        if s.is_action_pending(action)? {
            s.mark_action_satisfied(action)?;
        }
    }
    Ok(())
}

fn run(config: CouplingConfig) -> (Trace, Trace, Vec<f64>) {
    let (fluid_end, solid_end) = LocalTransport::pair("Fluid", "Solid");
    let fluid_end = fluid_end.with_timeout(Duration::from_secs(10));
    let solid_end = solid_end.with_timeout(Duration::from_secs(10));
    let solid_config = config.clone();
    let solid = thread::spawn(move || run_solid(solid_config, solid_end));
    let fluid = run_fluid(config, fluid_end).unwrap();
    let (solid, coords) = solid.join().unwrap().unwrap();
    (fluid, solid, coords)
}

#[test]
fn parallel_explicit_exchanges_both_ways() {
    let (fluid, solid, coords) = run(two_way_config(SchemeOrder::Parallel, SchemeKind::Explicit, 3));
    assert_eq!(coords, FLUID_COORDS.to_vec());
    assert_eq!(fluid.len(), 3);
    for (k, (window, iteration, complete, displacement)) in fluid.iter().enumerate() {
        let w = k as u64 + 1;
        assert_eq!((*window, *iteration, *complete), (w, 1, true));
        assert_eq!(displacement, &vec![10.0 * w as f64; 3]);
    }
    assert_eq!(solid.len(), 3);
    for (k, (_, _, complete, force)) in solid.iter().enumerate() {
        assert!(*complete);
        assert_eq!(force, &vec![k as f64 + 1.0; 6]);
    }
}

#[test]
fn serial_explicit_solid_sees_fluid_data_one_round_ahead() {
    let (fluid, solid, _) = run(two_way_config(SchemeOrder::Serial, SchemeKind::Explicit, 2));
    assert_eq!(fluid.len(), 2);
    assert_eq!(fluid[1].3, vec![20.0; 3]);
    // after window 1 the solid already holds the fluid's window 2 forces
    assert_eq!(solid[0].3, vec![2.0; 6]);
}

#[test]
fn serial_implicit_iterates_to_max_iterations() {
    let mut config = two_way_config(SchemeOrder::Serial, SchemeKind::Implicit, 2);
    config.scheme.convergence = ConvergencePolicy::default().with_max_iterations(3);
    let (fluid, solid, _) = run(config);
    let fluid_steps: Vec<(u64, u32, bool)> = fluid.iter().map(|t| (t.0, t.1, t.2)).collect();
    assert_eq!(
        fluid_steps,
        vec![
            (1, 1, false),
            (1, 2, false),
            (1, 3, true),
            (2, 1, false),
            (2, 2, false),
            (2, 3, true),
        ]
    );
    let solid_complete = solid.iter().filter(|t| t.2).count();
    assert_eq!(solid_complete, 2);
}

#[test]
fn initialize_without_partner_times_out() {
    let (fluid_end, _solid_end) = LocalTransport::pair("Fluid", "Solid");
    let fluid_end = fluid_end.with_timeout(Duration::from_millis(20));
    let config = two_way_config(SchemeOrder::Parallel, SchemeKind::Explicit, 1);
    let mut s = CouplingSession::new("Fluid", config, 0, 1, fluid_end).unwrap();
    let mesh = s.mesh_id("FluidMesh").unwrap();
    s.create_vertices(mesh, &FLUID_COORDS).unwrap();
    let err = s.initialize().unwrap_err();
    assert!(matches!(err, CouplingError::CouplingAborted(msg) if msg.contains("partition")));
    assert_eq!(s.state(), CouplingState::Finalized);
    assert!(s.finalize().is_ok());
}
