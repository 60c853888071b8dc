mod util;

use mesh_coupler::prelude::*;
use util::{ScriptedTransport, buffer, session_a, step, temperature_config, two_way_config};

fn implicit_config(order: SchemeOrder, max_iterations: u32) -> CouplingConfig {
    let mut config = temperature_config(order, SchemeKind::Implicit, 2);
    config.scheme.convergence = ConvergencePolicy::default().with_max_iterations(max_iterations);
    config
}

#[test]
fn checkpoint_actions_follow_iterations() {
    use RequiredAction::{ReadIterationCheckpoint as Read, WriteIterationCheckpoint as Write};

    let transport = ScriptedTransport::new()
        .with_reply(step(1, 1, vec![], Some(false)))
        .with_reply(step(1, 2, vec![], Some(false)))
        .with_reply(step(1, 3, vec![], Some(true)));
    let (mut s, _, _, _) = session_a(implicit_config(SchemeOrder::Serial, 3), transport);
    let dt = s.initialize().unwrap();
    assert!(s.is_action_pending(Write).unwrap());
    assert!(!s.is_action_pending(Read).unwrap());
    s.mark_action_satisfied(Write).unwrap();

    let mut read_pending = Vec::new();
    for iteration in 1..=3 {
        assert_eq!(s.iteration(), iteration);
        let pending = s.is_action_pending(Read).unwrap();
        read_pending.push(pending);
        if pending {
            s.mark_action_satisfied(Read).unwrap();
        }
        s.advance(dt).unwrap();
    }
    assert_eq!(read_pending, vec![false, true, true]);
    assert!(s.is_time_window_complete().unwrap());
    assert!(!s.is_action_pending(Read).unwrap());
    assert!(s.is_action_pending(Write).unwrap());
    assert_eq!(s.time_window(), 2);
}

#[test]
fn repeated_iteration_rewinds_time() {
    let transport = ScriptedTransport::new().with_reply(step(1, 1, vec![], Some(false)));
    let (mut s, _, _, _) = session_a(implicit_config(SchemeOrder::Parallel, 3), transport);
    let dt = s.initialize().unwrap();
    let next = s.advance(dt).unwrap();
    assert!(!s.is_time_window_complete().unwrap());
    assert_eq!(s.time(), 0.0);
    assert_eq!(s.iteration(), 2);
    assert!((next - dt).abs() < 1e-12);
}

#[test]
fn missing_verdict_aborts() {
    let transport = ScriptedTransport::new().with_reply(step(1, 1, vec![], None));
    let (mut s, _, _, _) = session_a(implicit_config(SchemeOrder::Parallel, 3), transport);
    s.initialize().unwrap();
    assert!(matches!(s.advance(0.1), Err(CouplingError::CouplingAborted(msg)) if msg.contains("verdict")));
}

#[test]
fn strict_mode_rejects_unacknowledged_checkpoint() {
    let config = implicit_config(SchemeOrder::Parallel, 3).with_strict_actions(true);
    let transport = ScriptedTransport::new().with_reply(step(1, 1, vec![], Some(true)));
    let (mut s, _, _, _) = session_a(config, transport);
    s.initialize().unwrap();
    assert_eq!(
        s.advance(0.1).unwrap_err(),
        CouplingError::UnfulfilledAction(RequiredAction::WriteIterationCheckpoint)
    );
    // nothing moved
    assert_eq!(s.time(), 0.0);
    assert!(s.transport().sent.is_empty());
    s.mark_action_satisfied(RequiredAction::WriteIterationCheckpoint).unwrap();
    s.advance(0.1).unwrap();
}

#[test]
fn lenient_mode_advances_with_pending_checkpoint() {
    let transport = ScriptedTransport::new().with_reply(step(1, 1, vec![], Some(true)));
    let (mut s, _, _, _) = session_a(implicit_config(SchemeOrder::Parallel, 3), transport);
    s.initialize().unwrap();
    s.advance(0.1).unwrap();
    assert!(s.is_time_window_complete().unwrap());
}

#[test]
fn controller_measures_and_sends_verdict() {
    let mut config = implicit_config(SchemeOrder::Parallel, 10);
    config.scheme.convergence = ConvergencePolicy::default()
        .with_max_iterations(10)
        .with_measure("Temperature", "MeshA", MeasureKind::Absolute { limit: 1e-6 });
    let data = vec![buffer(0, "Temperature", &[1.0, 2.0])];
    let transport = ScriptedTransport::new()
        .with_partition(0, "MeshA", &[0.0, 0.0, 1.0, 0.0])
        .with_reply(step(1, 1, data.clone(), None))
        .with_reply(step(1, 2, data, None));
    let mut s = CouplingSession::new("B", config, 0, 1, transport).unwrap();
    assert_eq!(s.role(), Role::Second);
    let dt = s.initialize().unwrap();

    s.advance(dt).unwrap();
    assert!(s.is_action_pending(RequiredAction::ReadIterationCheckpoint).unwrap());
    s.mark_action_satisfied(RequiredAction::ReadIterationCheckpoint).unwrap();
    s.advance(dt).unwrap();
    assert!(s.is_time_window_complete().unwrap());

    let verdicts: Vec<_> = s.transport().sent.iter().map(|m| m.converged).collect();
    assert_eq!(verdicts, vec![Some(false), Some(true)]);
}

#[test]
fn serial_controller_measures_against_values_before_first_round() {
    let mut config = implicit_config(SchemeOrder::Serial, 10);
    config.scheme.convergence = ConvergencePolicy::default()
        .with_max_iterations(10)
        .with_measure("Temperature", "MeshA", MeasureKind::Absolute { limit: 1e-6 });
    let data = vec![buffer(0, "Temperature", &[1.0, 2.0])];
    let transport = ScriptedTransport::new()
        .with_partition(0, "MeshA", &[0.0, 0.0, 1.0, 0.0])
        .with_reply(step(1, 1, data.clone(), None))
        .with_reply(step(1, 2, data.clone(), None))
        .with_reply(step(2, 1, data, None));
    let mut s = CouplingSession::new("B", config, 0, 1, transport).unwrap();
    let dt = s.initialize().unwrap();
    assert!(s.is_read_data_available().unwrap());

    // the first round changed the field from zero, so the window repeats
    s.advance(dt).unwrap();
    assert!(!s.is_time_window_complete().unwrap());
    assert_eq!((s.time_window(), s.iteration()), (1, 2));
    assert!(s.is_action_pending(RequiredAction::ReadIterationCheckpoint).unwrap());
    s.mark_action_satisfied(RequiredAction::ReadIterationCheckpoint).unwrap();

    s.advance(dt).unwrap();
    assert!(s.is_time_window_complete().unwrap());
    assert_eq!((s.time_window(), s.iteration()), (2, 1));

    let sent: Vec<_> = s
        .transport()
        .sent
        .iter()
        .map(|m| (m.time_window, m.iteration, m.converged))
        .collect();
    assert_eq!(sent, vec![(1, 1, Some(false)), (1, 2, Some(true))]);
    assert!(s.transport().replies.is_empty());
}

#[test]
fn measure_on_foreign_field_is_rejected_for_controller() {
    let mut config = implicit_config(SchemeOrder::Parallel, 5).with_data("Pressure", Arity::Scalar);
    config.scheme.convergence = config
        .scheme
        .convergence
        .clone()
        .with_measure("Pressure", "MeshA", MeasureKind::Relative { limit: 1e-3 });
    assert!(matches!(
        CouplingSession::new("B", config, 0, 1, ScriptedTransport::new()),
        Err(CouplingError::Configuration(_))
    ));
}

#[test]
fn initial_data_is_written_then_exchanged() {
    let mut config = temperature_config(SchemeOrder::Parallel, SchemeKind::Explicit, 1);
    config.scheme.exchanges[0].initialize = true;
    let transport = ScriptedTransport::new().with_reply(step(1, 1, vec![], None));
    let (mut s, mesh, t, v) = session_a(config, transport);
    s.initialize().unwrap();
    assert!(s.is_action_pending(RequiredAction::WriteInitialData).unwrap());
    assert!(matches!(s.advance(0.1), Err(CouplingError::InvalidState { .. })));

    s.write_block_scalar(t, &v, &[7.0, 8.0]).unwrap();
    s.mark_action_satisfied(RequiredAction::WriteInitialData).unwrap();
    s.initialize_data().unwrap();
    assert!(!s.is_action_pending(RequiredAction::WriteInitialData).unwrap());
    assert_eq!(
        s.transport().sent_initial,
        vec![(mesh, vec![buffer(0, "Temperature", &[7.0, 8.0])])]
    );
    assert!(matches!(s.initialize_data(), Err(CouplingError::InvalidState { .. })));
    s.advance(0.1).unwrap();
}

#[test]
fn serial_second_sends_initial_data_then_receives_first_round() {
    let mut config = two_way_config(SchemeOrder::Serial, SchemeKind::Explicit, 1);
    config.scheme.exchanges[1].initialize = true;
    let transport = ScriptedTransport::new()
        .with_partition(0, "FluidMesh", &[0.0, 0.0, 1.0, 0.0])
        .with_reply(step(1, 1, vec![buffer(0, "Force", &[1.0, 2.0, 3.0, 4.0])], None));
    let mut s = CouplingSession::new("Solid", config, 0, 1, transport).unwrap();
    let mesh = s.mesh_id("FluidMesh").unwrap();
    let force = s.data_id("Force", mesh).unwrap();
    let displacement = s.data_id("Displacement", mesh).unwrap();

    s.initialize().unwrap();
    assert!(s.is_action_pending(RequiredAction::WriteInitialData).unwrap());
    assert!(!s.is_read_data_available().unwrap());
    assert_eq!(s.transport().replies.len(), 1);

    let (ids, _) = s.mesh_vertices(mesh).unwrap();
    s.write_block_scalar(displacement, &ids, &[7.0, 8.0]).unwrap();
    s.mark_action_satisfied(RequiredAction::WriteInitialData).unwrap();
    s.initialize_data().unwrap();
    assert_eq!(
        s.transport().sent_initial,
        vec![(mesh, vec![buffer(0, "Displacement", &[7.0, 8.0])])]
    );
    assert!(s.is_read_data_available().unwrap());
    assert_eq!(s.read_block_vector(force, &ids).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert!(s.transport().replies.is_empty());
}
