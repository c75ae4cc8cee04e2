//! Integration tests for axis-motion.
//!
//! Every scenario drives the public `Controller` facade against a
//! `LoopbackWire`, whose command pulses echo straight into the encoder
//! stream and whose input switches can be scripted or derived from the
//! simulated position.

use axis_motion::cam::CamSource;
use axis_motion::comp::CompPoint;
use axis_motion::coord::{ContiMode, SegmentSpec, Vec2};
use axis_motion::homing::{GantryPair, GantryPolicy, HomeResult};
use axis_motion::param::{HomingParams, PositionMode, ZPhaseUse};
use axis_motion::pvt::PvtPoint;
use axis_motion::signal::Signal;
use axis_motion::trigger::{TriggerConfig, TriggerMode};
use axis_motion::wire::SwitchModel;
use axis_motion::{
    AxisState, Controller, DriveCommand, Error, LoopbackWire, ReturnMode, UnitRatio, Units,
    UnitsPerSec,
};

const WAIT: u32 = 2_000_000;

fn controller(axes: u8) -> Controller<LoopbackWire> {
    let mut ctl = Controller::new(LoopbackWire::new(axes), axes);
    for a in 0..axes {
        ctl.update_params(a, |p| {
            p.unit_ratio = UnitRatio { unit: 1.0, pulse: 1000.0 };
            p.max_vel = UnitsPerSec(700_000.0);
        })
        .unwrap();
        ctl.servo_on(a, true).unwrap();
    }
    ctl
}

// =============================================================================
// Scenario 1: single-axis trapezoidal move
// =============================================================================

#[test]
fn single_axis_trapezoidal_lands_on_target() {
    let mut ctl = controller(1);

    ctl.move_start(0, Units(10.0), 100.0, 400.0, 400.0).unwrap();
    assert!(ctl.in_motion(0).unwrap());

    let mut cycles = 0u32;
    while ctl.axis_state(0).unwrap().is_active() {
        ctl.tick();
        cycles += 1;
        assert!(cycles < 10_000, "move never finished");
    }

    assert!(!ctl.in_motion(0).unwrap());
    assert!((ctl.cmd_pos(0).unwrap().0 - 10.0).abs() < 1e-9);
    // One pulse of slack between command and delivered pulses.
    assert!((ctl.wire().count(0) - 10_000).abs() <= 1);
    // Short move at these slopes is triangular; elapsed lands in the
    // few-hundred-millisecond band.
    let elapsed = cycles as f64 * 0.001;
    assert!(elapsed > 0.1 && elapsed < 0.6, "elapsed = {}", elapsed);
}

#[test]
fn blocking_move_checks_gates() {
    let mut ctl = controller(1);
    ctl.servo_on(0, false).unwrap();
    assert_eq!(
        ctl.move_start(0, Units(1.0), 10.0, 100.0, 100.0),
        Err(Error::NotServoOn)
    );
    ctl.servo_on(0, true).unwrap();
    ctl.move_to(0, Units(1.0), 10.0, 100.0, 100.0).unwrap();
    // Busy while a second start is attempted mid-motion.
    ctl.move_start(0, Units(2.0), 10.0, 100.0, 100.0).unwrap();
    assert_eq!(
        ctl.move_start(0, Units(3.0), 10.0, 100.0, 100.0),
        Err(Error::Busy)
    );
    ctl.wait_axis_idle(0, WAIT).unwrap();
}

// =============================================================================
// Scenario 2: homing with Z-phase refinement
// =============================================================================

#[test]
fn homing_with_z_phase_succeeds_and_clears() {
    let mut ctl = controller(1);
    ctl.wire_mut().set_switches(
        0,
        SwitchModel {
            home_window: Some((-1000, -400)),
            z_period: Some(100),
            z_width: 2,
            ..Default::default()
        },
    );
    ctl.update_params(0, |p| {
        p.homing = HomingParams {
            direction: -1,
            z_use: ZPhaseUse::SameDirection,
            offset: Units(0.5),
            ..HomingParams::default()
        };
    })
    .unwrap();

    ctl.home_start(0).unwrap();
    let (result, progress) = ctl.home_status(0).unwrap();
    assert_eq!(result, HomeResult::Searching);
    assert!(progress.0 >= 1);

    let result = ctl.home_wait(0).unwrap();
    assert_eq!(result, HomeResult::Success);
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Idle);
    assert!((ctl.cmd_pos(0).unwrap().0).abs() < 1e-9);
    assert!((ctl.position_error(0).unwrap().0).abs() < 1e-9);
}

#[test]
fn homing_stopped_by_client_reports_user_break() {
    let mut ctl = controller(1);
    // Home sensor far away so the search runs long enough to break.
    ctl.wire_mut().set_switches(
        0,
        SwitchModel {
            home_window: Some((-500_000, -400_000)),
            ..Default::default()
        },
    );
    ctl.home_start(0).unwrap();
    ctl.run_cycles(50);
    ctl.move_estop(0).unwrap();
    let (result, _) = ctl.home_status(0).unwrap();
    assert_eq!(result, HomeResult::UserBreak);
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::HomeFailed);
    ctl.clear_error(0).unwrap();
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Idle);
}

// =============================================================================
// Scenario 3: gantry pair over-range latch
// =============================================================================

#[test]
fn gantry_over_range_latches_offset() {
    let mut ctl = controller(2);
    // Slave physically sits one unit above the master.
    ctl.wire_mut().displace(1, 1000);
    ctl.tick();
    ctl.set_actual_pos(1, Units(1.0)).unwrap();
    ctl.set_cmd_pos(1, Units(1.0)).unwrap();

    let mut pair = GantryPair::new(0, 1, Units(1.0), Units(0.1));
    pair.policy = GantryPolicy::Latch;
    let index = ctl.gantry_set(pair).unwrap();
    ctl.gantry_enable(index, true).unwrap();

    ctl.run_cycles(5);
    assert!(!ctl.gantry(index).unwrap().read_error_range_status());

    // Disturb the slave mechanics beyond the allowed window.
    ctl.wire_mut().displace(1, 250);
    ctl.tick();

    let pair = ctl.gantry(index).unwrap();
    assert!(pair.read_error_range_status());
    let latched = pair.compare_pos().unwrap();
    assert!((latched.0 - 0.25).abs() < 1e-6, "latched = {}", latched.0);
}

// =============================================================================
// Scenario 4: continuous linear -> arc blend
// =============================================================================

#[test]
fn continuous_line_arc_blend_is_continuous() {
    let mut ctl = controller(2);
    ctl.coord_map(0, &[0, 1], PositionMode::Absolute).unwrap();
    ctl.coord_set_connection_radius(0, Some(2.0)).unwrap();

    ctl.conti_begin(0).unwrap();
    ctl.coord_move(
        0,
        &SegmentSpec::Line { end: end_pos(&[10.0, 0.0]) },
        5.0,
        50.0,
        50.0,
    )
    .unwrap();
    ctl.coord_move(
        0,
        &SegmentSpec::ArcCenter {
            center: Vec2::new(10.0, 2.0),
            end: Vec2::new(10.0, 4.0),
            ccw: true,
        },
        5.0,
        50.0,
        50.0,
    )
    .unwrap();
    ctl.conti_end(0).unwrap();
    assert_eq!(ctl.conti_total_nodes(0).unwrap(), 2);

    ctl.conti_start(0, ContiMode::NodeAuto, 45.0).unwrap();

    let mut min_speed_at_junction = f64::MAX;
    let mut seen_node_1 = false;
    let mut order = Vec::new();
    for _ in 0..200_000 {
        ctl.tick();
        if let Some(node) = ctl.conti_node_num(0).unwrap() {
            if order.last() != Some(&node) {
                order.push(node);
            }
            if node == 1 && !seen_node_1 {
                seen_node_1 = true;
                let vx = ctl.velocity(0).unwrap().0;
                let vy = ctl.velocity(1).unwrap().0;
                min_speed_at_junction = (vx * vx + vy * vy).sqrt();
            }
        }
        if !ctl.axis_state(0).unwrap().is_active() && seen_node_1 {
            break;
        }
    }

    // Execution order equals enqueue order; node index is monotone.
    assert!(order.windows(2).all(|w| w[0] <= w[1]), "order = {:?}", order);
    assert!(seen_node_1);
    // The junction is tangent-continuous, so the blend keeps moving.
    assert!(
        min_speed_at_junction > 1.0,
        "junction speed = {}",
        min_speed_at_junction
    );
    // Final position is the arc endpoint.
    assert!((ctl.cmd_pos(0).unwrap().0 - 10.0).abs() < 1e-6);
    assert!((ctl.cmd_pos(1).unwrap().0 - 4.0).abs() < 1e-6);
}

fn end_pos(vals: &[f64]) -> axis_motion::coord::AxPos {
    let mut p = [0.0; axis_motion::coord::MAX_COORD_AXES];
    p[..vals.len()].copy_from_slice(vals);
    p
}

// =============================================================================
// Scenario 5: electronic cam
// =============================================================================

#[test]
fn ecam_tracks_table_and_holds_on_disable() {
    let mut ctl = Controller::new(LoopbackWire::new(2), 2);
    for a in 0..2 {
        ctl.servo_on(a, true).unwrap();
    }
    ctl.ecam_set(
        0,
        1,
        0.0,
        CamSource::Command,
        &[0.0, 100.0, 200.0, 300.0],
        &[0.0, 50.0, 150.0, 200.0],
    )
    .unwrap();
    ctl.ecam_enable(1, true).unwrap();

    ctl.move_to(0, Units(150.0), 1000.0, 10_000.0, 10_000.0).unwrap();
    assert!((ctl.cmd_pos(1).unwrap().0 - 100.0).abs() < 1e-9);

    // Exact at a node.
    ctl.move_to(0, Units(200.0), 1000.0, 10_000.0, 10_000.0).unwrap();
    assert!((ctl.cmd_pos(1).unwrap().0 - 150.0).abs() < 1e-9);

    // Disable: the slave stops tracking and holds.
    ctl.ecam_enable(1, false).unwrap();
    ctl.move_to(0, Units(300.0), 1000.0, 10_000.0, 10_000.0).unwrap();
    assert!((ctl.cmd_pos(1).unwrap().0 - 150.0).abs() < 1e-9);
}

#[test]
fn egear_scales_master_motion() {
    let mut ctl = Controller::new(LoopbackWire::new(2), 2);
    for a in 0..2 {
        ctl.servo_on(a, true).unwrap();
    }
    ctl.egear_link(0, 1, -1, 2).unwrap();
    ctl.egear_enable(1, true).unwrap();

    ctl.move_to(0, Units(10.0), 100.0, 1000.0, 1000.0).unwrap();
    assert!((ctl.cmd_pos(1).unwrap().0 + 5.0).abs() < 1e-6);

    ctl.egear_enable(1, false).unwrap();
    ctl.move_to(0, Units(20.0), 100.0, 1000.0, 1000.0).unwrap();
    assert!((ctl.cmd_pos(1).unwrap().0 + 5.0).abs() < 1e-6);
}

// =============================================================================
// Scenario 6: velocity override in flight
// =============================================================================

#[test]
fn override_velocity_climbs_then_completes() {
    let mut ctl = controller(1);
    ctl.set_max_vel(0, UnitsPerSec(1000.0)).unwrap();

    // Long enough that the override plateau is reachable.
    ctl.move_start(0, Units(500.0), 200.0, 2000.0, 2000.0).unwrap();
    ctl.run_cycles(200);
    ctl.override_velocity(0, 500.0).unwrap();

    // The climb takes (500-200)/2000 = 0.15 s; allow one accel period.
    let mut reached = false;
    for _ in 0..200 {
        ctl.tick();
        if (ctl.velocity(0).unwrap().0 - 500.0).abs() < 5.0 {
            reached = true;
            break;
        }
    }
    assert!(reached, "override velocity never reached");

    ctl.wait_axis_idle(0, WAIT).unwrap();
    assert!((ctl.cmd_pos(0).unwrap().0 - 500.0).abs() < 1e-6);
}

// =============================================================================
// Triggers, capture, compensation
// =============================================================================

#[test]
fn periodic_trigger_fires_along_move() {
    let mut ctl = controller(1);
    ctl.trigger_configure(
        0,
        0,
        TriggerConfig {
            mode: TriggerMode::Periodic { interval: 1.0 },
            ..TriggerConfig::absolute(0.0)
        },
    )
    .unwrap();
    ctl.trigger_enable(0, 0, true).unwrap();
    // Prime the comparator at rest so the pitch counts from zero.
    ctl.tick();

    ctl.move_to(0, Units(10.0), 100.0, 1000.0, 1000.0).unwrap();
    assert_eq!(ctl.trigger_fire_count(0, 0).unwrap(), 10);
}

#[test]
fn search_and_capture_latches_once() {
    let mut ctl = controller(1);
    ctl.wire_mut().set_switches(
        0,
        SwitchModel {
            home_window: Some((-500_000, -400)),
            ..Default::default()
        },
    );
    ctl.search_and_capture(0, -10.0, 100.0, Signal::Home, true).unwrap();
    ctl.wait_axis_idle(0, WAIT).unwrap();

    let captured = ctl.capture_read(0).unwrap().expect("no capture");
    assert!((captured.0 + 0.4).abs() < 0.05, "captured = {}", captured.0);
    // Read-once semantics.
    assert_eq!(ctl.capture_read(0).unwrap(), None);
}

#[test]
fn compensation_table_corrects_targets() {
    let mut ctl = controller(1);
    ctl.comp_set_table(
        0,
        &[
            CompPoint { position: 0.0, correction: 0.0 },
            CompPoint { position: 10.0, correction: 0.02 },
            CompPoint { position: 20.0, correction: -0.01 },
        ],
        false,
    )
    .unwrap();
    ctl.comp_enable(0, true).unwrap();

    ctl.move_to(0, Units(15.0), 100.0, 1000.0, 1000.0).unwrap();
    assert!((ctl.cmd_pos(0).unwrap().0 - 15.005).abs() < 1e-9);
}

#[test]
fn backlash_locate_requires_configuration() {
    let mut ctl = controller(1);
    assert_eq!(
        ctl.backlash_locate(0, 10.0, 100.0, 5),
        Err(Error::BacklashNotConfigured)
    );
    ctl.update_params(0, |p| {
        p.backlash.direction = -1;
        p.backlash.amount = Units(0.05);
    })
    .unwrap();
    ctl.backlash_locate(0, 10.0, 100.0, 5).unwrap();
    assert!((ctl.cmd_pos(0).unwrap().0).abs() < 1e-9);
}

// =============================================================================
// PVT and synchronized starts
// =============================================================================

#[test]
fn pvt_tables_start_together_under_sync() {
    let mut ctl = controller(2);
    let points_a = [
        PvtPoint { position: 1.0, velocity: 2.0, dt_us: 100_000 },
        PvtPoint { position: 2.0, velocity: 0.0, dt_us: 100_000 },
    ];
    let points_b = [PvtPoint { position: -1.0, velocity: 0.0, dt_us: 200_000 }];

    ctl.sync_set_axis_map(0, &[0, 1]).unwrap();
    ctl.sync_begin(0).unwrap();
    ctl.move_pvt(0, &points_a).unwrap();
    ctl.move_pvt(1, &points_b).unwrap();
    // Reserved, not started.
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Idle);
    ctl.sync_end(0).unwrap();

    ctl.sync_start(0).unwrap();
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Coordinated);
    assert_eq!(ctl.axis_state(1).unwrap(), AxisState::Coordinated);

    ctl.run_cycles(250);
    assert!((ctl.cmd_pos(0).unwrap().0 - 2.0).abs() < 1e-6);
    assert!((ctl.cmd_pos(1).unwrap().0 + 1.0).abs() < 1e-6);
}

#[test]
fn pvt_outside_sync_runs_immediately() {
    let mut ctl = controller(1);
    let points = [PvtPoint { position: 1.0, velocity: 0.0, dt_us: 50_000 }];
    ctl.move_pvt(0, &points).unwrap();
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Coordinated);
    ctl.run_cycles(60);
    assert!((ctl.cmd_pos(0).unwrap().0 - 1.0).abs() < 1e-6);
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Idle);
}

// =============================================================================
// Round trips: parameter file, virtual map, drive link
// =============================================================================

#[cfg(feature = "std")]
#[test]
fn mot_file_round_trip_is_byte_exact() {
    use axis_motion::param::{render_all, save_all, load_all, ParamStore};

    let mut store = ParamStore::with_axes(3);
    store.set_unit_ratio(0, 1.0, 1000.0).unwrap();
    store
        .set_velocity_window(0, UnitsPerSec(0.5), UnitsPerSec(700_000.0))
        .unwrap();
    store.set_backlash(2, -1, Units(0.125)).unwrap();

    let path = std::env::temp_dir().join("axis_motion_round_trip.mot");
    save_all(&path, &store).unwrap();
    let outcome = load_all(&path).unwrap();
    assert_eq!(outcome.skipped_keys, 0);
    assert_eq!(render_all(&outcome.store), render_all(&store));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn virtual_map_round_trips_and_rejects_duplicates() {
    let mut ctl = controller(2);
    ctl.set_virtual_map(5, 0).unwrap();
    assert_eq!(ctl.get_virtual_map(5), Some(0));

    // Duplicate real target and duplicate virtual slot both rejected.
    assert!(ctl.set_virtual_map(6, 0).is_err());
    assert!(ctl.set_virtual_map(5, 1).is_err());

    // Ops through the virtual number reach the real axis.
    ctl.move_to(5, Units(1.0), 100.0, 1000.0, 1000.0).unwrap();
    assert!((ctl.cmd_pos(0).unwrap().0 - 1.0).abs() < 1e-9);

    ctl.reset_virtual_map();
    assert_eq!(ctl.get_virtual_map(5), None);
}

#[test]
fn drive_read_times_out_on_budget() {
    let mut ctl = controller(1);
    ctl.wire_mut().set_reply_delay(0, 5);
    let err = ctl.servo_command(
        0,
        DriveCommand::ReadParam { index: 3 },
        ReturnMode::NonBlocking { budget_cycles: 2 },
    );
    assert_eq!(err, Err(Error::Timeout));

    ctl.wire_mut().set_reply_delay(0, 2);
    let reply = ctl
        .servo_command(
            0,
            DriveCommand::ReadParam { index: 3 },
            ReturnMode::NonBlocking { budget_cycles: 10 },
        )
        .unwrap();
    assert_eq!(reply, axis_motion::DriveReply::Param { value: 3 });
}

// =============================================================================
// Multi-axis stops and soft limits
// =============================================================================

#[test]
fn multi_estop_halts_all_axes_on_one_cycle() {
    let mut ctl = controller(2);
    ctl.move_start(0, Units(50.0), 100.0, 1000.0, 1000.0).unwrap();
    ctl.move_start(1, Units(-50.0), 100.0, 1000.0, 1000.0).unwrap();
    ctl.run_cycles(100);

    ctl.multi_estop(&[0, 1]).unwrap();
    ctl.tick();
    assert_eq!(ctl.axis_state(0).unwrap(), AxisState::Idle);
    assert_eq!(ctl.axis_state(1).unwrap(), AxisState::Idle);
    assert!(ctl.cmd_pos(0).unwrap().0 < 50.0);
    assert!(ctl.cmd_pos(1).unwrap().0 > -50.0);
}

#[test]
fn soft_limit_rejects_out_of_window_target() {
    let mut ctl = controller(1);
    ctl.update_params(0, |p| {
        p.soft_limit.enabled = true;
        p.soft_limit.negative = Units(-5.0);
        p.soft_limit.positive = Units(5.0);
    })
    .unwrap();
    let err = ctl.move_start(0, Units(10.0), 100.0, 1000.0, 1000.0);
    assert!(matches!(err, Err(Error::LimitHit(_))));
}

#[test]
fn hardware_limit_stops_motion_and_latches() {
    let mut ctl = controller(1);
    ctl.wire_mut().set_switches(
        0,
        SwitchModel {
            limit_pos_at: Some(2_000),
            ..Default::default()
        },
    );
    ctl.move_start(0, Units(10.0), 100.0, 1000.0, 1000.0).unwrap();
    let err = ctl.wait_axis_idle(0, WAIT);
    assert!(matches!(err, Err(Error::LimitHit(_))));
    assert!(ctl.cmd_pos(0).unwrap().0 < 10.0);
}

// =============================================================================
// BOUND position representation
// =============================================================================

#[test]
fn bound_repr_wraps_rotary_positions() {
    let mut ctl = controller(1);
    ctl.set_pos_repr(
        0,
        axis_motion::PosRepr::Bound {
            negative: Units(0.0),
            positive: Units(360.0),
        },
    )
    .unwrap();

    ctl.move_to(0, Units(350.0), 10_000.0, 100_000.0, 100_000.0).unwrap();
    // Relative-style continuation past the wrap point.
    ctl.move_to(0, Units(370.0), 10_000.0, 100_000.0, 100_000.0).unwrap();
    let reported = ctl.cmd_pos(0).unwrap().0;
    assert!((reported - 10.0).abs() < 1e-6, "reported = {}", reported);
}

// =============================================================================
// Event channel
// =============================================================================

#[test]
fn events_arrive_in_fifo_order() {
    let mut ctl = controller(1);
    ctl.move_to(0, Units(1.0), 100.0, 1000.0, 1000.0).unwrap();
    let ev = ctl.take_event(0).unwrap().expect("no event");
    assert_ne!(ev.flags & axis_motion::axis::EV_MOVE_DONE, 0);
    assert!(ctl.take_event(0).unwrap().is_none());
}
