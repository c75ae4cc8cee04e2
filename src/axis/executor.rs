//! Per-axis motion executor.
//!
//! Plays velocity curves against the control clock, converts command
//! positions to pulse deltas, checks limits and alarms every cycle and
//! applies in-flight overrides. One executor owns one axis; nothing
//! else mutates that axis's pulse output.

use heapless::Vec;

use crate::error::{Error, LimitKind};
use crate::param::{AxisParams, StopMode};
use crate::profile::{generate, generate_stop, MotionPhase, MoveSpec, ShapeLimits, VelCurve};
use crate::signal::{Signal, SignalBank};
use crate::status::{MotionFlags, StatusTracker};
use crate::units::Units;

use super::state::AxisState;

/// Queued follow-up targets for multi-position overrides.
const MAX_FOLLOWUPS: usize = 4;

/// When the at-position override takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverrideMoment {
    /// The new velocity is reached starting *at* the threshold.
    AtStart,
    /// The new velocity has been reached *by* the threshold.
    ByEnd,
}

#[derive(Debug, Clone, Copy)]
struct PendingOverride {
    threshold: f64,
    velocity: f64,
    moment: OverrideMoment,
}

#[derive(Debug, Clone, Copy)]
struct Followup {
    target: f64,
    velocity: f64,
}

/// What terminated the last motion, for event reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Nothing noteworthy this cycle.
    #[default]
    None,
    /// A profile move ran to completion.
    MoveDone,
    /// A stop ramp finished.
    StopDone,
    /// Motion was cut by a limit.
    LimitStop(LimitKind),
    /// Motion was cut by a servo alarm.
    AlarmStop,
}

/// Per-axis curve playback and pulse conversion.
#[derive(Debug, Default)]
pub struct AxisExecutor {
    state: AxisState,
    curve: VelCurve,
    /// Elapsed time inside the current curve.
    t: f64,
    /// Travel direction of the current curve (+1.0 / -1.0).
    dir: f64,
    /// Command position at curve start.
    origin: f64,
    /// Absolute end position of the curve, when bounded.
    target: Option<f64>,
    /// Move arguments kept for overrides and stop reshaping.
    move_vel: f64,
    move_accel: f64,
    move_decel: f64,
    /// Pulses emitted since the executor was created.
    emitted: i64,
    /// Sign of the last nonzero pulse delta.
    last_pulse_dir: i8,
    pending_override: Option<PendingOverride>,
    followups: Vec<Followup, MAX_FOLLOWUPS>,
}

impl AxisExecutor {
    /// Current state.
    #[inline]
    pub fn state(&self) -> AxisState {
        self.state
    }

    /// Whether a new motion command may start.
    #[inline]
    pub fn accepts_commands(&self) -> bool {
        self.state.accepts_commands()
    }

    /// Absolute target of the current move, if bounded.
    #[inline]
    pub fn target(&self) -> Option<Units> {
        self.target.map(Units)
    }

    /// Command velocity at the current playback point, signed.
    pub fn current_velocity(&self) -> f64 {
        if self.state.is_active() {
            self.dir * self.curve.velocity_at(self.t)
        } else {
            0.0
        }
    }

    /// Command position at the current playback point.
    pub fn playback_pos(&self) -> f64 {
        self.origin + self.dir * self.curve.position_at(self.t)
    }

    /// Begin playing a curve. `state` selects Moving or Homing framing.
    pub fn start_curve(
        &mut self,
        curve: VelCurve,
        dir: f64,
        origin: Units,
        target: Option<Units>,
        state: AxisState,
        tracker: &mut StatusTracker,
    ) {
        self.curve = curve;
        self.t = 0.0;
        self.dir = if dir < 0.0 { -1.0 } else { 1.0 };
        self.origin = origin.0;
        self.target = target.map(|u| u.0);
        self.state = state;
        self.pending_override = None;
        self.followups.clear();
        tracker.begin_motion();
        tracker.flags_mut().set(MotionFlags::IN_MOTION, true);
        tracker
            .flags_mut()
            .set(MotionFlags::HOMING, state == AxisState::Homing);
    }

    /// Remember the commanded move arguments for later reshaping.
    pub fn set_move_args(&mut self, vel: f64, accel: f64, decel: f64) {
        self.move_vel = vel;
        self.move_accel = accel;
        self.move_decel = decel;
    }

    /// Enter coordinated (externally driven) playback.
    pub fn enter_coordinated(&mut self, tracker: &mut StatusTracker) {
        self.state = AxisState::Coordinated;
        self.curve = VelCurve::empty();
        self.t = 0.0;
        tracker.begin_motion();
        tracker.flags_mut().set(MotionFlags::IN_MOTION, true);
    }

    /// Leave coordinated playback.
    pub fn leave_coordinated(&mut self) {
        if self.state == AxisState::Coordinated {
            self.state = AxisState::Idle;
        }
    }

    /// Enter torque mode (drive handles the loop; no pulses).
    pub fn enter_torque_mode(&mut self, tracker: &mut StatusTracker) {
        self.state = AxisState::TorqueMode;
        tracker.flags_mut().set(MotionFlags::TORQUE, true);
    }

    /// Leave torque mode back to idle.
    pub fn leave_torque_mode(&mut self, tracker: &mut StatusTracker) {
        if self.state == AxisState::TorqueMode {
            self.state = AxisState::Idle;
            tracker.flags_mut().set(MotionFlags::TORQUE, false);
        }
    }

    /// Acknowledge a failed homing sequence.
    pub fn clear_home_failed(&mut self) {
        if self.state == AxisState::HomeFailed {
            self.state = AxisState::Idle;
        }
    }

    /// Mark the axis home-failed (called by the homing engine).
    pub(crate) fn set_home_failed(&mut self, tracker: &mut StatusTracker) {
        self.state = AxisState::HomeFailed;
        self.halt_flags(tracker);
    }

    /// Finish a homing-owned motion and return to idle.
    pub(crate) fn finish_homing(&mut self, tracker: &mut StatusTracker) {
        self.state = AxisState::Idle;
        self.curve = VelCurve::empty();
        self.halt_flags(tracker);
    }

    /// Request a stop with an explicit deceleration slope.
    pub fn stop_decel(&mut self, decel: f64, tracker: &mut StatusTracker) {
        if !self.state.is_active() {
            return;
        }
        let vel = self.curve.velocity_at(self.t);
        self.origin = self.playback_pos();
        self.curve = generate_stop(vel, decel);
        self.t = 0.0;
        self.target = None;
        self.pending_override = None;
        self.followups.clear();
        self.state = AxisState::StoppingDecel;
        tracker.flags_mut().set(MotionFlags::HOMING, false);
    }

    /// Request a stop using the axis's configured profile decel.
    pub fn stop_configured(&mut self, tracker: &mut StatusTracker) {
        let decel = if self.move_decel > 0.0 {
            self.move_decel
        } else {
            self.move_accel.max(1.0)
        };
        self.stop_decel(decel, tracker);
    }

    /// Halt the pulse train at the next cycle, ignoring deceleration.
    pub fn stop_emergency(&mut self, tracker: &mut StatusTracker) {
        if !self.state.is_active() && self.state != AxisState::StoppingEmergency {
            return;
        }
        self.origin = self.playback_pos();
        self.curve = VelCurve::empty();
        self.t = 0.0;
        self.target = None;
        self.pending_override = None;
        self.followups.clear();
        self.state = AxisState::StoppingEmergency;
        tracker.flags_mut().set(MotionFlags::HOMING, false);
    }

    /// Replace the plateau velocity of the move in flight.
    pub fn override_velocity(&mut self, velocity: f64, limits: &ShapeLimits) -> Result<(), Error> {
        let Some(target) = self.target else {
            return self.override_jog_velocity(velocity, limits);
        };
        if self.state != AxisState::Moving {
            return Err(Error::Busy);
        }
        let pos = self.playback_pos();
        let vel_now = self.curve.velocity_at(self.t);
        let remaining = (target - pos).abs();
        let spec = MoveSpec {
            distance: remaining,
            velocity,
            accel: self.move_accel,
            decel: self.move_decel,
            start_vel: vel_now,
            end_vel: 0.0,
        };
        let curve = generate(&spec, limits)?;
        self.origin = pos;
        self.curve = curve;
        self.t = 0.0;
        self.move_vel = velocity;
        Ok(())
    }

    fn override_jog_velocity(&mut self, velocity: f64, limits: &ShapeLimits) -> Result<(), Error> {
        if self.state != AxisState::Moving || !self.curve.is_unbounded() {
            return Err(Error::Busy);
        }
        let pos = self.playback_pos();
        let vel_now = self.curve.velocity_at(self.t);
        let curve =
            crate::profile::generate_jog(velocity, self.move_accel.max(1.0), vel_now, limits)?;
        self.origin = pos;
        self.curve = curve;
        self.t = 0.0;
        self.move_vel = velocity;
        Ok(())
    }

    /// Replace velocity together with accel/decel slopes.
    pub fn override_motion(
        &mut self,
        velocity: f64,
        accel: f64,
        decel: f64,
        limits: &ShapeLimits,
    ) -> Result<(), Error> {
        self.move_accel = accel;
        self.move_decel = decel;
        self.override_velocity(velocity, limits)
    }

    /// Move the in-flight target. A reversal decelerates to rest first
    /// and then runs the remainder as a follow-up move.
    pub fn override_position(&mut self, target: f64, limits: &ShapeLimits) -> Result<(), Error> {
        if self.state != AxisState::Moving {
            return Err(Error::Busy);
        }
        let pos = self.playback_pos();
        let vel_now = self.curve.velocity_at(self.t);
        let new_dir = if target >= pos { 1.0 } else { -1.0 };
        if new_dir != self.dir && vel_now > 0.0 {
            self.followups.clear();
            // Full stop, then a fresh move to the new target.
            let _ = self.followups.push(Followup {
                target,
                velocity: self.move_vel,
            });
            self.origin = pos;
            self.curve = generate_stop(vel_now, self.move_decel.max(1.0));
            self.t = 0.0;
            self.target = None;
            return Ok(());
        }
        let spec = MoveSpec {
            distance: (target - pos).abs(),
            velocity: self.move_vel,
            accel: self.move_accel,
            decel: self.move_decel,
            start_vel: vel_now,
            end_vel: 0.0,
        };
        let curve = generate(&spec, limits)?;
        self.origin = pos;
        self.dir = new_dir;
        self.curve = curve;
        self.t = 0.0;
        self.target = Some(target);
        Ok(())
    }

    /// Queue an additional target to run after the current one
    /// completes (multi-position override).
    pub fn push_followup(&mut self, target: f64, velocity: f64) -> Result<(), Error> {
        if self.state != AxisState::Moving {
            return Err(Error::Busy);
        }
        self.followups
            .push(Followup { target, velocity })
            .map_err(|_| Error::QueueFull)
    }

    /// Arm a velocity override that takes effect at a position.
    pub fn override_at_position(
        &mut self,
        threshold: f64,
        velocity: f64,
        moment: OverrideMoment,
    ) -> Result<(), Error> {
        if self.state != AxisState::Moving {
            return Err(Error::Busy);
        }
        self.pending_override = Some(PendingOverride {
            threshold,
            velocity,
            moment,
        });
        Ok(())
    }

    /// Advance one control cycle.
    ///
    /// Returns the pulse delta delivered to the wire and the cycle
    /// outcome for event reporting.
    pub fn tick(
        &mut self,
        dt: f64,
        params: &AxisParams,
        bank: &SignalBank,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
    ) -> (i64, TickOutcome) {
        match self.state {
            AxisState::Idle | AxisState::HomeFailed | AxisState::TorqueMode => {
                tracker.update_idle();
                return (0, TickOutcome::None);
            }
            AxisState::StoppingEmergency => {
                tracker.update_idle();
                self.state = AxisState::Idle;
                self.halt_flags(tracker);
                return (0, TickOutcome::StopDone);
            }
            AxisState::Coordinated => {
                // Position is pushed via `track_to`; nothing to play.
                return (0, TickOutcome::None);
            }
            _ => {}
        }

        // Servo alarm cuts motion unconditionally.
        if bank.read_logical(Signal::ServoAlarm) {
            tracker.latch_error(Error::AlarmActive);
            self.abort(tracker);
            return (0, TickOutcome::AlarmStop);
        }

        // Emergency-stop input, per its configured policy.
        if bank.read_logical(Signal::EmergencyStop) && self.state != AxisState::StoppingDecel {
            match bank.estop_policy() {
                StopMode::Emergency => {
                    self.abort(tracker);
                    return (0, TickOutcome::StopDone);
                }
                StopMode::Slowdown => self.stop_configured(tracker),
            }
        }

        let prev_pos = self.playback_pos();
        self.t += dt;

        // Pending at-position override.
        if let Some(p) = self.pending_override {
            let pos = self.playback_pos();
            let vel_now = self.curve.velocity_at(self.t);
            let remaining = self.dir * (p.threshold - pos);
            let lead = match p.moment {
                OverrideMoment::AtStart => 0.0,
                OverrideMoment::ByEnd => {
                    let slope = if p.velocity < vel_now {
                        self.move_decel
                    } else {
                        self.move_accel
                    };
                    let dv2 = (p.velocity * p.velocity - vel_now * vel_now).abs();
                    dv2 / (2.0 * slope.max(1e-9))
                }
            };
            if remaining <= lead {
                self.pending_override = None;
                let _ = self.override_velocity(p.velocity, limits);
            }
        }

        let mut outcome = TickOutcome::None;
        let mut new_pos = self.playback_pos();
        let travel_dir = if new_pos >= prev_pos { 1 } else { -1 };

        // The homing engine owns limit semantics during a search (a
        // limit may BE the home signal), and soft limits are
        // meaningless before a reference exists.
        let limits_armed = self.state != AxisState::Homing;

        // Hardware limit in the direction of travel.
        let hw_limit = if !limits_armed {
            None
        } else if travel_dir > 0 && bank.read_logical(Signal::LimitPositive) {
            Some(LimitKind::HardPositive)
        } else if travel_dir < 0 && bank.read_logical(Signal::LimitNegative) {
            Some(LimitKind::HardNegative)
        } else {
            None
        };
        if let Some(kind) = hw_limit {
            tracker.latch_error(Error::LimitHit(kind));
            match params.limit_stop_mode {
                StopMode::Emergency => {
                    self.abort(tracker);
                    return (0, TickOutcome::LimitStop(kind));
                }
                StopMode::Slowdown => {
                    if self.state != AxisState::StoppingDecel {
                        self.stop_configured(tracker);
                        new_pos = self.playback_pos();
                    }
                    outcome = TickOutcome::LimitStop(kind);
                }
            }
        }

        // Soft limit window.
        if limits_armed && params.soft_limit.enabled && hw_limit.is_none() {
            let soft = if new_pos > params.soft_limit.positive.0 {
                Some(LimitKind::SoftPositive)
            } else if new_pos < params.soft_limit.negative.0 {
                Some(LimitKind::SoftNegative)
            } else {
                None
            };
            if let Some(kind) = soft {
                tracker.latch_error(Error::LimitHit(kind));
                match params.soft_limit.stop_mode {
                    StopMode::Emergency => {
                        self.abort(tracker);
                        return (0, TickOutcome::LimitStop(kind));
                    }
                    StopMode::Slowdown => {
                        if self.state != AxisState::StoppingDecel {
                            self.stop_configured(tracker);
                            new_pos = self.playback_pos();
                        }
                        outcome = TickOutcome::LimitStop(kind);
                    }
                }
            }
        }

        // Completion handling.
        if self.curve.is_complete(self.t) {
            if let Some(target) = self.target {
                // Snap to the exact commanded endpoint.
                new_pos = target;
            }
            if let Some(next) = self.pop_followup() {
                let spec = MoveSpec {
                    distance: (next.target - new_pos).abs(),
                    velocity: next.velocity,
                    accel: self.move_accel,
                    decel: self.move_decel,
                    start_vel: 0.0,
                    end_vel: 0.0,
                };
                if let Ok(curve) = generate(&spec, limits) {
                    self.origin = new_pos;
                    self.dir = if next.target >= new_pos { 1.0 } else { -1.0 };
                    self.curve = curve;
                    self.t = 0.0;
                    self.target = Some(next.target);
                    self.move_vel = next.velocity;
                }
            } else {
                outcome = match self.state {
                    AxisState::StoppingDecel => TickOutcome::StopDone,
                    _ if outcome == TickOutcome::None => TickOutcome::MoveDone,
                    _ => outcome,
                };
                self.state = if self.state == AxisState::Homing {
                    // The homing engine decides what comes next.
                    AxisState::Homing
                } else {
                    AxisState::Idle
                };
                if self.state != AxisState::Homing {
                    self.halt_flags(tracker);
                }
            }
        }

        let delta = self.deliver(new_pos, dt, params, tracker);
        self.update_phase_flags(tracker);
        (delta, outcome)
    }

    /// Push an externally computed command position (coordinated,
    /// cam, gear or PVT playback). Returns the pulse delta.
    pub fn track_to(
        &mut self,
        new_pos: f64,
        dt: f64,
        params: &AxisParams,
        tracker: &mut StatusTracker,
    ) -> i64 {
        self.deliver(new_pos, dt, params, tracker)
    }

    /// Whether the current curve playback has consumed its curve.
    pub fn playback_done(&self) -> bool {
        self.curve.is_complete(self.t)
    }

    /// Re-declare the pulse origin after a forced position write.
    ///
    /// Zeroing or overwriting the command position must not move the
    /// machine; this re-aligns the internal pulse accumulator with the
    /// new coordinate frame.
    pub fn rebase(&mut self, params: &AxisParams, tracker: &StatusTracker) {
        self.emitted = params.unit_ratio.to_pulses(tracker.cmd_pos()).0;
        self.origin = tracker.cmd_pos().0;
    }

    fn pop_followup(&mut self) -> Option<Followup> {
        if self.followups.is_empty() {
            None
        } else {
            Some(self.followups.remove(0))
        }
    }

    /// Convert a command position to a pulse delta, applying backlash
    /// takeup on configured-direction reversals.
    fn deliver(
        &mut self,
        new_pos: f64,
        dt: f64,
        params: &AxisParams,
        tracker: &mut StatusTracker,
    ) -> i64 {
        tracker.update_cmd(Units(new_pos), dt);
        // Pulse truth follows the raw (unwrapped) command stream; the
        // BOUND representation only affects reported positions.
        let target_pulses = params.unit_ratio.to_pulses(Units(new_pos)).0;
        let mut delta = target_pulses - self.emitted;
        self.emitted = target_pulses;

        if delta != 0 {
            let dir = if delta > 0 { 1i8 } else { -1i8 };
            if self.last_pulse_dir != 0
                && dir != self.last_pulse_dir
                && params.backlash.is_configured()
                && dir == params.backlash.direction
            {
                let extra = params.unit_ratio.to_pulses(params.backlash.amount).0;
                delta += extra * dir as i64;
            }
            self.last_pulse_dir = dir;
        }
        tracker.add_drive_pulses(delta);
        delta
    }

    fn abort(&mut self, tracker: &mut StatusTracker) {
        self.curve = VelCurve::empty();
        self.t = 0.0;
        self.target = None;
        self.pending_override = None;
        self.followups.clear();
        self.state = AxisState::Idle;
        self.halt_flags(tracker);
    }

    fn halt_flags(&self, tracker: &mut StatusTracker) {
        let flags = tracker.flags_mut();
        flags.set(MotionFlags::IN_MOTION, false);
        flags.set(MotionFlags::ACCEL, false);
        flags.set(MotionFlags::CRUISE, false);
        flags.set(MotionFlags::DECEL, false);
        flags.set(MotionFlags::HOMING, false);
    }

    fn update_phase_flags(&self, tracker: &mut StatusTracker) {
        let phase = if self.state.is_active() {
            self.curve.phase_at(self.t)
        } else {
            MotionPhase::Complete
        };
        let flags = tracker.flags_mut();
        flags.set(MotionFlags::ACCEL, phase == MotionPhase::Accelerating);
        flags.set(MotionFlags::CRUISE, phase == MotionPhase::Cruising);
        flags.set(MotionFlags::DECEL, phase == MotionPhase::Decelerating);
        flags.set(MotionFlags::IN_MOTION, self.state.is_active());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ProfileMode;
    use crate::units::UnitRatio;

    fn setup() -> (AxisParams, SignalBank, StatusTracker, ShapeLimits, AxisExecutor) {
        let mut params = AxisParams::new(0);
        params.unit_ratio = UnitRatio::new(1.0, 1000.0).unwrap();
        params.max_vel = crate::units::UnitsPerSec(1000.0);
        let bank = SignalBank::from_params(&params);
        let tracker = StatusTracker::new(params.unit_ratio);
        let limits = ShapeLimits::from_params(&params);
        (params, bank, tracker, limits, AxisExecutor::default())
    }

    fn start_move(
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
        target: f64,
        vel: f64,
        accel: f64,
    ) {
        let spec = MoveSpec::rest_to_rest(target.abs(), vel, accel, accel);
        let curve = generate(&spec, limits).unwrap();
        exec.set_move_args(vel, accel, accel);
        exec.start_curve(
            curve,
            target.signum(),
            Units(0.0),
            Some(Units(target)),
            AxisState::Moving,
            tracker,
        );
    }

    fn run_to_idle(
        exec: &mut AxisExecutor,
        params: &AxisParams,
        bank: &mut SignalBank,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
    ) -> i64 {
        let mut total = 0i64;
        for _ in 0..200_000 {
            bank.sample(crate::signal::InputBits::default(), 1000);
            let (delta, _) = exec.tick(0.001, params, bank, tracker, limits);
            total += delta;
            if exec.state() == AxisState::Idle {
                break;
            }
        }
        total
    }

    #[test]
    fn move_lands_on_target_within_one_pulse() {
        let (params, mut bank, mut tracker, limits, mut exec) = setup();
        start_move(&mut exec, &mut tracker, &limits, 10.0, 100.0, 400.0);
        let pulses = run_to_idle(&mut exec, &params, &mut bank, &mut tracker, &limits);
        assert_eq!(exec.state(), AxisState::Idle);
        assert!((tracker.cmd_pos().0 - 10.0).abs() < 1e-9);
        assert!((pulses - 10_000).abs() <= 1);
    }

    #[test]
    fn estop_halts_next_cycle() {
        let (params, mut bank, mut tracker, limits, mut exec) = setup();
        start_move(&mut exec, &mut tracker, &limits, 10.0, 100.0, 400.0);
        for _ in 0..50 {
            bank.sample(crate::signal::InputBits::default(), 1000);
            exec.tick(0.001, &params, &bank, &mut tracker, &limits);
        }
        exec.stop_emergency(&mut tracker);
        bank.sample(crate::signal::InputBits::default(), 1000);
        let (delta, outcome) = exec.tick(0.001, &params, &bank, &mut tracker, &limits);
        assert_eq!(delta, 0);
        assert_eq!(outcome, TickOutcome::StopDone);
        assert_eq!(exec.state(), AxisState::Idle);
        assert!(tracker.cmd_pos().0 < 10.0);
    }

    #[test]
    fn alarm_latches_error() {
        let (params, mut bank, mut tracker, limits, mut exec) = setup();
        start_move(&mut exec, &mut tracker, &limits, 10.0, 100.0, 400.0);
        bank.sample(crate::signal::InputBits(crate::signal::InputBits::ALARM), 1000);
        let (_, outcome) = exec.tick(0.001, &params, &bank, &mut tracker, &limits);
        assert_eq!(outcome, TickOutcome::AlarmStop);
        assert_eq!(tracker.last_error(), Some(Error::AlarmActive));
        assert_eq!(exec.state(), AxisState::Idle);
    }

    #[test]
    fn backlash_injected_on_configured_reversal() {
        let (mut params, mut bank, mut tracker, limits, mut exec) = setup();
        params.backlash.direction = -1;
        params.backlash.amount = Units(0.01); // 10 pulses

        start_move(&mut exec, &mut tracker, &limits, 1.0, 100.0, 400.0);
        let fwd = run_to_idle(&mut exec, &params, &mut bank, &mut tracker, &limits);
        assert!((fwd - 1000).abs() <= 1);

        // Reverse into the configured direction: raw + backlash.
        let spec = MoveSpec::rest_to_rest(1.0, 100.0, 400.0, 400.0);
        let curve = generate(&spec, &limits).unwrap();
        exec.set_move_args(100.0, 400.0, 400.0);
        exec.start_curve(curve, -1.0, tracker.cmd_pos(), Some(Units(0.0)), AxisState::Moving, &mut tracker);
        let rev = run_to_idle(&mut exec, &params, &mut bank, &mut tracker, &limits);
        assert!((rev + 1000 + 10).abs() <= 1, "rev = {}", rev);
    }

    #[test]
    fn override_velocity_in_flight() {
        let (params, mut bank, mut tracker, limits, mut exec) = setup();
        // Long move so the override plateau is actually reachable.
        start_move(&mut exec, &mut tracker, &limits, 1000.0, 200.0, 2000.0);
        for _ in 0..200 {
            bank.sample(crate::signal::InputBits::default(), 1000);
            exec.tick(0.001, &params, &bank, &mut tracker, &limits);
        }
        exec.override_velocity(500.0, &limits).unwrap();
        // Velocity climbs to the override target within one accel period.
        let mut reached = false;
        for _ in 0..200 {
            bank.sample(crate::signal::InputBits::default(), 1000);
            exec.tick(0.001, &params, &bank, &mut tracker, &limits);
            if (exec.current_velocity() - 500.0).abs() < 1.0 {
                reached = true;
                break;
            }
        }
        assert!(reached);
        run_to_idle(&mut exec, &params, &mut bank, &mut tracker, &limits);
        assert!((tracker.cmd_pos().0 - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn soft_limit_emergency_aborts() {
        let (mut params, mut bank, mut tracker, limits, mut exec) = setup();
        params.soft_limit.enabled = true;
        params.soft_limit.negative = Units(-5.0);
        params.soft_limit.positive = Units(5.0);
        params.soft_limit.stop_mode = StopMode::Emergency;

        start_move(&mut exec, &mut tracker, &limits, 10.0, 100.0, 400.0);
        let mut limit_seen = false;
        for _ in 0..100_000 {
            bank.sample(crate::signal::InputBits::default(), 1000);
            let (_, outcome) = exec.tick(0.001, &params, &bank, &mut tracker, &limits);
            if let TickOutcome::LimitStop(kind) = outcome {
                assert_eq!(kind, LimitKind::SoftPositive);
                limit_seen = true;
                break;
            }
        }
        assert!(limit_seen);
        assert_eq!(exec.state(), AxisState::Idle);
        assert_eq!(
            tracker.last_error(),
            Some(Error::LimitHit(LimitKind::SoftPositive))
        );
    }
}
