//! Multi-stage homing state machine.
//!
//! Up to five stages: fast approach toward the selected signal, coarse
//! back-off past its edge, slow re-approach, optional Z-phase capture
//! and the final offset traverse. Each stage runs its own velocity and
//! acceleration from the homing parameter block, with a timeout derived
//! from the stage velocity and the available travel span.

use crate::axis::{AxisExecutor, AxisState};
use crate::param::{AxisParams, HomeInterlock, HomeMethod, ZPhaseUse};
use crate::profile::{generate, generate_jog, MoveSpec, ShapeLimits};
use crate::signal::{Signal, SignalBank};
use crate::status::StatusTracker;
use crate::units::Units;

/// Final or in-flight outcome of a homing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomeResult {
    /// Reference established.
    Success,
    /// Search still running.
    #[default]
    Searching,
    /// Gantry slave offset left the allowed window during homing.
    GantryRange,
    /// Client issued a stop mid-search.
    UserBreak,
    /// A stage velocity is zero or out of range.
    Velocity,
    /// Servo alarm during the search.
    AmpFault,
    /// Negative end limit hit without finding the signal.
    NegLimit,
    /// Positive end limit hit without finding the signal.
    PosLimit,
    /// Signal never seen inside the stage budget.
    NotDetected,
    /// Inconsistent internal state.
    Unknown,
}

/// Homing stages; `Inactive` means no sequence is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Stage {
    #[default]
    Inactive,
    FastApproach,
    BackOff,
    SlowApproach,
    ZSearch,
    OffsetMove,
    Done,
    Failed,
}

impl Stage {
    fn main_step(self) -> u8 {
        match self {
            Stage::Inactive => 0,
            Stage::FastApproach => 1,
            Stage::BackOff => 2,
            Stage::SlowApproach => 3,
            Stage::ZSearch => 4,
            Stage::OffsetMove => 5,
            Stage::Done | Stage::Failed => 9,
        }
    }
}

/// Within a stage: searching, then ramping down, then re-arming.
const SUB_SEARCH: u8 = 0;
const SUB_STOPPING: u8 = 1;
const SUB_ARM: u8 = 2;

/// One axis's homing sequence.
#[derive(Debug, Default)]
pub struct HomingSeq {
    stage: Stage,
    sub: u8,
    result: HomeResult,
    /// Seconds the home level has held (scan-time qualification).
    hold_s: f64,
    /// Seconds elapsed inside the current stage.
    stage_elapsed: f64,
    /// Stage budget in seconds.
    stage_budget: f64,
    /// Position where a limit fired, for the distance interlock.
    limit_latch: Option<f64>,
    /// Captured Z-phase position.
    z_capture: Option<f64>,
    /// Reported with +10 on the gantry slave pass.
    slave_pass: bool,
    /// Edge tracking for the Z-phase.
    z_was_active: bool,
}

impl HomingSeq {
    /// Whether a sequence is running.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self.stage, Stage::Inactive | Stage::Done | Stage::Failed)
    }

    /// Current result.
    #[inline]
    pub fn result(&self) -> HomeResult {
        self.result
    }

    /// Progress as (main-step, sub-step). Main steps ≥ 10 identify the
    /// gantry slave pass.
    pub fn progress(&self) -> (u8, u8) {
        let main = self.stage.main_step() + if self.slave_pass { 10 } else { 0 };
        (main, self.sub)
    }

    /// Captured Z-phase position, if stage four ran.
    #[inline]
    pub fn z_capture(&self) -> Option<Units> {
        self.z_capture.map(Units)
    }

    /// Mark this sequence as the gantry slave pass.
    pub(crate) fn set_slave_pass(&mut self) {
        self.slave_pass = true;
    }

    /// Begin a sequence. The executor must be idle.
    pub fn start(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
        limits: &ShapeLimits,
    ) -> HomeResult {
        let h = &params.homing;
        if h.fast_vel.0 <= 0.0 || h.backoff_vel.0 <= 0.0 {
            self.fail(HomeResult::Velocity, exec, tracker);
            return HomeResult::Velocity;
        }
        if h.fine_search && (h.slow_vel.0 <= 0.0 || h.fine_vel.0 <= 0.0) {
            self.fail(HomeResult::Velocity, exec, tracker);
            return HomeResult::Velocity;
        }
        if bank.read_logical(Signal::ServoAlarm) {
            self.fail(HomeResult::AmpFault, exec, tracker);
            return HomeResult::AmpFault;
        }

        *self = Self::default();
        self.result = HomeResult::Searching;
        self.enter_search(Stage::FastApproach, params, exec, tracker, limits);
        HomeResult::Searching
    }

    /// Abort with USER_BREAK (client stop during the search).
    pub fn user_break(&mut self, exec: &mut AxisExecutor, tracker: &mut StatusTracker) {
        if self.is_active() {
            exec.stop_emergency(tracker);
            self.fail(HomeResult::UserBreak, exec, tracker);
        }
    }

    /// Abort with GANTRY_RANGE (pair monitor tripped).
    pub fn gantry_break(&mut self, exec: &mut AxisExecutor, tracker: &mut StatusTracker) {
        if self.is_active() {
            exec.stop_emergency(tracker);
            self.fail(HomeResult::GantryRange, exec, tracker);
        }
    }

    /// Advance one control cycle. Returns the (possibly final) result.
    pub fn tick(
        &mut self,
        dt: f64,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
        limits: &ShapeLimits,
    ) -> HomeResult {
        if !self.is_active() {
            return self.result;
        }
        if bank.read_logical(Signal::ServoAlarm) {
            exec.stop_emergency(tracker);
            self.fail(HomeResult::AmpFault, exec, tracker);
            return self.result;
        }

        self.stage_elapsed += dt;
        if self.stage_budget > 0.0 && self.stage_elapsed > self.stage_budget {
            exec.stop_emergency(tracker);
            self.fail(HomeResult::NotDetected, exec, tracker);
            return self.result;
        }

        match self.stage {
            Stage::FastApproach => self.tick_approach(dt, true, params, exec, tracker, bank, limits),
            Stage::BackOff => self.tick_backoff(dt, params, exec, tracker, bank, limits),
            Stage::SlowApproach => {
                self.tick_approach(dt, false, params, exec, tracker, bank, limits)
            }
            Stage::ZSearch => self.tick_zsearch(params, exec, tracker, bank, limits),
            Stage::OffsetMove => self.tick_offset(params, exec, tracker),
            _ => {}
        }
        self.result
    }

    // --- stages -------------------------------------------------------

    fn enter_search(
        &mut self,
        stage: Stage,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
    ) {
        let h = &params.homing;
        let (vel, accel, dir) = match stage {
            Stage::FastApproach => (h.fast_vel.0, h.accel_1.0, h.direction as f64),
            Stage::BackOff => (h.backoff_vel.0, h.accel_1.0, -(h.direction as f64)),
            Stage::SlowApproach => (h.slow_vel.0, h.accel_2.0, h.direction as f64),
            Stage::ZSearch => {
                let z_dir = match h.z_use {
                    ZPhaseUse::ReverseDirection => -(h.direction as f64),
                    _ => h.direction as f64,
                };
                (h.fine_vel.0, h.accel_2.0, z_dir)
            }
            _ => return,
        };
        self.stage = stage;
        self.sub = SUB_SEARCH;
        self.hold_s = 0.0;
        self.stage_elapsed = 0.0;
        self.stage_budget = stage_budget(params, vel);
        self.z_was_active = false;

        let curve = match generate_jog(vel, accel, 0.0, limits) {
            Ok(c) => c,
            Err(_) => {
                self.fail(HomeResult::Velocity, exec, tracker);
                return;
            }
        };
        exec.set_move_args(vel, accel, accel);
        exec.start_curve(curve, dir, tracker.cmd_pos(), None, AxisState::Homing, tracker);
    }

    fn home_signal(&self, params: &AxisParams) -> Signal {
        match params.homing.method {
            HomeMethod::HomeSensor => Signal::Home,
            HomeMethod::PositiveLimit => Signal::LimitPositive,
            HomeMethod::NegativeLimit => Signal::LimitNegative,
            HomeMethod::ZPhase => Signal::ZPhase,
        }
    }

    fn tick_approach(
        &mut self,
        dt: f64,
        fast: bool,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
        limits: &ShapeLimits,
    ) {
        match self.sub {
            SUB_SEARCH => {
                if self.check_limit_interlock(params, exec, tracker, bank) {
                    return;
                }
                let active = bank.read_logical(self.home_signal(params));
                if active {
                    self.hold_s += dt;
                } else {
                    self.hold_s = 0.0;
                }
                let scan = params.homing.scan_time_ms as f64 / 1000.0;
                if active && self.hold_s >= scan {
                    if params.homing.interlock == HomeInterlock::Distance {
                        if let Some(at) = self.limit_latch {
                            let dist = (tracker.cmd_pos().0 - at).abs();
                            if dist > params.homing.dog_length.0 {
                                exec.stop_emergency(tracker);
                                self.fail(HomeResult::NotDetected, exec, tracker);
                                return;
                            }
                        }
                    }
                    exec.stop_decel(params.homing.accel_1.0, tracker);
                    self.sub = SUB_STOPPING;
                }
            }
            SUB_STOPPING => {
                if exec.state() == AxisState::Idle {
                    if fast {
                        self.enter_search(Stage::BackOff, params, exec, tracker, limits);
                    } else {
                        self.after_reapproach(params, exec, tracker, limits);
                    }
                }
            }
            _ => {}
        }
    }

    fn tick_backoff(
        &mut self,
        dt: f64,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
        limits: &ShapeLimits,
    ) {
        match self.sub {
            SUB_SEARCH => {
                let inactive = !bank.read_logical(self.home_signal(params));
                if inactive {
                    self.hold_s += dt;
                } else {
                    self.hold_s = 0.0;
                }
                let scan = params.homing.scan_time_ms as f64 / 1000.0;
                if inactive && self.hold_s >= scan {
                    exec.stop_decel(params.homing.accel_1.0, tracker);
                    self.sub = SUB_STOPPING;
                }
            }
            SUB_STOPPING => {
                if exec.state() == AxisState::Idle {
                    if params.homing.fine_search {
                        self.enter_search(Stage::SlowApproach, params, exec, tracker, limits);
                    } else {
                        self.after_reapproach(params, exec, tracker, limits);
                    }
                }
            }
            _ => {}
        }
    }

    /// After the reference edge is fixed: Z-phase stage or offset.
    fn after_reapproach(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
    ) {
        if params.homing.z_use != ZPhaseUse::None {
            self.enter_search(Stage::ZSearch, params, exec, tracker, limits);
        } else {
            self.enter_offset(params, exec, tracker, limits);
        }
    }

    fn tick_zsearch(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
        limits: &ShapeLimits,
    ) {
        match self.sub {
            SUB_SEARCH => {
                let active = bank.read_logical(Signal::ZPhase);
                let rising = active && !self.z_was_active;
                self.z_was_active = active;
                if rising {
                    self.z_capture = Some(tracker.actual_pos().0);
                    exec.stop_decel(params.homing.accel_2.0, tracker);
                    self.sub = SUB_STOPPING;
                }
            }
            SUB_STOPPING => {
                if exec.state() == AxisState::Idle {
                    self.enter_offset(params, exec, tracker, limits);
                }
            }
            _ => {}
        }
    }

    fn enter_offset(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        limits: &ShapeLimits,
    ) {
        let h = &params.homing;
        let offset = h.offset.0;
        self.stage = Stage::OffsetMove;
        self.sub = SUB_ARM;
        self.stage_elapsed = 0.0;
        self.stage_budget = stage_budget(params, h.backoff_vel.0);

        if offset == 0.0 {
            self.finish(params, exec, tracker);
            return;
        }
        let spec = MoveSpec::rest_to_rest(offset.abs(), h.backoff_vel.0, h.accel_2.0, h.accel_2.0);
        match generate(&spec, limits) {
            Ok(curve) => {
                let origin = tracker.cmd_pos();
                let dir = offset.signum();
                let target = Units(origin.0 + offset);
                exec.set_move_args(h.backoff_vel.0, h.accel_2.0, h.accel_2.0);
                exec.start_curve(curve, dir, origin, Some(target), AxisState::Homing, tracker);
                self.sub = SUB_SEARCH;
            }
            Err(_) => self.fail(HomeResult::Unknown, exec, tracker),
        }
    }

    fn tick_offset(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
    ) {
        if exec.playback_done() {
            self.finish(params, exec, tracker);
        }
    }

    fn finish(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
    ) {
        exec.finish_homing(tracker);
        if params.homing.clear_after_home {
            tracker.set_cmd_pos(Units(0.0));
            tracker.pos_match();
            exec.rebase(params, tracker);
        }
        self.stage = Stage::Done;
        self.sub = 0;
        self.result = HomeResult::Success;
    }

    fn fail(&mut self, result: HomeResult, exec: &mut AxisExecutor, tracker: &mut StatusTracker) {
        exec.set_home_failed(tracker);
        self.stage = Stage::Failed;
        self.sub = 0;
        self.result = result;
    }

    /// Limit handling during approaches. Returns true when the
    /// sequence failed.
    fn check_limit_interlock(
        &mut self,
        params: &AxisParams,
        exec: &mut AxisExecutor,
        tracker: &mut StatusTracker,
        bank: &SignalBank,
    ) -> bool {
        let dir = params.homing.direction;
        let (limit_sig, fail_result) = if dir > 0 {
            (Signal::LimitPositive, HomeResult::PosLimit)
        } else {
            (Signal::LimitNegative, HomeResult::NegLimit)
        };
        // A limit that doubles as the home signal is not an error.
        if self.home_signal(params) == limit_sig {
            return false;
        }
        if bank.read_logical(limit_sig) {
            match params.homing.interlock {
                HomeInterlock::SensorCheck => {
                    if !bank.read_logical(self.home_signal(params)) {
                        exec.stop_emergency(tracker);
                        self.fail(fail_result, exec, tracker);
                        return true;
                    }
                    false
                }
                HomeInterlock::Distance => {
                    if self.limit_latch.is_none() {
                        self.limit_latch = Some(tracker.cmd_pos().0);
                    }
                    false
                }
                HomeInterlock::None => {
                    exec.stop_emergency(tracker);
                    self.fail(fail_result, exec, tracker);
                    true
                }
            }
        } else {
            false
        }
    }
}

/// Stage timeout from the stage velocity and the available span.
fn stage_budget(params: &AxisParams, vel: f64) -> f64 {
    if vel <= 0.0 {
        return 1.0;
    }
    let span = if params.soft_limit.enabled {
        (params.soft_limit.positive.0 - params.soft_limit.negative.0).abs()
    } else {
        // No window armed: assume a generous travel.
        1e6 * params.unit_ratio.units_per_pulse()
    };
    // Twice the worst-case traverse, plus settle margin.
    (2.0 * span / vel) + 5.0
}
