//! The controller facade.
//!
//! Owns every per-axis runtime (executor, signals, status, triggers,
//! compensation, homing) plus the cross-axis engines (coordinates,
//! continuous queue, cam/gear, gantry, PVT sync) and advances them all
//! by one control cycle per [`Controller::tick`]. Blocking call
//! variants drive the tick loop inline until the awaited condition.

use heapless::Vec;

use crate::axis::{
    AxisEvent, AxisExecutor, AxisState, EventQueue, OverrideMoment, TickOutcome, EV_ALARM,
    EV_CAPTURE, EV_HOME_DONE, EV_HOME_FAILED, EV_LIMIT, EV_MOVE_DONE, EV_NODE_DONE, EV_STOP_DONE,
    EV_TRIGGER,
};
use crate::cam::{CamSource, EcamTable, GearLink};
use crate::comp::{CompPoint, CompTable};
use crate::coord::{
    resolve, ContiMode, ContiNode, ContiQueue, CoordId, CoordManager, Coordinate, DeferredIo,
    PathSegment, SegmentSpec, MAX_COORDS,
};
use crate::error::{Error, LimitKind, ParamIssue, Result};
use crate::homing::{GantryAction, GantryHomeMode, GantryPair, HomeResult, HomingSeq};
use crate::param::{AxisParams, ParamStore, PositionMode, MAX_AXES};
use crate::profile::{generate, generate_jog, generate_stop, MoveSpec, ShapeLimits, VelCurve};
use crate::pvt::{PvtCurve, PvtPoint, SyncGroup, MAX_SYNC_GROUPS};
use crate::signal::{FilterClass, OutputSignal, Signal, SignalBank};
use crate::status::{InfoSelect, MotionInfo, PosRepr, StatusTracker};
use crate::trigger::{CaptureLatch, TriggerBank, TriggerConfig};
use crate::units::{AxisId, CycleTime, Units, UnitsPerSec};
use crate::wire::{DriveCommand, DriveReply, ReturnMode, Wire};

/// Gear links per controller.
pub const MAX_GEAR_LINKS: usize = 8;

/// Cam tables per controller.
pub const MAX_ECAM_TABLES: usize = 4;

/// Gantry pairs per controller.
pub const MAX_GANTRY_PAIRS: usize = 2;

/// Fraction of the gantry offset error corrected per second.
const GANTRY_ALIGN_RATE: f64 = 1.0;

/// Safety cap on blocking waits, in cycles.
const BLOCKING_CAP: u32 = 10_000_000;

#[derive(Debug, Default)]
struct PvtPlay {
    curve: PvtCurve,
    t: f64,
}

#[derive(Debug)]
struct ActiveSegment {
    path: PathSegment,
    curve: VelCurve,
    t: f64,
    io: Option<DeferredIo>,
    io_done: bool,
}

#[derive(Debug, Default)]
struct CoordRt {
    queue: ContiQueue,
    active: Option<ActiveSegment>,
    running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GantryHomePhase {
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy)]
struct GantryHomeRun {
    pair: usize,
    phase: GantryHomePhase,
}

#[derive(Default)]
struct AxisRt {
    exec: AxisExecutor,
    bank: SignalBank,
    tracker: StatusTracker,
    events: EventQueue,
    triggers: TriggerBank,
    capture: CaptureLatch,
    comp: CompTable,
    homing: HomingSeq,
    pvt: Option<PvtPlay>,
    /// Command position at the top of the current cycle.
    prev_cmd: f64,
    /// Stop the axis when the armed capture latches.
    capture_stop: bool,
    home_was_active: bool,
}

impl AxisRt {
    fn new(params: &AxisParams) -> Self {
        Self {
            bank: SignalBank::from_params(params),
            tracker: StatusTracker::new(params.unit_ratio),
            ..Self::default()
        }
    }
}

/// Virtual→real axis remap, enforced as a bijection.
#[derive(Debug, Default)]
struct VirtualMap {
    to_real: [Option<AxisId>; MAX_AXES],
}

impl VirtualMap {
    fn set(&mut self, virtual_id: AxisId, real_id: AxisId) -> Result<()> {
        if virtual_id as usize >= MAX_AXES || real_id as usize >= MAX_AXES {
            return Err(Error::InvalidAxis(virtual_id.max(real_id)));
        }
        // Duplicate mappings shadow silently on vendor stacks; here
        // they are rejected loudly in both directions.
        if self.to_real[virtual_id as usize].is_some() {
            return Err(Error::InvalidParameter(ParamIssue::DuplicateMapping));
        }
        if self.to_real.iter().any(|m| *m == Some(real_id)) {
            return Err(Error::InvalidParameter(ParamIssue::DuplicateMapping));
        }
        self.to_real[virtual_id as usize] = Some(real_id);
        Ok(())
    }

    fn get(&self, virtual_id: AxisId) -> Option<AxisId> {
        self.to_real.get(virtual_id as usize).copied().flatten()
    }

    fn reset(&mut self) {
        self.to_real = [None; MAX_AXES];
    }

    fn resolve(&self, id: AxisId) -> AxisId {
        self.get(id).unwrap_or(id)
    }
}

/// Cycle-driven multi-axis motion controller over a [`Wire`].
pub struct Controller<W: Wire> {
    wire: W,
    cycle: CycleTime,
    params: ParamStore,
    axes: Vec<AxisRt, MAX_AXES>,
    coords: CoordManager,
    coord_rt: [CoordRt; MAX_COORDS],
    gears: Vec<GearLink, MAX_GEAR_LINKS>,
    cams: Vec<EcamTable, MAX_ECAM_TABLES>,
    gantries: Vec<GantryPair, MAX_GANTRY_PAIRS>,
    gantry_home: Option<GantryHomeRun>,
    syncs: [SyncGroup; MAX_SYNC_GROUPS],
    vmap: VirtualMap,
}

impl<W: Wire> Controller<W> {
    /// Build a controller with `axis_count` axes at default parameters.
    pub fn new(wire: W, axis_count: u8) -> Self {
        Self::with_cycle(wire, axis_count, CycleTime::DEFAULT)
    }

    /// Build with an explicit control cycle.
    pub fn with_cycle(wire: W, axis_count: u8, cycle: CycleTime) -> Self {
        let params = ParamStore::with_axes(axis_count);
        let mut axes = Vec::new();
        for p in params.iter() {
            let _ = axes.push(AxisRt::new(p));
        }
        Self {
            wire,
            cycle,
            params,
            axes,
            coords: CoordManager::default(),
            coord_rt: Default::default(),
            gears: Vec::new(),
            cams: Vec::new(),
            gantries: Vec::new(),
            gantry_home: None,
            syncs: Default::default(),
            vmap: VirtualMap::default(),
        }
    }

    /// The control cycle period.
    #[inline]
    pub fn cycle(&self) -> CycleTime {
        self.cycle
    }

    /// Borrow the wire (simulation inspection, test hooks).
    pub fn wire(&self) -> &W {
        &self.wire
    }

    /// Mutable wire access.
    pub fn wire_mut(&mut self) -> &mut W {
        &mut self.wire
    }

    // --- axis resolution and parameter access -------------------------

    fn resolve_axis(&self, id: AxisId) -> Result<AxisId> {
        let real = self.vmap.resolve(id);
        if self.params.has_axis(real) {
            Ok(real)
        } else {
            Err(Error::InvalidAxis(id))
        }
    }

    /// Borrow the parameter store.
    pub fn param_store(&self) -> &ParamStore {
        &self.params
    }

    /// Replace the whole parameter store (e.g. after a file load).
    /// Every axis must be idle.
    pub fn load_param_store(&mut self, store: ParamStore) -> Result<()> {
        for rt in self.axes.iter() {
            if rt.exec.state().is_active() {
                return Err(Error::Busy);
            }
        }
        for (id, rt) in self.axes.iter_mut().enumerate() {
            if let Ok(p) = store.axis(id as u8) {
                rt.bank = SignalBank::from_params(p);
                rt.tracker.set_ratio(p.unit_ratio);
            }
        }
        self.params = store;
        Ok(())
    }

    /// Update parameters for an idle axis. Writes while the axis is in
    /// motion are rejected with `Busy`; use the override entry points
    /// for the fields that are mutable in motion.
    pub fn update_params<F>(&mut self, axis: AxisId, f: F) -> Result<()>
    where
        F: FnOnce(&mut AxisParams),
    {
        let id = self.resolve_axis(axis)?;
        if self.axes[id as usize].exec.state().is_active() {
            return Err(Error::Busy);
        }
        self.params.try_update(id, f)?;
        let p = self.params.axis(id)?;
        self.axes[id as usize].tracker.set_ratio(p.unit_ratio);
        Ok(())
    }

    /// Raise the velocity ceiling. Permitted while the axis moves
    /// (override-class parameter).
    pub fn set_max_vel(&mut self, axis: AxisId, max: UnitsPerSec) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.params.set_max_vel(id, max)
    }

    // --- virtual axis map ---------------------------------------------

    /// Map a virtual axis number onto a real one. Duplicates are
    /// rejected with `InvalidParameter`.
    pub fn set_virtual_map(&mut self, virtual_id: AxisId, real_id: AxisId) -> Result<()> {
        if !self.params.has_axis(real_id) {
            return Err(Error::InvalidAxis(real_id));
        }
        self.vmap.set(virtual_id, real_id)
    }

    /// Read a virtual mapping.
    pub fn get_virtual_map(&self, virtual_id: AxisId) -> Option<AxisId> {
        self.vmap.get(virtual_id)
    }

    /// Restore the identity mapping.
    pub fn reset_virtual_map(&mut self) {
        self.vmap.reset();
    }

    // --- signal layer -------------------------------------------------

    /// Set the active level of an input line.
    pub fn set_signal_level(&mut self, axis: AxisId, signal: Signal, level: crate::param::Level) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].bank.set_level(signal, level);
        Ok(())
    }

    /// Set a debounce filter bandwidth in microseconds.
    pub fn set_filter_us(&mut self, axis: AxisId, class: FilterClass, micros: f64) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].bank.set_filter_us(class, micros);
        Ok(())
    }

    /// Raw electrical level of an input line.
    pub fn read_raw(&self, axis: AxisId, signal: Signal) -> Result<bool> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].bank.read_raw(signal))
    }

    /// Level-corrected, debounced input state.
    pub fn read_logical(&self, axis: AxisId, signal: Signal) -> Result<bool> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].bank.read_logical(signal))
    }

    /// Write a general-purpose output line.
    pub fn write_output(&mut self, axis: AxisId, channel: u8, value: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize]
            .bank
            .write_output(OutputSignal::GeneralOut(channel), value);
        Ok(())
    }

    /// Assert general outputs for a bounded time.
    pub fn pulse_output_for_ms(&mut self, axis: AxisId, mask: u8, duration_ms: u32) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].bank.pulse_output_for_ms(mask, duration_ms);
        Ok(())
    }

    /// Configure how the emergency-stop input halts motion.
    pub fn set_estop_policy(&mut self, axis: AxisId, policy: crate::param::StopMode) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].bank.set_estop_policy(policy);
        Ok(())
    }

    // --- servo control ------------------------------------------------

    /// Switch the servo-on output. Refused while the drive is alarmed
    /// or the parameter block fails validation. Gantry-paired axes
    /// switch together.
    pub fn servo_on(&mut self, axis: AxisId, on: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        if on {
            self.params.axis(id)?.validate().map_err(|_| Error::Internal)?;
            if self.axes[id as usize].bank.read_logical(Signal::ServoAlarm) {
                return Err(Error::AlarmActive);
            }
        }
        let mut targets: Vec<AxisId, 2> = Vec::new();
        let _ = targets.push(id);
        for pair in self.gantries.iter() {
            if pair.is_enabled() && (pair.master == id || pair.slave == id) {
                let other = if pair.master == id { pair.slave } else { pair.master };
                let _ = targets.push(other);
            }
        }
        for t in targets {
            self.axes[t as usize]
                .bank
                .write_output(OutputSignal::ServoOn, on);
        }
        Ok(())
    }

    /// Whether the servo-on output is asserted.
    pub fn is_servo_on(&self, axis: AxisId) -> Result<bool> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].bank.outputs().servo_on)
    }

    /// Pulse the alarm-reset output for the given duration.
    pub fn alarm_reset(&mut self, axis: AxisId, duration_ms: u32) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let rt = &mut self.axes[id as usize];
        rt.bank.write_output(OutputSignal::AlarmReset, true);
        // Reuse the timed-pulse machinery through a direct clear after
        // the blocking wait below; non-blocking callers clear manually.
        let cycles = (duration_ms.max(1) * 1000) / self.cycle.micros().max(1);
        for _ in 0..cycles.max(1) {
            self.tick();
        }
        self.axes[id as usize]
            .bank
            .write_output(OutputSignal::AlarmReset, false);
        self.axes[id as usize].tracker.clear_error();
        Ok(())
    }

    // --- status layer -------------------------------------------------

    /// Command position.
    pub fn cmd_pos(&self, axis: AxisId) -> Result<Units> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.cmd_pos())
    }

    /// Actual (encoder) position.
    pub fn actual_pos(&self, axis: AxisId) -> Result<Units> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.actual_pos())
    }

    /// Command minus actual.
    pub fn position_error(&self, axis: AxisId) -> Result<Units> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.position_error())
    }

    /// Live velocity from the short-window finite difference.
    pub fn velocity(&self, axis: AxisId) -> Result<UnitsPerSec> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.velocity())
    }

    /// Whether the pulse train is active.
    pub fn in_motion(&self, axis: AxisId) -> Result<bool> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.in_motion())
    }

    /// Axis state machine state.
    pub fn axis_state(&self, axis: AxisId) -> Result<AxisState> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].exec.state())
    }

    /// Signed pulses delivered since the current motion began.
    pub fn drive_pulses(&self, axis: AxisId) -> Result<i64> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.drive_pulses())
    }

    /// Distance covered since the current motion began.
    pub fn drive_distance(&self, axis: AxisId) -> Result<Units> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.drive_distance())
    }

    /// Forcibly set the command position (idle axes only).
    pub fn set_cmd_pos(&mut self, axis: AxisId, pos: Units) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let rt = &mut self.axes[id as usize];
        if rt.exec.state().is_active() {
            return Err(Error::Busy);
        }
        rt.tracker.set_cmd_pos(pos);
        let params = self.params.axis(id)?;
        rt.exec.rebase(params, &rt.tracker);
        Ok(())
    }

    /// Forcibly set the actual position.
    pub fn set_actual_pos(&mut self, axis: AxisId, pos: Units) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].tracker.set_actual_pos(pos);
        Ok(())
    }

    /// Align the actual position to the command position.
    pub fn pos_match(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].tracker.pos_match();
        Ok(())
    }

    /// Select the reported position representation.
    pub fn set_pos_repr(&mut self, axis: AxisId, repr: PosRepr) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].tracker.set_repr(repr);
        Ok(())
    }

    /// Latched asynchronous motion error, if any.
    pub fn last_error(&self, axis: AxisId) -> Result<Option<Error>> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].tracker.last_error())
    }

    /// Clear the latched error and a HomeFailed state.
    pub fn clear_error(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let rt = &mut self.axes[id as usize];
        rt.tracker.clear_error();
        rt.exec.clear_home_failed();
        Ok(())
    }

    /// Combined bitmask-selected status snapshot.
    pub fn motion_info(&self, axis: AxisId, select: InfoSelect) -> Result<MotionInfo> {
        let id = self.resolve_axis(axis)?;
        let rt = &self.axes[id as usize];
        let mut info = MotionInfo::default();
        if select.has(InfoSelect::CMD_POS) {
            info.cmd_pos = rt.tracker.cmd_pos();
        }
        if select.has(InfoSelect::ACT_POS) {
            info.act_pos = rt.tracker.actual_pos();
        }
        if select.has(InfoSelect::MECH_SIGNALS) {
            info.mech_signals = rt.bank.filtered();
        }
        if select.has(InfoSelect::DRIVE_STATUS) {
            info.drive_status = rt.tracker.flags();
        }
        if select.has(InfoSelect::UIO_IN) {
            info.uio_in = rt.bank.uio_in();
        }
        if select.has(InfoSelect::UIO_OUT) {
            info.uio_out = rt.bank.outputs();
        }
        Ok(info)
    }

    // --- events -------------------------------------------------------

    /// Drain one notification record for an axis.
    pub fn take_event(&mut self, axis: AxisId) -> Result<Option<AxisEvent>> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].events.pop())
    }

    // --- single-axis motion -------------------------------------------

    fn validate_motion_entry(&self, id: AxisId, target: Option<Units>) -> Result<()> {
        let rt = &self.axes[id as usize];
        let params = self.params.axis(id)?;
        if !rt.exec.accepts_commands() {
            return Err(Error::Busy);
        }
        if !rt.bank.outputs().servo_on {
            return Err(Error::NotServoOn);
        }
        if rt.bank.read_logical(Signal::ServoAlarm) {
            return Err(Error::AlarmActive);
        }
        if let Some(target) = target {
            if params.soft_limit.enabled && !params.soft_limit.contains(target) {
                let kind = if target.0 > params.soft_limit.positive.0 {
                    LimitKind::SoftPositive
                } else {
                    LimitKind::SoftNegative
                };
                return Err(Error::LimitHit(kind));
            }
            let dir = target.0 - rt.tracker.cmd_pos().0;
            if dir > 0.0 && rt.bank.read_logical(Signal::LimitPositive) {
                return Err(Error::LimitHit(LimitKind::HardPositive));
            }
            if dir < 0.0 && rt.bank.read_logical(Signal::LimitNegative) {
                return Err(Error::LimitHit(LimitKind::HardNegative));
            }
        }
        Ok(())
    }

    /// Start a point-to-point move (non-blocking).
    ///
    /// The target is absolute or relative per the axis's configured
    /// position mode; the compensation table, when armed, corrects the
    /// absolute target transparently.
    pub fn move_start(
        &mut self,
        axis: AxisId,
        target: Units,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let params = self.params.axis(id)?.clone();
        let current = self.axes[id as usize].tracker.cmd_pos();
        let absolute = match params.position_mode {
            PositionMode::Absolute => target,
            PositionMode::Relative => Units(current.0 + target.0),
        };
        let corrected = self.axes[id as usize].comp.apply(absolute);
        self.validate_motion_entry(id, Some(corrected))?;

        let distance = (corrected.0 - current.0).abs();
        let limits = ShapeLimits::from_params(&params);
        let spec = MoveSpec::rest_to_rest(distance, velocity, accel, decel);
        let curve = generate(&spec, &limits)?;
        let rt = &mut self.axes[id as usize];
        let dir = if corrected.0 >= current.0 { 1.0 } else { -1.0 };
        rt.exec.set_move_args(velocity, accel, decel);
        rt.exec.start_curve(
            curve,
            dir,
            current,
            Some(corrected),
            AxisState::Moving,
            &mut rt.tracker,
        );
        Ok(())
    }

    /// Move and block until the axis returns to idle.
    pub fn move_to(
        &mut self,
        axis: AxisId,
        target: Units,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> Result<()> {
        self.move_start(axis, target, velocity, accel, decel)?;
        self.wait_axis_idle(axis, BLOCKING_CAP)
    }

    /// Start an unbounded velocity-mode move (jog). Sign of
    /// `velocity` sets the direction.
    pub fn jog_start(&mut self, axis: AxisId, velocity: f64, accel: f64) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.validate_motion_entry(id, None)?;
        let params = self.params.axis(id)?.clone();
        let limits = ShapeLimits::from_params(&params);
        let curve = generate_jog(velocity.abs(), accel, 0.0, &limits)?;
        let rt = &mut self.axes[id as usize];
        let origin = rt.tracker.cmd_pos();
        rt.exec.set_move_args(velocity.abs(), accel, accel);
        rt.exec
            .start_curve(curve, velocity.signum(), origin, None, AxisState::Moving, &mut rt.tracker);
        Ok(())
    }

    /// Start several independent moves latched on the same cycle.
    pub fn multi_start(&mut self, moves: &[(AxisId, Units, f64, f64, f64)]) -> Result<()> {
        // Validate everything first so the batch is all-or-nothing.
        for &(axis, target, ..) in moves {
            let id = self.resolve_axis(axis)?;
            let params = self.params.axis(id)?;
            let current = self.axes[id as usize].tracker.cmd_pos();
            let absolute = match params.position_mode {
                PositionMode::Absolute => target,
                PositionMode::Relative => Units(current.0 + target.0),
            };
            self.validate_motion_entry(id, Some(absolute))?;
        }
        for &(axis, target, vel, accel, decel) in moves {
            self.move_start(axis, target, vel, accel, decel)?;
        }
        Ok(())
    }

    /// Decel-respecting stop with an explicit slope.
    pub fn move_stop(&mut self, axis: AxisId, decel: f64) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.break_homing_if_active(id);
        let rt = &mut self.axes[id as usize];
        rt.exec.stop_decel(decel, &mut rt.tracker);
        Ok(())
    }

    /// Stop using the axis's configured profile decel.
    pub fn move_sstop(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.break_homing_if_active(id);
        let rt = &mut self.axes[id as usize];
        rt.exec.stop_configured(&mut rt.tracker);
        Ok(())
    }

    /// Halt the pulse train at the next cycle.
    pub fn move_estop(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.break_homing_if_active(id);
        let rt = &mut self.axes[id as usize];
        rt.exec.stop_emergency(&mut rt.tracker);
        Ok(())
    }

    /// Stop several axes on the same cycle.
    pub fn multi_stop(&mut self, axes: &[AxisId], decel: f64) -> Result<()> {
        for &a in axes {
            self.move_stop(a, decel)?;
        }
        Ok(())
    }

    /// Configured-profile stop on several axes.
    pub fn multi_sstop(&mut self, axes: &[AxisId]) -> Result<()> {
        for &a in axes {
            self.move_sstop(a)?;
        }
        Ok(())
    }

    /// Emergency stop on several axes.
    pub fn multi_estop(&mut self, axes: &[AxisId]) -> Result<()> {
        for &a in axes {
            self.move_estop(a)?;
        }
        Ok(())
    }

    fn break_homing_if_active(&mut self, id: AxisId) {
        let rt = &mut self.axes[id as usize];
        if rt.homing.is_active() {
            rt.homing.user_break(&mut rt.exec, &mut rt.tracker);
            rt.home_was_active = false;
            rt.events.push(id, EV_HOME_FAILED);
        }
    }

    // --- overrides ----------------------------------------------------

    /// Replace the plateau velocity of the move in flight.
    pub fn override_velocity(&mut self, axis: AxisId, velocity: f64) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let limits = ShapeLimits::from_params(self.params.axis(id)?);
        self.axes[id as usize].exec.override_velocity(velocity, &limits)
    }

    /// Replace velocity and both slopes of the move in flight.
    pub fn override_motion(
        &mut self,
        axis: AxisId,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let limits = ShapeLimits::from_params(self.params.axis(id)?);
        self.axes[id as usize]
            .exec
            .override_motion(velocity, accel, decel, &limits)
    }

    /// Retarget the move in flight.
    pub fn override_position(&mut self, axis: AxisId, target: Units) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let limits = ShapeLimits::from_params(self.params.axis(id)?);
        let corrected = self.axes[id as usize].comp.apply(target);
        self.axes[id as usize]
            .exec
            .override_position(corrected.0, &limits)
    }

    /// Arm a velocity override that applies at a position threshold.
    pub fn override_at_position(
        &mut self,
        axis: AxisId,
        threshold: Units,
        velocity: f64,
        moment: OverrideMoment,
    ) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize]
            .exec
            .override_at_position(threshold.0, velocity, moment)
    }

    /// Queue an additional target after the current one
    /// (multi-position override).
    pub fn override_next_position(
        &mut self,
        axis: AxisId,
        target: Units,
        velocity: f64,
    ) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].exec.push_followup(target.0, velocity)
    }

    /// Send a torque-limit frame to the drive (mutable in motion).
    pub fn override_torque_limit(&mut self, axis: AxisId, percent: u16) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.wire
            .send_drive(id, &DriveCommand::TorqueLimit { percent })?;
        let _ = self.wire.poll_drive(id);
        Ok(())
    }

    // --- torque mode --------------------------------------------------

    /// Put the drive into torque mode; no pulses are produced.
    pub fn torque_mode_enter(&mut self, axis: AxisId, percent: i16) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.validate_motion_entry(id, None)?;
        self.wire
            .send_drive(id, &DriveCommand::TorqueControl { percent })?;
        let _ = self.wire.poll_drive(id);
        let rt = &mut self.axes[id as usize];
        rt.exec.enter_torque_mode(&mut rt.tracker);
        Ok(())
    }

    /// Return the drive to position mode.
    pub fn torque_mode_exit(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.wire.send_drive(id, &DriveCommand::PositionControl)?;
        let _ = self.wire.poll_drive(id);
        let rt = &mut self.axes[id as usize];
        rt.exec.leave_torque_mode(&mut rt.tracker);
        Ok(())
    }

    // --- homing -------------------------------------------------------

    /// Start the homing sequence (non-blocking).
    pub fn home_start(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.validate_motion_entry(id, None)?;
        let params = self.params.axis(id)?.clone();
        let limits = ShapeLimits::from_params(&params);
        let rt = &mut self.axes[id as usize];
        rt.home_was_active = true;
        let result = rt
            .homing
            .start(&params, &mut rt.exec, &mut rt.tracker, &rt.bank, &limits);
        match result {
            HomeResult::Searching => Ok(()),
            HomeResult::Velocity => Err(Error::InvalidParameter(ParamIssue::OutOfRange)),
            HomeResult::AmpFault => Err(Error::AlarmActive),
            _ => Err(Error::Internal),
        }
    }

    /// Homing result and (main-step, sub-step) progress.
    pub fn home_status(&self, axis: AxisId) -> Result<(HomeResult, (u8, u8))> {
        let id = self.resolve_axis(axis)?;
        let rt = &self.axes[id as usize];
        Ok((rt.homing.result(), rt.homing.progress()))
    }

    /// Block until homing terminates.
    pub fn home_wait(&mut self, axis: AxisId) -> Result<HomeResult> {
        let id = self.resolve_axis(axis)?;
        for _ in 0..BLOCKING_CAP {
            if !self.axes[id as usize].homing.is_active() {
                return Ok(self.axes[id as usize].homing.result());
            }
            self.tick();
        }
        Err(Error::Timeout)
    }

    // --- gantry -------------------------------------------------------

    /// Install a gantry pair.
    pub fn gantry_set(&mut self, pair: GantryPair) -> Result<usize> {
        let index = self.gantries.len();
        self.gantries.push(pair).map_err(|_| Error::QueueFull)?;
        Ok(index)
    }

    /// Arm or disarm a pair. Arming puts the slave under the master.
    pub fn gantry_enable(&mut self, index: usize, enabled: bool) -> Result<()> {
        let pair = self
            .gantries
            .get_mut(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?;
        pair.set_enabled(enabled);
        let slave = pair.slave;
        let rt = &mut self.axes[slave as usize];
        if enabled {
            rt.exec.enter_coordinated(&mut rt.tracker);
        } else {
            rt.exec.leave_coordinated();
        }
        Ok(())
    }

    /// Borrow a pair (status reads).
    pub fn gantry(&self, index: usize) -> Result<&GantryPair> {
        self.gantries
            .get(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))
    }

    /// Clear a pair's latched over-range error.
    pub fn gantry_clear_error(&mut self, index: usize) -> Result<()> {
        self.gantries
            .get_mut(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?
            .clear_error();
        Ok(())
    }

    /// Home a gantry pair per its home-use mode (non-blocking; watch
    /// with `home_status` on the master, then the slave).
    pub fn gantry_home_start(&mut self, index: usize) -> Result<()> {
        let pair = self
            .gantries
            .get(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?;
        let master = pair.master;
        self.gantry_home = Some(GantryHomeRun {
            pair: index,
            phase: GantryHomePhase::Master,
        });
        self.home_start(master)
    }

    // --- triggers and capture -----------------------------------------

    /// Configure a comparator.
    pub fn trigger_configure(&mut self, axis: AxisId, index: usize, config: TriggerConfig) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].triggers.configure(index, config)
    }

    /// Arm or disarm a comparator. Trigger settings are mutable in
    /// motion.
    pub fn trigger_enable(&mut self, axis: AxisId, index: usize, enabled: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].triggers.set_enabled(index, enabled)
    }

    /// Electrical level of a comparator output.
    pub fn trigger_output(&self, axis: AxisId, index: usize) -> Result<bool> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize]
            .triggers
            .comparator(index)
            .map(|c| c.output_active())
            .unwrap_or(false))
    }

    /// Firings since a comparator was armed.
    pub fn trigger_fire_count(&self, axis: AxisId, index: usize) -> Result<u32> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize]
            .triggers
            .comparator(index)
            .map(|c| c.fire_count())
            .unwrap_or(0))
    }

    /// Arm the capture latch on a signal edge.
    pub fn capture_arm(&mut self, axis: AxisId, signal: Signal, rising: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let rt = &mut self.axes[id as usize];
        rt.capture.arm(signal, rising, &rt.bank);
        rt.capture_stop = false;
        Ok(())
    }

    /// Read the captured position. Consumed by the read.
    pub fn capture_read(&mut self, axis: AxisId) -> Result<Option<Units>> {
        let id = self.resolve_axis(axis)?;
        Ok(self.axes[id as usize].capture.take())
    }

    /// Start a jog and capture the position of the next signal edge;
    /// motion stops once the edge latches.
    pub fn search_and_capture(
        &mut self,
        axis: AxisId,
        velocity: f64,
        accel: f64,
        signal: Signal,
        rising: bool,
    ) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.jog_start(id, velocity, accel)?;
        let rt = &mut self.axes[id as usize];
        rt.capture.arm(signal, rising, &rt.bank);
        rt.capture_stop = true;
        Ok(())
    }

    // --- compensation -------------------------------------------------

    /// Install a compensation table.
    pub fn comp_set_table(&mut self, axis: AxisId, points: &[CompPoint], rollover: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].comp.set_table(points, rollover)
    }

    /// Arm or disarm the compensation table.
    pub fn comp_enable(&mut self, axis: AxisId, enabled: bool) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.axes[id as usize].comp.set_enabled(enabled)
    }

    /// Drive the axis out and back by the backlash amount with a
    /// dwell, aligning the mechanics after servo-on. Blocking.
    pub fn backlash_locate(&mut self, axis: AxisId, velocity: f64, accel: f64, dwell_ms: u32) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        let params = self.params.axis(id)?.clone();
        if !params.backlash.is_configured() {
            return Err(Error::BacklashNotConfigured);
        }
        let amount = params.backlash.amount.0 * params.backlash.direction as f64;
        let origin = self.axes[id as usize].tracker.cmd_pos();
        self.move_to(id, Units(origin.0 + amount), velocity, accel, accel)?;
        let dwell_cycles = (dwell_ms * 1000) / self.cycle.micros().max(1);
        self.run_cycles(dwell_cycles.max(1));
        self.move_to(id, origin, velocity, accel, accel)?;
        Ok(())
    }

    // --- cam / gear ---------------------------------------------------

    /// Link a slave to a master with a signed gear ratio.
    pub fn egear_link(&mut self, master: AxisId, slave: AxisId, numerator: i32, denominator: u32) -> Result<()> {
        let m = self.resolve_axis(master)?;
        let s = self.resolve_axis(slave)?;
        if m == s {
            return Err(Error::InvalidAxis(slave));
        }
        if !self.axes[s as usize].exec.accepts_commands() {
            return Err(Error::Busy);
        }
        // One link per slave; a new link replaces the old.
        self.gears.retain(|l| l.slave != s);
        let link = GearLink::new(m, s, numerator, denominator);
        self.gears.push(link).map_err(|_| Error::QueueFull)?;
        Ok(())
    }

    /// Engage or disengage a slave's gear link.
    pub fn egear_enable(&mut self, slave: AxisId, enabled: bool) -> Result<()> {
        let s = self.resolve_axis(slave)?;
        let link = self
            .gears
            .iter_mut()
            .find(|l| l.slave == s)
            .ok_or(Error::InvalidAxis(slave))?;
        link.set_enabled(enabled);
        let rt = &mut self.axes[s as usize];
        if enabled {
            rt.exec.enter_coordinated(&mut rt.tracker);
        } else {
            rt.exec.leave_coordinated();
        }
        Ok(())
    }

    /// Remove a slave's gear link (or all links of a master).
    pub fn egear_reset(&mut self, axis: AxisId) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        for l in self.gears.iter() {
            if (l.slave == id || l.master == id) && l.is_active() {
                let rt = &mut self.axes[l.slave as usize];
                rt.exec.leave_coordinated();
            }
        }
        self.gears.retain(|l| l.slave != id && l.master != id);
        Ok(())
    }

    /// Install a cam table.
    pub fn ecam_set(
        &mut self,
        master: AxisId,
        slave: AxisId,
        master_start: f64,
        source: CamSource,
        master_positions: &[f64],
        slave_positions: &[f64],
    ) -> Result<()> {
        let m = self.resolve_axis(master)?;
        let s = self.resolve_axis(slave)?;
        let table = EcamTable::new(m, s, master_start, source, master_positions, slave_positions)?;
        self.cams.retain(|c| c.slave != s);
        self.cams.push(table).map_err(|_| Error::QueueFull)?;
        Ok(())
    }

    /// Engage or disengage a cam slave. Disengaging holds the slave
    /// at its current position.
    pub fn ecam_enable(&mut self, slave: AxisId, enabled: bool) -> Result<()> {
        let s = self.resolve_axis(slave)?;
        let cam = self
            .cams
            .iter_mut()
            .find(|c| c.slave == s)
            .ok_or(Error::InvalidAxis(slave))?;
        cam.set_enabled(enabled);
        let rt = &mut self.axes[s as usize];
        if enabled {
            rt.exec.enter_coordinated(&mut rt.tracker);
        } else {
            rt.exec.leave_coordinated();
        }
        Ok(())
    }

    /// Engage or disengage every cam slave of a master.
    pub fn ecam_enable_master(&mut self, master: AxisId, enabled: bool) -> Result<()> {
        let m = self.resolve_axis(master)?;
        let mut slaves: Vec<AxisId, MAX_ECAM_TABLES> = Vec::new();
        for cam in self.cams.iter_mut() {
            if cam.master == m {
                cam.set_enabled(enabled);
                let _ = slaves.push(cam.slave);
            }
        }
        for s in slaves {
            let rt = &mut self.axes[s as usize];
            if enabled {
                rt.exec.enter_coordinated(&mut rt.tracker);
            } else {
                rt.exec.leave_coordinated();
            }
        }
        Ok(())
    }

    // --- coordinates and continuous motion ----------------------------

    /// Map a coordinate: an ascending axis list plus abs/rel mode.
    pub fn coord_map(&mut self, id: CoordId, axes: &[AxisId], mode: PositionMode) -> Result<()> {
        for &a in axes {
            self.resolve_axis(a)?;
        }
        let coord = Coordinate::new(axes, mode)?;
        self.coords.map(id, coord)
    }

    /// Set the connection radius used for automatic corner rounding.
    pub fn coord_set_connection_radius(&mut self, id: CoordId, radius: Option<f64>) -> Result<()> {
        self.coords.get_mut(id)?.connection_radius = radius;
        Ok(())
    }

    /// Drop a coordinate mapping.
    pub fn coord_reset(&mut self, id: CoordId) -> Result<()> {
        self.coord_rt[id as usize].queue.reset();
        self.coord_rt[id as usize].active = None;
        self.coord_rt[id as usize].running = false;
        self.coords.reset(id)
    }

    /// Issue a coordinated move. Inside a node window the segment is
    /// enqueued; otherwise it executes immediately.
    pub fn coord_move(
        &mut self,
        id: CoordId,
        spec: &SegmentSpec,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> Result<()> {
        let coord = self.coords.get(id)?.clone();
        // Inside the node window, segments chain from the endpoint of
        // the last enqueued node.
        let start = self.coord_rt[id as usize]
            .queue
            .last_end()
            .filter(|_| self.coord_rt[id as usize].queue.is_collecting())
            .unwrap_or_else(|| self.coord_positions(&coord));
        let relative = coord.position_mode == PositionMode::Relative;
        let path = resolve(spec, start, coord.len(), relative)?;

        if self.coord_rt[id as usize].queue.is_collecting() {
            self.coord_rt[id as usize]
                .queue
                .enqueue(path, velocity, accel, decel, 0.0, 0.0)?;
            return Ok(());
        }

        self.check_coord_axes(&coord)?;
        let node = ContiNode {
            path,
            velocity,
            accel,
            decel,
            start_vel: 0.0,
            end_vel: 0.0,
            io: None,
            index: 0,
        };
        let active = self.build_segment(&coord, node)?;
        self.claim_coord_axes(&coord);
        self.coord_rt[id as usize].active = Some(active);
        self.coord_rt[id as usize].running = true;
        Ok(())
    }

    /// Open the deferred-enqueue window.
    pub fn conti_begin(&mut self, id: CoordId) -> Result<()> {
        self.coords.get(id)?;
        self.coord_rt[id as usize].queue.begin();
        Ok(())
    }

    /// Close the deferred-enqueue window.
    pub fn conti_end(&mut self, id: CoordId) -> Result<()> {
        self.coords.get(id)?;
        self.coord_rt[id as usize].queue.end();
        Ok(())
    }

    /// Drain the queue with the selected blending mode. `blend_angle`
    /// is the largest junction angle (degrees) that still blends.
    pub fn conti_start(&mut self, id: CoordId, mode: ContiMode, blend_angle: f64) -> Result<()> {
        let coord = self.coords.get(id)?.clone();
        {
            let rt = &mut self.coord_rt[id as usize];
            if rt.queue.queued() == 0 {
                return Err(Error::QueueEmpty);
            }
            rt.queue.end();
            rt.queue
                .plan_blending(mode, blend_angle, coord.connection_radius);
        }
        self.check_coord_axes(&coord)?;
        let node = self.coord_rt[id as usize]
            .queue
            .pop_next()
            .ok_or(Error::QueueEmpty)?;
        let active = self.build_segment(&coord, node)?;
        self.claim_coord_axes(&coord);
        self.coord_rt[id as usize].active = Some(active);
        self.coord_rt[id as usize].running = true;
        Ok(())
    }

    /// Arm a deferred digital output on the next enqueued segment.
    pub fn conti_digital_output(&mut self, id: CoordId, io: DeferredIo) -> Result<()> {
        self.coords.get(id)?;
        self.coord_rt[id as usize].queue.arm_deferred_io(io)
    }

    /// Drop pending nodes; the executing segment continues.
    pub fn conti_write_clear(&mut self, id: CoordId) -> Result<()> {
        self.coords.get(id)?;
        self.coord_rt[id as usize].queue.write_clear();
        Ok(())
    }

    /// Free queue slots.
    pub fn conti_free_slots(&self, id: CoordId) -> Result<usize> {
        self.coords.get(id)?;
        Ok(self.coord_rt[id as usize].queue.free_slots())
    }

    /// Queued node count.
    pub fn conti_queued(&self, id: CoordId) -> Result<usize> {
        self.coords.get(id)?;
        Ok(self.coord_rt[id as usize].queue.queued())
    }

    /// Index of the executing node.
    pub fn conti_node_num(&self, id: CoordId) -> Result<Option<u32>> {
        self.coords.get(id)?;
        Ok(self.coord_rt[id as usize].queue.node_num())
    }

    /// Total nodes enqueued since the window opened.
    pub fn conti_total_nodes(&self, id: CoordId) -> Result<u32> {
        self.coords.get(id)?;
        Ok(self.coord_rt[id as usize].queue.total_nodes())
    }

    /// Stack a direct-override segment (depth 1–8).
    pub fn conti_override(
        &mut self,
        id: CoordId,
        spec: &SegmentSpec,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> Result<()> {
        let coord = self.coords.get(id)?.clone();
        let start = self.coord_positions(&coord);
        let relative = coord.position_mode == PositionMode::Relative;
        let path = resolve(spec, start, coord.len(), relative)?;
        let node = ContiNode {
            path,
            velocity,
            accel,
            decel,
            start_vel: 0.0,
            end_vel: 0.0,
            io: None,
            index: u32::MAX,
        };
        self.coord_rt[id as usize].queue.push_override(node)
    }

    /// Stop a coordinate's motion (decel-respecting) and drop its
    /// pending nodes.
    pub fn coord_stop(&mut self, id: CoordId, decel: f64) -> Result<()> {
        let coord = self.coords.get(id)?.clone();
        let rt = &mut self.coord_rt[id as usize];
        rt.queue.write_clear();
        let active = rt.active.take();
        rt.running = false;

        // Ramp each member down from its share of the tangential
        // velocity instead of freezing mid-segment.
        let per_axis_vel = active.map(|seg| {
            let v = seg.curve.velocity_at(seg.t);
            let s = seg.curve.position_at(seg.t);
            let tangent = seg.path.tangent_at(s);
            (v, tangent)
        });
        for (k, &a) in coord.axes().iter().enumerate() {
            let axis = &mut self.axes[a as usize];
            axis.exec.leave_coordinated();
            if let Some((v, tangent)) = &per_axis_vel {
                let axis_vel = v * tangent[k];
                if axis_vel.abs() > 1e-12 {
                    let curve = generate_stop(axis_vel.abs(), decel);
                    let origin = axis.tracker.cmd_pos();
                    axis.exec.start_curve(
                        curve,
                        axis_vel.signum(),
                        origin,
                        None,
                        AxisState::StoppingDecel,
                        &mut axis.tracker,
                    );
                }
            }
        }
        Ok(())
    }

    // --- PVT / sync ---------------------------------------------------

    /// Replace a sync group's axis map.
    pub fn sync_set_axis_map(&mut self, sync_id: u8, axes: &[AxisId]) -> Result<()> {
        let group = self
            .syncs
            .get_mut(sync_id as usize)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?;
        group.set_axis_map(axes)
    }

    /// Open a sync reservation window.
    pub fn sync_begin(&mut self, sync_id: u8) -> Result<()> {
        self.syncs
            .get_mut(sync_id as usize)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?
            .begin();
        Ok(())
    }

    /// Close a sync reservation window.
    pub fn sync_end(&mut self, sync_id: u8) -> Result<()> {
        self.syncs
            .get_mut(sync_id as usize)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?
            .end();
        Ok(())
    }

    /// Fire every reservation of a sync group on the same cycle.
    pub fn sync_start(&mut self, sync_id: u8) -> Result<()> {
        let reservations = self
            .syncs
            .get_mut(sync_id as usize)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?
            .take_reservations();
        if reservations.is_empty() {
            return Err(Error::QueueEmpty);
        }
        for r in reservations {
            let rt = &mut self.axes[r.axis as usize];
            rt.exec.enter_coordinated(&mut rt.tracker);
            rt.pvt = Some(PvtPlay { curve: r.curve, t: 0.0 });
        }
        Ok(())
    }

    /// Run a PVT table on an axis. Inside an open sync window mapping
    /// the axis, the start is reserved for `sync_start`; otherwise
    /// playback begins immediately.
    pub fn move_pvt(&mut self, axis: AxisId, points: &[PvtPoint]) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.validate_motion_entry(id, None)?;
        let start_pos = self.axes[id as usize].tracker.cmd_pos().0;
        let curve = PvtCurve::compile(start_pos, 0.0, points, self.cycle)?;

        if let Some(gi) = self
            .syncs
            .iter()
            .position(|g| g.is_open() && g.maps(id))
        {
            return self.syncs[gi].reserve(id, curve);
        }
        let rt = &mut self.axes[id as usize];
        rt.exec.enter_coordinated(&mut rt.tracker);
        rt.pvt = Some(PvtPlay { curve, t: 0.0 });
        Ok(())
    }

    // --- drive link ---------------------------------------------------

    /// Send a drive command and collect the reply per the return mode.
    pub fn servo_command(
        &mut self,
        axis: AxisId,
        command: DriveCommand,
        mode: ReturnMode,
    ) -> Result<DriveReply> {
        let id = self.resolve_axis(axis)?;
        self.wire.send_drive(id, &command)?;
        let budget = match mode {
            ReturnMode::Blocking => BLOCKING_CAP,
            ReturnMode::NonBlocking { budget_cycles } => budget_cycles,
        };
        for _ in 0..=budget {
            if let Some(reply) = self.wire.poll_drive(id) {
                return Ok(reply);
            }
            self.tick();
        }
        Err(Error::Timeout)
    }

    // --- blocking helpers ---------------------------------------------

    /// Advance `n` control cycles.
    pub fn run_cycles(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Tick until the axis leaves every active state. Surfaces the
    /// latched error if the motion terminated abnormally.
    pub fn wait_axis_idle(&mut self, axis: AxisId, max_cycles: u32) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        for _ in 0..max_cycles {
            let state = self.axes[id as usize].exec.state();
            if !state.is_active() {
                return match self.axes[id as usize].tracker.last_error() {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            self.tick();
        }
        Err(Error::Timeout)
    }

    /// Tick until the drive reports in-position after a move (servo
    /// settling). The line's active level comes from the parameters.
    pub fn wait_inposition(&mut self, axis: AxisId, max_cycles: u32) -> Result<()> {
        let id = self.resolve_axis(axis)?;
        self.wait_axis_idle(id, max_cycles)?;
        for _ in 0..max_cycles {
            if self.axes[id as usize].bank.read_logical(Signal::InPosition) {
                return Ok(());
            }
            self.tick();
        }
        Err(Error::Timeout)
    }

    /// Tick until a coordinate finishes its queue.
    pub fn wait_coord_idle(&mut self, id: CoordId, max_cycles: u32) -> Result<()> {
        self.coords.get(id)?;
        for _ in 0..max_cycles {
            if !self.coord_rt[id as usize].running {
                return Ok(());
            }
            self.tick();
        }
        Err(Error::Timeout)
    }

    // --- the control cycle --------------------------------------------

    /// Advance every engine by one control cycle.
    pub fn tick(&mut self) {
        let dt = self.cycle.secs();
        let dt_us = self.cycle.micros();
        let axis_count = self.axes.len();

        // 1. Sample inputs and encoders; snapshot command positions.
        for i in 0..axis_count {
            let scan = self.wire.scan_inputs(i as AxisId);
            let enc = self.wire.read_encoder(i as AxisId);
            let rt = &mut self.axes[i];
            rt.bank.sample(scan, dt_us);
            rt.tracker.update_encoder(enc);
            rt.prev_cmd = rt.tracker.cmd_pos().0;
        }

        // 2. Homing engines.
        self.tick_homing(dt);

        // 3. Per-axis executors.
        let mut deltas = [0i64; MAX_AXES];
        for i in 0..axis_count {
            let params = match self.params.axis(i as AxisId) {
                Ok(p) => p.clone(),
                Err(_) => continue,
            };
            let limits = ShapeLimits::from_params(&params);
            let rt = &mut self.axes[i];
            let homing_active = rt.homing.is_active();
            let (delta, outcome) = rt.exec.tick(dt, &params, &rt.bank, &mut rt.tracker, &limits);
            deltas[i] += delta;
            if !homing_active {
                let flags = match outcome {
                    TickOutcome::MoveDone => EV_MOVE_DONE,
                    TickOutcome::StopDone => EV_STOP_DONE,
                    TickOutcome::LimitStop(_) => EV_LIMIT,
                    TickOutcome::AlarmStop => EV_ALARM,
                    TickOutcome::None => 0,
                };
                rt.events.push(i as AxisId, flags);
            }
        }

        // 4. Coordinate segment playback.
        self.tick_coords(dt, &mut deltas);

        // 5. Electronic gear links.
        self.tick_gears(dt, &mut deltas);

        // 6. Electronic cams.
        self.tick_cams(dt, &mut deltas);

        // 7. Gantry mirroring and range monitoring.
        self.tick_gantries(dt, &mut deltas);

        // 8. PVT playback.
        self.tick_pvt(dt, &mut deltas);

        // 9. Triggers and capture on the final cycle positions.
        for i in 0..axis_count {
            let rt = &mut self.axes[i];
            let cmd = rt.tracker.cmd_pos();
            let act = rt.tracker.actual_pos();
            let (fired, notify) = rt.triggers.tick(cmd, act, dt_us);
            if fired != 0 && notify {
                rt.events.push(i as AxisId, EV_TRIGGER);
            }
            if rt.capture.tick(&rt.bank, act) {
                rt.events.push(i as AxisId, EV_CAPTURE);
                if rt.capture_stop {
                    rt.capture_stop = false;
                    rt.exec.stop_configured(&mut rt.tracker);
                }
            }
        }

        // 10. Flush pulses and outputs to the wire.
        for i in 0..axis_count {
            if deltas[i] != 0 {
                self.wire.write_pulses(i as AxisId, deltas[i]);
            }
            let outputs = self.axes[i].bank.outputs();
            self.wire.write_outputs(i as AxisId, outputs);
        }
    }

    fn tick_homing(&mut self, dt: f64) {
        let axis_count = self.axes.len();
        for i in 0..axis_count {
            if !self.axes[i].homing.is_active() {
                continue;
            }
            let params = match self.params.axis(i as AxisId) {
                Ok(p) => p.clone(),
                Err(_) => continue,
            };
            let limits = ShapeLimits::from_params(&params);
            let rt = &mut self.axes[i];
            let result = rt.homing.tick(
                dt,
                &params,
                &mut rt.exec,
                &mut rt.tracker,
                &rt.bank,
                &limits,
            );
            if !rt.homing.is_active() && rt.home_was_active {
                rt.home_was_active = false;
                match result {
                    HomeResult::Success => rt.events.push(i as AxisId, EV_HOME_DONE),
                    HomeResult::Searching => {}
                    _ => rt.events.push(i as AxisId, EV_HOME_FAILED),
                }
                self.advance_gantry_home(i as AxisId, result);
            }
        }
    }

    /// Step the gantry homing sequence when one side finishes.
    fn advance_gantry_home(&mut self, finished_axis: AxisId, result: HomeResult) {
        let Some(run) = self.gantry_home else {
            return;
        };
        let Some(pair) = self.gantries.get(run.pair) else {
            self.gantry_home = None;
            return;
        };
        if result != HomeResult::Success {
            self.gantry_home = None;
            return;
        }
        match run.phase {
            GantryHomePhase::Master if pair.master == finished_axis => match pair.home_mode {
                GantryHomeMode::MasterOnly => {
                    self.gantry_home = None;
                }
                GantryHomeMode::MeasureOnly => {
                    let master_act = self.axes[pair.master as usize].tracker.actual_pos();
                    let slave_act = self.axes[pair.slave as usize].tracker.actual_pos();
                    let measured = slave_act.0 - master_act.0;
                    if let Some(p) = self.gantries.get_mut(run.pair) {
                        p.offset = Units(measured);
                    }
                    self.gantry_home = None;
                }
                GantryHomeMode::MasterAndSlave => {
                    let slave = pair.slave;
                    self.gantry_home = Some(GantryHomeRun {
                        pair: run.pair,
                        phase: GantryHomePhase::Slave,
                    });
                    let params = match self.params.axis(slave) {
                        Ok(p) => p.clone(),
                        Err(_) => return,
                    };
                    let limits = ShapeLimits::from_params(&params);
                    let rt = &mut self.axes[slave as usize];
                    rt.exec.leave_coordinated();
                    rt.home_was_active = true;
                    let _ = rt
                        .homing
                        .start(&params, &mut rt.exec, &mut rt.tracker, &rt.bank, &limits);
                    rt.homing.set_slave_pass();
                }
            },
            GantryHomePhase::Slave if pair.slave == finished_axis => {
                let slave = pair.slave;
                if pair.is_enabled() {
                    let rt = &mut self.axes[slave as usize];
                    rt.exec.enter_coordinated(&mut rt.tracker);
                }
                self.gantry_home = None;
            }
            _ => {}
        }
    }

    fn tick_coords(&mut self, dt: f64, deltas: &mut [i64; MAX_AXES]) {
        for cid in 0..MAX_COORDS {
            if !self.coord_rt[cid].running {
                continue;
            }
            let Ok(coord) = self.coords.get(cid as CoordId) else {
                continue;
            };
            let coord = coord.clone();
            let Some(mut seg) = self.coord_rt[cid].active.take() else {
                self.coord_rt[cid].running = false;
                continue;
            };

            seg.t += dt;
            let duration = seg.curve.duration();
            let s = seg.curve.position_at(seg.t);
            let total = seg.path.length();

            // Deferred output: fire at the lead before segment end.
            if let (Some(io), false) = (seg.io, seg.io_done) {
                let due = if io.time_based {
                    duration - seg.t <= io.lead
                } else {
                    total - s <= io.lead
                };
                if due {
                    let first = coord.axes()[0];
                    self.axes[first as usize]
                        .bank
                        .write_output(OutputSignal::GeneralOut(io.channel), io.value);
                    seg.io_done = true;
                }
            }

            let complete = seg.curve.is_complete(seg.t);
            let positions = if complete {
                seg.path.end
            } else {
                seg.path.point_at(s)
            };
            for (k, &a) in coord.axes().iter().enumerate() {
                let params = match self.params.axis(a) {
                    Ok(p) => p.clone(),
                    Err(_) => continue,
                };
                let rt = &mut self.axes[a as usize];
                deltas[a as usize] += rt.exec.track_to(positions[k], dt, &params, &mut rt.tracker);
            }

            if complete {
                let first = coord.axes()[0];
                self.axes[first as usize].events.push(first, EV_NODE_DONE);
                match self.coord_rt[cid].queue.pop_next() {
                    Some(node) => match self.build_segment(&coord, node) {
                        Ok(next) => self.coord_rt[cid].active = Some(next),
                        Err(_) => {
                            self.release_coord_axes(&coord);
                            self.coord_rt[cid].running = false;
                        }
                    },
                    None => {
                        self.release_coord_axes(&coord);
                        self.coord_rt[cid].running = false;
                    }
                }
            } else {
                self.coord_rt[cid].active = Some(seg);
            }
        }
    }

    fn tick_gears(&mut self, dt: f64, deltas: &mut [i64; MAX_AXES]) {
        for gi in 0..self.gears.len() {
            let link = self.gears[gi];
            if !link.is_active() {
                continue;
            }
            let m = link.master as usize;
            let s = link.slave as usize;
            let master_delta = self.axes[m].tracker.cmd_pos().0 - self.axes[m].prev_cmd;
            if master_delta == 0.0 {
                continue;
            }
            let params = match self.params.axis(link.slave) {
                Ok(p) => p.clone(),
                Err(_) => continue,
            };
            let rt = &mut self.axes[s];
            let target = rt.tracker.cmd_pos().0 + link.slave_delta(master_delta);
            deltas[s] += rt.exec.track_to(target, dt, &params, &mut rt.tracker);
        }
    }

    fn tick_cams(&mut self, dt: f64, deltas: &mut [i64; MAX_AXES]) {
        for ci in 0..self.cams.len() {
            if !self.cams[ci].is_enabled() {
                continue;
            }
            let (master, slave, source) =
                (self.cams[ci].master, self.cams[ci].slave, self.cams[ci].source);
            let m_pos = match source {
                CamSource::Command => self.axes[master as usize].tracker.cmd_pos(),
                CamSource::Actual => self.axes[master as usize].tracker.actual_pos(),
            };
            let target = self.cams[ci].eval(m_pos);
            let params = match self.params.axis(slave) {
                Ok(p) => p.clone(),
                Err(_) => continue,
            };
            let rt = &mut self.axes[slave as usize];
            deltas[slave as usize] += rt.exec.track_to(target.0, dt, &params, &mut rt.tracker);
        }
    }

    fn tick_gantries(&mut self, dt: f64, deltas: &mut [i64; MAX_AXES]) {
        // Skip mirroring while a gantry homing pass owns the slave.
        let homing_pair = self.gantry_home.map(|r| r.pair);
        for gi in 0..self.gantries.len() {
            if Some(gi) == homing_pair {
                continue;
            }
            if !self.gantries[gi].is_enabled() {
                continue;
            }
            let (m, s) = (self.gantries[gi].master, self.gantries[gi].slave);
            let master_act = self.axes[m as usize].tracker.actual_pos();
            let slave_act = self.axes[s as usize].tracker.actual_pos();
            let action = self.gantries[gi].monitor(master_act, slave_act);

            let master_delta = self.axes[m as usize].tracker.cmd_pos().0 - self.axes[m as usize].prev_cmd;
            let diff = (slave_act.0 - master_act.0) - self.gantries[gi].offset.0;
            let (_, slave_frac) = self.gantries[gi].correction_split();

            if let Ok(params) = self.params.axis(s) {
                let params = params.clone();
                let rt = &mut self.axes[s as usize];
                let correction = -diff * slave_frac * GANTRY_ALIGN_RATE * dt;
                let target = rt.tracker.cmd_pos().0 + master_delta + correction;
                deltas[s as usize] += rt.exec.track_to(target, dt, &params, &mut rt.tracker);
            }

            match action {
                GantryAction::None => {}
                GantryAction::StopSlowdown => {
                    for id in [m, s] {
                        let rt = &mut self.axes[id as usize];
                        if rt.homing.is_active() {
                            rt.homing.gantry_break(&mut rt.exec, &mut rt.tracker);
                        } else {
                            rt.exec.stop_configured(&mut rt.tracker);
                        }
                    }
                }
                GantryAction::StopEmergency => {
                    for id in [m, s] {
                        let rt = &mut self.axes[id as usize];
                        if rt.homing.is_active() {
                            rt.homing.gantry_break(&mut rt.exec, &mut rt.tracker);
                        } else {
                            rt.exec.stop_emergency(&mut rt.tracker);
                        }
                    }
                }
            }
        }
    }

    fn tick_pvt(&mut self, dt: f64, deltas: &mut [i64; MAX_AXES]) {
        let axis_count = self.axes.len();
        for i in 0..axis_count {
            if self.axes[i].pvt.is_none() {
                continue;
            }
            let params = match self.params.axis(i as AxisId) {
                Ok(p) => p.clone(),
                Err(_) => continue,
            };
            let rt = &mut self.axes[i];
            let Some(play) = rt.pvt.as_mut() else {
                continue;
            };
            play.t += dt;
            let target = play.curve.position_at(play.t);
            let done = play.curve.is_complete(play.t);
            deltas[i] += rt.exec.track_to(target, dt, &params, &mut rt.tracker);
            if done {
                rt.pvt = None;
                rt.exec.leave_coordinated();
                rt.events.push(i as AxisId, EV_MOVE_DONE);
            }
        }
    }

    // --- coordinate helpers -------------------------------------------

    fn coord_positions(&self, coord: &Coordinate) -> crate::coord::AxPos {
        let mut pos = [0.0; crate::coord::MAX_COORD_AXES];
        for (k, &a) in coord.axes().iter().enumerate() {
            pos[k] = self.axes[a as usize].tracker.cmd_pos().0;
        }
        pos
    }

    /// Verify every member axis can be taken for coordinated motion.
    fn check_coord_axes(&self, coord: &Coordinate) -> Result<()> {
        for &a in coord.axes() {
            let rt = &self.axes[a as usize];
            if !rt.exec.accepts_commands() {
                return Err(Error::Busy);
            }
            if !rt.bank.outputs().servo_on {
                return Err(Error::NotServoOn);
            }
        }
        Ok(())
    }

    /// Put every member axis under group control. Call only after
    /// [`Controller::check_coord_axes`] passed on this cycle.
    fn claim_coord_axes(&mut self, coord: &Coordinate) {
        for &a in coord.axes() {
            let rt = &mut self.axes[a as usize];
            rt.exec.enter_coordinated(&mut rt.tracker);
        }
    }

    fn release_coord_axes(&mut self, coord: &Coordinate) {
        for &a in coord.axes() {
            self.axes[a as usize].exec.leave_coordinated();
        }
    }

    /// Build the tangential velocity curve of one segment. Plateau
    /// velocity respects the slowest member axis; arc segments always
    /// use automatic deceleration.
    fn build_segment(&self, coord: &Coordinate, node: ContiNode) -> Result<ActiveSegment> {
        let mut max_vel = f64::MAX;
        for &a in coord.axes() {
            let p = self.params.axis(a)?;
            max_vel = max_vel.min(p.max_vel.0);
        }
        let limits = ShapeLimits {
            mode: crate::param::ProfileMode::Trapezoid,
            min_vel: 0.0,
            max_vel,
            jerk_accel_ratio: 0.0,
            jerk_decel_ratio: 0.0,
            accel_unit: crate::param::AccelUnit::Rate,
            priority: crate::profile::ProfilePriority::Velocity,
            patched_triangle: true,
        };
        let spec = MoveSpec {
            distance: node.path.length(),
            velocity: node.velocity,
            accel: node.accel,
            decel: node.decel,
            start_vel: node.start_vel,
            end_vel: node.end_vel,
        };
        let curve = generate(&spec, &limits)?;
        Ok(ActiveSegment {
            path: node.path,
            curve,
            t: 0.0,
            io: node.io,
            io_done: false,
        })
    }
}
