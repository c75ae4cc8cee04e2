//! Position comparators with pulsed outputs.
//!
//! Five comparators per axis: 0 watches the command stream, 1 the
//! actual stream, 2–4 choose their source. Each fires a bounded-width
//! output pulse when its mode condition is met.

use heapless::Vec;

use crate::error::{Error, ParamIssue, Result};
use crate::units::Units;

/// Comparators per axis.
pub const COMPARATOR_COUNT: usize = 5;

/// Positions an array-mode comparator can hold.
pub const MAX_ARRAY_POSITIONS: usize = 16;

/// Pulse width window in microseconds.
const PULSE_MIN_US: u32 = 1;
const PULSE_MAX_US: u32 = 50_000;

/// Which position stream a comparator watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerScope {
    /// Command position.
    #[default]
    Command,
    /// Actual (encoder) position.
    Actual,
}

/// Firing condition of one comparator.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerMode {
    /// Fire when the position crosses the stored target.
    Absolute {
        /// Crossing target.
        position: f64,
    },
    /// Fire every `interval` of travel from the enable point.
    Periodic {
        /// Firing pitch.
        interval: f64,
    },
    /// Fire at `interval` pitch, only while inside `[start, end]`.
    Block {
        /// Window start.
        start: f64,
        /// Window end.
        end: f64,
        /// Firing pitch inside the window.
        interval: f64,
    },
    /// Fire on each crossing of an ordered position list.
    Array {
        /// Ordered crossing positions.
        positions: Vec<f64, MAX_ARRAY_POSITIONS>,
    },
    /// Single unconditional pulse on enable.
    OneShot,
    /// Single pulse after a delay.
    TimerOneShot {
        /// Delay in milliseconds.
        delay_ms: u32,
    },
}

/// Static configuration of one comparator.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    /// Firing condition.
    pub mode: TriggerMode,
    /// Watched stream (fixed for comparators 0 and 1).
    pub scope: TriggerScope,
    /// Output pulse width, 1 µs – 50 ms.
    pub pulse_width_us: u32,
    /// Output polarity: `true` pulses high.
    pub active_high: bool,
    /// Only fire while traveling in this direction.
    pub direction: Option<i8>,
    /// Raise an axis event on each firing.
    pub notify: bool,
}

impl TriggerConfig {
    /// Absolute-crossing config with defaults.
    pub fn absolute(position: f64) -> Self {
        Self {
            mode: TriggerMode::Absolute { position },
            scope: TriggerScope::Command,
            pulse_width_us: 100,
            active_high: true,
            direction: None,
            notify: false,
        }
    }
}

#[derive(Debug, Default)]
struct Runtime {
    enabled: bool,
    primed: bool,
    last_pos: f64,
    /// Next firing mark for periodic/block modes.
    next_mark: f64,
    array_next: usize,
    timer_us: u32,
    pulse_remaining_us: u32,
    fire_count: u32,
}

impl Runtime {
    fn fire(&mut self, width_us: u32) -> bool {
        self.pulse_remaining_us = width_us;
        self.fire_count += 1;
        true
    }
}

/// One configured comparator plus its runtime state.
#[derive(Debug, Default)]
pub struct Comparator {
    config: Option<TriggerConfig>,
    rt: Runtime,
}

impl Comparator {
    /// Install a configuration. The comparator starts disabled.
    pub fn configure(&mut self, config: TriggerConfig) -> Result<()> {
        if !(PULSE_MIN_US..=PULSE_MAX_US).contains(&config.pulse_width_us) {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        if let TriggerMode::Array { positions } = &config.mode {
            if positions.is_empty() {
                return Err(Error::InvalidParameter(ParamIssue::TableOrder));
            }
        }
        if let TriggerMode::Periodic { interval } | TriggerMode::Block { interval, .. } =
            &config.mode
        {
            if *interval <= 0.0 {
                return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
            }
        }
        self.config = Some(config);
        self.rt = Runtime::default();
        Ok(())
    }

    /// Arm or disarm. Arming re-primes at the current position.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.rt.enabled = enabled;
        if enabled {
            self.rt.primed = false;
            self.rt.array_next = 0;
            self.rt.fire_count = 0;
        }
    }

    /// Whether the comparator is armed.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.rt.enabled
    }

    /// Total firings since arming.
    #[inline]
    pub fn fire_count(&self) -> u32 {
        self.rt.fire_count
    }

    /// Current electrical output level.
    pub fn output_active(&self) -> bool {
        let Some(cfg) = &self.config else {
            return false;
        };
        let pulsing = self.rt.pulse_remaining_us > 0;
        if cfg.active_high {
            pulsing
        } else {
            !pulsing
        }
    }

    /// Whether this comparator raises events on firing.
    pub fn notifies(&self) -> bool {
        self.config.as_ref().map(|c| c.notify).unwrap_or(false)
    }

    /// Advance one cycle. Returns `true` when the comparator fired.
    pub fn tick(&mut self, cmd: Units, act: Units, dt_us: u32) -> bool {
        self.rt.pulse_remaining_us = self.rt.pulse_remaining_us.saturating_sub(dt_us);
        let Some(cfg) = &self.config else {
            return false;
        };
        if !self.rt.enabled {
            return false;
        }
        let pos = match cfg.scope {
            TriggerScope::Command => cmd.0,
            TriggerScope::Actual => act.0,
        };
        if !self.rt.primed {
            self.rt.primed = true;
            self.rt.last_pos = pos;
            self.rt.next_mark = pos;
            self.rt.timer_us = 0;
            // One-shot fires on the first armed cycle.
            if matches!(cfg.mode, TriggerMode::OneShot) {
                return self.rt.fire(cfg.pulse_width_us);
            }
        }
        let prev = self.rt.last_pos;
        self.rt.last_pos = pos;
        let travel = pos - prev;
        if let Some(dir) = cfg.direction {
            if (dir > 0 && travel < 0.0) || (dir < 0 && travel > 0.0) {
                return false;
            }
        }

        let width = cfg.pulse_width_us;
        match &cfg.mode {
            TriggerMode::Absolute { position } => {
                if crossed(prev, pos, *position) {
                    return self.rt.fire(width);
                }
            }
            TriggerMode::Periodic { interval } => {
                if (pos - self.rt.next_mark).abs() >= *interval {
                    let sign = if pos >= self.rt.next_mark { 1.0 } else { -1.0 };
                    self.rt.next_mark += sign * *interval;
                    return self.rt.fire(width);
                }
            }
            TriggerMode::Block {
                start,
                end,
                interval,
            } => {
                let inside = pos >= *start && pos <= *end;
                if !inside {
                    self.rt.next_mark = pos.clamp(*start, *end);
                    return false;
                }
                if (pos - self.rt.next_mark).abs() >= *interval {
                    let sign = if pos >= self.rt.next_mark { 1.0 } else { -1.0 };
                    self.rt.next_mark += sign * *interval;
                    return self.rt.fire(width);
                }
            }
            TriggerMode::Array { positions } => {
                if let Some(&target) = positions.get(self.rt.array_next) {
                    if crossed(prev, pos, target) {
                        self.rt.array_next += 1;
                        return self.rt.fire(width);
                    }
                }
            }
            TriggerMode::OneShot => {}
            TriggerMode::TimerOneShot { delay_ms } => {
                if self.rt.fire_count == 0 {
                    self.rt.timer_us = self.rt.timer_us.saturating_add(dt_us);
                    if self.rt.timer_us >= delay_ms.saturating_mul(1000) {
                        return self.rt.fire(width);
                    }
                }
            }
        }
        false
    }
}

#[inline]
fn crossed(prev: f64, cur: f64, target: f64) -> bool {
    (prev < target && cur >= target) || (prev > target && cur <= target)
}

/// The five comparators of one axis.
#[derive(Debug, Default)]
pub struct TriggerBank {
    comparators: [Comparator; COMPARATOR_COUNT],
}

impl TriggerBank {
    /// Configure a comparator. Indices 0 and 1 have fixed scopes.
    pub fn configure(&mut self, index: usize, mut config: TriggerConfig) -> Result<()> {
        let comp = self
            .comparators
            .get_mut(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?;
        match index {
            0 => config.scope = TriggerScope::Command,
            1 => config.scope = TriggerScope::Actual,
            _ => {}
        }
        comp.configure(config)
    }

    /// Arm or disarm one comparator.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.comparators
            .get_mut(index)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?
            .set_enabled(enabled);
        Ok(())
    }

    /// Borrow a comparator.
    pub fn comparator(&self, index: usize) -> Option<&Comparator> {
        self.comparators.get(index)
    }

    /// Advance all comparators one cycle. Returns a fired bitmask and
    /// whether any firing wants an event raised.
    pub fn tick(&mut self, cmd: Units, act: Units, dt_us: u32) -> (u8, bool) {
        let mut fired = 0u8;
        let mut notify = false;
        for (i, comp) in self.comparators.iter_mut().enumerate() {
            if comp.tick(cmd, act, dt_us) {
                fired |= 1 << i;
                notify |= comp.notifies();
            }
        }
        (fired, notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(comp: &mut Comparator, positions: &[f64]) -> u32 {
        let mut fired = 0;
        for &p in positions {
            if comp.tick(Units(p), Units(p), 1000) {
                fired += 1;
            }
        }
        fired
    }

    #[test]
    fn absolute_fires_on_crossing() {
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig::absolute(5.0)).unwrap();
        comp.set_enabled(true);
        assert!(!comp.tick(Units(0.0), Units(0.0), 1000));
        assert!(!comp.tick(Units(4.9), Units(4.9), 1000));
        assert!(comp.tick(Units(5.1), Units(5.1), 1000));
        assert!(comp.output_active());
        // No refire past the target.
        assert!(!comp.tick(Units(6.0), Units(6.0), 1000));
    }

    #[test]
    fn periodic_fires_every_interval() {
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig {
            mode: TriggerMode::Periodic { interval: 1.0 },
            ..TriggerConfig::absolute(0.0)
        })
        .unwrap();
        comp.set_enabled(true);
        let fired = step(
            &mut comp,
            &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0],
        );
        assert_eq!(fired, 4);
    }

    #[test]
    fn block_fires_inside_window_only() {
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig {
            mode: TriggerMode::Block {
                start: 2.0,
                end: 4.0,
                interval: 1.0,
            },
            ..TriggerConfig::absolute(0.0)
        })
        .unwrap();
        comp.set_enabled(true);
        let fired = step(
            &mut comp,
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        );
        assert_eq!(fired, 2); // at 3.0 and 4.0
    }

    #[test]
    fn array_fires_in_order() {
        let mut positions = Vec::new();
        positions.extend_from_slice(&[1.0, 2.0, 3.0]).unwrap();
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig {
            mode: TriggerMode::Array { positions },
            ..TriggerConfig::absolute(0.0)
        })
        .unwrap();
        comp.set_enabled(true);
        let fired = step(&mut comp, &[0.0, 0.5, 1.5, 2.5, 3.5]);
        assert_eq!(fired, 3);
        assert_eq!(comp.fire_count(), 3);
    }

    #[test]
    fn timer_one_shot() {
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig {
            mode: TriggerMode::TimerOneShot { delay_ms: 3 },
            ..TriggerConfig::absolute(0.0)
        })
        .unwrap();
        comp.set_enabled(true);
        let fired = step(&mut comp, &[0.0; 6]);
        assert_eq!(fired, 1);
    }

    #[test]
    fn direction_filter() {
        let mut comp = Comparator::default();
        comp.configure(TriggerConfig {
            direction: Some(1),
            ..TriggerConfig::absolute(5.0)
        })
        .unwrap();
        comp.set_enabled(true);
        // Crossing downward is filtered out.
        assert_eq!(step(&mut comp, &[10.0, 6.0, 4.0]), 0);
        // Crossing upward fires.
        assert_eq!(step(&mut comp, &[4.5, 5.5]), 1);
    }

    #[test]
    fn pulse_width_validated() {
        let mut comp = Comparator::default();
        let mut cfg = TriggerConfig::absolute(0.0);
        cfg.pulse_width_us = 100_000;
        assert!(comp.configure(cfg).is_err());
    }
}
