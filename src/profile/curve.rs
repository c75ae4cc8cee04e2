//! Piecewise constant-jerk velocity curves.
//!
//! A curve is a short list of pieces, each holding a duration, initial
//! velocity, initial acceleration and a constant jerk. Sampling by time
//! gives exact closed-form velocity and position, so the integral of
//! the curve equals the planned distance to floating-point precision.

use heapless::Vec;

/// Maximum pieces per curve: a full asymmetric S-profile needs seven,
/// stitched stop reshapes can add a couple more.
pub const MAX_PIECES: usize = 12;

/// Current phase of motion execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Velocity increasing toward the plateau.
    Accelerating,
    /// At constant velocity.
    Cruising,
    /// Velocity decreasing toward the end velocity.
    Decelerating,
    /// Curve exhausted.
    Complete,
}

/// One constant-jerk piece: `v(t) = v0 + a0·t + j·t²/2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    /// Piece duration in seconds.
    pub dur: f64,
    /// Velocity at piece start.
    pub v0: f64,
    /// Acceleration at piece start.
    pub a0: f64,
    /// Constant jerk over the piece.
    pub jerk: f64,
}

impl Piece {
    #[inline]
    fn velocity_at(&self, t: f64) -> f64 {
        self.v0 + self.a0 * t + 0.5 * self.jerk * t * t
    }

    #[inline]
    fn distance_at(&self, t: f64) -> f64 {
        self.v0 * t + 0.5 * self.a0 * t * t + self.jerk * t * t * t / 6.0
    }

    #[inline]
    fn distance(&self) -> f64 {
        self.distance_at(self.dur)
    }
}

/// A sampled velocity curve over unsigned distance.
///
/// Direction is applied by the executor; curves always describe
/// non-negative travel.
#[derive(Debug, Clone, Default)]
pub struct VelCurve {
    pieces: Vec<Piece, MAX_PIECES>,
    /// When set, the curve never completes: after the last piece the
    /// final velocity holds forever (jog / search moves).
    unbounded: bool,
}

impl VelCurve {
    /// An empty (zero-length) curve.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a piece. Zero-duration pieces are dropped.
    pub(crate) fn push(&mut self, piece: Piece) {
        if piece.dur > 0.0 {
            // Capacity is sized for the largest generator output.
            let _ = self.pieces.push(piece);
        }
    }

    /// Mark the curve as never-completing at its final velocity.
    pub(crate) fn set_unbounded(&mut self) {
        self.unbounded = true;
    }

    /// Whether this curve holds its final velocity forever.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    /// Whether the curve has no travel at all.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.pieces.is_empty() && !self.unbounded
    }

    /// Total duration in seconds (bounded curves).
    pub fn duration(&self) -> f64 {
        self.pieces.iter().map(|p| p.dur).sum()
    }

    /// Total travel of the bounded part.
    pub fn distance(&self) -> f64 {
        self.pieces.iter().map(|p| p.distance()).sum()
    }

    /// Velocity at the end of the bounded part.
    pub fn final_velocity(&self) -> f64 {
        self.pieces
            .last()
            .map(|p| p.velocity_at(p.dur))
            .unwrap_or(0.0)
    }

    /// Sample velocity at time `t`.
    pub fn velocity_at(&self, t: f64) -> f64 {
        let mut rem = t;
        for piece in &self.pieces {
            if rem < piece.dur {
                return piece.velocity_at(rem);
            }
            rem -= piece.dur;
        }
        if self.unbounded {
            self.final_velocity()
        } else {
            0.0
        }
    }

    /// Sample traveled distance at time `t`.
    pub fn position_at(&self, t: f64) -> f64 {
        let mut rem = t;
        let mut dist = 0.0;
        for piece in &self.pieces {
            if rem < piece.dur {
                return dist + piece.distance_at(rem);
            }
            rem -= piece.dur;
            dist += piece.distance();
        }
        if self.unbounded {
            dist + self.final_velocity() * rem
        } else {
            dist
        }
    }

    /// Whether the curve is exhausted at time `t`.
    #[inline]
    pub fn is_complete(&self, t: f64) -> bool {
        !self.unbounded && t >= self.duration()
    }

    /// Phase at time `t`, judged by the local acceleration sign.
    pub fn phase_at(&self, t: f64) -> MotionPhase {
        if self.is_complete(t) {
            return MotionPhase::Complete;
        }
        let mut rem = t;
        for piece in &self.pieces {
            if rem < piece.dur {
                let accel = piece.a0 + piece.jerk * rem;
                return if accel > 1e-9 {
                    MotionPhase::Accelerating
                } else if accel < -1e-9 {
                    MotionPhase::Decelerating
                } else {
                    MotionPhase::Cruising
                };
            }
            rem -= piece.dur;
        }
        MotionPhase::Cruising
    }
}
