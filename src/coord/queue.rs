//! Continuous-motion queue.
//!
//! Between `begin_node` and `end_node` markers, coordinated motion
//! calls enqueue instead of executing. `start` drains the queue in
//! enqueue order with the selected blending mode; direct-override
//! segments stack on top and preempt the remaining queue.

use heapless::{Deque, Vec};

use crate::error::{Error, Result};

use super::path::PathSegment;
use super::planner::{fillet_between, junction_alignment};

/// Nodes one queue can hold.
pub const QUEUE_DEPTH: usize = 16;

/// Direct-override stack depth.
pub const OVERRIDE_DEPTH: usize = 8;

/// Blending mode selected at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContiMode {
    /// Stitch segments at target velocity where geometry allows.
    NodeVelocity,
    /// Obey each segment's own start/stop velocities.
    NodeManual,
    /// Planner picks: blend continuous junctions, stop at corners.
    #[default]
    NodeAuto,
    /// Scale junction velocities so the tangential velocity stays
    /// continuous across every junction.
    VelocityComp,
}

/// A deferred digital output tied to a queued segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeferredIo {
    /// General-output channel 0–3.
    pub channel: u8,
    /// Level to write.
    pub value: bool,
    /// Lead before the segment end: distance, or seconds when
    /// `time_based`.
    pub lead: f64,
    /// Interpret `lead` as seconds instead of distance.
    pub time_based: bool,
}

/// One queued segment with its velocity envelope.
#[derive(Debug, Clone)]
pub struct ContiNode {
    /// Path geometry.
    pub path: PathSegment,
    /// Plateau velocity.
    pub velocity: f64,
    /// Accel slope.
    pub accel: f64,
    /// Decel slope.
    pub decel: f64,
    /// Entry velocity (set by blending).
    pub start_vel: f64,
    /// Exit velocity (set by blending).
    pub end_vel: f64,
    /// Armed mid-segment output.
    pub io: Option<DeferredIo>,
    /// Enqueue index, reported while executing.
    pub index: u32,
}

/// The per-coordinate deferred queue.
#[derive(Debug, Default)]
pub struct ContiQueue {
    nodes: Deque<ContiNode, QUEUE_DEPTH>,
    overrides: Vec<ContiNode, OVERRIDE_DEPTH>,
    collecting: bool,
    next_index: u32,
    current_index: Option<u32>,
    pending_io: Option<DeferredIo>,
}

impl ContiQueue {
    /// Open the node window: subsequent motion calls enqueue.
    pub fn begin(&mut self) {
        self.collecting = true;
    }

    /// Close the node window.
    pub fn end(&mut self) {
        self.collecting = false;
    }

    /// Whether calls are being deferred.
    #[inline]
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Free queue slots.
    #[inline]
    pub fn free_slots(&self) -> usize {
        QUEUE_DEPTH - self.nodes.len()
    }

    /// Queued (not yet executed) nodes.
    #[inline]
    pub fn queued(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the node currently executing.
    #[inline]
    pub fn node_num(&self) -> Option<u32> {
        self.current_index
    }

    /// Total nodes enqueued since the window opened.
    #[inline]
    pub fn total_nodes(&self) -> u32 {
        self.next_index
    }

    /// Arm a deferred output for the next enqueued segment.
    pub fn arm_deferred_io(&mut self, io: DeferredIo) -> Result<()> {
        if !self.collecting {
            return Err(Error::NotInNode);
        }
        self.pending_io = Some(io);
        Ok(())
    }

    /// Enqueue a segment. Must be inside the node window.
    pub fn enqueue(
        &mut self,
        path: PathSegment,
        velocity: f64,
        accel: f64,
        decel: f64,
        start_vel: f64,
        end_vel: f64,
    ) -> Result<u32> {
        if !self.collecting {
            return Err(Error::NotInNode);
        }
        let index = self.next_index;
        let node = ContiNode {
            path,
            velocity,
            accel,
            decel,
            start_vel,
            end_vel,
            io: self.pending_io.take(),
            index,
        };
        self.nodes.push_back(node).map_err(|_| Error::QueueFull)?;
        self.next_index += 1;
        Ok(index)
    }

    /// Stack a direct-override segment (depth 1–8). Overrides drain
    /// before the remaining queue, newest first.
    pub fn push_override(&mut self, node: ContiNode) -> Result<()> {
        self.overrides.push(node).map_err(|_| Error::QueueFull)
    }

    /// Drop all pending nodes. The executing one is not touched.
    pub fn write_clear(&mut self) {
        self.nodes.clear();
        self.overrides.clear();
        self.pending_io = None;
    }

    /// Reset counters for a fresh program.
    pub fn reset(&mut self) {
        self.write_clear();
        self.collecting = false;
        self.next_index = 0;
        self.current_index = None;
    }

    /// Take the next node to execute.
    pub fn pop_next(&mut self) -> Option<ContiNode> {
        let node = self.overrides.pop().or_else(|| self.nodes.pop_front())?;
        self.current_index = Some(node.index);
        Some(node)
    }

    /// Peek the entry velocity of the next node, for blending the
    /// exit of the one about to run.
    pub fn peek_start_vel(&self) -> Option<f64> {
        if let Some(ov) = self.overrides.last() {
            return Some(ov.start_vel);
        }
        self.nodes.front().map(|n| n.start_vel)
    }

    /// Endpoint of the newest queued node; segments enqueued inside
    /// the window chain from here.
    pub fn last_end(&self) -> Option<crate::coord::AxPos> {
        self.nodes.back().map(|n| n.path.end)
    }

    /// Apply a blending mode across the queued nodes, optionally
    /// rounding line/line corners with the connection radius.
    ///
    /// `blend_angle_deg` is the largest junction angle that still
    /// blends; sharper corners come to rest.
    pub fn plan_blending(
        &mut self,
        mode: ContiMode,
        blend_angle_deg: f64,
        connection_radius: Option<f64>,
    ) {
        if mode == ContiMode::NodeManual {
            return;
        }

        // Stage 1: corner rounding (auto modes with a radius).
        if let Some(radius) = connection_radius {
            if mode != ContiMode::NodeVelocity {
                self.insert_fillets(radius);
            }
        }

        // Stage 2: junction velocities.
        let cos_limit = libm::cos(blend_angle_deg.to_radians().abs());
        let len = self.nodes.len();
        if len == 0 {
            return;
        }
        let mut scratch: Vec<ContiNode, QUEUE_DEPTH> = Vec::new();
        while let Some(n) = self.nodes.pop_front() {
            // Capacity matches the source queue.
            let _ = scratch.push(n);
        }
        for i in 0..scratch.len() {
            if i + 1 >= scratch.len() {
                break;
            }
            let cos = junction_alignment(&scratch[i].path, &scratch[i + 1].path);
            let junction = if cos >= cos_limit {
                let base = scratch[i].velocity.min(scratch[i + 1].velocity);
                match mode {
                    ContiMode::VelocityComp => base * cos.max(0.0),
                    _ => base,
                }
            } else {
                0.0
            };
            scratch[i].end_vel = junction;
            scratch[i + 1].start_vel = junction;
        }
        for n in scratch {
            let _ = self.nodes.push_back(n);
        }
    }

    /// Round line/line corners, splicing trimmed segments plus the
    /// corner arc back into the queue.
    fn insert_fillets(&mut self, radius: f64) {
        let mut scratch: Vec<ContiNode, QUEUE_DEPTH> = Vec::new();
        while let Some(n) = self.nodes.pop_front() {
            let _ = scratch.push(n);
        }
        let mut out: Vec<ContiNode, QUEUE_DEPTH> = Vec::new();
        let mut iter = scratch.into_iter();
        let Some(mut hold) = iter.next() else {
            return;
        };
        for next in iter {
            match fillet_between(&hold.path, &next.path, radius) {
                Some((a, corner, b)) if out.len() + 2 < QUEUE_DEPTH => {
                    let corner_node = ContiNode {
                        path: corner,
                        velocity: hold.velocity.min(next.velocity),
                        accel: hold.accel,
                        decel: hold.decel,
                        start_vel: 0.0,
                        end_vel: 0.0,
                        io: None,
                        index: hold.index,
                    };
                    let mut trimmed = hold.clone();
                    trimmed.path = a;
                    let _ = out.push(trimmed);
                    let _ = out.push(corner_node);
                    hold = next;
                    hold.path = b;
                }
                _ => {
                    let _ = out.push(hold);
                    hold = next;
                }
            }
        }
        let _ = out.push(hold);
        for n in out {
            let _ = self.nodes.push_back(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::path::AxPos;

    fn pos(vals: &[f64]) -> AxPos {
        let mut p = [0.0; crate::coord::MAX_COORD_AXES];
        p[..vals.len()].copy_from_slice(vals);
        p
    }

    fn line(from: &[f64], to: &[f64]) -> PathSegment {
        PathSegment::line(pos(from), pos(to), 2)
    }

    fn queue_two_lines() -> ContiQueue {
        let mut q = ContiQueue::default();
        q.begin();
        q.enqueue(line(&[0.0, 0.0], &[10.0, 0.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.enqueue(line(&[10.0, 0.0], &[20.0, 0.0]), 3.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.end();
        q
    }

    #[test]
    fn enqueue_requires_window() {
        let mut q = ContiQueue::default();
        let err = q.enqueue(line(&[0.0, 0.0], &[1.0, 0.0]), 1.0, 1.0, 1.0, 0.0, 0.0);
        assert_eq!(err, Err(Error::NotInNode));
    }

    #[test]
    fn fifo_order_with_indices() {
        let mut q = queue_two_lines();
        q.plan_blending(ContiMode::NodeManual, 45.0, None);
        let first = q.pop_next().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(q.node_num(), Some(0));
        let second = q.pop_next().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(q.node_num(), Some(1));
        assert!(q.pop_next().is_none());
    }

    #[test]
    fn straight_junction_blends_to_lower_velocity() {
        let mut q = queue_two_lines();
        q.plan_blending(ContiMode::NodeVelocity, 45.0, None);
        let first = q.pop_next().unwrap();
        assert!((first.end_vel - 3.0).abs() < 1e-9);
        let second = q.pop_next().unwrap();
        assert!((second.start_vel - 3.0).abs() < 1e-9);
    }

    #[test]
    fn sharp_corner_comes_to_rest() {
        let mut q = ContiQueue::default();
        q.begin();
        q.enqueue(line(&[0.0, 0.0], &[10.0, 0.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.enqueue(line(&[10.0, 0.0], &[10.0, 10.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.end();
        q.plan_blending(ContiMode::NodeVelocity, 45.0, None);
        let first = q.pop_next().unwrap();
        assert!(first.end_vel.abs() < 1e-9);
    }

    #[test]
    fn auto_mode_inserts_fillet() {
        let mut q = ContiQueue::default();
        q.begin();
        q.enqueue(line(&[0.0, 0.0], &[10.0, 0.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.enqueue(line(&[10.0, 0.0], &[10.0, 10.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.end();
        q.plan_blending(ContiMode::NodeAuto, 45.0, Some(2.0));
        // line + corner + line
        assert_eq!(q.queued(), 3);
        let a = q.pop_next().unwrap();
        let corner = q.pop_next().unwrap();
        let b = q.pop_next().unwrap();
        assert!((a.path.length() - 8.0).abs() < 1e-9);
        assert!(corner.path.length() > 0.0);
        assert!((b.path.length() - 8.0).abs() < 1e-9);
        // Junctions blend after rounding.
        assert!(a.end_vel > 0.0);
        assert!(b.start_vel > 0.0);
    }

    #[test]
    fn write_clear_keeps_counters() {
        let mut q = queue_two_lines();
        q.write_clear();
        assert_eq!(q.queued(), 0);
        assert_eq!(q.total_nodes(), 2);
    }

    #[test]
    fn override_stack_preempts() {
        let mut q = queue_two_lines();
        let node = ContiNode {
            path: line(&[0.0, 0.0], &[1.0, 1.0]),
            velocity: 9.0,
            accel: 10.0,
            decel: 10.0,
            start_vel: 0.0,
            end_vel: 0.0,
            io: None,
            index: 99,
        };
        q.push_override(node).unwrap();
        assert_eq!(q.pop_next().unwrap().index, 99);
        assert_eq!(q.pop_next().unwrap().index, 0);
    }

    #[test]
    fn deferred_io_attaches_to_next_node() {
        let mut q = ContiQueue::default();
        q.begin();
        q.arm_deferred_io(DeferredIo {
            channel: 1,
            value: true,
            lead: 0.5,
            time_based: false,
        })
        .unwrap();
        q.enqueue(line(&[0.0, 0.0], &[10.0, 0.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.enqueue(line(&[10.0, 0.0], &[20.0, 0.0]), 5.0, 10.0, 10.0, 0.0, 0.0)
            .unwrap();
        q.end();
        let first = q.pop_next().unwrap();
        assert!(first.io.is_some());
        let second = q.pop_next().unwrap();
        assert!(second.io.is_none());
    }

    #[test]
    fn override_depth_bounded() {
        let mut q = ContiQueue::default();
        for i in 0..OVERRIDE_DEPTH {
            let node = ContiNode {
                path: line(&[0.0, 0.0], &[1.0, 0.0]),
                velocity: 1.0,
                accel: 1.0,
                decel: 1.0,
                start_vel: 0.0,
                end_vel: 0.0,
                io: None,
                index: i as u32,
            };
            q.push_override(node).unwrap();
        }
        let node = ContiNode {
            path: line(&[0.0, 0.0], &[1.0, 0.0]),
            velocity: 1.0,
            accel: 1.0,
            decel: 1.0,
            start_vel: 0.0,
            end_vel: 0.0,
            io: None,
            index: 100,
        };
        assert_eq!(q.push_override(node), Err(Error::QueueFull));
    }
}
