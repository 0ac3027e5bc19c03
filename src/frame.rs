//! Frame ownership and the single-slot hand-off.
//!
//! - `Frame`: Opaque camera frame. Pixels are private; there is no `Clone`.
//! - `TrackingQuality`: Platform-reported tracking state carried by each frame.
//! - `FrameSlot`: Holds at most one frame awaiting or undergoing classification.
//! - `InFlightFrame`: Guard returned by `FrameSlot::take`. Releasing it (explicitly
//!   or on drop) clears the slot, exactly once.
//!
//! The slot is the only mutable state shared between the frame-delivery thread
//! and the classification worker.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// TrackingQuality
// ----------------------------------------------------------------------------

/// Why tracking is limited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

/// World-tracking state attached to a frame at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingQuality {
    Normal,
    Limited(LimitedReason),
    NotAvailable,
}

impl TrackingQuality {
    pub fn is_normal(&self) -> bool {
        matches!(self, TrackingQuality::Normal)
    }

    /// True when the user should be guided to point at a textured surface.
    pub fn needs_coaching(&self) -> bool {
        matches!(
            self,
            TrackingQuality::Limited(LimitedReason::InsufficientFeatures)
        )
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Opaque camera frame (RGB8, row-major).
///
/// Explicitly not `Clone`: a frame is moved into the slot and lives there for
/// the duration of one classification.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture sequence assigned by the source.
    pub sequence: u64,
    pub tracking: TrackingQuality,
    captured_at: Instant,
}

impl Frame {
    /// Build a frame from tightly packed RGB8 pixels.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        tracking: TrackingQuality,
    ) -> anyhow::Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow::anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow::anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            sequence,
            tracking,
            captured_at: Instant::now(),
        })
    }

    /// Read-only pixel access for backends. The slice cannot outlive the frame.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Time since capture.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("tracking", &self.tracking)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// FrameSlot: single-slot buffer
// ----------------------------------------------------------------------------

/// Outcome of offering a frame to the slot. Drops are not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// A frame is already pending or in flight.
    DroppedBusy,
    /// Tracking was not `Normal`.
    DroppedUntracked,
}

/// Counters for everything that passed through the slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlotStats {
    pub offered: u64,
    pub accepted: u64,
    pub dropped_busy: u64,
    pub dropped_untracked: u64,
    pub released: u64,
}

impl SlotStats {
    /// Frames accepted but not yet released (0 or 1).
    pub fn outstanding(&self) -> u64 {
        self.accepted - self.released
    }
}

enum SlotState {
    Empty,
    Pending(Frame),
    InFlight,
}

struct SlotInner {
    state: SlotState,
    stats: SlotStats,
}

/// Holds zero or one frame. Admission control for the whole pipeline.
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Empty,
                stats: SlotStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    // Every critical section leaves the state consistent, so a poisoned lock
    // still guards valid data.
    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept `frame` iff the slot is empty and tracking is normal.
    pub fn offer(&self, frame: Frame) -> OfferOutcome {
        let mut inner = self.lock();
        inner.stats.offered += 1;
        if !frame.tracking.is_normal() {
            inner.stats.dropped_untracked += 1;
            log::trace!("frame {} dropped: tracking {:?}", frame.sequence, frame.tracking);
            return OfferOutcome::DroppedUntracked;
        }
        if !matches!(inner.state, SlotState::Empty) {
            inner.stats.dropped_busy += 1;
            log::trace!("frame {} dropped: slot busy", frame.sequence);
            return OfferOutcome::DroppedBusy;
        }
        inner.state = SlotState::Pending(frame);
        inner.stats.accepted += 1;
        drop(inner);
        self.ready.notify_one();
        OfferOutcome::Accepted
    }

    /// Move the pending frame out. The slot stays occupied until release.
    pub fn take(&self) -> Option<InFlightFrame<'_>> {
        let mut inner = self.lock();
        Self::take_locked(&mut inner).map(|frame| InFlightFrame::new(self, frame))
    }

    /// Block up to `timeout` for a pending frame.
    pub fn wait_take(&self, timeout: Duration) -> Option<InFlightFrame<'_>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(frame) = Self::take_locked(&mut inner) {
                return Some(InFlightFrame::new(self, frame));
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self
                .ready
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn take_locked(inner: &mut SlotInner) -> Option<Frame> {
        if !matches!(inner.state, SlotState::Pending(_)) {
            return None;
        }
        match std::mem::replace(&mut inner.state, SlotState::InFlight) {
            SlotState::Pending(frame) => Some(frame),
            _ => None,
        }
    }

    /// Clear the slot. Only reachable through `InFlightFrame`.
    fn release(&self) {
        let mut inner = self.lock();
        match inner.state {
            SlotState::InFlight => {
                inner.state = SlotState::Empty;
                inner.stats.released += 1;
            }
            _ => log::error!("frame slot released while not in flight"),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.lock().state, SlotState::Empty)
    }

    /// Number of frames currently held (pending or in flight).
    pub fn occupancy(&self) -> usize {
        match self.lock().state {
            SlotState::Empty => 0,
            SlotState::Pending(_) | SlotState::InFlight => 1,
        }
    }

    pub fn stats(&self) -> SlotStats {
        self.lock().stats
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// InFlightFrame
// ----------------------------------------------------------------------------

/// A frame taken from the slot for classification.
///
/// The slot is released when this guard is released or dropped, including
/// during unwinding if the backend panics.
pub struct InFlightFrame<'a> {
    slot: &'a FrameSlot,
    frame: Frame,
}

impl<'a> InFlightFrame<'a> {
    fn new(slot: &'a FrameSlot, frame: Frame) -> Self {
        Self { slot, frame }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Release the slot now, making room for the next `offer`.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for InFlightFrame<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_frame(sequence: u64, tracking: TrackingQuality) -> Frame {
        Frame::new(vec![sequence as u8; 4 * 4 * 3], 4, 4, sequence, tracking).unwrap()
    }

    #[test]
    fn frame_age_counts_from_capture() {
        let frame = make_frame(1, TrackingQuality::Normal);
        std::thread::sleep(Duration::from_millis(5));
        assert!(frame.age() >= Duration::from_millis(5));
    }

    #[test]
    fn frame_rejects_wrong_pixel_count() {
        assert!(Frame::new(vec![0; 10], 4, 4, 0, TrackingQuality::Normal).is_err());
    }

    #[test]
    fn slot_accepts_only_normal_tracking() {
        let slot = FrameSlot::new();
        assert_eq!(
            slot.offer(make_frame(1, TrackingQuality::NotAvailable)),
            OfferOutcome::DroppedUntracked
        );
        assert_eq!(
            slot.offer(make_frame(
                2,
                TrackingQuality::Limited(LimitedReason::Initializing)
            )),
            OfferOutcome::DroppedUntracked
        );
        assert!(slot.is_empty());
        assert_eq!(
            slot.offer(make_frame(3, TrackingQuality::Normal)),
            OfferOutcome::Accepted
        );
        assert_eq!(slot.stats().dropped_untracked, 2);
    }

    #[test]
    fn slot_holds_one_frame_until_release() {
        let slot = FrameSlot::new();
        assert_eq!(
            slot.offer(make_frame(1, TrackingQuality::Normal)),
            OfferOutcome::Accepted
        );
        assert_eq!(
            slot.offer(make_frame(2, TrackingQuality::Normal)),
            OfferOutcome::DroppedBusy
        );

        let in_flight = slot.take().expect("pending frame");
        assert_eq!(in_flight.frame().sequence, 1);
        assert!(slot.take().is_none());
        assert_eq!(
            slot.offer(make_frame(3, TrackingQuality::Normal)),
            OfferOutcome::DroppedBusy
        );
        assert_eq!(slot.occupancy(), 1);

        in_flight.release();
        assert!(slot.is_empty());
        assert_eq!(
            slot.offer(make_frame(4, TrackingQuality::Normal)),
            OfferOutcome::Accepted
        );

        let stats = slot.stats();
        assert_eq!(stats.offered, 4);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped_busy, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.outstanding(), 1);
    }

    #[test]
    fn dropping_guard_releases_once() {
        let slot = FrameSlot::new();
        slot.offer(make_frame(1, TrackingQuality::Normal));
        {
            let _guard = slot.take().unwrap();
        }
        assert!(slot.is_empty());
        assert_eq!(slot.stats().released, 1);
    }

    #[test]
    fn take_on_empty_slot_returns_none() {
        let slot = FrameSlot::new();
        assert!(slot.take().is_none());
        assert!(slot.wait_take(Duration::from_millis(5)).is_none());
        assert_eq!(slot.stats().released, 0);
    }

    #[test]
    fn wait_take_wakes_on_offer() {
        let slot = Arc::new(FrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                slot.offer(make_frame(7, TrackingQuality::Normal))
            })
        };
        let guard = slot.wait_take(Duration::from_secs(5)).expect("frame");
        assert_eq!(guard.frame().sequence, 7);
        drop(guard);
        assert_eq!(producer.join().unwrap(), OfferOutcome::Accepted);
    }

    #[test]
    fn concurrent_offers_never_exceed_one_frame() {
        let slot = Arc::new(FrameSlot::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        slot.offer(make_frame(p * 1000 + i, TrackingQuality::Normal));
                        assert!(slot.occupancy() <= 1);
                    }
                })
            })
            .collect();

        let mut taken = 0u64;
        for _ in 0..400 {
            if let Some(guard) = slot.take() {
                taken += 1;
                guard.release();
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }
        if let Some(guard) = slot.take() {
            taken += 1;
            drop(guard);
        }

        let stats = slot.stats();
        assert_eq!(stats.offered, 800);
        assert_eq!(stats.accepted, stats.released);
        assert_eq!(stats.released, taken);
        assert_eq!(stats.accepted + stats.dropped_busy, stats.offered);
    }
}
