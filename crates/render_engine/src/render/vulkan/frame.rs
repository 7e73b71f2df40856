//! Frame-cycle decision logic
//!
//! The per-frame protocol has a small decision core: which slot to use, when
//! to abandon an iteration, and when to recreate the swapchain. That core is
//! kept free of Vulkan handles so it can be exercised host-side; the
//! renderer feeds it real acquire/present outcomes at runtime.

/// Result of acquiring the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired and the swapchain still matches the surface
    Ready(u32),
    /// Image acquired but the swapchain no longer matches the surface
    Suboptimal(u32),
    /// No image; the swapchain must be recreated before rendering
    OutOfDate,
}

/// Result of presenting a finished image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and the swapchain still matches the surface
    Presented,
    /// Presented but the swapchain no longer matches the surface
    Suboptimal,
    /// Present failed; the swapchain must be recreated
    OutOfDate,
}

/// What the orchestrator should do after the acquire step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireAction {
    /// Record and submit against this image index
    Proceed(u32),
    /// Recreate the swapchain, recreate this slot's acquire semaphore, and
    /// restart the iteration without submitting
    AbortAndRecreate,
}

/// Decide how to react to an acquire outcome. A flagged resize forces
/// recreation even when the driver still hands out images.
pub fn acquire_action(outcome: AcquireOutcome, resize_flagged: bool) -> AcquireAction {
    match outcome {
        AcquireOutcome::OutOfDate | AcquireOutcome::Suboptimal(_) => AcquireAction::AbortAndRecreate,
        AcquireOutcome::Ready(_) if resize_flagged => AcquireAction::AbortAndRecreate,
        AcquireOutcome::Ready(index) => AcquireAction::Proceed(index),
    }
}

/// Decide whether the swapchain must be recreated after presentation.
pub fn present_needs_recreate(outcome: PresentOutcome, resize_flagged: bool) -> bool {
    matches!(
        outcome,
        PresentOutcome::Suboptimal | PresentOutcome::OutOfDate
    ) || resize_flagged
}

/// Frame-slot counter for N frames in flight.
///
/// The slot advances exactly once per completed frame — a frame that was
/// abandoned at the acquire step reuses its slot on the retry, a frame that
/// triggered recreation after presenting still advances.
#[derive(Debug, Clone, Copy)]
pub struct FrameCycle {
    current: usize,
    in_flight: usize,
}

impl FrameCycle {
    /// Create a cycle over `in_flight` slots.
    pub fn new(in_flight: usize) -> Self {
        assert!(in_flight > 0, "at least one frame in flight required");
        Self {
            current: 0,
            in_flight,
        }
    }

    /// Slot for the frame currently being recorded.
    pub fn slot(&self) -> usize {
        self.current
    }

    /// Number of slots.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Move to the next slot after a completed frame.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.in_flight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_wrap_modulo_frames_in_flight() {
        let mut cycle = FrameCycle::new(3);
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(cycle.slot());
            cycle.advance();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn stale_acquire_aborts_the_iteration() {
        assert_eq!(
            acquire_action(AcquireOutcome::OutOfDate, false),
            AcquireAction::AbortAndRecreate
        );
        assert_eq!(
            acquire_action(AcquireOutcome::Suboptimal(0), false),
            AcquireAction::AbortAndRecreate
        );
        assert_eq!(
            acquire_action(AcquireOutcome::Ready(2), false),
            AcquireAction::Proceed(2)
        );
    }

    #[test]
    fn resize_flag_forces_recreation_on_good_acquire() {
        assert_eq!(
            acquire_action(AcquireOutcome::Ready(0), true),
            AcquireAction::AbortAndRecreate
        );
    }

    #[test]
    fn present_recreates_on_staleness_or_resize() {
        assert!(present_needs_recreate(PresentOutcome::OutOfDate, false));
        assert!(present_needs_recreate(PresentOutcome::Suboptimal, false));
        assert!(present_needs_recreate(PresentOutcome::Presented, true));
        assert!(!present_needs_recreate(PresentOutcome::Presented, false));
    }

    /// Host-side simulation of the per-frame protocol with instrumented
    /// fences. Mirrors the renderer's control flow step for step.
    struct LoopSim {
        cycle: FrameCycle,
        /// Per-slot: GPU work outstanding (fence unsignaled)
        pending: Vec<bool>,
        /// Per-slot: submissions since the last wait on that slot
        submissions_since_wait: Vec<u32>,
        /// Slots in submission order
        submitted_slots: Vec<usize>,
        recreations: u32,
        semaphore_recreations: u32,
    }

    impl LoopSim {
        fn new(in_flight: usize) -> Self {
            Self {
                cycle: FrameCycle::new(in_flight),
                pending: vec![false; in_flight],
                submissions_since_wait: vec![0; in_flight],
                submitted_slots: Vec::new(),
                recreations: 0,
                semaphore_recreations: 0,
            }
        }

        /// Run one loop iteration with a scripted acquire outcome.
        fn iterate(&mut self, outcome: AcquireOutcome) {
            let slot = self.cycle.slot();

            // Step 1: wait on the slot fence. The simulated GPU completes
            // the outstanding submission here.
            assert!(
                self.submissions_since_wait[slot] <= 1,
                "slot {} was submitted more than once between fence waits",
                slot
            );
            self.pending[slot] = false;
            self.submissions_since_wait[slot] = 0;

            // Step 2: acquire
            match acquire_action(outcome, false) {
                AcquireAction::AbortAndRecreate => {
                    self.recreations += 1;
                    self.semaphore_recreations += 1;
                    // No submission, no slot advance; retry with same slot.
                }
                AcquireAction::Proceed(_) => {
                    // Steps 4-5: re-record and submit. The fence invariant:
                    // recording must never happen while the slot is pending.
                    assert!(!self.pending[slot], "re-recorded slot {} while in flight", slot);
                    self.pending[slot] = true;
                    self.submissions_since_wait[slot] += 1;
                    self.submitted_slots.push(slot);

                    // Steps 6-7: present and advance.
                    self.cycle.advance();
                }
            }
        }
    }

    #[test]
    fn five_clean_frames_cycle_two_slots() {
        let mut sim = LoopSim::new(2);
        for _ in 0..5 {
            sim.iterate(AcquireOutcome::Ready(0));
        }
        assert_eq!(sim.submitted_slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(sim.recreations, 0);
    }

    #[test]
    fn out_of_date_on_fourth_frame_recreates_once_without_submitting() {
        let mut sim = LoopSim::new(2);
        let script = [
            AcquireOutcome::Ready(0),
            AcquireOutcome::Ready(1),
            AcquireOutcome::Ready(0),
            AcquireOutcome::OutOfDate,
            AcquireOutcome::Ready(1),
            AcquireOutcome::Ready(0),
        ];
        for outcome in script {
            sim.iterate(outcome);
        }
        assert_eq!(sim.recreations, 1);
        assert_eq!(sim.semaphore_recreations, 1);
        // The out-of-date iteration submitted nothing; the retry reuses slot 1.
        assert_eq!(sim.submitted_slots, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn fence_wait_precedes_every_resubmission() {
        let mut sim = LoopSim::new(2);
        // Interleave staleness to stress the retry path; the asserts inside
        // iterate() are the invariant.
        let script = [
            AcquireOutcome::Ready(0),
            AcquireOutcome::Suboptimal(1),
            AcquireOutcome::Ready(1),
            AcquireOutcome::OutOfDate,
            AcquireOutcome::OutOfDate,
            AcquireOutcome::Ready(0),
            AcquireOutcome::Ready(1),
        ];
        for outcome in script {
            sim.iterate(outcome);
        }
        assert_eq!(sim.recreations, 3);
    }
}
