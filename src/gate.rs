//! Single-flight backpressure gate.
//!
//! The gate admits at most one frame at a time. A frame arriving while another
//! is in flight is released on the spot and reported as rejected; the caller is
//! never blocked and nothing is queued, so under load the pipeline always works
//! on the freshest frame it could take.
//!
//! Transitions are a compare-and-swap on one atomic flag, which keeps the gate
//! correct when frame delivery is re-entrant or comes from several threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::frame::PlanarFrame;

/// Observable gate state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Idle,
    /// A frame is in flight. Carries the admitted frame's sequence.
    Busy { sequence: u64 },
}

/// Result of offering a frame to the gate.
#[derive(Debug)]
pub enum Admission<'g> {
    Admitted(AdmittedFrame<'g>),
    /// The gate was busy; the frame has already been released.
    Rejected,
}

impl Admission<'_> {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

#[derive(Debug, Default)]
pub struct FrameGate {
    busy: AtomicBool,
    in_flight: AtomicU64,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `frame` if idle, otherwise release it immediately.
    pub fn admit(&self, frame: PlanarFrame) -> Admission<'_> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!(
                "gate busy with frame {}, dropping frame {}",
                self.in_flight.load(Ordering::Acquire),
                frame.sequence()
            );
            frame.release();
            return Admission::Rejected;
        }
        self.in_flight.store(frame.sequence(), Ordering::Release);
        Admission::Admitted(AdmittedFrame {
            gate: self,
            frame,
        })
    }

    /// Return to idle. The admitted frame must already have been released.
    fn release(&self) {
        let was_busy = self.busy.swap(false, Ordering::AcqRel);
        debug_assert!(was_busy, "frame gate released while idle");
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> GateState {
        if self.is_busy() {
            GateState::Busy {
                sequence: self.in_flight.load(Ordering::Acquire),
            }
        } else {
            GateState::Idle
        }
    }
}

/// The one frame currently in flight.
///
/// Finishing or dropping it releases the frame and then reopens the gate, so
/// every exit path out of processing, including unwinding, performs both steps.
#[derive(Debug)]
pub struct AdmittedFrame<'g> {
    gate: &'g FrameGate,
    frame: PlanarFrame,
}

impl AdmittedFrame<'_> {
    pub fn frame(&self) -> &PlanarFrame {
        &self.frame
    }

    pub fn sequence(&self) -> u64 {
        self.frame().sequence()
    }

    /// Release the frame and return the gate to idle.
    pub fn finish(self) {}
}

impl Drop for AdmittedFrame<'_> {
    fn drop(&mut self) {
        self.frame.run_release_hook();
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Plane;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counted_frame(sequence: u64, releases: &Arc<AtomicUsize>) -> PlanarFrame {
        let releases = Arc::clone(releases);
        PlanarFrame::new(
            sequence,
            2,
            2,
            Plane::new(vec![0; 4], 2, 1),
            Plane::new(vec![128], 1, 1),
            Plane::new(vec![128], 1, 1),
        )
        .with_release_hook(move |_| {
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn admits_when_idle_and_rejects_when_busy() {
        let gate = FrameGate::new();
        let releases = Arc::new(AtomicUsize::new(0));
        assert_eq!(gate.state(), GateState::Idle);

        let first = gate.admit(counted_frame(1, &releases));
        assert!(first.is_admitted());
        assert_eq!(gate.state(), GateState::Busy { sequence: 1 });

        let second = gate.admit(counted_frame(2, &releases));
        assert!(!second.is_admitted());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), GateState::Busy { sequence: 1 });

        drop(first);
        assert_eq!(releases.load(Ordering::SeqCst), 2);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn drops_all_but_one_while_busy() {
        let gate = FrameGate::new();
        let releases = Arc::new(AtomicUsize::new(0));
        let n = 16;

        let Admission::Admitted(in_flight) = gate.admit(counted_frame(0, &releases)) else {
            panic!("idle gate must admit");
        };
        let rejected = (1..n)
            .filter(|seq| !gate.admit(counted_frame(*seq, &releases)).is_admitted())
            .count();
        assert_eq!(rejected as u64, n - 1);
        assert_eq!(releases.load(Ordering::SeqCst), (n - 1) as usize);
        assert_eq!(in_flight.sequence(), 0);

        in_flight.finish();
        assert_eq!(releases.load(Ordering::SeqCst), n as usize);
        assert!(!gate.is_busy());
        assert!(gate.admit(counted_frame(n, &releases)).is_admitted());
    }

    #[test]
    fn frame_is_released_before_gate_reopens() {
        let gate = Arc::new(FrameGate::new());
        let seen_busy = Arc::new(AtomicUsize::new(0));
        let frame = {
            let gate = Arc::clone(&gate);
            let seen_busy = Arc::clone(&seen_busy);
            PlanarFrame::new(
                7,
                2,
                2,
                Plane::new(vec![0; 4], 2, 1),
                Plane::new(vec![128], 1, 1),
                Plane::new(vec![128], 1, 1),
            )
            .with_release_hook(move |sequence| {
                assert_eq!(sequence, 7);
                if gate.is_busy() {
                    seen_busy.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let Admission::Admitted(admitted) = gate.admit(frame) else {
            panic!("idle gate must admit");
        };
        assert_eq!(admitted.frame().sequence(), 7);
        admitted.finish();
        assert_eq!(seen_busy.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn concurrent_admits_never_overlap() {
        let gate = Arc::new(FrameGate::new());
        let releases = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let gate = Arc::clone(&gate);
                let releases = Arc::clone(&releases);
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        if let Admission::Admitted(frame) =
                            gate.admit(counted_frame(t * 1000 + i, &releases))
                        {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::thread::yield_now();
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            frame.finish();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 8 * 200);
        assert_eq!(gate.state(), GateState::Idle);
    }
}
