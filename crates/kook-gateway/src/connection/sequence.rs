//! Dispatch sequence tracking per session generation

/// Outcome of observing one dispatch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Next in order (or the first of a fresh generation)
    Accepted(u64),
    /// Frame carried no sequence; nothing advanced
    Unsequenced,
    /// Frames were skipped; the event is still applied
    Gap { expected: u64, received: u64 },
    /// Already processed; the event must be dropped
    Stale { last: u64, received: u64 },
}

impl SequenceCheck {
    /// Whether the carrying event should be applied
    pub fn is_deliverable(self) -> bool {
        !matches!(self, Self::Stale { .. })
    }
}

/// Last processed sequence of the current generation
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    generation: u64,
    last: Option<u64>,
    gap: Option<(u64, u64)>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    /// Whether a gap was seen in this generation
    pub fn has_gap(&self) -> bool {
        self.gap.is_some()
    }

    /// First gap of the generation as `(expected, received)`
    pub fn gap(&self) -> Option<(u64, u64)> {
        self.gap
    }

    pub fn observe(&mut self, sequence: Option<u64>) -> SequenceCheck {
        let Some(received) = sequence else {
            return SequenceCheck::Unsequenced;
        };

        let Some(last) = self.last else {
            self.last = Some(received);
            return SequenceCheck::Accepted(received);
        };

        if received <= last {
            return SequenceCheck::Stale { last, received };
        }

        self.last = Some(received);
        let expected = last + 1;
        if received == expected {
            SequenceCheck::Accepted(received)
        } else {
            self.gap.get_or_insert((expected, received));
            SequenceCheck::Gap { expected, received }
        }
    }

    /// Start a new generation with a fresh baseline; returns the new generation
    pub fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.last = None;
        self.gap = None;
        self.generation
    }
}
