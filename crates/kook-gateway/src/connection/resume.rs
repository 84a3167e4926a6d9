//! Resume bookkeeping for the current session generation

use super::SequenceTracker;

/// Resume token and sequence state of one session generation
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    session_id: Option<String>,
    sequence: SequenceTracker,
    /// Reached `Connected` in this generation without a gap since
    established: bool,
}

/// Everything needed to send `Resume`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub session_id: String,
    pub sequence: u64,
}

impl ResumeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.sequence.generation()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut SequenceTracker {
        &mut self.sequence
    }

    /// Record the token handed out by `READY`
    pub fn established(&mut self, session_id: String) {
        self.session_id = Some(session_id);
        self.established = true;
    }

    /// A resumed connection caught up
    pub fn resumed(&mut self) {
        self.established = true;
    }

    /// Forget the resume token; the next connection identifies
    pub fn discard(&mut self) {
        self.session_id = None;
    }

    /// Resume is possible only after an uninterrupted `Connected` period
    /// that left a token, a sequence, and no gap
    pub fn target(&self) -> Option<ResumeTarget> {
        if !self.established || self.sequence.has_gap() {
            return None;
        }
        Some(ResumeTarget {
            session_id: self.session_id.clone()?,
            sequence: self.sequence.last()?,
        })
    }

    /// Begin a new generation; returns its number
    pub fn begin_generation(&mut self) -> u64 {
        self.session_id = None;
        self.established = false;
        self.sequence.reset()
    }
}
