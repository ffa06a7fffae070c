//! Paced reveal of streamed text.
//!
//! Fragments arrive at whatever rate the backend produces them. The UI shows
//! them one character at a time on a fixed cadence, so a large burst does not
//! appear all at once and a slow trickle still looks live.
//!
//! The assembler is a small `idle -> revealing -> idle` state machine. It owns
//! exactly one deadline; the caller sleeps until [`StreamingTypewriter::next_deadline`]
//! and then calls [`StreamingTypewriter::tick`]. Clearing the deadline is the
//! only way a reveal cycle is cancelled, so two cycles can never overlap.

use std::time::Duration;

use tokio::time::Instant;

/// Timing of a reveal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPace {
    /// Delay before the first character of a new cycle.
    pub start_delay: Duration,
    /// Delay between subsequent characters.
    pub interval: Duration,
}

impl Default for RevealPace {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(50),
            interval: Duration::from_millis(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Revealing { next_at: Instant },
}

/// Accumulates text fragments and reveals them at a fixed pace.
#[derive(Debug, Clone)]
pub struct StreamingTypewriter {
    pace: RevealPace,
    /// Concatenation of every fragment since the last reset.
    full: String,
    /// Byte length of the revealed prefix; always on a char boundary.
    revealed: usize,
    phase: Phase,
    marked_complete: bool,
}

impl StreamingTypewriter {
    /// Create an idle assembler.
    #[must_use]
    pub fn new(pace: RevealPace) -> Self {
        Self {
            pace,
            full: String::new(),
            revealed: 0,
            phase: Phase::Idle,
            marked_complete: false,
        }
    }

    /// Append a fragment, starting a reveal cycle if none is active.
    pub fn add_chunk(&mut self, fragment: &str) {
        self.add_chunk_at(fragment, Instant::now());
    }

    /// Append a fragment as of `now`.
    ///
    /// An active cycle keeps its cadence; only an idle assembler schedules a
    /// new first deadline.
    pub fn add_chunk_at(&mut self, fragment: &str, now: Instant) {
        if fragment.is_empty() {
            return;
        }
        self.full.push_str(fragment);
        if self.phase == Phase::Idle {
            self.phase = Phase::Revealing {
                next_at: now + self.pace.start_delay,
            };
        }
    }

    /// Reveal the next character if the deadline has passed.
    ///
    /// Returns `true` when the revealed text changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Phase::Revealing { next_at } = self.phase else {
            return false;
        };
        if now < next_at {
            return false;
        }

        let Some(ch) = self.full[self.revealed..].chars().next() else {
            self.phase = Phase::Idle;
            return false;
        };
        self.revealed += ch.len_utf8();

        self.phase = if self.revealed < self.full.len() {
            Phase::Revealing {
                next_at: now + self.pace.interval,
            }
        } else {
            Phase::Idle
        };
        true
    }

    /// The pending reveal deadline, if a cycle is active.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::Revealing { next_at } => Some(next_at),
        }
    }

    /// Clear all text and cancel the pending deadline.
    pub fn reset(&mut self) {
        self.full.clear();
        self.revealed = 0;
        self.phase = Phase::Idle;
        self.marked_complete = false;
    }

    /// Signal that no more fragments are expected.
    ///
    /// Buffered characters keep revealing at the configured pace.
    pub fn mark_complete(&mut self) {
        self.marked_complete = true;
    }

    /// Reveal everything buffered immediately.
    pub fn skip(&mut self) {
        self.revealed = self.full.len();
        self.phase = Phase::Idle;
    }

    /// The revealed prefix.
    #[must_use]
    pub fn display_text(&self) -> &str {
        &self.full[..self.revealed]
    }

    /// Everything received since the last reset.
    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full
    }

    /// Whether a reveal cycle is in progress.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        matches!(self.phase, Phase::Revealing { .. })
    }

    /// Whether the stream was marked complete and fully revealed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.marked_complete && self.revealed == self.full.len()
    }
}

impl Default for StreamingTypewriter {
    fn default() -> Self {
        Self::new(RevealPace::default())
    }
}

/// Typewriter for a text known up front, such as a banner.
#[derive(Debug, Clone)]
pub struct Typewriter {
    text: String,
    inner: StreamingTypewriter,
}

impl Typewriter {
    /// Start revealing `text` as of `now`.
    #[must_use]
    pub fn start_at(text: impl Into<String>, pace: RevealPace, now: Instant) -> Self {
        let text = text.into();
        let mut inner = StreamingTypewriter::new(pace);
        inner.add_chunk_at(&text, now);
        inner.mark_complete();
        Self { text, inner }
    }

    /// Start revealing `text` now.
    #[must_use]
    pub fn start(text: impl Into<String>, pace: RevealPace) -> Self {
        Self::start_at(text, pace, Instant::now())
    }

    /// Advance the animation.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.inner.tick(now)
    }

    /// The pending reveal deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.next_deadline()
    }

    /// Clear the revealed text and stop.
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Show the whole text at once.
    pub fn skip(&mut self) {
        if self.inner.full_text().is_empty() && !self.text.is_empty() {
            self.inner.add_chunk(&self.text);
            self.inner.mark_complete();
        }
        self.inner.skip();
    }

    /// The revealed prefix.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.inner.display_text()
    }

    /// Whether characters are still being revealed.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.inner.is_typing()
    }

    /// Whether the whole text is shown.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }
}
