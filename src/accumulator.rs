//! Fold candidate files into a single corpus under a character budget.
//!
//! Each file contributes `header(path) + content`. Sizes are counted in
//! characters. The running total never exceeds the budget: a file that would
//! overflow it either ends the fold outright, or (when the corpus is still
//! nearly empty) is cut down to exactly fill what is left and then ends it.
//!
//! ```text
//! consumed + size <= budget          → append whole entry, continue
//! overflow, consumed <  guard*budget → append truncated entry, consumed = budget, stop
//! overflow, consumed >= guard*budget → drop entry, consumed unchanged, stop
//! ```
//!
//! The guard keeps one huge file deep in the tree from crowding out many
//! small ones that were already collected.

use crate::models::{AggregateContext, CandidateFile};

/// Fraction of the budget under which truncation-inclusion is allowed.
pub const DEFAULT_TRUNCATION_GUARD: f64 = 0.10;

/// Appended after a truncated file's content.
pub const TRUNCATION_MARKER: &str = "[truncated]";

/// Delimiter placed before each file so findings can be attributed to it.
pub fn header(relative_path: &str) -> String {
    format!("\n\n--- FILE PATH: {} ---\n", relative_path)
}

/// Whether the caller should keep feeding candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Per-run accumulation state.
#[derive(Debug)]
pub struct Accumulator {
    ctx: AggregateContext,
    guard: f64,
    done: bool,
}

impl Accumulator {
    pub fn new(budget_chars: usize) -> Self {
        Self::with_guard(budget_chars, DEFAULT_TRUNCATION_GUARD)
    }

    pub fn with_guard(budget_chars: usize, guard: f64) -> Self {
        Self {
            ctx: AggregateContext {
                budget_chars,
                ..AggregateContext::default()
            },
            guard,
            done: false,
        }
    }

    /// `true` once no further candidate will be accepted.
    pub fn is_exhausted(&self) -> bool {
        self.done || self.ctx.consumed_chars >= self.ctx.budget_chars
    }

    /// Offer one candidate. Returns [`Flow::Stop`] once the walk should end.
    pub fn offer(&mut self, candidate: CandidateFile) -> Flow {
        if self.is_exhausted() {
            self.done = true;
            return Flow::Stop;
        }

        let budget = self.ctx.budget_chars;
        let consumed = self.ctx.consumed_chars;
        let head = header(&candidate.relative_path);
        let head_len = head.chars().count();
        let entry_size = head_len + candidate.size;

        if consumed + entry_size <= budget {
            self.ctx.text.push_str(&head);
            self.ctx.text.push_str(&candidate.content);
            self.ctx.consumed_chars += entry_size;
            self.ctx.files_included += 1;
            return if self.is_exhausted() {
                self.done = true;
                Flow::Stop
            } else {
                Flow::Continue
            };
        }

        if (consumed as f64) < self.guard * budget as f64 {
            let keep = budget.saturating_sub(consumed).saturating_sub(head_len);
            tracing::debug!(
                path = %candidate.relative_path,
                kept = keep,
                size = candidate.size,
                "truncating oversized file into corpus"
            );
            self.ctx.text.push_str(&head);
            self.ctx.text.extend(candidate.content.chars().take(keep));
            self.ctx.text.push_str(TRUNCATION_MARKER);
            self.ctx.consumed_chars = budget;
            self.ctx.files_included += 1;
            self.ctx.truncated = true;
        } else {
            tracing::debug!(
                path = %candidate.relative_path,
                size = candidate.size,
                consumed,
                "budget edge reached; dropping file"
            );
        }
        self.done = true;
        Flow::Stop
    }

    pub fn finish(self) -> AggregateContext {
        self.ctx
    }
}

/// Drain `candidates` into an [`AggregateContext`], pulling no further than
/// needed.
pub fn accumulate<I>(candidates: I, budget_chars: usize, guard: f64) -> AggregateContext
where
    I: IntoIterator<Item = CandidateFile>,
{
    let mut acc = Accumulator::with_guard(budget_chars, guard);
    for candidate in candidates {
        if acc.offer(candidate) == Flow::Stop {
            break;
        }
    }
    acc.finish()
}
