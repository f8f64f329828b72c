/// How the fetch orchestrator reacts to a failed candidate.
///
/// # Behavior Summary
///
/// | Class | Advance to next candidate? | Counts against provider health? |
/// |-------|---------------------------|---------------------------------|
/// | `Terminal` | No | No |
/// | `NextCandidate` | Yes | No |
/// | `NextCandidateWithPenalty` | Yes | Yes |
///
/// Adapter errors never end a member's walk: the orchestrator treats a
/// `Terminal` error from an adapter like `NextCandidate`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The request itself is unusable; no other candidate can fix it.
    Terminal,

    /// The provider has no usable data for this member (empty series, wrong
    /// country, wrong indicator). Another provider may well have it, and the
    /// provider itself is reachable.
    NextCandidate,

    /// Transport-level trouble (timeouts, 429s, 5xx). Move on and record the
    /// provider as unreachable for this request.
    NextCandidateWithPenalty,
}
