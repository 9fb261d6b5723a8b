//! Responder policy: which participant produces the next message
//!
//! Pure function of participants and history. Alternation in two-agent
//! sessions is what keeps a pair of agents from answering themselves in a
//! loop: each observed update costs exactly one reply, from the agent that
//! did not speak last.

use parley_core::{ChatMessage, Participant};

/// Pick the participant who should respond next, or `None` when no agent
/// should act.
///
/// - No agents: `None`. Sessions between two non-agents never need dispatch.
/// - One agent: that agent, regardless of history. The non-agent side is a
///   human or system actor and never receives an auto-generated reply.
/// - Two agents: the one who did not send the last message. On an empty log
///   the second listed participant opens the conversation; participant order
///   is fixed at creation, so the choice is deterministic. A last sender
///   matching neither participant means the history is corrupt; better no
///   reply than a guessed one.
pub fn next_responder<'a>(
    participants: &'a [Participant; 2],
    messages: &[ChatMessage],
) -> Option<&'a Participant> {
    let [first, second] = participants;
    match (first.is_agent, second.is_agent) {
        (false, false) => None,
        (true, false) => Some(first),
        (false, true) => Some(second),
        (true, true) => match messages.last() {
            None => Some(second),
            Some(last) if last.sender == first.name => Some(second),
            Some(last) if last.sender == second.name => Some(first),
            Some(_) => None,
        },
    }
}
