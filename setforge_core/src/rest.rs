//! Rest-duration resolution.
//!
//! Rest durations cascade block -> template -> global. An explicit `0` at
//! any level is a real override meaning "no rest", not an absent value, so
//! the chain only falls through on `None`.

/// Resolve the rest between straight sets.
pub fn resolve_rest(
    block_rest_sec: Option<u32>,
    template_rest_sec: Option<u32>,
    global_rest_sec: u32,
) -> u32 {
    block_rest_sec
        .or(template_rest_sec)
        .unwrap_or(global_rest_sec)
}

/// Resolve the transition rest after a block. Templates carry no
/// transition-level default, so the chain is block -> global.
pub fn resolve_transition_rest(
    block_transition_sec: Option<u32>,
    global_transition_sec: u32,
) -> u32 {
    block_transition_sec.unwrap_or(global_transition_sec)
}
