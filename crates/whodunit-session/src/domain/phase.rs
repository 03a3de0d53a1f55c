//! Phase graph for a game session.
//!
//! The graph is an explicit adjacency table keyed by the current phase and
//! the trigger that was requested. Player actions that keep the session in
//! place (monologues, questions, mission submissions, final choices) are
//! self-loops; `advance` edges move the session forward. Legality is a pure
//! lookup over [`EDGES`].

use std::fmt;

use serde::{Deserialize, Serialize};
use whodunit_core::error::DomainError;

/// Stage of a session within an act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players are joining; nothing has been narrated yet.
    Initialization,
    /// Characters introduce themselves.
    Monologue,
    /// Players question characters.
    Qna,
    /// Players submit missions or clues.
    MissionSubmit,
    /// Players make their final accusation.
    FinalChoice,
    /// The session is over.
    Completed,
}

impl Phase {
    /// Every phase, in narrative order.
    pub const ALL: [Self; 6] = [
        Self::Initialization,
        Self::Monologue,
        Self::Qna,
        Self::MissionSubmit,
        Self::FinalChoice,
        Self::Completed,
    ];

    /// Returns the wire name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Monologue => "monologue",
            Self::Qna => "qna",
            Self::MissionSubmit => "mission_submit",
            Self::FinalChoice => "final_choice",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` for the phase without outgoing edges.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !EDGES.iter().any(|edge| edge.from == self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was requested of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A character monologue.
    Monologue,
    /// A question to a character.
    Question,
    /// A mission submission.
    MissionSubmit,
    /// A final accusation.
    FinalChoice,
    /// An explicit phase change.
    Advance,
}

impl Trigger {
    /// Returns the action name of the trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monologue => "monologue",
            Self::Question => "qna",
            Self::MissionSubmit => "mission_submit",
            Self::FinalChoice => "final_choice",
            Self::Advance => "advance_phase",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition an edge requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// No condition.
    Always,
    /// At least one player has joined.
    PlayersJoined,
    /// The session is in its last act.
    FinalAct,
    /// The session has acts left after the current one.
    ActsRemaining,
}

impl Guard {
    /// Evaluates the guard.
    #[must_use]
    pub const fn allows(self, context: &TransitionContext) -> bool {
        match self {
            Self::Always => true,
            Self::PlayersJoined => context.player_count > 0,
            Self::FinalAct => context.current_act == context.max_acts,
            Self::ActsRemaining => context.current_act < context.max_acts,
        }
    }

    const fn requirement(self) -> &'static str {
        match self {
            Self::Always => "nothing",
            Self::PlayersJoined => "at least one joined player",
            Self::FinalAct => "the final act",
            Self::ActsRemaining => "an act remaining",
        }
    }
}

/// Side effect of taking an edge, beyond setting the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Only the phase changes.
    Stay,
    /// The act counter increments; per-act quotas start from zero.
    NextAct,
}

/// Facts about a session that guards look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    /// Current act (1-based).
    pub current_act: u32,
    /// Last act of the session.
    pub max_acts: u32,
    /// Number of joined players.
    pub player_count: usize,
}

/// One row of the phase graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Phase the edge leaves.
    pub from: Phase,
    /// Trigger the edge answers.
    pub trigger: Trigger,
    /// Phase the edge enters.
    pub to: Phase,
    /// Condition for taking the edge.
    pub guard: Guard,
    /// Additional effect of taking the edge.
    pub effect: Effect,
}

const fn edge(from: Phase, trigger: Trigger, to: Phase, guard: Guard, effect: Effect) -> Edge {
    Edge {
        from,
        trigger,
        to,
        guard,
        effect,
    }
}

/// The phase graph. For an untargeted `advance`, edges earlier in the table
/// win.
pub const EDGES: &[Edge] = &[
    edge(Phase::Initialization, Trigger::Advance, Phase::Monologue, Guard::PlayersJoined, Effect::Stay),
    edge(Phase::Monologue, Trigger::Monologue, Phase::Monologue, Guard::Always, Effect::Stay),
    edge(Phase::Monologue, Trigger::Advance, Phase::Qna, Guard::Always, Effect::Stay),
    edge(Phase::Qna, Trigger::Question, Phase::Qna, Guard::Always, Effect::Stay),
    edge(Phase::Qna, Trigger::Advance, Phase::MissionSubmit, Guard::Always, Effect::Stay),
    edge(Phase::MissionSubmit, Trigger::MissionSubmit, Phase::MissionSubmit, Guard::Always, Effect::Stay),
    edge(Phase::MissionSubmit, Trigger::Advance, Phase::Monologue, Guard::ActsRemaining, Effect::NextAct),
    edge(Phase::MissionSubmit, Trigger::Advance, Phase::FinalChoice, Guard::FinalAct, Effect::Stay),
    edge(Phase::MissionSubmit, Trigger::Advance, Phase::Qna, Guard::Always, Effect::Stay),
    edge(Phase::FinalChoice, Trigger::FinalChoice, Phase::FinalChoice, Guard::Always, Effect::Stay),
    edge(Phase::FinalChoice, Trigger::Advance, Phase::Completed, Guard::Always, Effect::Stay),
];

/// Finds the edge taken when `trigger` is requested in phase `from`.
///
/// `target` narrows `advance` requests to edges entering that phase; without
/// it the first edge whose guard passes is chosen.
///
/// # Errors
///
/// Returns `DomainError::InvalidTransition` if no edge matches, or if every
/// matching edge's guard rejects `context`.
pub fn resolve(
    from: Phase,
    trigger: Trigger,
    target: Option<Phase>,
    context: &TransitionContext,
) -> Result<&'static Edge, DomainError> {
    let mut candidates = EDGES
        .iter()
        .filter(|edge| edge.from == from && edge.trigger == trigger)
        .filter(|edge| target.is_none_or(|to| edge.to == to))
        .peekable();

    let Some(first) = candidates.peek().copied() else {
        return Err(DomainError::InvalidTransition(match (trigger, target) {
            (Trigger::Advance, Some(to)) => format!("cannot advance from {from} to {to}"),
            (Trigger::Advance, None) => format!("phase {from} has no outgoing transitions"),
            _ => format!("{trigger} is not allowed in phase {from}"),
        }));
    };

    candidates
        .find(|edge| edge.guard.allows(context))
        .ok_or_else(|| {
            DomainError::InvalidTransition(format!(
                "cannot advance from {from} to {}: requires {} (act {} of {})",
                first.to,
                first.guard.requirement(),
                context.current_act,
                context.max_acts
            ))
        })
}

/// Returns `true` if `trigger` is legal in phase `from`.
#[must_use]
pub fn permits(from: Phase, trigger: Trigger, context: &TransitionContext) -> bool {
    resolve(from, trigger, None, context).is_ok()
}

/// Phases reachable from `from` with an `advance` request right now, in
/// table order and without duplicates.
#[must_use]
pub fn advance_targets(from: Phase, context: &TransitionContext) -> Vec<Phase> {
    let mut targets = Vec::new();
    for edge in EDGES {
        if edge.from == from
            && edge.trigger == Trigger::Advance
            && edge.guard.allows(context)
            && !targets.contains(&edge.to)
        {
            targets.push(edge.to);
        }
    }
    targets
}
