//! Goal lifecycle tracking
//!
//! At most one goal executes at a time. Accepting a goal preempts the executing one, and every
//! finished goal is kept in a bounded history so that late pollers still see how it ended.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use std::collections::VecDeque;

use comms_if::tc::chain_ctrl::{GoalId, GoalState, GoalStatus};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GoalTracker {
    next_id: GoalId,

    /// The executing goal, or the most recent one if it has finished
    current: Option<GoalStatus>,

    /// Finished goals, oldest first
    history: VecDeque<GoalStatus>,

    history_len: usize,

    /// Goals finished since the last call to `drain_finished`
    newly_finished: Vec<GoalStatus>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GoalTracker {
    pub fn new(history_len: usize) -> Self {
        Self {
            next_id: 1,
            current: None,
            history: VecDeque::with_capacity(history_len),
            history_len,
            newly_finished: Vec::new(),
        }
    }

    /// Accept a new goal, preempting the executing one.
    pub fn accept(&mut self) -> GoalId {
        self.finish(GoalState::Preempted, None);

        let id = self.next_id;
        self.next_id += 1;

        self.current = Some(GoalStatus {
            id,
            state: GoalState::Executing,
            message: None,
        });

        info!("Goal {} accepted", id);

        id
    }

    /// Move the executing goal into a terminal state.
    ///
    /// Returns the finished status, or `None` if no goal was executing.
    pub fn finish(&mut self, state: GoalState, message: Option<String>) -> Option<GoalStatus> {
        let current = match self.current {
            Some(ref mut c) if c.state == GoalState::Executing => c,
            _ => return None,
        };

        current.state = state;
        current.message = message;
        let finished = current.clone();

        match finished.message {
            Some(ref m) => info!("Goal {} {:?}: {}", finished.id, finished.state, m),
            None => info!("Goal {} {:?}", finished.id, finished.state),
        }

        if self.history_len > 0 {
            if self.history.len() == self.history_len {
                self.history.pop_front();
            }
            self.history.push_back(finished.clone());
        }
        self.newly_finished.push(finished.clone());

        Some(finished)
    }

    /// The executing goal, if any.
    pub fn executing(&self) -> Option<&GoalStatus> {
        self.current
            .as_ref()
            .filter(|c| c.state == GoalState::Executing)
    }

    /// The executing goal, or the most recently finished one.
    pub fn current(&self) -> Option<&GoalStatus> {
        self.current.as_ref()
    }

    /// State of the current goal, `Idle` if no goal was ever accepted.
    pub fn current_state(&self) -> GoalState {
        self.current
            .as_ref()
            .map(|c| c.state)
            .unwrap_or(GoalState::Idle)
    }

    /// Status of the goal with the given ID, `None` if it was never accepted or has left the
    /// history.
    pub fn status(&self, id: GoalId) -> Option<GoalStatus> {
        match self.current {
            Some(ref c) if c.id == id => Some(c.clone()),
            _ => self.history.iter().rev().find(|g| g.id == id).cloned(),
        }
    }

    /// Take the goals finished since the last call.
    pub fn drain_finished(&mut self) -> Vec<GoalStatus> {
        std::mem::take(&mut self.newly_finished)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
