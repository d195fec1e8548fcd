use std::fmt;

/// Lifecycle state of a [`Scheduler`](super::Scheduler).
///
/// ```text
/// INIT -> RUN_PRE -> RUN_ITER* -> CONVERGED -> RUN_POST -> DONE
/// ```
///
/// `FAILED` is reachable from every state except `DONE`. `DONE` and `FAILED`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Set up; nothing has run.
    Init,

    /// PRE has run and its outputs are cached.
    RunPre,

    /// At least one ITER pass has been requested.
    RunIter,

    /// The loop has ended; POST is about to run.
    Converged,

    /// POST is running.
    RunPost,

    /// POST has run.
    Done,

    /// The run failed; POST is skipped.
    Failed,
}

impl SchedulerState {
    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition(self, next: Self) -> bool {
        use SchedulerState::{Converged, Done, Failed, Init, RunIter, RunPost, RunPre};

        matches!(
            (self, next),
            (Init, RunPre)
                | (RunPre | RunIter, RunIter | Converged)
                | (Converged, RunPost)
                | (RunPost, Done)
                | (Init | RunPre | RunIter | Converged | RunPost, Failed)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::RunPre => "RUN_PRE",
            Self::RunIter => "RUN_ITER",
            Self::Converged => "CONVERGED",
            Self::RunPost => "RUN_POST",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SchedulerState::*;

    const ALL: [SchedulerState; 7] = [Init, RunPre, RunIter, Converged, RunPost, Done, Failed];

    #[test]
    fn happy_path_is_allowed() {
        let path = [Init, RunPre, RunIter, RunIter, Converged, RunPost, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for state in ALL {
            assert!(!Done.can_transition(state));
            assert!(!Failed.can_transition(state));
        }
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn failure_reachable_from_running_states() {
        for state in [Init, RunPre, RunIter, Converged, RunPost] {
            assert!(state.can_transition(Failed));
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn no_skipping_ahead() {
        assert!(!Init.can_transition(RunIter));
        assert!(!RunPre.can_transition(RunPost));
        assert!(!RunIter.can_transition(Done));
        assert!(!Converged.can_transition(RunIter));
        assert!(!RunPost.can_transition(RunPre));
    }
}
