/// Experiment screens. The sequencer holds exactly one of these and replaces
/// it only through [`Screen::apply`].
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Welcome,
    ParticipantIntake,
    Loading,
    Running {
        trial: usize,
        total: usize,
    },
    Finishing,
    Uploading,
    Success,
    ManualFallback,
    Cancelled,
    StartFailed,
}

/// Inputs to the screen transition table
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Begin,
    IntakeAccepted,
    Loaded { total: usize },
    LoadFailed,
    NextTrial,
    TrialsFinished,
    Cancel { with_data: bool },
    UploadStarted,
    UploadSucceeded,
    UploadFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no transition {transition:?} from screen {from:?}")]
pub struct InvalidTransition {
    pub from: Screen,
    pub transition: Transition,
}

impl Screen {
    pub fn apply(self, transition: Transition) -> Result<Screen, InvalidTransition> {
        use Screen::*;
        let next = match (self, transition) {
            (Welcome, Transition::Begin) => ParticipantIntake,
            (ParticipantIntake, Transition::IntakeAccepted) => Loading,
            (Loading, Transition::Loaded { total }) if total > 0 => Running { trial: 0, total },
            (Loading, Transition::LoadFailed) => StartFailed,
            (Running { trial, total }, Transition::NextTrial) if trial + 1 < total => Running {
                trial: trial + 1,
                total,
            },
            (Running { .. }, Transition::TrialsFinished) => Finishing,
            (Running { .. }, Transition::Cancel { with_data: true }) => Finishing,
            (Running { .. }, Transition::Cancel { with_data: false }) => Cancelled,
            (Finishing, Transition::UploadStarted) => Uploading,
            (Uploading, Transition::UploadSucceeded) => Success,
            (Uploading, Transition::UploadFailed) => ManualFallback,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Screen::Success | Screen::ManualFallback | Screen::Cancelled | Screen::StartFailed
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Screen::Running { .. })
    }

    /// Trial progress as (1-based current, total) while running
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        match self {
            Screen::Running { trial, total } => Some((trial + 1, *total)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::ParticipantIntake => "participant",
            Screen::Loading => "loading",
            Screen::Running { .. } => "experiment",
            Screen::Finishing => "finishing",
            Screen::Uploading => "upload",
            Screen::Success => "upload-success",
            Screen::ManualFallback => "end",
            Screen::Cancelled => "cancelled",
            Screen::StartFailed => "error",
        }
    }
}
