use serde::{Deserialize, Serialize};
use std::fmt;

/// Stimulus category of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialKind {
    Image,
    Filler,
}

impl TrialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialKind::Image => "image",
            TrialKind::Filler => "filler",
        }
    }
}

impl fmt::Display for TrialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named slot a stimulus image fills within its trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusRole {
    Dysphoric,
    Threat,
    Positive,
    Neutral,
    Filler1,
    Filler2,
    Filler3,
    Filler4,
}

impl StimulusRole {
    pub const IMAGE: [StimulusRole; 4] = [
        StimulusRole::Dysphoric,
        StimulusRole::Threat,
        StimulusRole::Positive,
        StimulusRole::Neutral,
    ];

    pub const FILLER: [StimulusRole; 4] = [
        StimulusRole::Filler1,
        StimulusRole::Filler2,
        StimulusRole::Filler3,
        StimulusRole::Filler4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusRole::Dysphoric => "dysphoric",
            StimulusRole::Threat => "threat",
            StimulusRole::Positive => "positive",
            StimulusRole::Neutral => "neutral",
            StimulusRole::Filler1 => "filler1",
            StimulusRole::Filler2 => "filler2",
            StimulusRole::Filler3 => "filler3",
            StimulusRole::Filler4 => "filler4",
        }
    }

    pub fn kind(&self) -> TrialKind {
        if Self::IMAGE.contains(self) {
            TrialKind::Image
        } else {
            TrialKind::Filler
        }
    }
}

impl fmt::Display for StimulusRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed quadruple of stimulus images, one per role
pub trait StimulusSet: Clone + Send + Sync + fmt::Debug {
    const KIND: TrialKind;

    fn images(&self) -> [(StimulusRole, &str); 4];
}

/// Image trial: one affect-laden image per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTrial {
    pub dysphoric: String,
    pub threat: String,
    pub positive: String,
    pub neutral: String,
}

impl StimulusSet for ImageTrial {
    const KIND: TrialKind = TrialKind::Image;

    fn images(&self) -> [(StimulusRole, &str); 4] {
        [
            (StimulusRole::Dysphoric, self.dysphoric.as_str()),
            (StimulusRole::Threat, self.threat.as_str()),
            (StimulusRole::Positive, self.positive.as_str()),
            (StimulusRole::Neutral, self.neutral.as_str()),
        ]
    }
}

/// Filler trial: four neutral images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillerTrial {
    pub filler1: String,
    pub filler2: String,
    pub filler3: String,
    pub filler4: String,
}

impl StimulusSet for FillerTrial {
    const KIND: TrialKind = TrialKind::Filler;

    fn images(&self) -> [(StimulusRole, &str); 4] {
        [
            (StimulusRole::Filler1, self.filler1.as_str()),
            (StimulusRole::Filler2, self.filler2.as_str()),
            (StimulusRole::Filler3, self.filler3.as_str()),
            (StimulusRole::Filler4, self.filler4.as_str()),
        ]
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialDefinition {
    Image(ImageTrial),
    Filler(FillerTrial),
}

impl TrialDefinition {
    pub fn kind(&self) -> TrialKind {
        match self {
            TrialDefinition::Image(_) => ImageTrial::KIND,
            TrialDefinition::Filler(_) => FillerTrial::KIND,
        }
    }

    pub fn images(&self) -> [(StimulusRole, &str); 4] {
        match self {
            TrialDefinition::Image(trial) => trial.images(),
            TrialDefinition::Filler(trial) => trial.images(),
        }
    }

    pub fn roles(&self) -> [StimulusRole; 4] {
        match self {
            TrialDefinition::Image(_) => StimulusRole::IMAGE,
            TrialDefinition::Filler(_) => StimulusRole::FILLER,
        }
    }
}
