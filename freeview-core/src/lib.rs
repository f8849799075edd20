pub mod geometry;
pub mod quadrant;
pub mod screen;
pub mod session;
pub mod stimulus;
pub mod trial;

pub use geometry::{Footprint, Point, Size, Viewport};
pub use quadrant::{AssignmentError, PositionAssignment, Quadrant};
pub use screen::{InvalidTransition, Screen, Transition};
pub use session::{
    Participant, SessionId, SessionMetadata, SessionRecord, SessionStatus, ValidationError,
};
pub use stimulus::{FillerTrial, ImageTrial, StimulusRole, StimulusSet, TrialDefinition, TrialKind};
pub use trial::{PlacedStimulus, PointerSample, TrialRecord};
