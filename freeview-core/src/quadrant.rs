use crate::stimulus::StimulusRole;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen region a stimulus is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn index(self) -> usize {
        match self {
            Quadrant::TopLeft => 0,
            Quadrant::TopRight => 1,
            Quadrant::BottomLeft => 2,
            Quadrant::BottomRight => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "top-left",
            Quadrant::TopRight => "top-right",
            Quadrant::BottomLeft => "bottom-left",
            Quadrant::BottomRight => "bottom-right",
        }
    }

    pub fn is_left(self) -> bool {
        matches!(self, Quadrant::TopLeft | Quadrant::BottomLeft)
    }

    pub fn is_top(self) -> bool {
        matches!(self, Quadrant::TopLeft | Quadrant::TopRight)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("quadrant {0} assigned more than once")]
    DuplicateQuadrant(Quadrant),
    #[error("role {0} assigned more than once")]
    DuplicateRole(StimulusRole),
}

/// Role to quadrant mapping for one trial. Always a bijection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAssignment {
    slots: [(StimulusRole, Quadrant); 4],
}

impl PositionAssignment {
    pub fn new(slots: [(StimulusRole, Quadrant); 4]) -> Result<Self, AssignmentError> {
        for (i, (role, quadrant)) in slots.iter().enumerate() {
            for (other_role, other_quadrant) in &slots[i + 1..] {
                if quadrant == other_quadrant {
                    return Err(AssignmentError::DuplicateQuadrant(*quadrant));
                }
                if role == other_role {
                    return Err(AssignmentError::DuplicateRole(*role));
                }
            }
        }
        Ok(Self { slots })
    }

    /// Pairs `roles[i]` with `quadrants[i]`.
    pub fn zip(
        roles: [StimulusRole; 4],
        quadrants: [Quadrant; 4],
    ) -> Result<Self, AssignmentError> {
        Self::new([
            (roles[0], quadrants[0]),
            (roles[1], quadrants[1]),
            (roles[2], quadrants[2]),
            (roles[3], quadrants[3]),
        ])
    }

    pub fn quadrant_of(&self, role: StimulusRole) -> Option<Quadrant> {
        self.slots.iter().find(|(r, _)| *r == role).map(|(_, q)| *q)
    }

    pub fn role_at(&self, quadrant: Quadrant) -> Option<StimulusRole> {
        self.slots
            .iter()
            .find(|(_, q)| *q == quadrant)
            .map(|(r, _)| *r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(StimulusRole, Quadrant)> {
        self.slots.iter()
    }

    pub fn is_bijection(&self) -> bool {
        Quadrant::ALL
            .iter()
            .all(|q| self.slots.iter().filter(|(_, s)| s == q).count() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_repeated_quadrant() {
        let err = PositionAssignment::zip(
            StimulusRole::IMAGE,
            [
                Quadrant::TopLeft,
                Quadrant::TopLeft,
                Quadrant::BottomLeft,
                Quadrant::BottomRight,
            ],
        )
        .unwrap_err();
        assert_eq!(err, AssignmentError::DuplicateQuadrant(Quadrant::TopLeft));
    }

    #[test]
    fn lookups_are_inverse() {
        let a = PositionAssignment::zip(
            StimulusRole::FILLER,
            [
                Quadrant::BottomRight,
                Quadrant::TopLeft,
                Quadrant::TopRight,
                Quadrant::BottomLeft,
            ],
        )
        .unwrap();
        assert!(a.is_bijection());
        for q in Quadrant::ALL {
            let role = a.role_at(q).unwrap();
            assert_eq!(a.quadrant_of(role), Some(q));
        }
    }

    #[test]
    fn serializes_quadrants_as_labels() {
        let json = serde_json::to_string(&Quadrant::BottomLeft).unwrap();
        assert_eq!(json, "\"bottom-left\"");
    }
}
