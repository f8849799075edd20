//! Static stimulus catalog and per-participant trial plans.

use crate::error::{CatalogError, TrialRuntimeError};
use freeview_core::{
    FillerTrial, ImageTrial, PlacedStimulus, PositionAssignment, Quadrant, StimulusSet,
    TrialDefinition, TrialKind,
};
use freeview_render::LayoutResult;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default)]
    pub image_viewing_time: Option<u64>,
}

/// `stimuli-config.json`: image quadruples and neutral filler quadruples
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialCatalog {
    #[serde(default)]
    pub config: CatalogConfig,
    #[serde(default)]
    pub image_trials: Vec<ImageTrial>,
    #[serde(default)]
    pub neutral_fillers: Vec<FillerTrial>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialPlanEntry {
    pub kind: TrialKind,
    pub source_index: usize,
}

/// Presentation order for one participant. Fixed once generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    entries: Vec<TrialPlanEntry>,
}

impl TrialPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TrialPlanEntry> {
        self.entries.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrialPlanEntry> {
        self.entries.iter()
    }
}

/// Stimuli for one trial with a freshly drawn role-to-quadrant mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialStimuli {
    pub definition: TrialDefinition,
    pub assignment: PositionAssignment,
}

impl TrialStimuli {
    pub fn placed(&self, layout: &LayoutResult) -> Vec<PlacedStimulus> {
        self.definition
            .images()
            .iter()
            .filter_map(|(role, image)| {
                let quadrant = self.assignment.quadrant_of(*role)?;
                Some(PlacedStimulus {
                    role: *role,
                    image: image.to_string(),
                    quadrant,
                    origin: layout.position(quadrant),
                    size: layout.size,
                })
            })
            .collect()
    }

    /// Image references in role order, comma separated
    pub fn image_list(&self) -> String {
        self.definition
            .images()
            .iter()
            .map(|(_, image)| *image)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl TrialCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: TrialCatalog = serde_json::from_str(json)?;
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.image_trials.len() + self.neutral_fillers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn definition(&self, entry: TrialPlanEntry) -> Option<TrialDefinition> {
        match entry.kind {
            TrialKind::Image => self
                .image_trials
                .get(entry.source_index)
                .cloned()
                .map(TrialDefinition::Image),
            TrialKind::Filler => self
                .neutral_fillers
                .get(entry.source_index)
                .cloned()
                .map(TrialDefinition::Filler),
        }
    }

    /// Every distinct image reference, in catalog order
    pub fn image_refs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.image_trials
            .iter()
            .flat_map(|t| t.images().map(|(_, image)| image.to_string()))
            .chain(
                self.neutral_fillers
                    .iter()
                    .flat_map(|t| t.images().map(|(_, image)| image.to_string())),
            )
            .filter(|image| seen.insert(image.clone()))
            .collect()
    }

    /// Every catalog entry exactly once, Fisher-Yates shuffled
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> TrialPlan {
        let mut entries: Vec<_> = (0..self.image_trials.len())
            .map(|source_index| TrialPlanEntry {
                kind: TrialKind::Image,
                source_index,
            })
            .chain((0..self.neutral_fillers.len()).map(|source_index| TrialPlanEntry {
                kind: TrialKind::Filler,
                source_index,
            }))
            .collect();
        entries.shuffle(rng);
        TrialPlan { entries }
    }

    pub fn stimuli_for<R: Rng + ?Sized>(
        &self,
        entry: TrialPlanEntry,
        rng: &mut R,
    ) -> Result<TrialStimuli, TrialRuntimeError> {
        let definition =
            self.definition(entry)
                .ok_or(TrialRuntimeError::MissingDefinition {
                    kind: entry.kind.as_str(),
                    index: entry.source_index,
                })?;
        let mut quadrants = Quadrant::ALL;
        quadrants.shuffle(rng);
        let assignment = PositionAssignment::zip(definition.roles(), quadrants)?;
        Ok(TrialStimuli {
            definition,
            assignment,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    pub(crate) const CATALOG: &str = r#"{
        "config": { "imageViewingTime": 8000 },
        "imageTrials": [
            { "dysphoric": "d1.jpg", "threat": "t1.jpg", "positive": "p1.jpg", "neutral": "n1.jpg" },
            { "dysphoric": "d2.jpg", "threat": "t2.jpg", "positive": "p2.jpg", "neutral": "n2.jpg" }
        ],
        "neutralFillers": [
            { "filler1": "f1.jpg", "filler2": "f2.jpg", "filler3": "f3.jpg", "filler4": "n1.jpg" }
        ]
    }"#;

    #[test]
    fn parses_camel_case_catalog() {
        let catalog = TrialCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.config.image_viewing_time, Some(8000));
        assert_eq!(catalog.neutral_fillers[0].filler2, "f2.jpg");
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            TrialCatalog::from_json(r#"{"imageTrials": [], "neutralFillers": []}"#),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn image_refs_are_distinct() {
        let refs = TrialCatalog::from_json(CATALOG).unwrap().image_refs();
        assert_eq!(refs.len(), 11);
        assert_eq!(refs.iter().filter(|r| *r == "n1.jpg").count(), 1);
    }

    #[test]
    fn seeded_plans_repeat() {
        let catalog = TrialCatalog::from_json(CATALOG).unwrap();
        let a = catalog.plan(&mut StdRng::seed_from_u64(7));
        let b = catalog.plan(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_definition_is_a_runtime_error() {
        let catalog = TrialCatalog::from_json(CATALOG).unwrap();
        let entry = TrialPlanEntry {
            kind: TrialKind::Filler,
            source_index: 5,
        };
        assert!(matches!(
            catalog.stimuli_for(entry, &mut StdRng::seed_from_u64(1)),
            Err(TrialRuntimeError::MissingDefinition { index: 5, .. })
        ));
    }
}
