use freeview_experiment::TrialCatalog;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

fn catalog(images: usize, fillers: usize) -> TrialCatalog {
    let image_trials: Vec<_> = (0..images)
        .map(|i| {
            json!({
                "dysphoric": format!("d{i}.jpg"),
                "threat": format!("t{i}.jpg"),
                "positive": format!("p{i}.jpg"),
                "neutral": format!("n{i}.jpg"),
            })
        })
        .collect();
    let neutral_fillers: Vec<_> = (0..fillers)
        .map(|i| {
            json!({
                "filler1": format!("f{i}a.jpg"),
                "filler2": format!("f{i}b.jpg"),
                "filler3": format!("f{i}c.jpg"),
                "filler4": format!("f{i}d.jpg"),
            })
        })
        .collect();
    let doc = json!({ "imageTrials": image_trials, "neutralFillers": neutral_fillers });
    TrialCatalog::from_json(&doc.to_string()).unwrap()
}

proptest! {
    #[test]
    fn plan_visits_every_entry_once(images in 0usize..12, fillers in 0usize..8, seed: u64) {
        prop_assume!(images + fillers > 0);
        let catalog = catalog(images, fillers);
        let plan = catalog.plan(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(plan.len(), images + fillers);

        let mut seen: Vec<_> = plan.iter().map(|e| (e.kind.as_str(), e.source_index)).collect();
        seen.sort();
        let mut expected: Vec<_> = (0..fillers)
            .map(|i| ("filler", i))
            .chain((0..images).map(|i| ("image", i)))
            .collect();
        expected.sort();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn every_trial_gets_a_bijective_assignment(seed: u64) {
        let catalog = catalog(3, 2);
        let mut rng = StdRng::seed_from_u64(seed);
        let plan = catalog.plan(&mut rng);
        for entry in plan.iter() {
            let stimuli = catalog.stimuli_for(*entry, &mut rng).unwrap();
            prop_assert!(stimuli.assignment.is_bijection());
            prop_assert_eq!(stimuli.image_list().split(',').count(), 4);
        }
    }
}
