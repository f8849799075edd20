use crate::assets::{AssetSource, preload_all};
use crate::capture::PointerCapture;
use crate::catalog::{TrialCatalog, TrialPlan};
use crate::config::ExperimentConfig;
use crate::display::{Frame, StimulusDisplay};
use crate::error::{AssetLoadError, CatalogError, ExperimentError, TrialRuntimeError};
use crate::gate::{ProgressGate, Prompt};
use crate::trial::TrialDraft;
use freeview_core::{InvalidTransition, Participant, Screen, SessionMetadata, Transition, Viewport};
use freeview_data::{
    DataAggregator, ExportReport, LocalExporter, UploadFailure, UploadPipeline, UploadProgress,
    UploadReceipt, manual_export,
};
use freeview_render::{LayoutResult, LayoutTracker, place};
use freeview_timing::Clock;
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the sequencer talks to
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub capture: Arc<dyn PointerCapture>,
    pub display: Arc<dyn StimulusDisplay>,
    pub gate: Arc<dyn ProgressGate>,
    pub assets: Arc<dyn AssetSource>,
    pub pipeline: Arc<UploadPipeline>,
    pub exporter: Arc<dyn LocalExporter>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Uploaded(UploadReceipt),
    ExportedLocally {
        failure: UploadFailure,
        report: ExportReport,
    },
    /// Cancelled before any trial was recorded; nothing was delivered
    Cancelled,
}

pub struct TrialSequencer<R>
where
    R: Rng,
{
    pub screen: Screen,
    pub config: ExperimentConfig,
    pub rng: R,
    collaborators: Collaborators,
    cancel: CancellationToken,
    participant: Option<Participant>,
    catalog: Option<TrialCatalog>,
    plan: Option<TrialPlan>,
    data: Option<DataAggregator>,
    tracker: Option<LayoutTracker>,
    run_started_ms: f64,
}

impl<R> TrialSequencer<R>
where
    R: Rng + Send,
{
    pub fn new(config: ExperimentConfig, rng: R, collaborators: Collaborators) -> Self {
        Self {
            screen: Screen::default(),
            config,
            rng,
            collaborators,
            cancel: CancellationToken::new(),
            participant: None,
            catalog: None,
            plan: None,
            data: None,
            tracker: None,
            run_started_ms: 0.0,
        }
    }

    /// Cancelling this token is the exit request. The current trial is
    /// finalized as interrupted and whatever was recorded gets delivered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    pub fn plan(&self) -> Option<&TrialPlan> {
        self.plan.as_ref()
    }

    pub fn data(&self) -> Option<&DataAggregator> {
        self.data.as_ref()
    }

    fn transition(&mut self, transition: Transition) -> Result<(), InvalidTransition> {
        let next = self.screen.apply(transition)?;
        info!("screen {} -> {}", self.screen.name(), next.name());
        self.screen = next;
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), ExperimentError> {
        self.transition(Transition::Begin)?;
        Ok(())
    }

    /// Validates intake. On a validation error the screen stays put so the
    /// participant can correct the form.
    pub fn submit_participant(
        &mut self,
        participant_id: &str,
        email: &str,
        session: &str,
    ) -> Result<(), ExperimentError> {
        self.screen.apply(Transition::IntakeAccepted)?;
        let participant = Participant::new(participant_id, email, session)?;
        info!(
            "participant {} session {}",
            participant.participant_id, participant.session
        );
        self.participant = Some(participant);
        self.transition(Transition::IntakeAccepted)?;
        Ok(())
    }

    /// Fetches the catalog, preloads every stimulus and shuffles the plan.
    /// Returns the number of trials.
    pub async fn load(&mut self) -> Result<usize, ExperimentError> {
        let participant = self
            .participant
            .clone()
            .ok_or(ExperimentError::NotReady("participant intake"))?;
        if self.screen != Screen::Loading {
            return Err(InvalidTransition {
                from: self.screen,
                transition: Transition::LoadFailed,
            }
            .into());
        }

        let catalog = match self.load_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("could not start: {e}");
                self.transition(Transition::LoadFailed)?;
                return Err(e.into());
            }
        };

        self.config = self.config.clone().with_catalog(&catalog.config);
        let plan = catalog.plan(&mut self.rng);
        let total = plan.len();
        info!(
            "{total} trials planned, {} ms viewing window",
            self.config.image_viewing_time_ms
        );

        self.data = Some(DataAggregator::new(
            participant,
            self.collaborators.clock.wall_time(),
            total,
        ));
        self.catalog = Some(catalog);
        self.plan = Some(plan);
        self.transition(Transition::Loaded { total })?;
        Ok(total)
    }

    async fn load_catalog(&self) -> Result<TrialCatalog, AssetLoadError> {
        let assets = self.collaborators.assets.as_ref();
        let catalog = assets.fetch_catalog().await?;
        if catalog.is_empty() {
            return Err(CatalogError::Empty.into());
        }
        preload_all(assets, &catalog.image_refs()).await?;
        Ok(catalog)
    }

    /// Runs every planned trial, then delivers the session. Returns once a
    /// terminal screen is reached.
    pub async fn run(&mut self) -> Result<RunOutcome, ExperimentError> {
        let Screen::Running { total, .. } = self.screen else {
            return Err(ExperimentError::NotReady("loading"));
        };
        self.run_started_ms = self.collaborators.clock.now_ms();

        self.collaborators.display.status("Ready!");
        self.collaborators
            .clock
            .sleep(self.config.ready_delay())
            .await;

        for index in 0..total {
            if self.cancel.is_cancelled() {
                info!("exit requested before trial {}", index + 1);
                break;
            }
            let prompt = if index == 0 {
                Prompt::Start
            } else {
                Prompt::NextTrial {
                    next: index + 1,
                    total,
                }
            };
            if !self.wait_for_gate(prompt).await {
                break;
            }
            if self.run_trial(index, total).await? {
                break;
            }
            self.collaborators
                .clock
                .sleep(self.config.inter_trial_interval())
                .await;
            if index + 1 < total {
                self.transition(Transition::NextTrial)?;
            }
        }

        self.finish().await
    }

    /// False when the run should stop instead of starting the next trial
    async fn wait_for_gate(&self, prompt: Prompt) -> bool {
        let gate = self.collaborators.gate.clone();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("exit requested at {prompt:?}");
                false
            }
            input = gate.wait(prompt) => match input {
                Some(input) => {
                    debug!("{prompt:?} passed with {input:?}");
                    true
                }
                None => {
                    warn!("input source closed at {prompt:?}, ending run");
                    self.cancel.cancel();
                    false
                }
            },
        }
    }

    /// Runs one trial through to its record. Returns whether an exit
    /// request interrupted the viewing window.
    async fn run_trial(&mut self, index: usize, total: usize) -> Result<bool, ExperimentError> {
        let entry = self
            .plan
            .as_ref()
            .and_then(|plan| plan.get(index))
            .ok_or(ExperimentError::NotReady("trial plan"))?;
        let clock = self.collaborators.clock.clone();
        let capture = self.collaborators.capture.clone();

        let mut draft = TrialDraft::new(
            index,
            entry,
            self.collaborators.display.viewport(),
            clock.now_ms(),
        );
        info!(
            "trial {}/{total}: {} #{}",
            draft.number(),
            entry.kind,
            entry.source_index
        );
        capture.enable();
        capture.mark(draft.start_ms, &draft.start_tag());

        let shown = match self.present(&mut draft).await {
            Ok(()) => true,
            Err(e @ TrialRuntimeError::Display(_)) => {
                warn!("trial {}: {e}", draft.number());
                draft.fail(&e);
                true
            }
            Err(e) => {
                warn!("trial {}: {e}", draft.number());
                draft.fail(&e);
                false
            }
        };

        let mut interrupted = false;
        if shown {
            let window_start = clock.now_ms();
            let viewing = self.config.viewing_time();
            interrupted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => true,
                _ = clock.sleep(viewing) => false,
            };
            if interrupted {
                info!("exit requested during trial {}", draft.number());
                capture.mark(clock.now_ms(), &draft.interrupt_tag());
                capture.disable();
                clock
                    .sleep(viewing.saturating_sub(clock.elapsed(window_start)))
                    .await;
            }
        }

        let end_ms = clock.now_ms();
        let samples = capture.close(end_ms, &draft.end_tag());
        let pointer_samples = samples.iter().filter(|s| !s.is_event()).count();
        let record = draft.finish(end_ms, pointer_samples, interrupted);
        debug!(
            "trial {} recorded: {:.0} ms, {} samples",
            record.trial_number(),
            record.duration_ms(),
            record.pointer_sample_count
        );

        self.data
            .as_mut()
            .ok_or(ExperimentError::NotReady("loading"))?
            .record_trial(record, samples)?;
        self.collaborators.display.clear().await;
        Ok(interrupted)
    }

    async fn present(&mut self, draft: &mut TrialDraft) -> Result<(), TrialRuntimeError> {
        let stimuli = match self.catalog.as_ref() {
            Some(catalog) => catalog.stimuli_for(draft.entry, &mut self.rng)?,
            None => {
                return Err(TrialRuntimeError::MissingDefinition {
                    kind: draft.entry.kind.as_str(),
                    index: draft.entry.source_index,
                });
            }
        };
        let layout = self.layout_for(draft.viewport);
        draft.place(&stimuli, &layout);

        let frame = Frame {
            trial_number: draft.number(),
            layout,
            stimuli: draft.stimuli.clone(),
        };
        self.collaborators
            .display
            .show(&frame)
            .await
            .map_err(|e| TrialRuntimeError::Display(e.0))?;
        self.collaborators.capture.mark(
            self.collaborators.clock.now_ms(),
            &format!("images_displayed_{}", stimuli.image_list()),
        );
        Ok(())
    }

    fn layout_for(&mut self, viewport: Viewport) -> LayoutResult {
        let tracker = self
            .tracker
            .get_or_insert_with(|| LayoutTracker::new(viewport));
        if tracker.observe(viewport) {
            info!("viewport resized to {viewport}");
        }
        let layout = place(viewport);
        if layout.is_fallback() {
            warn!("no non-overlapping layout for {viewport}, using fallback grid");
        }
        layout
    }

    async fn finish(&mut self) -> Result<RunOutcome, ExperimentError> {
        let (recorded, expected) = self
            .data
            .as_ref()
            .map(|data| (data.len(), data.trials_expected()))
            .ok_or(ExperimentError::NotReady("loading"))?;

        if recorded == 0 {
            self.transition(Transition::Cancel { with_data: false })?;
            info!("run ended before any trial was recorded");
            return Ok(RunOutcome::Cancelled);
        }

        let cut_short = recorded < expected;
        self.transition(if cut_short {
            Transition::Cancel { with_data: true }
        } else {
            Transition::TrialsFinished
        })?;
        self.transition(Transition::UploadStarted)?;
        info!("delivering {recorded}/{expected} trials");

        let clock = self.collaborators.clock.clone();
        let display = self.collaborators.display.clone();
        let pipeline = self.collaborators.pipeline.clone();
        let metadata = SessionMetadata {
            viewport: display.viewport().to_string(),
            platform: std::env::consts::OS.to_string(),
            experiment_duration_seconds: clock.elapsed(self.run_started_ms).as_secs(),
            cancelled: cut_short,
        };

        let result = {
            let data = self
                .data
                .as_ref()
                .ok_or(ExperimentError::NotReady("loading"))?;
            let session = data.session_record(clock.wall_time(), metadata);
            let status = display.clone();
            pipeline
                .upload(data, session, move |progress| match progress {
                    UploadProgress::Phase(phase) => status.status(&phase.to_string()),
                    UploadProgress::Heatmap { current, total } => {
                        status.status(&format!("generating heatmaps ({current}/{total})"))
                    }
                })
                .await
        };

        match result {
            Ok(receipt) => {
                self.transition(Transition::UploadSucceeded)?;
                info!("session {} uploaded", receipt.session.session_id);
                Ok(RunOutcome::Uploaded(receipt))
            }
            Err(mut failure) => {
                self.transition(Transition::UploadFailed)?;
                error!("upload failed: {failure}");
                display.status("Upload failed, saving files locally");
                let data = self
                    .data
                    .as_ref()
                    .ok_or(ExperimentError::NotReady("loading"))?;
                let report = manual_export(
                    self.collaborators.exporter.as_ref(),
                    data,
                    &failure.session,
                    failure.artifacts.take(),
                    pipeline.renderer(),
                )
                .await?;
                info!(
                    "{} files saved to {}",
                    report.files.len(),
                    report.location
                );
                Ok(RunOutcome::ExportedLocally { failure, report })
            }
        }
    }
}
