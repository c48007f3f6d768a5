//! Screen-sequencing state machine.
//!
//! `ScreenFlowController` owns the current screen, the recorded answers, the
//! gallery carousel while it is on screen, and the navigation that is pending
//! after an answer. It is single-writer: callers mutate it only through its
//! methods and feed time in through `poll`. Everything observable is also
//! queued as a [`FlowEvent`] for renderers (see [`ScreenFlowController::take_events`]).

use std::collections::BTreeMap;

use keepsake_schema::{
    CompletionCause, FlowEvent, MemoryGroup, Progress, QuestionId, QuestionSpec, RotationCause,
    ScreenId,
};
use tokio::time::{Duration, Instant};

use crate::{
    validate_config, BranchTable, CarouselEvent, ClosingConfig, FlowConfig, FlowError, FlowResult,
    GalleryConfig, TimedCarousel,
};

/// Selected option per question. A later answer for the same question
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(BTreeMap<QuestionId, String>);

impl Answers {
    pub fn get(&self, question: &QuestionId) -> Option<&str> {
        self.0.get(question).map(String::as_str)
    }

    pub fn insert(&mut self, question: QuestionId, answer: String) -> Option<String> {
        self.0.insert(question, answer)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingNavigation {
    session: u64,
    from: ScreenId,
    to: ScreenId,
    due: Instant,
}

#[derive(Debug, Clone)]
struct FlowState {
    screen: ScreenId,
    answers: Answers,
    pending: Option<PendingNavigation>,
    session: u64,
}

impl FlowState {
    fn initial(session: u64) -> Self {
        Self {
            screen: ScreenId::Welcome,
            answers: Answers::default(),
            pending: None,
            session,
        }
    }
}

pub struct ScreenFlowController {
    questions: Vec<QuestionSpec>,
    branches: BranchTable,
    /// Built once so generations keep increasing across visits and restarts.
    carousel: Option<TimedCarousel>,
    videos: Vec<String>,
    copy: BTreeMap<ScreenId, String>,
    closing: ClosingConfig,
    answer_delay: Duration,
    state: FlowState,
    events: Vec<FlowEvent>,
}

impl ScreenFlowController {
    pub fn new(config: FlowConfig) -> FlowResult<Self> {
        validate_config(&config)?;
        let carousel = config
            .gallery
            .as_ref()
            .map(GalleryConfig::build_carousel)
            .transpose()?;

        Ok(Self {
            answer_delay: config.answer_delay(),
            branches: config.branch_table(),
            questions: config.questions,
            carousel,
            videos: config.videos,
            copy: config.copy,
            closing: config.closing,
            state: FlowState::initial(0),
            events: Vec::new(),
        })
    }

    /// Hard reset to `Welcome`. Bumps the restart counter so anything still
    /// scheduled for the previous session is discarded when it fires.
    pub fn start(&mut self) {
        if let Some(carousel) = self.carousel.as_mut() {
            carousel.reset();
        }

        let session = self.state.session + 1;
        self.state = FlowState::initial(session);
        tracing::info!(session, "flow started");
        self.events.push(FlowEvent::FlowRestarted { session });
    }

    pub fn restart(&mut self) {
        self.start();
    }

    /// Welcome → first question.
    pub fn advance(&mut self, now: Instant) -> FlowResult<ScreenId> {
        let from = self.state.screen;
        if from != ScreenId::Welcome {
            return Err(FlowError::transition(from, "advance is only valid from welcome"));
        }
        let to = self.default_successor(from)?;
        self.transition(to, now)?;
        Ok(to)
    }

    /// Records the answer and schedules navigation to the branch-table target
    /// after the configured answer delay. Returns that target.
    pub fn submit_answer(
        &mut self,
        question_id: &QuestionId,
        answer: impl Into<String>,
        now: Instant,
    ) -> FlowResult<ScreenId> {
        let from = self.state.screen;
        let Some(index) = from.question_index() else {
            return Err(FlowError::transition(from, "not on a question screen"));
        };
        let question = self
            .questions
            .get(index)
            .ok_or_else(|| FlowError::InvalidState(format!("no question at {from}")))?;
        if &question.id != question_id {
            return Err(FlowError::transition(
                from,
                format!(
                    "answer for {question_id} submitted while {} is on screen",
                    question.id
                ),
            ));
        }

        let answer = answer.into();
        let to = self
            .branches
            .resolve(from, Some(answer.as_str()))
            .ok_or_else(|| FlowError::transition(from, "no route for answer"))?;

        let session = self.state.session;
        if let Some(previous) = self.state.answers.insert(question_id.clone(), answer.clone()) {
            tracing::debug!(%question_id, %previous, "answer overwritten");
        }
        self.events.push(FlowEvent::AnswerRecorded {
            session,
            question_id: question_id.clone(),
            answer,
        });

        if self.answer_delay.is_zero() {
            self.state.pending = None;
            self.transition(to, now)?;
            return Ok(to);
        }

        self.state.pending = Some(PendingNavigation {
            session,
            from,
            to,
            due: now + self.answer_delay,
        });
        self.events.push(FlowEvent::NavigationScheduled {
            session,
            from,
            to,
            delay_ms: self.answer_delay.as_millis() as u64,
        });
        Ok(to)
    }

    /// Leaves a passive screen (reassurance, affirmation, video, final closure).
    pub fn acknowledge(&mut self, now: Instant) -> FlowResult<ScreenId> {
        let from = self.state.screen;
        if !from.is_passive() {
            return Err(FlowError::transition(from, "nothing to acknowledge here"));
        }
        let to = self.default_successor(from)?;
        self.transition(to, now)?;
        Ok(to)
    }

    /// Manual "next memory" on the gallery.
    pub fn next_memory(&mut self, now: Instant) -> FlowResult<usize> {
        let from = self.state.screen;
        let session = self.state.session;
        let carousel = match (from, self.carousel.as_mut()) {
            (ScreenId::Gallery, Some(carousel)) if carousel.is_running() => carousel,
            _ => return Err(FlowError::transition(from, "no gallery on screen")),
        };

        let event = carousel.next(now);
        let index = carousel.index();
        let group_id = carousel.current_group().id.clone();
        if let CarouselEvent::IndexChanged { generation, .. } = event {
            self.events.push(FlowEvent::CarouselIndexChanged {
                session,
                generation,
                index,
                group_id,
                cause: RotationCause::Manual,
            });
        }
        Ok(index)
    }

    /// The user asked to leave the gallery.
    pub fn on_gallery_complete(&mut self, now: Instant) -> FlowResult<ScreenId> {
        self.complete_gallery(CompletionCause::UserRequested, now)
    }

    /// Applies an event produced by the gallery carousel. Events from a
    /// carousel run that has since been stopped are dropped.
    pub fn handle_carousel_event(&mut self, event: CarouselEvent, now: Instant) -> FlowResult<()> {
        let session = self.state.session;
        let Some(carousel) = self.carousel.as_ref() else {
            tracing::debug!(?event, "no gallery configured; discarding event");
            return Ok(());
        };
        if !carousel.is_current(&event) {
            tracing::debug!(
                ?event,
                live_generation = carousel.generation(),
                "discarding stale carousel event"
            );
            return Ok(());
        }

        match event {
            CarouselEvent::IndexChanged {
                generation,
                index,
                cause,
            } => {
                let Some(group) = carousel.groups().get(index) else {
                    tracing::debug!(index, "carousel index out of range; discarding event");
                    return Ok(());
                };
                let group_id = group.id.clone();
                tracing::debug!(index, %group_id, "gallery rotated");
                self.events.push(FlowEvent::CarouselIndexChanged {
                    session,
                    generation,
                    index,
                    group_id,
                    cause,
                });
                Ok(())
            }
            CarouselEvent::Completed { at, .. } => self
                .complete_gallery(CompletionCause::Deadline, at.min(now))
                .map(|_| ()),
        }
    }

    /// Fires every timer due at or before `now`.
    pub fn poll(&mut self, now: Instant) -> FlowResult<()> {
        if let Some(pending) = self.state.pending {
            if pending.due <= now {
                self.state.pending = None;
                if pending.session != self.state.session || pending.from != self.state.screen {
                    tracing::debug!(
                        stale_session = pending.session,
                        "discarding stale navigation"
                    );
                } else {
                    self.transition(pending.to, pending.due)?;
                }
            }
        }

        let events = match self.carousel.as_mut() {
            Some(carousel) => carousel.poll(now),
            None => Vec::new(),
        };
        for event in events {
            self.handle_carousel_event(event, now)?;
        }
        Ok(())
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.state.pending.map(|pending| pending.due);
        let carousel = self.carousel.as_ref().and_then(TimedCarousel::next_wake);
        match (pending, carousel) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn take_events(&mut self) -> Vec<FlowEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn current_screen(&self) -> ScreenId {
        self.state.screen
    }

    pub fn session(&self) -> u64 {
        self.state.session
    }

    pub fn answers(&self) -> &Answers {
        &self.state.answers
    }

    /// The gallery carousel while it is on screen.
    pub fn carousel(&self) -> Option<&TimedCarousel> {
        self.carousel
            .as_ref()
            .filter(|carousel| carousel.is_running())
    }

    pub fn current_group(&self) -> Option<&MemoryGroup> {
        self.carousel().map(TimedCarousel::current_group)
    }

    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.state
            .screen
            .question_index()
            .and_then(|index| self.questions.get(index))
    }

    pub fn progress(&self) -> Option<Progress> {
        self.state.screen.question_index().map(|index| Progress {
            number: index + 1,
            total: self.questions.len(),
        })
    }

    /// Option currently selected on the question screen, if any.
    pub fn selected_option(&self) -> Option<&str> {
        self.current_question()
            .and_then(|question| self.state.answers.get(&question.id))
    }

    pub fn pending_target(&self) -> Option<ScreenId> {
        self.state.pending.map(|pending| pending.to)
    }

    pub fn answer_delay(&self) -> Duration {
        self.answer_delay
    }

    pub fn current_video(&self) -> Option<&str> {
        match self.state.screen {
            ScreenId::Video(index) => self.videos.get(index).map(String::as_str),
            _ => None,
        }
    }

    pub fn copy_for(&self, screen: ScreenId) -> Option<&str> {
        self.copy.get(&screen).map(String::as_str)
    }

    pub fn closing_message(&self) -> &str {
        self.closing.resolve(&self.state.answers)
    }

    fn default_successor(&self, from: ScreenId) -> FlowResult<ScreenId> {
        self.branches
            .default_target(from)
            .ok_or_else(|| FlowError::transition(from, "no default route"))
    }

    fn complete_gallery(&mut self, cause: CompletionCause, now: Instant) -> FlowResult<ScreenId> {
        let from = self.state.screen;
        let generation = match (from, self.carousel()) {
            (ScreenId::Gallery, Some(carousel)) => carousel.generation(),
            _ => return Err(FlowError::transition(from, "no gallery on screen")),
        };
        let to = self.default_successor(from)?;

        tracing::info!(?cause, "gallery complete");
        self.events.push(FlowEvent::GalleryCompleted {
            session: self.state.session,
            generation,
            cause,
        });
        self.transition(to, now)?;
        Ok(to)
    }

    fn transition(&mut self, to: ScreenId, at: Instant) -> FlowResult<()> {
        let from = self.state.screen;

        self.state.pending = None;
        if let Some(carousel) = self.carousel.as_mut() {
            carousel.reset();
        }

        if to == ScreenId::Gallery {
            let carousel = self
                .carousel
                .as_mut()
                .ok_or_else(|| FlowError::transition(from, "gallery is not configured"))?;
            carousel.start(at)?;
        }

        self.state.screen = to;
        tracing::info!(session = self.state.session, %from, %to, "screen changed");
        self.events.push(FlowEvent::ScreenChanged {
            session: self.state.session,
            from,
            to,
        });
        Ok(())
    }
}
