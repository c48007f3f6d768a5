//! Async driver for the screen flow.
//!
//! The controller is a plain state machine that needs to be told what time it
//! is. `FlowDriver` owns it on a single task, sleeps until the controller's
//! next deadline, applies host commands as they arrive and forwards every
//! `FlowEvent` to the bus.

use anyhow::{anyhow, Result};
use keepsake_bus::BusPublisher;
use keepsake_core::{FlowError, FlowResult, ScreenFlowController};
use keepsake_schema::{GroupId, Progress, QuestionId, QuestionSpec, ScreenId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowCommand {
    Start,
    Restart,
    Advance,
    SubmitAnswer {
        question_id: QuestionId,
        answer: String,
    },
    Acknowledge,
    NextMemory,
    CompleteGallery,
}

/// Everything a renderer draws, read off the controller after each change.
/// Renderers never keep flow state of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub screen: ScreenId,
    pub session: u64,
    pub carousel_index: Option<usize>,
    pub group_id: Option<GroupId>,
    pub caption: Option<String>,
    pub pending_target: Option<ScreenId>,
    pub question: Option<QuestionSpec>,
    pub progress: Option<Progress>,
    pub selected_option: Option<String>,
    pub video: Option<String>,
    pub copy: Option<String>,
    /// Only set on the surprise screen, once the answers are final.
    pub closing_message: Option<String>,
}

impl FlowSnapshot {
    pub fn capture(controller: &ScreenFlowController) -> Self {
        let screen = controller.current_screen();
        let carousel = controller.carousel();
        Self {
            screen,
            session: controller.session(),
            carousel_index: carousel.map(|carousel| carousel.index()),
            group_id: controller.current_group().map(|group| group.id.clone()),
            caption: carousel
                .and_then(|carousel| carousel.current_caption())
                .map(str::to_string),
            pending_target: controller.pending_target(),
            question: controller.current_question().cloned(),
            progress: controller.progress(),
            selected_option: controller.selected_option().map(str::to_string),
            video: controller.current_video().map(str::to_string),
            copy: controller.copy_for(screen).map(str::to_string),
            closing_message: (screen == ScreenId::Surprise)
                .then(|| controller.closing_message().to_string()),
        }
    }
}

struct Request {
    command: FlowCommand,
    reply: oneshot::Sender<FlowResult<FlowSnapshot>>,
}

pub struct FlowDriver {
    controller: ScreenFlowController,
    publisher: BusPublisher,
    commands: mpsc::Receiver<Request>,
    snapshot: watch::Sender<FlowSnapshot>,
}

impl FlowDriver {
    pub fn new(controller: ScreenFlowController, publisher: BusPublisher) -> (Self, FlowHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot, snapshot_rx) = watch::channel(FlowSnapshot::capture(&controller));

        let driver = Self {
            controller,
            publisher,
            commands,
            snapshot,
        };
        let handle = FlowHandle {
            tx,
            snapshot: snapshot_rx,
        };
        (driver, handle)
    }

    /// Runs until every `FlowHandle` has been dropped.
    pub async fn run(mut self) {
        loop {
            let wake_at = self.controller.next_deadline();
            tokio::select! {
                maybe_request = self.commands.recv() => {
                    let Some(request) = maybe_request else {
                        break;
                    };
                    self.fire_due_timers();
                    let result = self.apply(request.command);
                    self.flush().await;
                    let _ = request.reply.send(result.map(|_| self.current_snapshot()));
                }
                _ = tokio::time::sleep_until(wake_at.unwrap_or_else(Instant::now)), if wake_at.is_some() => {
                    self.fire_due_timers();
                    self.flush().await;
                }
            }
        }
        tracing::debug!("flow driver stopped");
    }

    fn apply(&mut self, command: FlowCommand) -> FlowResult<()> {
        let now = Instant::now();
        let result = match &command {
            FlowCommand::Start => {
                self.controller.start();
                Ok(())
            }
            FlowCommand::Restart => {
                self.controller.restart();
                Ok(())
            }
            FlowCommand::Advance => self.controller.advance(now).map(|_| ()),
            FlowCommand::SubmitAnswer {
                question_id,
                answer,
            } => self
                .controller
                .submit_answer(question_id, answer.as_str(), now)
                .map(|_| ()),
            FlowCommand::Acknowledge => self.controller.acknowledge(now).map(|_| ()),
            FlowCommand::NextMemory => self.controller.next_memory(now).map(|_| ()),
            FlowCommand::CompleteGallery => self.controller.on_gallery_complete(now).map(|_| ()),
        };

        if let Err(err) = &result {
            tracing::warn!(?command, %err, "flow command rejected");
        }
        result
    }

    fn fire_due_timers(&mut self) {
        if let Err(err) = self.controller.poll(Instant::now()) {
            tracing::warn!(%err, "timer handling failed");
        }
    }

    async fn flush(&mut self) {
        for event in self.controller.take_events() {
            if let Err(err) = self.publisher.publish(event).await {
                tracing::warn!(%err, "failed to publish flow event");
            }
        }
        self.snapshot.send_replace(self.current_snapshot());
    }

    fn current_snapshot(&self) -> FlowSnapshot {
        FlowSnapshot::capture(&self.controller)
    }
}

/// Cloneable command side of a running `FlowDriver`.
#[derive(Clone)]
pub struct FlowHandle {
    tx: mpsc::Sender<Request>,
    snapshot: watch::Receiver<FlowSnapshot>,
}

impl FlowHandle {
    /// Sends a command and waits for the driver to apply it. Controller
    /// rejections come back as a `FlowError` inside the `anyhow` error.
    pub async fn send(&self, command: FlowCommand) -> Result<FlowSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| anyhow!("flow driver is not running"))?;
        let result = rx
            .await
            .map_err(|_| anyhow!("flow driver dropped the request"))?;
        Ok(result?)
    }

    pub async fn start(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::Start).await
    }

    pub async fn restart(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::Restart).await
    }

    pub async fn advance(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::Advance).await
    }

    pub async fn submit_answer(
        &self,
        question_id: impl Into<QuestionId>,
        answer: impl Into<String>,
    ) -> Result<FlowSnapshot> {
        self.send(FlowCommand::SubmitAnswer {
            question_id: question_id.into(),
            answer: answer.into(),
        })
        .await
    }

    pub async fn acknowledge(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::Acknowledge).await
    }

    pub async fn next_memory(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::NextMemory).await
    }

    pub async fn complete_gallery(&self) -> Result<FlowSnapshot> {
        self.send(FlowCommand::CompleteGallery).await
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FlowSnapshot> {
        self.snapshot.clone()
    }
}

/// Pulls the controller error back out of a handle result, if that is what
/// it was.
pub fn flow_error(err: &anyhow::Error) -> Option<&FlowError> {
    err.downcast_ref::<FlowError>()
}
