use keepsake_core::{MediaResolver, MediaSet};
use keepsake_runtime::FlowSnapshot;
use keepsake_schema::{CompletionCause, FlowEvent, GroupId, ScreenId};

/// Turns driver snapshots into terminal text. A screen is drawn once per
/// session; after that only gallery rotations are drawn.
pub struct TerminalRenderer {
    resolver: Box<dyn MediaResolver>,
    drawn: Option<Drawn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Drawn {
    session: u64,
    screen: ScreenId,
    carousel_index: Option<usize>,
}

impl TerminalRenderer {
    pub fn new(resolver: Box<dyn MediaResolver>) -> Self {
        Self {
            resolver,
            drawn: None,
        }
    }

    pub fn render_snapshot(&mut self, snapshot: &FlowSnapshot) -> Vec<String> {
        let now = Drawn {
            session: snapshot.session,
            screen: snapshot.screen,
            carousel_index: snapshot.carousel_index,
        };
        let previous = self.drawn.replace(now);

        match previous {
            Some(prev) if prev.session == now.session && prev.screen == now.screen => {
                if prev.carousel_index != now.carousel_index {
                    self.memory(snapshot)
                } else {
                    Vec::new()
                }
            }
            _ => self.screen(snapshot),
        }
    }

    /// Lines for events that leave no trace in the snapshot.
    pub fn render_event(&self, event: &FlowEvent) -> Vec<String> {
        match event {
            FlowEvent::AnswerRecorded { answer, .. } => vec![format!("  ✓ {answer}")],
            FlowEvent::GalleryCompleted {
                cause: CompletionCause::Deadline,
                ..
            } => vec!["  (time's up for the slideshow)".to_string()],
            _ => Vec::new(),
        }
    }

    fn screen(&self, snapshot: &FlowSnapshot) -> Vec<String> {
        let screen = snapshot.screen;
        let mut lines = vec![String::new(), format!("── {screen} ──")];
        match screen {
            ScreenId::Welcome => {
                lines.push("Happy Birthday".to_string());
                lines.extend(snapshot.copy.clone());
                lines.push("[Enter] Let's begin".to_string());
            }
            ScreenId::Question(_) => {
                if let Some(progress) = snapshot.progress {
                    lines.push(format!(
                        "Question {} of {} ({}%)",
                        progress.number,
                        progress.total,
                        progress.percent()
                    ));
                }
                if let Some(question) = &snapshot.question {
                    lines.push(question.prompt.clone());
                    for (number, option) in question.options.iter().enumerate() {
                        lines.push(format!("  {}. {option}", number + 1));
                    }
                }
            }
            ScreenId::Gallery => {
                lines.extend(self.memory(snapshot));
                lines.push("[n] next memory  [Enter] continue".to_string());
            }
            ScreenId::Video(_) => {
                if let Some(key) = &snapshot.video {
                    lines.push(format!("▶ {}", self.resolver.resolve_video(key)));
                }
                lines.push("[Enter] when the video ends".to_string());
            }
            ScreenId::ReassuranceText | ScreenId::Affirmation | ScreenId::FinalClosure => {
                lines.extend(snapshot.copy.clone());
                lines.push("[Enter] continue".to_string());
            }
            ScreenId::Surprise => {
                lines.extend(snapshot.copy.clone());
                lines.extend(snapshot.closing_message.clone());
                lines.push("[r] start over  [q] quit".to_string());
            }
        }
        lines
    }

    fn memory(&self, snapshot: &FlowSnapshot) -> Vec<String> {
        let Some(group) = &snapshot.group_id else {
            return Vec::new();
        };

        let mut lines = self.media(group);
        if let Some(caption) = &snapshot.caption {
            lines.push(format!("  “{caption}”"));
        }
        lines
    }

    fn media(&self, group: &GroupId) -> Vec<String> {
        let set = MediaSet::resolve(group, self.resolver.as_ref());
        vec![
            format!("  [{group}]"),
            format!("    main:  {}", set.main),
            format!("    left:  {}", set.left),
            format!("    right: {}", set.right),
        ]
    }
}
