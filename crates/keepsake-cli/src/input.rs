use keepsake_runtime::{FlowCommand, FlowSnapshot};
use keepsake_schema::ScreenId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Continue,
    Choose(usize),
    NextMemory,
    Restart,
    Quit,
    Unknown,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Continue,
            "n" | "next" => Input::NextMemory,
            "r" | "restart" => Input::Restart,
            "q" | "quit" | "exit" => Input::Quit,
            other => match other.parse::<usize>() {
                Ok(number) if number > 0 => Input::Choose(number),
                _ => Input::Unknown,
            },
        }
    }
}

/// What a keypress means on the screen in `snapshot`. `None` when it means
/// nothing there.
pub fn command_for(input: Input, snapshot: &FlowSnapshot) -> Option<FlowCommand> {
    match (input, snapshot.screen) {
        (Input::Restart, _) => Some(FlowCommand::Restart),
        (Input::Continue, ScreenId::Welcome) => Some(FlowCommand::Advance),
        (Input::Continue, ScreenId::Gallery) => Some(FlowCommand::CompleteGallery),
        (Input::Continue, screen) if screen.is_passive() => Some(FlowCommand::Acknowledge),
        (Input::NextMemory, ScreenId::Gallery) => Some(FlowCommand::NextMemory),
        (Input::Choose(number), ScreenId::Question(_)) => {
            let question = snapshot.question.as_ref()?;
            let answer = question.options.get(number - 1)?;
            Some(FlowCommand::SubmitAnswer {
                question_id: question.id.clone(),
                answer: answer.clone(),
            })
        }
        _ => None,
    }
}
