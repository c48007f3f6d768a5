use keepsake_schema::QuestionId;
use serde::{Deserialize, Serialize};

use crate::{AnswerMatch, Answers};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingRule {
    pub question: QuestionId,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub when: AnswerMatch,
    pub message: String,
}

/// Picks the reveal message from earlier answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingConfig {
    #[serde(default)]
    pub default_message: String,
    #[serde(default)]
    pub rules: Vec<ClosingRule>,
}

impl ClosingConfig {
    pub fn resolve<'a>(&'a self, answers: &Answers) -> &'a str {
        self.rules
            .iter()
            .find(|rule| {
                answers
                    .get(&rule.question)
                    .map(|answer| rule.when.matches(answer))
                    .unwrap_or(false)
            })
            .map(|rule| rule.message.as_str())
            .unwrap_or(self.default_message.as_str())
    }
}
