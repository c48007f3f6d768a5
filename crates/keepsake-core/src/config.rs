use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use keepsake_schema::{MemoryGroup, QuestionSpec, ScreenId};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::{BranchTable, ClosingConfig, FlowError, FlowResult, Route, TimedCarousel};

const SAMPLE_CONFIG: &str = include_str!("../../../config/flow.yaml");

fn default_answer_delay_ms() -> u64 {
    500
}

fn default_period_ms() -> u64 {
    9_000
}

fn default_deadline_ms() -> Option<u64> {
    Some(45_000)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryConfig {
    pub groups: Vec<MemoryGroup>,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Wall-clock limit from gallery start, independent of how many groups
    /// were shown. `null` keeps the gallery open until the user moves on.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub captions: Vec<String>,
}

impl GalleryConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn build_carousel(&self) -> FlowResult<TimedCarousel> {
        Ok(
            TimedCarousel::new(self.groups.clone(), self.period(), self.deadline())?
                .with_captions(self.captions.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_answer_delay_ms")]
    pub answer_delay_ms: u64,
    pub questions: Vec<QuestionSpec>,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub gallery: Option<GalleryConfig>,
    /// Opaque video keys; `video:<n>` screens index into this list.
    #[serde(default)]
    pub videos: Vec<String>,
    /// Copy text per screen, handed to the renderer untouched.
    #[serde(default)]
    pub copy: BTreeMap<ScreenId, String>,
    #[serde(default)]
    pub closing: ClosingConfig,
}

impl FlowConfig {
    pub fn answer_delay(&self) -> Duration {
        Duration::from_millis(self.answer_delay_ms)
    }

    pub fn branch_table(&self) -> BranchTable {
        BranchTable::new(self.routes.clone())
    }

    fn defines(&self, screen: ScreenId) -> bool {
        match screen {
            ScreenId::Question(index) => index < self.questions.len(),
            ScreenId::Video(index) => index < self.videos.len(),
            ScreenId::Gallery => self.gallery.is_some(),
            _ => true,
        }
    }
}

pub fn sample_config() -> &'static str {
    SAMPLE_CONFIG
}

pub fn parse_config(yaml: &str) -> Result<FlowConfig> {
    let config: FlowConfig = serde_yaml::from_str(yaml).context("failed to parse flow yaml")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<FlowConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: FlowConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))?;
    validate_config(&config)
        .with_context(|| format!("invalid flow config: {}", path.display()))?;
    Ok(config)
}

pub fn validate_config(config: &FlowConfig) -> FlowResult<()> {
    validate_questions(config)?;
    validate_routes(config)?;
    validate_reachability(config)?;

    if let Some(gallery) = &config.gallery {
        gallery.build_carousel()?;
    }

    let question_ids: HashSet<_> = config.questions.iter().map(|q| &q.id).collect();
    for rule in &config.closing.rules {
        if !question_ids.contains(&rule.question) {
            return Err(FlowError::config(format!(
                "closing rule references unknown question: {}",
                rule.question
            )));
        }
    }

    for screen in config.copy.keys() {
        if !config.defines(*screen) {
            return Err(FlowError::config(format!(
                "copy references undefined screen: {screen}"
            )));
        }
    }

    Ok(())
}

fn validate_questions(config: &FlowConfig) -> FlowResult<()> {
    if config.questions.is_empty() {
        return Err(FlowError::config("at least one question is required"));
    }

    let mut seen = HashSet::new();
    for question in &config.questions {
        if !seen.insert(question.id.as_str()) {
            return Err(FlowError::config(format!(
                "duplicate question id: {}",
                question.id
            )));
        }
        if question.options.len() < 2 {
            return Err(FlowError::config(format!(
                "question {} needs at least two options",
                question.id
            )));
        }
        let distinct: HashSet<_> = question.options.iter().collect();
        if distinct.len() != question.options.len() {
            return Err(FlowError::config(format!(
                "question {} has duplicate options",
                question.id
            )));
        }
    }
    Ok(())
}

fn validate_routes(config: &FlowConfig) -> FlowResult<()> {
    let mut defaults = HashSet::new();
    for route in &config.routes {
        for screen in [route.from, route.to] {
            if !config.defines(screen) {
                return Err(FlowError::config(format!(
                    "route references undefined screen: {screen}"
                )));
            }
        }
        if route.from.is_terminal() {
            return Err(FlowError::config(format!(
                "{} is terminal and cannot have outgoing routes",
                route.from
            )));
        }
        match &route.when {
            Some(_) if route.from.question_index().is_none() => {
                return Err(FlowError::config(format!(
                    "conditional route from {} which takes no answer",
                    route.from
                )));
            }
            None if !defaults.insert(route.from) => {
                return Err(FlowError::config(format!(
                    "duplicate default target for {}",
                    route.from
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_reachability(config: &FlowConfig) -> FlowResult<()> {
    let table = config.branch_table();

    match table.default_target(ScreenId::Welcome) {
        None => {
            return Err(FlowError::config("missing default target for welcome"));
        }
        Some(ScreenId::Question(0)) => {}
        Some(other) => {
            return Err(FlowError::config(format!(
                "welcome must lead to question:0, found {other}"
            )));
        }
    }

    let reachable = table.reachable_from(ScreenId::Welcome);

    let mut ordered: Vec<_> = reachable.iter().copied().collect();
    ordered.sort();
    for screen in ordered {
        if !screen.is_terminal() && table.default_target(screen).is_none() {
            return Err(FlowError::config(format!(
                "missing default target for {screen}"
            )));
        }
    }

    for route in table.routes() {
        if !reachable.contains(&route.from) {
            return Err(FlowError::config(format!(
                "unreachable screen in routes: {}",
                route.from
            )));
        }
    }

    for (index, question) in config.questions.iter().enumerate() {
        if !reachable.contains(&ScreenId::Question(index)) {
            return Err(FlowError::config(format!(
                "question {} is unreachable",
                question.id
            )));
        }
    }

    if !reachable.contains(&ScreenId::Surprise) {
        return Err(FlowError::config("surprise is unreachable from welcome"));
    }

    Ok(())
}
