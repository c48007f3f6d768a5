use std::collections::{HashSet, VecDeque};

use keepsake_schema::ScreenId;
use serde::{Deserialize, Serialize};

/// How a conditional route matches the answer given on its screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMatch {
    Equals(String),
    Contains(String),
}

impl AnswerMatch {
    pub fn matches(&self, answer: &str) -> bool {
        match self {
            AnswerMatch::Equals(expected) => answer == expected,
            AnswerMatch::Contains(needle) => answer.contains(needle.as_str()),
        }
    }
}

/// One row of the branch table. A route without `when` is the default
/// successor of its `from` screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub from: ScreenId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub when: Option<AnswerMatch>,
    pub to: ScreenId,
}

impl Route {
    pub fn then(from: ScreenId, to: ScreenId) -> Self {
        Self {
            from,
            when: None,
            to,
        }
    }

    pub fn when(from: ScreenId, when: AnswerMatch, to: ScreenId) -> Self {
        Self {
            from,
            when: Some(when),
            to,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTable {
    routes: Vec<Route>,
}

impl BranchTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_target(&self, from: ScreenId) -> Option<ScreenId> {
        self.routes
            .iter()
            .find(|route| route.from == from && route.when.is_none())
            .map(|route| route.to)
    }

    /// First conditional route (in table order) accepting `answer`, else the
    /// screen's default.
    pub fn resolve(&self, from: ScreenId, answer: Option<&str>) -> Option<ScreenId> {
        if let Some(answer) = answer {
            let matched = self
                .routes
                .iter()
                .filter(|route| route.from == from)
                .find(|route| {
                    route
                        .when
                        .as_ref()
                        .map(|when| when.matches(answer))
                        .unwrap_or(false)
                });
            if let Some(route) = matched {
                return Some(route.to);
            }
        }
        self.default_target(from)
    }

    pub fn successors(&self, from: ScreenId) -> impl Iterator<Item = ScreenId> + '_ {
        self.routes
            .iter()
            .filter(move |route| route.from == from)
            .map(|route| route.to)
    }

    /// Every screen reachable from `start`, `start` included.
    pub fn reachable_from(&self, start: ScreenId) -> HashSet<ScreenId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(screen) = queue.pop_front() {
            for next in self.successors(screen) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}
