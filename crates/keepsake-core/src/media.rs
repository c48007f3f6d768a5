use keepsake_schema::{GroupId, MediaSlot};

/// Host-supplied mapping from opaque media keys to URLs or paths.
pub trait MediaResolver: Send + Sync {
    fn resolve(&self, group: &GroupId, slot: MediaSlot) -> String;

    /// Videos are configured as opaque keys; the default passes them through.
    fn resolve_video(&self, key: &str) -> String {
        key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSet {
    pub main: String,
    pub left: String,
    pub right: String,
}

impl MediaSet {
    pub fn resolve(group: &GroupId, resolver: &dyn MediaResolver) -> Self {
        Self {
            main: resolver.resolve(group, MediaSlot::Main),
            left: resolver.resolve(group, MediaSlot::Left),
            right: resolver.resolve(group, MediaSlot::Right),
        }
    }

    pub fn get(&self, slot: MediaSlot) -> &str {
        match slot {
            MediaSlot::Main => &self.main,
            MediaSlot::Left => &self.left,
            MediaSlot::Right => &self.right,
        }
    }
}
