use std::path::PathBuf;

use keepsake_core::MediaResolver;
use keepsake_schema::{GroupId, MediaSlot};

/// Media laid out on disk as `<root>/<group>/<1|2|3>.<ext>` and
/// `<root>/videos/<key>.mp4`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
    extension: String,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "jpg".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl MediaResolver for DirectoryResolver {
    fn resolve(&self, group: &GroupId, slot: MediaSlot) -> String {
        self.root
            .join(group.as_str())
            .join(format!("{}.{}", slot.ordinal(), self.extension))
            .display()
            .to_string()
    }

    fn resolve_video(&self, key: &str) -> String {
        self.root
            .join("videos")
            .join(format!("{key}.mp4"))
            .display()
            .to_string()
    }
}
