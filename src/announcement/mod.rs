//! Interstitial announcement shown before a wrapped view.

pub mod flags;

use std::fmt::Display;

use thiserror::Error;

use crate::model::Visibility;
use flags::SeenFlags;

#[derive(Error, Debug)]
pub enum AnnouncementError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Malformed announcement state: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    ShowingAnnouncement,
    ShowingNextView,
}

/// What the announcement panel displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementView {
    pub headline: String,
    pub content: String,
    pub button_label: String,
}

impl Display for AnnouncementView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}!", self.headline)?;
        writeln!(f)?;
        writeln!(f, "{}", self.content)?;
        writeln!(f)?;
        write!(f, "[ {} ]", self.button_label)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Rendered<'a, V> {
    Announcement(&'a AnnouncementView),
    NextView(&'a V),
}

/// Gates `next_view` behind an announcement according to `visibility`.
pub struct Announcement<V> {
    pub id: String,
    pub visibility: Visibility,
    pub view: AnnouncementView,
    next_view: V,
    // Set by `proceed`, lives as long as this instance.
    should_view_next: bool,
}

impl<V> Announcement<V> {
    pub fn new(id: &str, visibility: Visibility, view: AnnouncementView, next_view: V) -> Self {
        Announcement {
            id: id.into(),
            visibility,
            view,
            next_view,
            should_view_next: false,
        }
    }

    pub fn state(&self, flags: &impl SeenFlags) -> Result<GateState, AnnouncementError> {
        let show_next = match self.visibility {
            Visibility::None => true,
            Visibility::Always => self.should_view_next,
            Visibility::Once => flags.get(&self.id)?,
        };
        Ok(if show_next {
            GateState::ShowingNextView
        } else {
            GateState::ShowingAnnouncement
        })
    }

    pub fn render(&self, flags: &impl SeenFlags) -> Result<Rendered<'_, V>, AnnouncementError> {
        Ok(match self.state(flags)? {
            GateState::ShowingNextView => Rendered::NextView(&self.next_view),
            GateState::ShowingAnnouncement => Rendered::Announcement(&self.view),
        })
    }

    /// The user dismissed the announcement. Nothing is recorded when the
    /// announcement is never shown.
    pub fn proceed(&mut self, flags: &mut impl SeenFlags) -> Result<(), AnnouncementError> {
        if self.visibility == Visibility::None {
            return Ok(());
        }
        flags.set(&self.id, true)?;
        self.should_view_next = true;
        log::info!("announcement {} dismissed", self.id);
        Ok(())
    }
}
