//! Episode server selection.
//!
//! An episode exposes up to five optional source fields. `compute_servers`
//! turns the present ones into a priority-ordered list, and `ServerSelector`
//! tracks which one the user is watching. The selector is keyed by episode
//! slug: navigating to a different slug drops the options and the explicit
//! choice, and any data that arrives for a slug other than the current one is
//! discarded.

use crate::models::{EpisodeRecord, ServerOption, SourceField};

/// Candidate servers for an episode, lowest priority number first.
pub fn compute_servers(episode: &EpisodeRecord) -> Vec<ServerOption> {
    let mut servers: Vec<ServerOption> = SourceField::ALL
        .iter()
        .filter_map(|&field| {
            let url = episode.source(field)?.trim();
            if url.is_empty() {
                return None;
            }
            Some(ServerOption {
                id: field.id().to_string(),
                name: field.label().to_string(),
                url: url.to_string(),
                priority: field.priority(),
            })
        })
        .collect();
    servers.sort_by_key(|s| s.priority);
    servers
}

/// The user's explicit choice, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Selected(String),
}

/// What the playback screen should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerListState {
    /// No episode requested yet.
    Idle,
    Loading,
    Error(String),
    /// The episode loaded but carries no playable source.
    Empty,
    Available(usize),
}

#[derive(Debug, Clone)]
enum Phase {
    Loading,
    Error(String),
    Loaded,
}

/// Server list and selection for the episode currently on screen.
#[derive(Debug, Clone, Default)]
pub struct ServerSelector {
    episode: Option<String>,
    phase: Option<Phase>,
    record: Option<EpisodeRecord>,
    servers: Vec<ServerOption>,
    selection: Selection,
}

impl ServerSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded record for the current episode, if it has arrived.
    pub fn record(&self) -> Option<&EpisodeRecord> {
        self.record.as_ref()
    }

    /// Switch to `slug`. A different slug resets options and selection;
    /// the same slug is a no-op. Returns whether a reset happened.
    pub fn navigate(&mut self, slug: &str) -> bool {
        if self.episode.as_deref() == Some(slug) {
            return false;
        }
        tracing::debug!(from = ?self.episode, to = slug, "Episode changed, resetting server selection");
        self.episode = Some(slug.to_string());
        self.phase = Some(Phase::Loading);
        self.record = None;
        self.servers.clear();
        self.selection = Selection::Unselected;
        true
    }

    /// Apply fetched episode data. Ignored (returns `false`) when the record
    /// is for a different episode than the current key.
    pub fn apply_episode(&mut self, episode: &EpisodeRecord) -> bool {
        if self.episode.as_deref() != Some(episode.slug.as_str()) {
            tracing::debug!(slug = %episode.slug, current = ?self.episode, "Discarding stale episode data");
            return false;
        }
        self.servers = compute_servers(episode);
        self.record = Some(episode.clone());
        self.phase = Some(Phase::Loaded);
        if let Selection::Selected(id) = &self.selection {
            if !self.servers.iter().any(|s| &s.id == id) {
                self.selection = Selection::Unselected;
            }
        }
        true
    }

    /// Record a failed fetch for `slug`. Ignored for stale slugs.
    pub fn apply_error(&mut self, slug: &str, message: impl Into<String>) -> bool {
        if self.episode.as_deref() != Some(slug) {
            return false;
        }
        self.phase = Some(Phase::Error(message.into()));
        true
    }

    /// Explicitly choose a server. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> Option<&ServerOption> {
        let index = self.servers.iter().position(|s| s.id == id)?;
        self.selection = Selection::Selected(id.to_string());
        self.servers.get(index)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn servers(&self) -> &[ServerOption] {
        &self.servers
    }

    /// The selected server, or the default (first) one.
    pub fn active(&self) -> Option<&ServerOption> {
        if let Selection::Selected(id) = &self.selection {
            if let Some(server) = self.servers.iter().find(|s| &s.id == id) {
                return Some(server);
            }
        }
        self.servers.first()
    }

    pub fn state(&self) -> ServerListState {
        match &self.phase {
            None => ServerListState::Idle,
            Some(Phase::Loading) => ServerListState::Loading,
            Some(Phase::Error(msg)) => ServerListState::Error(msg.clone()),
            Some(Phase::Loaded) if self.servers.is_empty() => ServerListState::Empty,
            Some(Phase::Loaded) => ServerListState::Available(self.servers.len()),
        }
    }
}
