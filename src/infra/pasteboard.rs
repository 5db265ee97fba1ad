//! External request source backed by a pasteboard.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::{link::parse_session_link, request::ExternalRequest};

/// Shared text buffer the user copies session links into.
pub trait Pasteboard {
    fn contents(&self) -> Option<String>;

    /// Clear the pasteboard if it still holds `expected`.
    fn clear_if(&self, expected: &str) -> bool;
}

/// Produces at most one pending request per poll.
pub trait RequestSource {
    fn poll_pending_request(&mut self) -> Option<ExternalRequest>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPasteboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(text: impl Into<String>) -> Self {
        let pasteboard = Self::new();
        pasteboard.set(text);
        pasteboard
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.into());
    }
}

impl Pasteboard for MemoryPasteboard {
    fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn clear_if(&self, expected: &str) -> bool {
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        if contents.as_deref() == Some(expected) {
            *contents = None;
            true
        } else {
            false
        }
    }
}

/// Picks up session links from a pasteboard, clearing the pasteboard when a
/// link is taken.
pub struct PasteboardSource<P> {
    pasteboard: P,
}

impl<P: Pasteboard> PasteboardSource<P> {
    pub fn new(pasteboard: P) -> Self {
        Self { pasteboard }
    }
}

impl<P: Pasteboard> RequestSource for PasteboardSource<P> {
    fn poll_pending_request(&mut self) -> Option<ExternalRequest> {
        let text = self.pasteboard.contents()?;
        let session = match parse_session_link(&text) {
            Ok(session) => session,
            Err(e) => {
                debug!("Pasteboard holds no session link: {}", e);
                return None;
            }
        };
        // Content replaced since the read stays where it is.
        if !self.pasteboard.clear_if(&text) {
            return None;
        }
        debug!("Took session {} from pasteboard", session.topic);
        Some(ExternalRequest::SessionLink(session))
    }
}
