//! Editor event adapter.
//!
//! The host editor reports focus, save and modification events for open
//! documents. Each relevant event becomes one heartbeat pushed into the
//! buffer. Producers never wait on provisioning or dispatch.

use crate::heartbeat::{Heartbeat, HeartbeatError, HeartbeatSender, Timestamp};
use crate::transparency::SharedTransparencyLog;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name and version of the host editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub name: String,
    pub version: String,
}

impl HostInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Identity passed to the reporter, e.g. `vim/9.1 vim-wakatime/0.1.0`.
    pub fn plugin_identity(&self, plugin_version: &str) -> String {
        format!(
            "{name}/{version} {name}-wakatime/{plugin_version}",
            name = self.name,
            version = self.version
        )
    }
}

/// An open document as seen by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub line_number: Option<NonZeroU32>,
    #[serde(default)]
    pub cursor_position: Option<u64>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            line_number: None,
            cursor_position: None,
            project: None,
            language: None,
        }
    }

    pub fn line_count(&self) -> u32 {
        u32::try_from(self.content.lines().count()).unwrap_or(u32::MAX)
    }
}

/// Notifications delivered by the host editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditorEvent {
    /// A document gained or lost focus.
    Focus {
        #[serde(flatten)]
        document: Document,
        active: bool,
    },
    /// A document was written to disk.
    Saved {
        #[serde(flatten)]
        document: Document,
    },
    /// A document's buffer changed.
    Modified {
        #[serde(flatten)]
        document: Document,
    },
}

impl EditorEvent {
    pub fn document(&self) -> &Document {
        match self {
            EditorEvent::Focus { document, .. }
            | EditorEvent::Saved { document }
            | EditorEvent::Modified { document } => document,
        }
    }

    /// The heartbeat this event produces at `timestamp`.
    ///
    /// Focus loss produces nothing. Saves are writes; modifications mark the
    /// entity as unsaved.
    pub fn to_heartbeat(&self, timestamp: Timestamp) -> Result<Option<Heartbeat>, HeartbeatError> {
        let (is_write, is_unsaved) = match self {
            EditorEvent::Focus { active: false, .. } => return Ok(None),
            EditorEvent::Focus { .. } => (false, false),
            EditorEvent::Saved { .. } => (true, false),
            EditorEvent::Modified { .. } => (false, true),
        };

        let document = self.document();
        let entity = entity_for(&document.path)?;
        let mut heartbeat = Heartbeat::new(entity, timestamp)?
            .with_line_count(document.line_count())
            .with_write(is_write)
            .with_unsaved_file(is_unsaved);

        if let Some(line) = document.line_number {
            heartbeat = heartbeat.with_line_number(line);
        }
        if let Some(cursor) = document.cursor_position {
            heartbeat = heartbeat.with_cursor_position(cursor);
        }
        if let Some(project) = &document.project {
            heartbeat = heartbeat.with_project(project.clone());
        }
        if let Some(language) = &document.language {
            heartbeat = heartbeat.with_language(language.clone());
        }

        Ok(Some(heartbeat))
    }
}

fn entity_for(path: &Path) -> Result<String, HeartbeatError> {
    let entity = path.to_string_lossy().into_owned();
    if entity.is_empty() {
        return Err(HeartbeatError::EmptyEntity);
    }
    if !path.is_absolute() {
        return Err(HeartbeatError::RelativeEntity(entity));
    }
    Ok(entity)
}

/// Turns editor events into buffered heartbeats.
#[derive(Debug, Clone)]
pub struct HeartbeatProducer {
    sender: HeartbeatSender,
    log: SharedTransparencyLog,
}

impl HeartbeatProducer {
    pub fn new(sender: HeartbeatSender, log: SharedTransparencyLog) -> Self {
        Self { sender, log }
    }

    /// Handle one editor event. Returns whether a heartbeat was queued.
    pub fn on_event(&self, event: &EditorEvent) -> Result<bool, HeartbeatError> {
        match event.to_heartbeat(Timestamp::now())? {
            Some(heartbeat) => {
                debug!(entity = heartbeat.entity(), "heartbeat captured");
                self.sender.push(heartbeat);
                self.log.record_heartbeat_captured();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatBuffer;
    use crate::transparency::create_shared_log;

    fn absolute(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_plugin_identity() {
        let host = HostInfo::new("vim", "9.1");
        assert_eq!(host.plugin_identity("0.1.0"), "vim/9.1 vim-wakatime/0.1.0");
    }

    #[test]
    fn test_saved_event_is_write() {
        let event = EditorEvent::Saved {
            document: Document::new(absolute("main.rs"), "fn main() {}\n\nmod x;\n"),
        };
        let hb = event
            .to_heartbeat(Timestamp::from_ticks(1))
            .unwrap()
            .unwrap();

        assert_eq!(hb.line_count(), Some(3));
        assert!(hb.is_write());
        assert!(!hb.is_unsaved_file());
        assert!(!hb.is_building());
    }

    #[test]
    fn test_modified_event_is_unsaved() {
        let event = EditorEvent::Modified {
            document: Document::new(absolute("notes.md"), ""),
        };
        let hb = event.to_heartbeat(Timestamp::from_ticks(1)).unwrap().unwrap();
        assert_eq!(hb.line_count(), Some(0));
        assert!(!hb.is_write());
        assert!(hb.is_unsaved_file());
    }

    #[test]
    fn test_focus_loss_produces_nothing() {
        let event = EditorEvent::Focus {
            document: Document::new(absolute("a.rs"), "x"),
            active: false,
        };
        assert_eq!(event.to_heartbeat(Timestamp::from_ticks(1)).unwrap(), None);
    }

    #[test]
    fn test_relative_path_rejected() {
        let event = EditorEvent::Saved {
            document: Document::new("src/main.rs", ""),
        };
        assert!(matches!(
            event.to_heartbeat(Timestamp::from_ticks(1)),
            Err(HeartbeatError::RelativeEntity(_))
        ));
    }

    #[test]
    fn test_optional_document_fields_flow_through() {
        let mut document = Document::new(absolute("lib.rs"), "a\nb");
        document.line_number = NonZeroU32::new(2);
        document.cursor_position = Some(3);
        document.project = Some("agent".into());
        document.language = Some("Rust".into());

        let hb = EditorEvent::Focus {
            document,
            active: true,
        }
        .to_heartbeat(Timestamp::from_ticks(1))
        .unwrap()
        .unwrap();

        assert_eq!(hb.line_number().map(NonZeroU32::get), Some(2));
        assert_eq!(hb.cursor_position(), Some(3));
        assert_eq!(hb.project(), Some("agent"));
        assert_eq!(hb.language(), Some("Rust"));
    }

    #[test]
    fn test_event_json_shape() {
        let path = absolute("x.rs");
        let json = serde_json::json!({
            "kind": "focus",
            "path": path,
            "content": "one\ntwo",
            "active": true
        });
        let event: EditorEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(event, EditorEvent::Focus { active: true, .. }));
        assert_eq!(event.document().line_count(), 2);
    }

    #[test]
    fn test_producer_pushes_and_counts() {
        let buffer = HeartbeatBuffer::new();
        let log = create_shared_log();
        let producer = HeartbeatProducer::new(buffer.sender(), log.clone());

        let saved = EditorEvent::Saved {
            document: Document::new(absolute("a.rs"), "x"),
        };
        let blur = EditorEvent::Focus {
            document: Document::new(absolute("a.rs"), "x"),
            active: false,
        };

        assert!(producer.on_event(&saved).unwrap());
        assert!(!producer.on_event(&blur).unwrap());
        assert_eq!(buffer.len(), 1);
        assert_eq!(log.stats().heartbeats_captured, 1);
    }
}
