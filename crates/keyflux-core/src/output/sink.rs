// Output sink abstraction: the engine emits through this, the uinput
// device implements it, and tests record against it.

use std::fmt;

use crate::Key;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to create virtual device: {0}")]
    Create(String),

    #[error("failed to write output event: {0}")]
    Write(String),
}

/// Consumer of synthesized key events. `sync` marks the end of an atomic
/// event group and must follow every logical action boundary.
pub trait Sink {
    fn press(&mut self, key: Key) -> Result<(), OutputError>;
    fn release(&mut self, key: Key) -> Result<(), OutputError>;
    fn sync(&mut self) -> Result<(), OutputError>;
}

/// One recorded sink event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Press(Key),
    Release(Key),
    Sync,
}

impl fmt::Display for SinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkEvent::Press(k) => write!(f, "press {k}"),
            SinkEvent::Release(k) => write!(f, "release {k}"),
            SinkEvent::Sync => write!(f, "sync"),
        }
    }
}

/// In-memory sink for tests and `--check` style dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<SinkEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events with sync markers stripped, for terser assertions.
    pub fn key_events(&self) -> Vec<SinkEvent> {
        self.events
            .iter()
            .copied()
            .filter(|e| !matches!(e, SinkEvent::Sync))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Sink for MemorySink {
    fn press(&mut self, key: Key) -> Result<(), OutputError> {
        self.events.push(SinkEvent::Press(key));
        Ok(())
    }

    fn release(&mut self, key: Key) -> Result<(), OutputError> {
        self.events.push(SinkEvent::Release(key));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), OutputError> {
        self.events.push(SinkEvent::Sync);
        Ok(())
    }
}
