//! Fire-and-forget status broadcast.
//!
//! Any number of listeners may subscribe; nobody acknowledges. A send with no
//! subscribers is dropped silently, and a subscriber that falls more than
//! [`CHANNEL_CAPACITY`] messages behind loses the oldest ones.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A batch began.
    Started { variants: u32, total: u32 },
    /// A unit is about to be submitted.
    Progress {
        variant: u32,
        unit: u32,
        units: u32,
        label: String,
    },
    /// A unit finished and its record now has asset refs.
    RecordUpdated { id: Uuid, label: String },
    /// Informational, e.g. a start request while a batch is already active.
    Info { message: String },
    /// Something in the batch failed; the batch keeps going.
    Failed { message: String },
    /// A stop request was honored after draining the current unit.
    Cancelled { label: String },
    /// The batch ended, naturally or after a cancellation.
    Completed { records: u32 },
}

impl Notification {
    /// Human-readable text shown by the UI.
    pub fn message(&self) -> String {
        match self {
            Self::Started { variants, total } => {
                format!("Process started: {total} images across {variants} prompts")
            }
            Self::Progress {
                variant,
                unit,
                units,
                label,
            } => format!("Prompt {variant}: generating image {unit}/{units} ({label})"),
            Self::RecordUpdated { label, .. } => format!("Images ready for {label}"),
            Self::Info { message } | Self::Failed { message } => message.clone(),
            Self::Cancelled { label } => format!("Process stopped after {label}"),
            Self::Completed { records } => format!("Process complete: {records} records created"),
        }
    }
}

/// The broadcast port. Cheap to clone; all clones share one channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn broadcast(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.broadcast(Notification::Info {
            message: message.into(),
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.broadcast(Notification::Failed {
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}
