use core_types::{Category, DocumentUrl, HighlightDescriptor};
use std::sync::mpsc::{self, Receiver, Sender};

/// Stored category choices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryState {
    pub recent: Option<Category>,
    /// Custom categories, oldest first, without duplicates.
    pub categories: Vec<Category>,
}

#[derive(Debug)]
pub enum StoreCommand {
    // Highlights
    Load {
        url: DocumentUrl,
        reply: Sender<Result<Vec<HighlightDescriptor>, String>>,
    },
    /// Replaces the whole list stored for `url`.
    Save {
        url: DocumentUrl,
        descriptors: Vec<HighlightDescriptor>,
    },
    // Categories
    RememberCategory {
        category: Category,
    },
    LoadCategories {
        reply: Sender<Result<CategoryState, String>>,
    },
    // Lifecycle
    /// Answered once every command sent before it has been applied.
    Flush {
        reply: Sender<()>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Saved { url: DocumentUrl, count: usize },
    CategoryRemembered { category: Category },
    Failed { url: Option<DocumentUrl>, error: String },
}

pub struct Bus {
    pub cmd_tx: Sender<StoreCommand>,
    pub evt_rx: Receiver<StoreEvent>,
    pub evt_tx: Sender<StoreEvent>, // shareable for runtimes
}

impl Bus {
    /// A fresh bus plus the command receiver to hand to a runtime.
    pub fn open() -> (Bus, Receiver<StoreCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        (
            Bus {
                cmd_tx,
                evt_rx,
                evt_tx,
            },
            cmd_rx,
        )
    }
}
