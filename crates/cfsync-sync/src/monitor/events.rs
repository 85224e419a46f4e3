//! Event mapping: `notify::Event` → [`FsEvent`]
//!
//! Only the kinds the monitor acts on survive the mapping:
//!
//! | notify kind                          | FsEventKind  |
//! |--------------------------------------|--------------|
//! | `Create(*)`                          | `Create`     |
//! | `Remove(*)`                          | `Delete`     |
//! | `Access(Close(Write))`               | `CloseWrite` |
//! | `Modify(Name(From))` + tracker       | `MovedFrom`  |
//! | `Modify(Name(To))` + tracker         | `MovedTo`    |
//!
//! `Modify(Name(Both))`, which inotify synthesizes after a matched pair, is
//! dropped: the pair itself is correlated by cookie in the monitor.

use std::path::PathBuf;

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Delete,
    CloseWrite,
    MovedFrom,
    MovedTo,
}

/// A filesystem event the monitor dispatches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub is_dir: bool,
    /// Kernel correlation id pairing `MovedFrom` with `MovedTo`
    pub cookie: Option<usize>,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            is_dir,
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: usize) -> Self {
        self.cookie = Some(cookie);
        self
    }
}

/// Converts a raw notify event, returning `None` for kinds the monitor ignores
pub fn map_notify_event(event: &notify::Event) -> Option<FsEvent> {
    if event.need_rescan() {
        warn!("Kernel event queue overflowed, changes may have been missed");
        return None;
    }

    let path = event.paths.first()?;
    let cookie = event.attrs.tracker();

    let (kind, is_dir) = match &event.kind {
        EventKind::Create(CreateKind::Folder) => (FsEventKind::Create, true),
        EventKind::Create(CreateKind::File) => (FsEventKind::Create, false),
        EventKind::Create(_) => (FsEventKind::Create, path.is_dir()),
        EventKind::Remove(RemoveKind::Folder) => (FsEventKind::Delete, true),
        EventKind::Remove(RemoveKind::File) => (FsEventKind::Delete, false),
        EventKind::Remove(_) => (FsEventKind::Delete, false),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            (FsEventKind::CloseWrite, false)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => (FsEventKind::MovedFrom, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            (FsEventKind::MovedTo, path.is_dir())
        }
        other => {
            debug!(kind = ?other, path = %path.display(), "Ignoring event");
            return None;
        }
    };

    Some(FsEvent {
        kind,
        path: path.clone(),
        is_dir,
        cookie,
    })
}
