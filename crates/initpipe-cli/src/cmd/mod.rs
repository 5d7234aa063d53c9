pub mod apply;
pub mod blueprint;
pub mod cleanup;
pub mod docs;
pub mod scaffold;
pub mod stage;

use anyhow::Context;
use initpipe_core::io::{self, StateLock};
use initpipe_core::paths;
use initpipe_core::InitError;
use initpipe_core::state::InitState;
use std::path::Path;

/// Take the state lock for a command that mutates a started pipeline.
/// Fails with "not started" before `start`, without touching the disk.
pub fn lock(root: &Path) -> anyhow::Result<StateLock> {
    if !InitState::exists(root) {
        return Err(InitError::NotStarted).context("cannot modify init state");
    }
    StateLock::acquire(root).context("cannot modify init state")
}

/// Take the lock only when the pipeline has been started; commands that
/// merely record into an existing state must not create `init/` themselves.
pub fn lock_if_started(root: &Path) -> anyhow::Result<Option<StateLock>> {
    if InitState::exists(root) {
        Ok(Some(lock(root)?))
    } else {
        Ok(None)
    }
}

/// `start` is the only command that creates `init/`.
pub fn lock_for_start(root: &Path) -> anyhow::Result<StateLock> {
    io::ensure_dir(&paths::init_dir(root)).context("failed to create init/")?;
    StateLock::acquire(root).context("cannot modify init state")
}

pub fn load_state(root: &Path) -> anyhow::Result<InitState> {
    InitState::load(root).context("failed to load init state")
}

pub fn save_state(root: &Path, state: &InitState) -> anyhow::Result<()> {
    state.save(root).context("failed to save init state")
}
