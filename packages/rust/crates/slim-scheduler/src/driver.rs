//! Async driver: runs a session on a tokio runtime.
//!
//! One loop owns the session. Each turn drains host mutations, runs due
//! timers, gives the scheduled pass its idle slot, then sleeps until the
//! next deadline or the next command, whichever comes first.

use std::time::Duration;

use slim_host::HostTree;
use slim_types::{NodeId, TokenId};
use slim_window::{PurgeOutcome, WindowStats};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::clock::Clock;
use crate::session::Session;

/// Host-side mutation applied inside the driver loop.
pub type TreeEdit<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Commands accepted by [`drive`].
pub enum SessionCommand<T> {
    /// Change the keep-count.
    SetKeepLast(i64),
    /// Toggle automatic application.
    SetAutoApply(bool),
    /// Forced pass.
    SoftHide,
    /// Restore everything.
    ExpandAll,
    /// Restore one item by token.
    Expand(TokenId),
    /// Restore the item behind a placeholder node.
    ExpandPlaceholder(NodeId),
    /// Keep only the last exchange.
    KeepLastExchange,
    /// Flip selection mode.
    ToggleSelectionMode,
    /// Select every realized item.
    SelectAllVisible,
    /// Clear selections.
    SelectNone,
    /// Hard purge; `accept` answers the confirmation prompt.
    HardPurge {
        /// Answer to the prompt.
        accept: bool,
        /// Receives the outcome.
        reply: oneshot::Sender<PurgeOutcome>,
    },
    /// Let the host mutate the tree.
    Edit(TreeEdit<T>),
    /// Ask for current stats.
    Stats(oneshot::Sender<WindowStats>),
    /// Stop the loop.
    Shutdown,
}

impl<T> std::fmt::Debug for SessionCommand<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SetKeepLast(_) => "SetKeepLast",
            Self::SetAutoApply(_) => "SetAutoApply",
            Self::SoftHide => "SoftHide",
            Self::ExpandAll => "ExpandAll",
            Self::Expand(_) => "Expand",
            Self::ExpandPlaceholder(_) => "ExpandPlaceholder",
            Self::KeepLastExchange => "KeepLastExchange",
            Self::ToggleSelectionMode => "ToggleSelectionMode",
            Self::SelectAllVisible => "SelectAllVisible",
            Self::SelectNone => "SelectNone",
            Self::HardPurge { .. } => "HardPurge",
            Self::Edit(_) => "Edit",
            Self::Stats(_) => "Stats",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

async fn sleep_for(wait_ms: Option<u64>) {
    match wait_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Run `session` until [`SessionCommand::Shutdown`] or the sender side
/// closes, then hand the stopped session back.
///
/// The clock must follow tokio time ([`crate::TokioClock`] or
/// [`crate::SystemClock`]); a manual clock never advances while the loop sleeps.
pub async fn drive<T, C>(
    mut session: Session<T, C>,
    mut commands: mpsc::Receiver<SessionCommand<T>>,
) -> Session<T, C>
where
    T: HostTree,
    C: Clock,
{
    session.start();
    loop {
        session.sync_mutations();
        session.pump();
        session.on_idle();

        let wait_ms = session
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(session.now()));
        tokio::select! {
            () = sleep_for(wait_ms) => {}
            command = commands.recv() => {
                match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => handle(&mut session, command),
                }
            }
        }
    }
    session.stop();
    session
}

fn handle<T: HostTree, C: Clock>(session: &mut Session<T, C>, command: SessionCommand<T>) {
    debug!(?command, "session command");
    match command {
        SessionCommand::SetKeepLast(keep) => {
            session.set_keep_last(keep);
        }
        SessionCommand::SetAutoApply(enabled) => {
            session.set_auto_apply(enabled);
        }
        SessionCommand::SoftHide => {
            session.soft_hide();
        }
        SessionCommand::ExpandAll => {
            session.expand_all();
        }
        SessionCommand::Expand(token) => {
            session.expand(token);
        }
        SessionCommand::ExpandPlaceholder(node) => {
            session.expand_placeholder(node);
        }
        SessionCommand::KeepLastExchange => {
            session.keep_last_exchange();
        }
        SessionCommand::ToggleSelectionMode => {
            session.toggle_selection_mode();
        }
        SessionCommand::SelectAllVisible => {
            session.select_all_visible();
        }
        SessionCommand::SelectNone => {
            session.select_none();
        }
        SessionCommand::HardPurge { accept, reply } => {
            let outcome = session.hard_purge(&mut |_: &str| accept);
            let _ = reply.send(outcome);
        }
        SessionCommand::Edit(edit) => {
            edit(session.tree_mut());
        }
        SessionCommand::Stats(reply) => {
            let _ = reply.send(session.stats());
        }
        SessionCommand::Shutdown => {}
    }
}
