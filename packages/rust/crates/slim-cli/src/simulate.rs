//! Streaming replay of a transcript.
//!
//! Turns arrive one at a time, the way a host renders a reply. The manual
//! replay steps a [`ManualClock`] in fixed ticks so output is reproducible;
//! the realtime replay runs the async driver against tokio time.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use slim_events::drain;
use slim_host::{HostTree, MemoryTree, Transcript};
use slim_scheduler::{ManualClock, Session, SessionCommand, TokioClock, drive};
use slim_types::Settings;
use tokio::sync::{mpsc, oneshot};

/// Replay pacing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimulateOptions {
    pub interval_ms: u64,
    pub tick_ms: u64,
}

pub(crate) fn manual(transcript: &Transcript, settings: Settings, options: SimulateOptions) -> String {
    let clock = ManualClock::default();
    let mut tree = MemoryTree::new();
    let main = tree.mount_main();
    let mut session = Session::new(tree, clock.clone()).with_settings(settings);
    let mut events = session.bus().subscribe();
    let settle_ms = session.scheduler().config().stats_ms;
    let turns = &transcript.turns;
    let end_ms = options.interval_ms * turns.len() as u64 + settle_ms;

    let mut out = String::new();
    let mut streamed = 0;
    session.start();
    loop {
        let now = session.now();
        if streamed < turns.len() && now >= options.interval_ms * (streamed as u64 + 1) {
            session.tree_mut().push_turn(main, &turns[streamed]);
            streamed += 1;
            let _ = writeln!(out, "{now:>6}ms  + turn {streamed} ({})", turns[streamed - 1].role);
        }
        session.sync_mutations();
        session.pump();
        session.on_idle();
        for event in drain(&mut events) {
            let _ = writeln!(out, "{now:>6}ms  {} {}", event.topic, event.payload);
        }
        if now >= end_ms {
            break;
        }
        clock.advance(options.tick_ms);
    }
    session.stop();
    let _ = write!(out, "{}", session.stats());
    out
}

pub(crate) async fn realtime(
    transcript: Transcript,
    settings: Settings,
    options: SimulateOptions,
) -> Result<String> {
    let mut tree = MemoryTree::new();
    tree.mount_main();
    let session = Session::new(tree, TokioClock::default()).with_settings(settings);
    let mut events = session.bus().subscribe();
    let settle = Duration::from_millis(session.scheduler().config().stats_ms);
    let (commands, inbox) = mpsc::channel(32);
    let handle = tokio::spawn(drive(session, inbox));

    let closed = || anyhow!("session loop stopped early");
    for turn in transcript.turns {
        tokio::time::sleep(Duration::from_millis(options.interval_ms)).await;
        let edit = move |tree: &mut MemoryTree| {
            if let Some(main) = tree.container() {
                tree.push_turn(main, &turn);
            }
        };
        commands
            .send(SessionCommand::Edit(Box::new(edit)))
            .await
            .map_err(|_| closed())?;
    }
    tokio::time::sleep(settle).await;

    let (reply, stats) = oneshot::channel();
    commands
        .send(SessionCommand::Stats(reply))
        .await
        .map_err(|_| closed())?;
    let stats = stats.await.context("session loop dropped the stats request")?;
    commands
        .send(SessionCommand::Shutdown)
        .await
        .map_err(|_| closed())?;
    handle.await.context("session loop panicked")?;

    let mut out = String::new();
    for event in drain(&mut events) {
        let _ = writeln!(out, "{event}");
    }
    let _ = write!(out, "{stats}");
    Ok(out)
}
