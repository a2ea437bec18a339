use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use session_stress_core::prelude::DelegatedShutdownListener;
use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, MissedTickBehavior};

use crate::event::StatusEvent;
use crate::status_board::{changed_lines, format_duration, StatusBoard};

/// How often the view is redrawn when no events arrive.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// The terminal view currently being drawn, if any. Console output has to go around it.
static ACTIVE_VIEW: Mutex<Option<MultiProgress>> = parking_lot::const_mutex(None);

/// Run `write` with the terminal view hidden, so that anything it prints to the console is not
/// drawn over.
pub(crate) fn with_view_suspended(write: impl FnOnce()) {
    let view = ACTIVE_VIEW.lock().clone();
    match view {
        Some(multi) => multi.suspend(write),
        None => write(),
    }
}

/// Somewhere to show the status board.
pub trait StatusOutput: Send {
    /// Called for every event, before it is applied to the board.
    fn on_event(&mut self, _event: &StatusEvent) {}

    fn render(&mut self, lines: &[String]);

    fn finish(&mut self, lines: &[String]);
}

/// Draws the board in place on the terminal, only touching lines that changed.
pub struct TerminalOutput {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
    last_lines: Vec<String>,
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    fn with_multi_progress(multi: MultiProgress) -> Self {
        *ACTIVE_VIEW.lock() = Some(multi.clone());
        Self {
            multi,
            bars: Vec::new(),
            last_lines: Vec::new(),
        }
    }

    fn new_line(&self) -> ProgressBar {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{msg}").expect("Failed to set live view style"),
        );
        self.multi.add(bar)
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusOutput for TerminalOutput {
    fn render(&mut self, lines: &[String]) {
        while self.bars.len() < lines.len() {
            let bar = self.new_line();
            self.bars.push(bar);
        }
        while self.bars.len() > lines.len() {
            if let Some(bar) = self.bars.pop() {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }

        for i in changed_lines(&self.last_lines, lines) {
            self.bars[i].set_message(lines[i].clone());
        }
        self.last_lines = lines.to_vec();
    }

    fn finish(&mut self, lines: &[String]) {
        self.render(lines);
        for bar in self.bars.drain(..) {
            bar.finish_and_clear();
        }
        if let Err(e) = self.multi.clear() {
            log::warn!("Failed to clear live view: {e:?}");
        }
    }
}

impl Drop for TerminalOutput {
    fn drop(&mut self) {
        ACTIVE_VIEW.lock().take();
    }
}

/// Logs each status change instead of drawing, for when nobody is watching the terminal.
#[derive(Default)]
pub struct LogOutput;

impl StatusOutput for LogOutput {
    fn on_event(&mut self, event: &StatusEvent) {
        log::info!(
            "User {} session {}: {} ({})",
            event.username,
            event.session_index + 1,
            event.state,
            format_duration(event.elapsed)
        );
    }

    fn render(&mut self, _lines: &[String]) {}

    fn finish(&mut self, _lines: &[String]) {}
}

/// The single consumer of status events.
///
/// Runs until every sender has been dropped or a shutdown is signalled. Redraws on every tick and
/// after every batch of events. Any events already queued are drained before drawing, so a
/// slow terminal only ever costs one redraw per batch and never holds up the session runners.
pub async fn run_live_view<O: StatusOutput>(
    mut receiver: Receiver<StatusEvent>,
    mut shutdown_listener: DelegatedShutdownListener,
    mut output: O,
    tick: Duration,
) -> StatusBoard {
    let mut board = StatusBoard::new(Instant::now());
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_listener.wait_for_shutdown() => {
                log::debug!("Live view shutting down");
                break;
            }
            event = receiver.recv() => {
                let Some(event) = event else {
                    break;
                };
                output.on_event(&event);
                board.apply(event, Instant::now());
                while let Ok(event) = receiver.try_recv() {
                    output.on_event(&event);
                    board.apply(event, Instant::now());
                }
                output.render(&board.render(Instant::now()));
            }
            _ = ticker.tick() => {
                output.render(&board.render(Instant::now()));
            }
        }
    }

    output.finish(&board.render(Instant::now()));
    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::status_channel;
    use crate::task::TaskState;
    use indicatif::ProgressDrawTarget;
    use session_stress_core::prelude::ShutdownHandle;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct RecordingOutput {
        renders: Arc<Mutex<Vec<Vec<String>>>>,
        finished: Arc<Mutex<Option<Vec<String>>>>,
    }

    impl StatusOutput for RecordingOutput {
        fn render(&mut self, lines: &[String]) {
            self.renders.lock().push(lines.to_vec());
        }

        fn finish(&mut self, lines: &[String]) {
            *self.finished.lock() = Some(lines.to_vec());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn view_ends_when_all_senders_are_dropped() {
        let (sender, receiver) = status_channel();
        let shutdown = ShutdownHandle::new();
        let output = RecordingOutput::default();

        let view = tokio::spawn(run_live_view(
            receiver,
            shutdown.new_listener(),
            output.clone(),
            DEFAULT_TICK,
        ));

        let alice = sender.for_user("alice");
        alice.emit(0, TaskState::Requesting, Duration::ZERO).await;
        alice.emit(0, TaskState::Completed, Duration::from_secs(12)).await;
        drop(alice);
        drop(sender);

        let board = view.await.unwrap();
        assert_eq!(Some(TaskState::Completed), board.state_of("alice", 0));

        let finished = output.finished.lock().clone().unwrap();
        assert!(finished.contains(&"  Session 1: Completed - 12s".to_string()));
        assert!(!output.renders.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn view_stops_on_shutdown() {
        let (sender, receiver) = status_channel();
        let shutdown = ShutdownHandle::new();
        let output = RecordingOutput::default();

        let view = tokio::spawn(run_live_view(
            receiver,
            shutdown.new_listener(),
            output.clone(),
            DEFAULT_TICK,
        ));

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.shutdown();

        let board = view.await.unwrap();
        assert_eq!(0, board.finished_count());
        assert!(output.finished.lock().is_some());
        // The ticker keeps redrawing the elapsed time while nothing else happens.
        assert!(output.renders.lock().len() >= 3);

        drop(sender);
    }

    #[test]
    fn console_writes_go_around_the_terminal_view() {
        let output = TerminalOutput::with_multi_progress(MultiProgress::with_draw_target(
            ProgressDrawTarget::hidden(),
        ));
        assert!(ACTIVE_VIEW.lock().is_some());

        let mut written = false;
        with_view_suspended(|| written = true);
        assert!(written);

        drop(output);
        assert!(ACTIVE_VIEW.lock().is_none());

        let mut written = false;
        with_view_suspended(|| written = true);
        assert!(written);
    }
}
