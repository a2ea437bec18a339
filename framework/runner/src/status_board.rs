use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::event::StatusEvent;
use crate::task::TaskState;

/// Format a duration as `Hh Mm Ss`, `Mm Ss` or `Ss` depending on its magnitude, rounded to the
/// nearest second.
pub fn format_duration(d: Duration) -> String {
    let total_seconds = (d.as_millis() + 500) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug, Clone)]
struct BoardEntry {
    state: TaskState,
    elapsed: Duration,
    received_at: Instant,
}

/// The latest known state of every session, keyed by user then session index.
///
/// Owned exclusively by the live view loop. Applying an event replaces whatever was known about
/// that session, so bursts of events coalesce into the most recent state.
#[derive(Debug)]
pub struct StatusBoard {
    started_at: Instant,
    sessions: BTreeMap<String, BTreeMap<usize, BoardEntry>>,
}

impl StatusBoard {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            sessions: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, event: StatusEvent, received_at: Instant) {
        self.sessions.entry(event.username).or_default().insert(
            event.session_index,
            BoardEntry {
                state: event.state,
                elapsed: event.elapsed,
                received_at,
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn state_of(&self, username: &str, session_index: usize) -> Option<TaskState> {
        self.sessions
            .get(username)
            .and_then(|s| s.get(&session_index))
            .map(|e| e.state)
    }

    /// Number of sessions that have reached a terminal state.
    #[cfg(test)]
    pub(crate) fn finished_count(&self) -> usize {
        self.sessions
            .values()
            .flat_map(|s| s.values())
            .filter(|e| e.state.is_terminal())
            .count()
    }

    /// Render the board as of `now`. The output only depends on the applied events and `now`.
    ///
    /// Sessions that are still in progress have their elapsed time extended by the time since
    /// their last event, so the view keeps ticking between events.
    pub fn render(&self, now: Instant) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Stress Test Status - Elapsed Time: {}",
                format_duration(now.saturating_duration_since(self.started_at))
            ),
            String::new(),
        ];

        for (username, sessions) in &self.sessions {
            lines.push(format!("User {} ({} sessions)", username, sessions.len()));
            for (index, entry) in sessions {
                let elapsed = if entry.state.is_active() {
                    entry.elapsed + now.saturating_duration_since(entry.received_at)
                } else {
                    entry.elapsed
                };
                lines.push(format!(
                    "  Session {}: {} - {}",
                    index + 1,
                    entry.state.label(),
                    format_duration(elapsed)
                ));
            }
            lines.push(String::new());
        }

        lines
    }
}

/// Indexes of lines in `next` that differ from `previous`, including lines that are new.
pub fn changed_lines(previous: &[String], next: &[String]) -> Vec<usize> {
    next.iter()
        .enumerate()
        .filter(|(i, line)| previous.get(*i) != Some(*line))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(username: &str, index: usize, state: TaskState, secs: u64) -> StatusEvent {
        StatusEvent {
            username: username.to_string(),
            session_index: index,
            state,
            elapsed: Duration::from_secs(secs),
        }
    }

    #[test]
    fn format_duration_by_magnitude() {
        assert_eq!("0s", format_duration(Duration::ZERO));
        assert_eq!("59s", format_duration(Duration::from_secs(59)));
        assert_eq!("1m 0s", format_duration(Duration::from_secs(60)));
        assert_eq!("2m 5s", format_duration(Duration::from_millis(124_600)));
        assert_eq!("1h 0m 1s", format_duration(Duration::from_secs(3601)));
    }

    #[tokio::test(start_paused = true)]
    async fn render_is_sorted_and_keeps_latest_state() {
        let start = Instant::now();
        let mut board = StatusBoard::new(start);

        board.apply(event("bob", 0, TaskState::Requesting, 0), start);
        board.apply(event("alice", 1, TaskState::Waiting, 5), start);
        board.apply(event("alice", 0, TaskState::Requesting, 0), start);
        board.apply(event("alice", 0, TaskState::Completed, 30), start);

        assert_eq!(
            vec![
                "Stress Test Status - Elapsed Time: 0s",
                "",
                "User alice (2 sessions)",
                "  Session 1: Completed - 30s",
                "  Session 2: Waiting for session - 5s",
                "",
                "User bob (1 sessions)",
                "  Session 1: Requesting session - 0s",
                "",
            ],
            board.render(start)
        );
        assert_eq!(Some(TaskState::Completed), board.state_of("alice", 0));
        assert_eq!(1, board.finished_count());
    }

    #[tokio::test(start_paused = true)]
    async fn in_progress_sessions_keep_ticking() {
        let start = Instant::now();
        let mut board = StatusBoard::new(start);
        board.apply(event("alice", 0, TaskState::Waiting, 10), start);
        board.apply(event("alice", 1, TaskState::Failed, 10), start);

        let later = start + Duration::from_secs(65);
        let lines = board.render(later);

        assert_eq!("Stress Test Status - Elapsed Time: 1m 5s", lines[0]);
        assert_eq!("  Session 1: Waiting for session - 1m 15s", lines[3]);
        assert_eq!("  Session 2: Failed - 10s", lines[4]);
    }

    #[tokio::test(start_paused = true)]
    async fn planned_sessions_are_listed_before_they_start() {
        let start = Instant::now();
        let mut board = StatusBoard::new(start);
        for index in 0..3 {
            board.apply(event("alice", index, TaskState::Pending, 0), start);
            board.apply(event("bob", index, TaskState::Pending, 0), start);
        }
        board.apply(event("alice", 0, TaskState::Waiting, 4), start);
        for index in 0..3 {
            board.apply(event("bob", index, TaskState::Failed, 1), start);
        }

        let later = start + Duration::from_secs(20);
        assert_eq!(
            vec![
                "Stress Test Status - Elapsed Time: 20s",
                "",
                "User alice (3 sessions)",
                "  Session 1: Waiting for session - 24s",
                "  Session 2: Starting - 0s",
                "  Session 3: Starting - 0s",
                "",
                "User bob (3 sessions)",
                "  Session 1: Failed - 1s",
                "  Session 2: Failed - 1s",
                "  Session 3: Failed - 1s",
                "",
            ],
            board.render(later)
        );
        assert_eq!(3, board.finished_count());
    }

    #[test]
    fn changed_lines_only_reports_differences() {
        let previous = vec!["a".to_string(), "b".to_string()];
        let next = vec!["a".to_string(), "c".to_string(), "d".to_string()];

        assert_eq!(vec![1, 2], changed_lines(&previous, &next));
        assert!(changed_lines(&next, &next).is_empty());
    }
}
