use log::warn;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::conflicts::Score;
use crate::data::ScheduledLecture;
use crate::model::Problem;
use crate::timetable::Timetable;

/// A new best timetable. Renders as one `course room day timeslot` line per
/// placed lecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub score: Score,
    pub lectures: Vec<ScheduledLecture>,
}

impl Snapshot {
    pub fn capture(problem: &Problem, timetable: &Timetable, score: Score) -> Self {
        let lectures = timetable
            .iter()
            .map(|(id, placement)| ScheduledLecture {
                event_id: id,
                course: problem.event(id).name.clone(),
                room: Some(problem.room(placement.room).id.clone()),
                day: Some(placement.period.day),
                timeslot: Some(placement.period.timeslot),
            })
            .collect();
        Self { score, lectures }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lecture in &self.lectures {
            writeln!(f, "{lecture}")?;
        }
        Ok(())
    }
}

/// Receives every new best timetable. Fire and forget: a sink cannot fail the run.
pub trait BestSolutionSink {
    fn publish(&mut self, snapshot: Snapshot);
}

impl<S: BestSolutionSink + ?Sized> BestSolutionSink for &mut S {
    fn publish(&mut self, snapshot: Snapshot) {
        (**self).publish(snapshot);
    }
}

/// Discards snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BestSolutionSink for NullSink {
    fn publish(&mut self, _snapshot: Snapshot) {}
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub snapshots: Vec<Snapshot>,
}

impl MemorySink {
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

impl BestSolutionSink for MemorySink {
    fn publish(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }
}

/// Overwrites a file with the latest snapshot.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BestSolutionSink for FileSink {
    fn publish(&mut self, snapshot: Snapshot) {
        if let Err(e) = std::fs::write(&self.path, snapshot.to_string()) {
            warn!("Could not write best solution to {}: {}", self.path.display(), e);
        }
    }
}

/// Shared stop flag. Cloning yields a handle to the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Period;
    use crate::model::tests::{build, course, input, room};
    use crate::timetable::Placement;

    #[test]
    fn snapshot_renders_one_line_per_placed_lecture() {
        let mut data = input(2, 2);
        data.courses = vec![course("math", "t", 2, 1, 10)];
        data.rooms = vec![room("A1", 20), room("B2", 30)];
        let problem = build(&data);

        let timetable: Timetable = [(1, Placement::new(1, Period::new(1, 0))), (0, Placement::new(0, Period::new(0, 1)))]
            .into_iter()
            .collect();
        let snapshot = Snapshot::capture(&problem, &timetable, Score::new(0, 3));

        assert_eq!(snapshot.to_string(), "math B2 1 0\nmath A1 0 1\n");
    }

    #[test]
    fn file_sink_overwrites() {
        let path = std::env::temp_dir().join(format!("timetable-sink-{}.txt", std::process::id()));
        let mut sink = FileSink::new(&path);
        let lecture = ScheduledLecture {
            event_id: 0,
            course: "c".to_string(),
            room: Some("r".to_string()),
            day: Some(0),
            timeslot: Some(1),
        };
        sink.publish(Snapshot {
            score: Score::new(1, 1),
            lectures: vec![lecture.clone(), lecture.clone()],
        });
        sink.publish(Snapshot {
            score: Score::new(0, 0),
            lectures: vec![lecture],
        });

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "c r 0 1\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
