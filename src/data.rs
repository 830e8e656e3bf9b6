use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SolverConfig;

// Type aliases for clarity
pub type Day = u32;
pub type Timeslot = u32;

/// A course taught in `lectures` separate lecture instances.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub name: String,
    pub teacher: String,
    pub lectures: u32,
    pub min_working_days: u32,
    pub students: u32,
}

/// Represents a physical room with a given capacity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomInput {
    pub id: String,
    pub capacity: u32,
}

/// A curriculum: courses whose lectures must never share a period.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurriculumInput {
    pub id: String,
    pub courses: Vec<String>,
}

/// A period in which a course may not be taught.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnavailabilityInput {
    pub course: String,
    pub day: Day,
    pub period: Timeslot,
}

/// The complete input for the timetabling problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInput {
    #[serde(default)]
    pub name: String,
    pub days: u32,
    pub periods_per_day: u32,
    pub courses: Vec<CourseInput>,
    pub rooms: Vec<RoomInput>,
    #[serde(default)]
    pub curricula: Vec<CurriculumInput>,
    #[serde(default)]
    pub unavailability: Vec<UnavailabilityInput>,
}

/// Body of a solve request: the problem plus optional solver settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub problem: ProblemInput,
    #[serde(default)]
    pub config: SolverConfig,
}

/// One lecture of the final timetable. Unassigned lectures carry no room or period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledLecture {
    pub event_id: usize,
    pub course: String,
    pub room: Option<String>,
    pub day: Option<Day>,
    pub timeslot: Option<Timeslot>,
}

impl fmt::Display for ScheduledLecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.room, self.day, self.timeslot) {
            (Some(room), Some(day), Some(timeslot)) => {
                write!(f, "{} {} {} {}", self.course, room, day, timeslot)
            }
            _ => write!(f, "{} unassigned", self.course),
        }
    }
}

/// Soft penalty of a timetable split by constraint kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftBreakdown {
    pub room_capacity: u32,
    pub min_working_days: u32,
    pub curriculum_compactness: u32,
    pub room_stability: u32,
}

impl SoftBreakdown {
    pub fn total(&self) -> u32 {
        self.room_capacity + self.min_working_days + self.curriculum_compactness + self.room_stability
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    IterationBudget,
    TimeBudget,
    TreeExhausted,
    Optimal,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::IterationBudget => "iteration budget exhausted",
            StopReason::TimeBudget => "time budget exhausted",
            StopReason::TreeExhausted => "search tree exhausted",
            StopReason::Optimal => "optimal solution found",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutput {
    pub lectures: Vec<ScheduledLecture>,
    pub hard_penalty: u32,
    pub soft_penalty: u32,
    pub soft_breakdown: SoftBreakdown,
    pub iterations: u64,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
}
