use std::collections::HashSet;

use crate::config::{
    CURRICULUM_COMPACTNESS_PENALTY, HARD_PENALTY, MIN_WORKING_DAYS_PENALTY, ROOM_STABILITY_PENALTY,
    UNPLACED_PENALTY,
};
use crate::data::{Day, SoftBreakdown};
use crate::model::{CourseIdx, Event, EventId, Period, Problem, RoomIdx};
use crate::timetable::{Placement, Scope, Timetable};

/// Room clashes collected during a full evaluation, keyed by the clashing lecture
/// and the room/period it clashes in.
pub type RoomConflicts = HashSet<(EventId, RoomIdx, Period)>;

/// Penalties of a timetable. Ordered lexicographically: hard first, then soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Score {
    pub hard: u32,
    pub soft: u32,
}

impl Score {
    pub fn new(hard: u32, soft: u32) -> Self {
        Self { hard, soft }
    }

    pub fn is_optimal(&self) -> bool {
        self.hard == 0 && self.soft == 0
    }
}

pub struct ConflictsChecker<'p> {
    problem: &'p Problem,
}

impl<'p> ConflictsChecker<'p> {
    pub fn new(problem: &'p Problem) -> Self {
        Self { problem }
    }

    pub fn problem(&self) -> &'p Problem {
        self.problem
    }

    // hard constraints

    /// Hard penalty of placing `event` in `room` at `period` next to `others`.
    ///
    /// Returns [`UNPLACED_PENALTY`] if room or period is missing. When
    /// `room_conflicts` is given, room clashes are recorded there instead of
    /// being added to the result.
    pub fn hard_penalty(
        &self,
        event: &Event,
        others: Scope<'_>,
        room: Option<RoomIdx>,
        period: Option<Period>,
        mut room_conflicts: Option<&mut RoomConflicts>,
    ) -> u32 {
        let (Some(room), Some(period)) = (room, period) else {
            return UNPLACED_PENALTY;
        };

        let mut penalty = self.unavailability(event, period) + self.block_clashes(event, others, period);

        for (other_id, placement) in others.iter() {
            if other_id == event.id || placement.period != period {
                continue;
            }
            let other = self.problem.event(other_id);
            if other.course == event.course {
                penalty += HARD_PENALTY;
                continue;
            }
            if placement.room == room {
                match room_conflicts.as_deref_mut() {
                    Some(conflicts) => {
                        conflicts.insert((other_id, room, period));
                    }
                    None => penalty += HARD_PENALTY,
                }
            }
            if other.teacher == event.teacher {
                penalty += HARD_PENALTY;
            }
        }
        penalty
    }

    /// Hard penalty of a lecture at its current placement.
    pub fn placed_hard_penalty(&self, event: &Event, others: Scope<'_>, placement: Placement) -> u32 {
        self.hard_penalty(event, others, Some(placement.room), Some(placement.period), None)
    }

    pub fn unavailability(&self, event: &Event, period: Period) -> u32 {
        let violations = self
            .problem
            .forbidden_periods(event)
            .iter()
            .filter(|&&forbidden| forbidden == period)
            .count() as u32;
        violations * HARD_PENALTY
    }

    /// One unit per distinct lecture sharing a curriculum with `event` at `period`.
    pub fn block_clashes(&self, event: &Event, others: Scope<'_>, period: Period) -> u32 {
        let clashing: HashSet<EventId> = self
            .problem
            .blocks_of(event)
            .iter()
            .flat_map(|&block| self.problem.block(block).members.iter().copied())
            .filter(|&member| member != event.id)
            .filter(|&member| others.get(member).is_some_and(|p| p.period == period))
            .collect();
        clashing.len() as u32 * HARD_PENALTY
    }

    // soft constraints

    pub fn min_working_days(&self, event: &Event, others: Scope<'_>, day: Day) -> u32 {
        let mut days: HashSet<Day> = self
            .problem
            .siblings(event)
            .iter()
            .filter(|&&sibling| sibling != event.id)
            .filter_map(|&sibling| others.get(sibling))
            .map(|p| p.period.day)
            .collect();
        days.insert(day);
        event.min_working_days.saturating_sub(days.len() as u32) * MIN_WORKING_DAYS_PENALTY
    }

    pub fn block_compactness(&self, event: &Event, others: Scope<'_>, period: Period) -> u32 {
        let isolated_in = self
            .problem
            .blocks_of(event)
            .iter()
            .filter(|&&block| {
                !self.problem.block(block).members.iter().any(|&member| {
                    member != event.id && others.get(member).is_some_and(|p| p.period.is_adjacent(&period))
                })
            })
            .count() as u32;
        isolated_in * CURRICULUM_COMPACTNESS_PENALTY
    }

    pub fn room_stability(&self, event: &Event, others: Scope<'_>, room: RoomIdx) -> u32 {
        let other_rooms: HashSet<RoomIdx> = self
            .problem
            .siblings(event)
            .iter()
            .filter(|&&sibling| sibling != event.id)
            .filter_map(|&sibling| others.get(sibling))
            .map(|p| p.room)
            .filter(|&other| other != room)
            .collect();
        other_rooms.len() as u32 * ROOM_STABILITY_PENALTY
    }

    pub fn room_capacity(&self, event: &Event, room: RoomIdx) -> u32 {
        event.capacity.saturating_sub(self.problem.room(room).capacity)
    }

    // full evaluation

    /// Hard and soft penalty of a timetable; each unassigned lecture costs one
    /// hard unit.
    pub fn evaluate(&self, timetable: &Timetable, unassigned: usize) -> Score {
        let hard = self.evaluate_hard(timetable) + unassigned as u32 * HARD_PENALTY;
        Score::new(hard, self.soft_breakdown(timetable).total())
    }

    pub fn evaluate_hard(&self, timetable: &Timetable) -> u32 {
        let mut room_conflicts = RoomConflicts::new();
        let mut penalty = 0;
        for (id, placement) in timetable.iter() {
            penalty += self.hard_penalty(
                self.problem.event(id),
                timetable.after(id),
                Some(placement.room),
                Some(placement.period),
                Some(&mut room_conflicts),
            );
        }
        penalty + room_conflicts.len() as u32 * HARD_PENALTY
    }

    pub fn soft_breakdown(&self, timetable: &Timetable) -> SoftBreakdown {
        let mut seen = HashSet::new();
        let mut breakdown = SoftBreakdown::default();
        for (id, placement) in timetable.iter() {
            let part = self.soft_contribution(timetable, id, placement, &mut seen);
            breakdown.room_capacity += part.room_capacity;
            breakdown.min_working_days += part.min_working_days;
            breakdown.curriculum_compactness += part.curriculum_compactness;
            breakdown.room_stability += part.room_stability;
        }
        breakdown
    }

    /// Soft penalty, or `None` as soon as the running sum reaches `bound`.
    /// Every term is non-negative, so a partial sum at the bound can only grow.
    pub fn soft_below(&self, timetable: &Timetable, bound: u32) -> Option<u32> {
        let mut seen = HashSet::new();
        let mut penalty = 0;
        for (id, placement) in timetable.iter() {
            penalty += self.soft_contribution(timetable, id, placement, &mut seen).total();
            if penalty >= bound {
                return None;
            }
        }
        Some(penalty)
    }

    fn soft_contribution(
        &self,
        timetable: &Timetable,
        id: EventId,
        placement: Placement,
        seen: &mut HashSet<CourseIdx>,
    ) -> SoftBreakdown {
        let event = self.problem.event(id);
        let mut part = SoftBreakdown {
            room_capacity: self.room_capacity(event, placement.room),
            curriculum_compactness: self.block_compactness(event, timetable.all(), placement.period),
            ..Default::default()
        };
        // course-wide terms are charged once, at the course's first lecture
        if seen.insert(event.course) {
            let later = timetable.after(id);
            part.min_working_days = self.min_working_days(event, later, placement.period.day);
            part.room_stability = self.room_stability(event, later, placement.room);
        }
        part
    }
}
