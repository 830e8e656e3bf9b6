use log::{debug, info};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use crate::config::NEIGHBOURHOOD_WEIGHTS;
use crate::conflicts::{ConflictsChecker, Score};
use crate::data::Day;
use crate::model::{Event, EventId, Period, Problem, RoomIdx};
use crate::sink::{BestSolutionSink, CancellationToken, Snapshot};
use crate::timetable::{Placement, Timetable, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    Period,
    Room,
    Event,
    RoomStability,
    MinWorkingDays,
    CurriculumCompactness,
}

impl Neighbourhood {
    /// Same order as [`NEIGHBOURHOOD_WEIGHTS`].
    pub const ALL: [Neighbourhood; 6] = [
        Neighbourhood::Period,
        Neighbourhood::Room,
        Neighbourhood::Event,
        Neighbourhood::RoomStability,
        Neighbourhood::MinWorkingDays,
        Neighbourhood::CurriculumCompactness,
    ];
}

impl fmt::Display for Neighbourhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Neighbourhood::Period => "period move",
            Neighbourhood::Room => "room move",
            Neighbourhood::Event => "event move",
            Neighbourhood::RoomStability => "room stability move",
            Neighbourhood::MinWorkingDays => "min working days move",
            Neighbourhood::CurriculumCompactness => "curriculum compactness move",
        };
        f.write_str(name)
    }
}

/// Outcome of one refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    pub soft: u32,
    pub accepted: u32,
    pub trials: u32,
}

/// Keeps a move only if the timetable stays hard-feasible and the soft penalty
/// strictly drops. Lectures before the frozen prefix never move.
pub struct HillClimber<'a, 'p> {
    checker: &'a ConflictsChecker<'p>,
    idle_cap: u32,
    deadline: Option<Instant>,
    cancel: &'a CancellationToken,
}

impl<'a, 'p> HillClimber<'a, 'p> {
    pub fn new(
        checker: &'a ConflictsChecker<'p>,
        idle_cap: u32,
        deadline: Option<Instant>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            checker,
            idle_cap,
            deadline,
            cancel,
        }
    }

    fn problem(&self) -> &'p Problem {
        self.checker.problem()
    }

    /// Improves `timetable` in place. Lectures at positions below `frozen` keep
    /// their placement. Every accepted move is published to `sink`.
    pub fn run<R, S>(
        &self,
        timetable: &mut Timetable,
        frozen: usize,
        best_soft: u32,
        rng: &mut R,
        sink: &mut S,
    ) -> Refinement
    where
        R: Rng + ?Sized,
        S: BestSolutionSink + ?Sized,
    {
        let mut outcome = Refinement {
            soft: best_soft,
            accepted: 0,
            trials: 0,
        };
        let Ok(weights) = WeightedIndex::new(NEIGHBOURHOOD_WEIGHTS) else {
            return outcome;
        };
        let mutable: Vec<EventId> = timetable.order()[frozen.min(timetable.len())..].to_vec();
        if mutable.is_empty() {
            return outcome;
        }

        let mut idle = 0;
        while idle < self.idle_cap
            && outcome.soft > 0
            && self.deadline.is_none_or(|deadline| Instant::now() < deadline)
            && !self.cancel.is_cancelled()
        {
            outcome.trials += 1;
            let neighbourhood = Neighbourhood::ALL[weights.sample(rng)];
            let mut tx = Transaction::begin(timetable);
            if !self.apply(neighbourhood, &mut tx, &mutable, frozen, rng) {
                idle += 1;
                continue;
            }

            let improved = self
                .checker
                .soft_below(tx.timetable(), outcome.soft)
                .filter(|_| self.checker.evaluate_hard(tx.timetable()) == 0);
            let Some(soft) = improved else {
                idle += 1;
                continue;
            };

            tx.commit();
            debug!("Hill climbing ({}): {} -> {}", neighbourhood, outcome.soft, soft);
            outcome.soft = soft;
            outcome.accepted += 1;
            idle = 0;
            sink.publish(Snapshot::capture(self.problem(), timetable, Score::new(0, soft)));
        }

        info!(
            "Hill climbing finished: soft penalty {} after {} trials, {} accepted",
            outcome.soft, outcome.trials, outcome.accepted
        );
        outcome
    }

    fn apply<R: Rng + ?Sized>(
        &self,
        neighbourhood: Neighbourhood,
        tx: &mut Transaction<'_>,
        mutable: &[EventId],
        frozen: usize,
        rng: &mut R,
    ) -> bool {
        match neighbourhood {
            Neighbourhood::Period => self.period_move(tx, mutable, rng),
            Neighbourhood::Room => self.room_move(tx, mutable, rng),
            Neighbourhood::Event => self.event_move(tx, mutable, frozen, rng),
            Neighbourhood::RoomStability => self.room_stability_move(tx, mutable, frozen, rng),
            Neighbourhood::MinWorkingDays => self.min_working_days_move(tx, mutable, rng),
            Neighbourhood::CurriculumCompactness => self.curriculum_compactness_move(tx, frozen, rng),
        }
    }

    fn feasible(&self, timetable: &Timetable, event: &Event, placement: Placement) -> bool {
        self.checker.placed_hard_penalty(event, timetable.all(), placement) == 0
    }

    fn free_rooms(&self, timetable: &Timetable, event: &Event, period: Period) -> Vec<RoomIdx> {
        self.problem()
            .find_available_rooms(event.capacity, timetable.all().placements(), &[period])
            .into_iter()
            .next()
            .map(|(_, rooms)| rooms)
            .unwrap_or_default()
    }

    /// First free room at `period` where the event is hard-feasible.
    fn feasible_room(&self, timetable: &Timetable, event: &Event, period: Period) -> Option<RoomIdx> {
        self.free_rooms(timetable, event, period)
            .into_iter()
            .find(|&room| self.feasible(timetable, event, Placement::new(room, period)))
    }

    fn pick<R: Rng + ?Sized>(&self, tx: &Transaction<'_>, mutable: &[EventId], rng: &mut R) -> Option<(&'p Event, Placement)> {
        let id = *mutable.choose(rng)?;
        let placement = tx.timetable().get(id)?;
        Some((self.problem().event(id), placement))
    }

    /// Same room, another permitted period.
    fn period_move<R: Rng + ?Sized>(&self, tx: &mut Transaction<'_>, mutable: &[EventId], rng: &mut R) -> bool {
        let Some((event, current)) = self.pick(tx, mutable, rng) else {
            return false;
        };
        let target = event
            .available_periods
            .iter()
            .filter(|&&period| period != current.period)
            .map(|&period| Placement::new(current.room, period))
            .find(|&placement| self.feasible(tx.timetable(), event, placement));
        target.is_some_and(|placement| tx.relocate(event.id, placement))
    }

    /// Same period, another free room.
    fn room_move<R: Rng + ?Sized>(&self, tx: &mut Transaction<'_>, mutable: &[EventId], rng: &mut R) -> bool {
        let Some((event, current)) = self.pick(tx, mutable, rng) else {
            return false;
        };
        let target = self
            .free_rooms(tx.timetable(), event, current.period)
            .into_iter()
            .filter(|&room| room != current.room)
            .map(|room| Placement::new(room, current.period))
            .find(|&placement| self.feasible(tx.timetable(), event, placement));
        target.is_some_and(|placement| tx.relocate(event.id, placement))
    }

    /// New room and period; a lecture blocking the target may be swapped into
    /// the vacated slot if both end up feasible.
    fn event_move<R: Rng + ?Sized>(
        &self,
        tx: &mut Transaction<'_>,
        mutable: &[EventId],
        frozen: usize,
        rng: &mut R,
    ) -> bool {
        let Some((event, current)) = self.pick(tx, mutable, rng) else {
            return false;
        };
        let problem = self.problem();
        for &period in &event.available_periods {
            if period == current.period {
                continue;
            }
            for room in 0..problem.rooms().len() {
                let target = Placement::new(room, period);
                if self.feasible(tx.timetable(), event, target) {
                    return tx.relocate(event.id, target);
                }

                let blocker = tx.timetable().iter().find(|&(other, placement)| {
                    other != event.id
                        && placement.period == period
                        && (placement.room == room || problem.event(other).teacher == event.teacher)
                });
                let Some((other, _)) = blocker else {
                    continue;
                };
                if !self.is_mutable(tx.timetable(), other, frozen) {
                    continue;
                }

                let savepoint = tx.savepoint();
                tx.relocate(event.id, target);
                tx.relocate(other, current);
                let displaced = problem.event(other);
                if self.feasible(tx.timetable(), event, target) && self.feasible(tx.timetable(), displaced, current) {
                    return true;
                }
                tx.rollback_to(savepoint);
            }
        }
        false
    }

    /// Every lecture of one course into one common room.
    fn room_stability_move<R: Rng + ?Sized>(
        &self,
        tx: &mut Transaction<'_>,
        mutable: &[EventId],
        frozen: usize,
        rng: &mut R,
    ) -> bool {
        let Some((event, _)) = self.pick(tx, mutable, rng) else {
            return false;
        };
        let problem = self.problem();
        let siblings = problem.siblings(event);
        if !siblings.iter().all(|&sibling| self.is_mutable(tx.timetable(), sibling, frozen)) {
            return false;
        }
        let target_room = rng.gen_range(0..problem.rooms().len());

        for &sibling in siblings {
            let Some(placement) = tx.timetable().get(sibling) else {
                return false;
            };
            if placement.room == target_room {
                continue;
            }
            let target = Placement::new(target_room, placement.period);
            if !self.feasible(tx.timetable(), problem.event(sibling), target) {
                return false;
            }
            tx.relocate(sibling, target);
        }
        tx.is_dirty()
    }

    /// Moves a lecture of a course short of working days onto an unused day.
    fn min_working_days_move<R: Rng + ?Sized>(
        &self,
        tx: &mut Transaction<'_>,
        mutable: &[EventId],
        rng: &mut R,
    ) -> bool {
        let problem = self.problem();
        let penalized: Vec<(&Event, Placement)> = mutable
            .iter()
            .filter_map(|&id| tx.timetable().get(id).map(|placement| (problem.event(id), placement)))
            .filter(|&(event, placement)| {
                self.checker
                    .min_working_days(event, tx.timetable().all(), placement.period.day)
                    > 0
            })
            .collect();
        let Some(&(event, _)) = penalized.choose(rng) else {
            return false;
        };

        let taught: HashSet<Day> = problem
            .siblings(event)
            .iter()
            .filter_map(|&sibling| tx.timetable().get(sibling))
            .map(|p| p.period.day)
            .collect();
        if taught.len() as u32 >= problem.days {
            return false;
        }

        let target = event
            .available_periods
            .iter()
            .filter(|period| !taught.contains(&period.day))
            .find_map(|&period| {
                self.feasible_room(tx.timetable(), event, period)
                    .map(|room| Placement::new(room, period))
            });
        target.is_some_and(|placement| tx.relocate(event.id, placement))
    }

    /// Moves an isolated curriculum member next to another member of the curriculum.
    fn curriculum_compactness_move<R: Rng + ?Sized>(
        &self,
        tx: &mut Transaction<'_>,
        frozen: usize,
        rng: &mut R,
    ) -> bool {
        let problem = self.problem();
        let Some(block) = problem.blocks().choose(rng) else {
            return false;
        };
        let placed: Vec<(EventId, Placement)> = block
            .members
            .iter()
            .filter_map(|&id| tx.timetable().get(id).map(|placement| (id, placement)))
            .collect();
        let has_neighbour = |id: EventId, period: Period| {
            placed
                .iter()
                .any(|&(other, placement)| other != id && placement.period.is_adjacent(&period))
        };

        let isolated: Vec<(EventId, Placement)> = placed
            .iter()
            .copied()
            .filter(|&(id, placement)| {
                self.is_mutable(tx.timetable(), id, frozen) && !has_neighbour(id, placement.period)
            })
            .collect();
        let Some(&(id, current)) = isolated.choose(rng) else {
            return false;
        };
        let event = problem.event(id);

        let candidates: Vec<Period> = event
            .available_periods
            .iter()
            .copied()
            .filter(|&period| period != current.period && has_neighbour(id, period))
            .collect();
        let Some(&period) = candidates.choose(rng) else {
            return false;
        };

        match self.feasible_room(tx.timetable(), event, period) {
            Some(room) => tx.relocate(id, Placement::new(room, period)),
            None => false,
        }
    }

    fn is_mutable(&self, timetable: &Timetable, id: EventId, frozen: usize) -> bool {
        timetable.position(id).is_some_and(|position| position >= frozen)
    }
}
