use itertools::Itertools;
use log::{info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::data::{Day, ProblemInput, Timeslot};
use crate::error::ModelError;
use crate::timetable::Placement;

pub type EventId = usize;
pub type RoomIdx = usize;
pub type BlockIdx = usize;
pub type CourseIdx = usize;

/// A (weekday, timeslot) pair of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub day: Day,
    pub timeslot: Timeslot,
}

impl Period {
    pub fn new(day: Day, timeslot: Timeslot) -> Self {
        Self { day, timeslot }
    }

    /// Same day, neighbouring timeslot.
    pub fn is_adjacent(&self, other: &Period) -> bool {
        self.day == other.day && self.timeslot.abs_diff(other.timeslot) == 1
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.timeslot)
    }
}

/// One lecture instance of a course.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub course: CourseIdx,
    pub name: String,
    pub teacher: String,
    pub capacity: u32,
    pub lectures: u32,
    pub min_working_days: u32,
    pub available_periods: Vec<Period>,
    pub priority: i64,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub capacity: u32,
}

/// A curriculum: the named courses must never share a period.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: String,
    pub courses: HashSet<String>,
    /// Lecture ids of every member course.
    pub members: Vec<EventId>,
}

/// A course must not be taught in `period`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailability {
    pub course: String,
    pub period: Period,
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub days: u32,
    pub periods_per_day: u32,
    events: Vec<Event>,
    rooms: Vec<Room>,
    blocks: Vec<Block>,
    constraints: Vec<Unavailability>,
    course_events: Vec<Vec<EventId>>,
    course_blocks: Vec<Vec<BlockIdx>>,
    forbidden: Vec<Vec<Period>>,
    order: Vec<EventId>,
    unplaceable: Vec<EventId>,
}

impl Problem {
    /// Builds the model. `rng` only breaks priority ties.
    pub fn build<R: Rng + ?Sized>(input: &ProblemInput, rng: &mut R) -> Result<Self, ModelError> {
        let mut course_index: HashMap<&str, CourseIdx> = HashMap::new();
        for (idx, course) in input.courses.iter().enumerate() {
            if course_index.insert(course.name.as_str(), idx).is_some() {
                return Err(ModelError::DuplicateCourse(course.name.clone()));
            }
        }
        if let Some(dup) = input.rooms.iter().map(|r| r.id.as_str()).duplicates().next() {
            return Err(ModelError::DuplicateRoom(dup.to_string()));
        }

        let mut forbidden: Vec<Vec<Period>> = vec![Vec::new(); input.courses.len()];
        let mut constraints = Vec::with_capacity(input.unavailability.len());
        for c in &input.unavailability {
            let course = *course_index
                .get(c.course.as_str())
                .ok_or_else(|| ModelError::UnknownConstraintCourse(c.course.clone()))?;
            let period = Period::new(c.day, c.period);
            forbidden[course].push(period);
            constraints.push(Unavailability {
                course: c.course.clone(),
                period,
            });
        }

        let mut course_blocks: Vec<Vec<BlockIdx>> = vec![Vec::new(); input.courses.len()];
        for (block_idx, curriculum) in input.curricula.iter().enumerate() {
            for name in curriculum.courses.iter().unique() {
                let course = *course_index.get(name.as_str()).ok_or_else(|| {
                    ModelError::UnknownCurriculumCourse {
                        curriculum: curriculum.id.clone(),
                        course: name.clone(),
                    }
                })?;
                course_blocks[course].push(block_idx);
            }
        }

        let grid: Vec<Period> = (0..input.days)
            .cartesian_product(0..input.periods_per_day)
            .map(|(day, timeslot)| Period::new(day, timeslot))
            .collect();

        let mut events = Vec::new();
        let mut course_events: Vec<Vec<EventId>> = vec![Vec::new(); input.courses.len()];
        for (course_idx, course) in input.courses.iter().enumerate() {
            let available_periods: Vec<Period> = grid
                .iter()
                .copied()
                .filter(|p| !forbidden[course_idx].contains(p))
                .collect();
            if available_periods.is_empty() && course.lectures > 0 {
                warn!("Course {} has no available period and can never be placed", course.name);
            }
            let priority = (i64::from(course.lectures) - i64::from(course.min_working_days)) * 4
                - available_periods.len() as i64 * 3
                + i64::from(course.students) * 2
                + course_blocks[course_idx].len() as i64;

            for _ in 0..course.lectures {
                let id = events.len();
                course_events[course_idx].push(id);
                events.push(Event {
                    id,
                    course: course_idx,
                    name: course.name.clone(),
                    teacher: course.teacher.clone(),
                    capacity: course.students,
                    lectures: course.lectures,
                    min_working_days: course.min_working_days,
                    available_periods: available_periods.clone(),
                    priority,
                });
            }
        }

        // periods open to fewer lectures come first
        let demand: HashMap<Period, usize> = events
            .iter()
            .flat_map(|e| e.available_periods.iter().copied())
            .counts();
        for event in &mut events {
            event
                .available_periods
                .sort_by_key(|p| (demand.get(p).copied().unwrap_or(0), p.day, p.timeslot));
        }

        let blocks = input
            .curricula
            .iter()
            .map(|curriculum| {
                let courses: HashSet<String> = curriculum.courses.iter().cloned().collect();
                let members = courses
                    .iter()
                    .filter_map(|name| course_index.get(name.as_str()))
                    .sorted()
                    .flat_map(|&course| course_events[course].iter().copied())
                    .collect();
                Block {
                    id: curriculum.id.clone(),
                    courses,
                    members,
                }
            })
            .collect();

        // lectures without a single period never enter the tree
        let (mut order, unplaceable): (Vec<EventId>, Vec<EventId>) =
            (0..events.len()).partition(|&id| !events[id].available_periods.is_empty());
        order.shuffle(rng);
        order.sort_by_key(|&id| Reverse(events[id].priority));

        let rooms = input
            .rooms
            .iter()
            .map(|r| Room {
                id: r.id.clone(),
                capacity: r.capacity,
            })
            .collect();

        info!(
            "Built problem {:?}: {} lectures of {} courses, {} rooms, {} curricula, {}x{} grid",
            input.name,
            events.len(),
            input.courses.len(),
            input.rooms.len(),
            input.curricula.len(),
            input.days,
            input.periods_per_day
        );

        Ok(Self {
            name: input.name.clone(),
            days: input.days,
            periods_per_day: input.periods_per_day,
            events,
            rooms,
            blocks,
            constraints,
            course_events,
            course_blocks,
            forbidden,
            order,
            unplaceable,
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id]
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, idx: RoomIdx) -> &Room {
        &self.rooms[idx]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, idx: BlockIdx) -> &Block {
        &self.blocks[idx]
    }

    pub fn constraints(&self) -> &[Unavailability] {
        &self.constraints
    }

    /// Lecture ids in the fixed order the search commits them. Lectures with
    /// no available period are left out.
    pub fn order(&self) -> &[EventId] {
        &self.order
    }

    /// Lectures whose course is forbidden in every period of the grid.
    pub fn unplaceable(&self) -> &[EventId] {
        &self.unplaceable
    }

    /// All lectures of the event's course, the event itself included.
    pub fn siblings(&self, event: &Event) -> &[EventId] {
        &self.course_events[event.course]
    }

    /// Curricula containing the event's course.
    pub fn blocks_of(&self, event: &Event) -> &[BlockIdx] {
        &self.course_blocks[event.course]
    }

    pub fn forbidden_periods(&self, event: &Event) -> &[Period] {
        &self.forbidden[event.course]
    }

    /// For each requested period, in request order, the rooms no placed lecture
    /// occupies. Rooms large enough for `capacity` come first by smallest slack;
    /// if none is large enough, every free room is returned by closeness of fit.
    pub fn find_available_rooms<I>(
        &self,
        capacity: u32,
        placed: I,
        periods: &[Period],
    ) -> Vec<(Period, Vec<RoomIdx>)>
    where
        I: IntoIterator<Item = Placement>,
    {
        let occupied: HashSet<(Period, RoomIdx)> =
            placed.into_iter().map(|p| (p.period, p.room)).collect();

        periods
            .iter()
            .map(|&period| {
                let free = (0..self.rooms.len()).filter(|&room| !occupied.contains(&(period, room)));
                let mut suitable: Vec<RoomIdx> = free
                    .clone()
                    .filter(|&room| self.rooms[room].capacity >= capacity)
                    .collect();
                if suitable.is_empty() {
                    suitable = free
                        .sorted_by_key(|&room| (self.rooms[room].capacity.abs_diff(capacity), room))
                        .collect();
                } else {
                    suitable.sort_by_key(|&room| (self.rooms[room].capacity - capacity, room));
                }
                (period, suitable)
            })
            .collect()
    }

    /// Number of (period, room) choices the event has next to the placed lectures.
    pub fn expansion_limit<I>(&self, event: &Event, placed: I) -> usize
    where
        I: IntoIterator<Item = Placement>,
    {
        self.find_available_rooms(event.capacity, placed, &event.available_periods)
            .iter()
            .map(|(_, rooms)| rooms.len())
            .sum()
    }
}
