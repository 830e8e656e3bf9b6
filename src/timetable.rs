use crate::model::{EventId, Period, RoomIdx};

/// Where a lecture takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub room: RoomIdx,
    pub period: Period,
}

impl Placement {
    pub fn new(room: RoomIdx, period: Period) -> Self {
        Self { room, period }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    position: usize,
    placement: Placement,
}

/// Lecture placements kept in insertion order. Evaluation checks each lecture
/// only against the ones placed after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timetable {
    order: Vec<EventId>,
    slots: Vec<Option<Slot>>,
}

impl Timetable {
    pub fn new(num_events: usize) -> Self {
        Self {
            order: Vec::with_capacity(num_events),
            slots: vec![None; num_events],
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.slot(id).is_some()
    }

    pub fn get(&self, id: EventId) -> Option<Placement> {
        self.slot(id).map(|slot| slot.placement)
    }

    /// Position of the lecture in insertion order.
    pub fn position(&self, id: EventId) -> Option<usize> {
        self.slot(id).map(|slot| slot.position)
    }

    /// Places a lecture. A lecture that is already placed keeps its position and
    /// only changes room and period.
    pub fn insert(&mut self, id: EventId, placement: Placement) {
        if id >= self.slots.len() {
            self.slots.resize(id + 1, None);
        }
        match &mut self.slots[id] {
            Some(slot) => slot.placement = placement,
            empty => {
                *empty = Some(Slot {
                    position: self.order.len(),
                    placement,
                });
                self.order.push(id);
            }
        }
    }

    /// Moves an already placed lecture, returning its previous placement.
    pub fn relocate(&mut self, id: EventId, placement: Placement) -> Option<Placement> {
        let slot = self.slots.get_mut(id)?.as_mut()?;
        Some(std::mem::replace(&mut slot.placement, placement))
    }

    pub fn order(&self) -> &[EventId] {
        &self.order
    }

    /// Placed lectures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, Placement)> + '_ {
        self.all().iter()
    }

    pub fn all(&self) -> Scope<'_> {
        Scope {
            timetable: self,
            start: 0,
        }
    }

    /// The lectures placed after `id`. Empty when `id` is not placed.
    pub fn after(&self, id: EventId) -> Scope<'_> {
        let start = self.position(id).map_or(self.order.len(), |position| position + 1);
        Scope {
            timetable: self,
            start,
        }
    }

    fn slot(&self, id: EventId) -> Option<&Slot> {
        self.slots.get(id).and_then(Option::as_ref)
    }
}

impl FromIterator<(EventId, Placement)> for Timetable {
    fn from_iter<I: IntoIterator<Item = (EventId, Placement)>>(iter: I) -> Self {
        let mut timetable = Timetable::default();
        for (id, placement) in iter {
            timetable.insert(id, placement);
        }
        timetable
    }
}

/// A suffix of a timetable's insertion order, used as the "other events" a
/// lecture is checked against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    timetable: &'a Timetable,
    start: usize,
}

impl<'a> Scope<'a> {
    pub fn get(&self, id: EventId) -> Option<Placement> {
        let slot = self.timetable.slot(id)?;
        (slot.position >= self.start).then_some(slot.placement)
    }

    pub fn iter(self) -> impl Iterator<Item = (EventId, Placement)> + 'a {
        let timetable = self.timetable;
        timetable.order[self.start.min(timetable.order.len())..]
            .iter()
            .filter_map(move |&id| timetable.get(id).map(|placement| (id, placement)))
    }

    pub fn placements(self) -> impl Iterator<Item = Placement> + 'a {
        self.iter().map(|(_, placement)| placement)
    }
}

/// Scoped undo log around a trial modification.
///
/// Every relocation goes through [`Transaction::relocate`], which remembers the
/// previous placement. Dropping the transaction without [`Transaction::commit`]
/// restores every recorded placement in reverse order.
pub struct Transaction<'a> {
    timetable: &'a mut Timetable,
    undo: Vec<(EventId, Placement)>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(timetable: &'a mut Timetable) -> Self {
        Self {
            timetable,
            undo: Vec::new(),
            committed: false,
        }
    }

    pub fn timetable(&self) -> &Timetable {
        self.timetable
    }

    /// Returns `false` (and records nothing) if the lecture is not placed.
    pub fn relocate(&mut self, id: EventId, placement: Placement) -> bool {
        match self.timetable.relocate(id, placement) {
            Some(previous) => {
                self.undo.push((id, previous));
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Marks the current state so later relocations can be undone on their own.
    pub fn savepoint(&self) -> usize {
        self.undo.len()
    }

    /// Undoes every relocation made after `savepoint`.
    pub fn rollback_to(&mut self, savepoint: usize) {
        while self.undo.len() > savepoint {
            if let Some((id, previous)) = self.undo.pop() {
                self.timetable.relocate(id, previous);
            }
        }
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.rollback_to(0);
    }
}
