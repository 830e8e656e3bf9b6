use log::{debug, info, trace};
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crate::config::{HARD_PENALTY, SolverConfig};
use crate::conflicts::{ConflictsChecker, Score};
use crate::data::StopReason;
use crate::hill_climbing::HillClimber;
use crate::model::{Event, EventId, Problem};
use crate::sink::{BestSolutionSink, CancellationToken, Snapshot};
use crate::timetable::{Placement, Timetable};
use crate::tree::{Assignment, NodeId, Tree};

/// Maps a raw penalty onto `[0, 1]` given the best (lowest) and worst (highest)
/// penalties seen so far: `(e^a - 1) / (e - 1)` with
/// `a = (value - worst) / (best - worst)`.
pub fn normalise(value: u32, best: u32, worst: u32) -> f64 {
    if best == 0 && worst == 0 {
        return 1.0;
    }
    if best == worst {
        return 0.5;
    }
    let a = (f64::from(value) - f64::from(worst)) / (f64::from(best) - f64::from(worst));
    a.exp_m1() / (std::f64::consts::E - 1.0)
}

/// Weight of the compactness term for the `index`-th placement out of `total`.
/// Later placements have more neighbours fixed, so compactness counts more.
fn compactness_weight(index: usize, total: usize) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    (index as f64 / (total - 1) as f64).min(1.0)
}

/// Lowest and highest penalty observed by rollouts.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    best: u32,
    worst: u32,
}

impl Bounds {
    fn new() -> Self {
        Self {
            best: u32::MAX,
            worst: 0,
        }
    }

    fn observe(&mut self, value: u32) {
        self.best = self.best.min(value);
        self.worst = self.worst.max(value);
    }

    fn normalise(&self, value: u32) -> f64 {
        normalise(value, self.best, self.worst)
    }
}

#[derive(Debug, Clone)]
struct Incumbent {
    timetable: Timetable,
    score: Score,
}

/// Result of one search.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Best full timetable seen, hill-climbing refinements included.
    pub timetable: Timetable,
    pub score: Score,
    /// Assignments along the tree path with the greatest accumulated scores.
    pub best_path: Vec<Assignment>,
    pub iterations: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    pub tree_size: usize,
}

/// Tree search where depth `d` commits the `d`-th lecture of [`Problem::order`].
pub struct Mcts<'p, R, S> {
    problem: &'p Problem,
    checker: ConflictsChecker<'p>,
    tree: Tree,
    exploration_constant: f64,
    iteration_cap: Option<u64>,
    time_limit: Duration,
    idle_cap: u32,
    rng: R,
    sink: S,
    cancel: CancellationToken,
    hard_bounds: Bounds,
    soft_bounds: Bounds,
    incumbent: Option<Incumbent>,
    /// Lectures a rollout failed to place; later rollouts place them first.
    difficult: HashSet<EventId>,
}

impl<'p, R, S> Mcts<'p, R, S>
where
    R: Rng,
    S: BestSolutionSink,
{
    pub fn new(problem: &'p Problem, config: &SolverConfig, rng: R, sink: S, cancel: CancellationToken) -> Self {
        let root_limit = problem
            .order()
            .first()
            .map_or(0, |&first| problem.expansion_limit(problem.event(first), std::iter::empty()));
        Self {
            problem,
            checker: ConflictsChecker::new(problem),
            tree: Tree::new(root_limit),
            exploration_constant: config.exploration_constant,
            iteration_cap: config.iterations,
            time_limit: config.time_limit(),
            idle_cap: config.hill_climbing_idle,
            rng,
            sink,
            cancel,
            hard_bounds: Bounds::new(),
            soft_bounds: Bounds::new(),
            incumbent: None,
            difficult: HashSet::new(),
        }
    }

    pub fn run(mut self) -> RunOutcome {
        let start = Instant::now();
        let deadline = start.checked_add(self.time_limit);
        info!(
            "Starting MCTS over {} lectures (root expansion limit {})",
            self.problem.num_events(),
            self.tree.root().expansion_limit
        );

        let mut iterations = 0;
        let stop_reason = loop {
            if self.iteration_cap.is_some_and(|cap| iterations >= cap) {
                break StopReason::IterationBudget;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break StopReason::TimeBudget;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            let step = self.iterate(deadline);
            iterations += 1;
            if let ControlFlow::Break(reason) = step {
                break reason;
            }
        };

        let best_path = self.tree.path(self.tree.best_terminal());
        let num_events = self.problem.num_events();
        let (timetable, score) = match self.incumbent {
            Some(incumbent) => (incumbent.timetable, incumbent.score),
            None => (
                Timetable::new(num_events),
                Score::new(num_events as u32 * HARD_PENALTY, 0),
            ),
        };
        let elapsed = start.elapsed();
        info!(
            "MCTS stopped ({}) after {} iterations in {:.2?}: hard {}, soft {}, {} nodes",
            stop_reason,
            iterations,
            elapsed,
            score.hard,
            score.soft,
            self.tree.len()
        );

        RunOutcome {
            timetable,
            score,
            best_path,
            iterations,
            elapsed,
            stop_reason,
            tree_size: self.tree.len(),
        }
    }

    /// One selection, expansion, rollout and backpropagation cycle.
    fn iterate(&mut self, deadline: Option<Instant>) -> ControlFlow<StopReason> {
        let Some(selected) = self.select() else {
            return ControlFlow::Break(StopReason::TreeExhausted);
        };
        let Some((leaf, path)) = self.expand(selected) else {
            return ControlFlow::Continue(());
        };
        let (reward_hard, reward_soft) = self.simulate(leaf, path, deadline);
        self.tree.backpropagate(leaf, reward_hard, reward_soft);

        if self.incumbent.as_ref().is_some_and(|incumbent| incumbent.score.is_optimal()) {
            return ControlFlow::Break(StopReason::Optimal);
        }
        ControlFlow::Continue(())
    }

    /// Descends from the root to the first node that can still be expanded.
    /// Nodes whose children are all dead die themselves and the descent resumes
    /// at their parent. Returns `None` once the root is dead.
    fn select(&mut self) -> Option<NodeId> {
        let total = self.problem.order().len();
        let mut current = NodeId::ROOT;
        loop {
            let node = self.tree.get(current);
            if node.is_dead() {
                current = node.parent?;
                continue;
            }
            if !node.is_fully_expanded() || node.is_terminal(total) {
                return Some(current);
            }

            let live = self.tree.live_children(current);
            match self.tree.best_child(current, &live, self.exploration_constant) {
                Some(child) => current = child,
                None => {
                    trace!("Node {:?} has no live children left", current);
                    self.tree.get_mut(current).mark_dead();
                }
            }
        }
    }

    /// Adds the next unexplored child of `id` and returns it with its path.
    fn expand(&mut self, id: NodeId) -> Option<(NodeId, Timetable)> {
        let problem = self.problem;
        let node = self.tree.get(id);
        let (depth, expanded) = (node.depth, node.children.len());

        let Some(&event_id) = problem.order().get(depth) else {
            self.tree.get_mut(id).mark_dead();
            return None;
        };
        let event = problem.event(event_id);
        let mut path = self.tree.path_timetable(id, problem.num_events());

        let candidates: Vec<Placement> = problem
            .find_available_rooms(event.capacity, path.all().placements(), &event.available_periods)
            .into_iter()
            .flat_map(|(period, rooms)| rooms.into_iter().map(move |room| Placement::new(room, period)))
            .collect();
        let Some(&placement) = candidates.get(expanded) else {
            debug!("Node {:?} ran out of candidates for lecture {}", id, event_id);
            self.tree.get_mut(id).mark_dead();
            return None;
        };

        path.insert(event_id, placement);
        let limit = problem
            .order()
            .get(depth + 1)
            .map_or(0, |&next| problem.expansion_limit(problem.event(next), path.all().placements()));
        let child = self.tree.add_child(
            id,
            Assignment {
                event: event_id,
                placement,
            },
            limit,
        );

        // a partial path only gains hard penalty as it grows
        if let Some(best) = &self.incumbent {
            let hard =
                self.checker.evaluate_hard(&path) + problem.unplaceable().len() as u32 * HARD_PENALTY;
            if hard > best.score.hard {
                trace!("Pruning node {:?}: path hard penalty {} > {}", child, hard, best.score.hard);
                self.tree.get_mut(child).mark_dead();
            }
        }
        Some((child, path))
    }

    /// Greedily completes `timetable`, records the result and returns the hard
    /// and soft rewards of `leaf`.
    fn simulate(&mut self, leaf: NodeId, mut timetable: Timetable, deadline: Option<Instant>) -> (f64, f64) {
        let problem = self.problem;
        let depth = self.tree.get(leaf).depth;

        let mut remaining = problem.order()[depth..].to_vec();
        remaining.shuffle(&mut self.rng);
        remaining.sort_by_key(|&id| Reverse((self.difficult.contains(&id), problem.event(id).priority)));

        let mut unassigned = problem.unplaceable().len();
        for (i, &id) in remaining.iter().enumerate() {
            let event = problem.event(id);
            match self.best_placement(event, depth + i, &timetable) {
                Some(placement) => timetable.insert(id, placement),
                None => {
                    self.difficult.insert(id);
                    unassigned += 1;
                }
            }
        }

        let score = self.checker.evaluate(&timetable, unassigned);
        self.hard_bounds.observe(score.hard);
        self.soft_bounds.observe(score.soft);
        self.tree.get_mut(leaf).record(score);
        trace!("Rollout from depth {}: hard {}, soft {}", depth, score.hard, score.soft);

        if self.incumbent.as_ref().is_none_or(|incumbent| score < incumbent.score) {
            debug!("New best timetable: hard {}, soft {}", score.hard, score.soft);
            self.sink.publish(Snapshot::capture(problem, &timetable, score));

            let mut best = score;
            if unassigned == 0 && score.hard == 0 && score.soft > 0 {
                let climber = HillClimber::new(&self.checker, self.idle_cap, deadline, &self.cancel);
                let refined = climber.run(&mut timetable, depth, score.soft, &mut self.rng, &mut self.sink);
                best.soft = refined.soft;
                self.soft_bounds.observe(refined.soft);
                self.tree.get_mut(leaf).record_soft(refined.soft);
            }
            self.incumbent = Some(Incumbent {
                timetable,
                score: best,
            });
        }

        let node = self.tree.get(leaf);
        let reward_hard = node
            .best_hard_penalty
            .map_or(0.0, |penalty| self.hard_bounds.normalise(penalty));
        let reward_soft = node
            .best_soft_penalty
            .map_or(0.0, |penalty| self.soft_bounds.normalise(penalty));
        (reward_hard, reward_soft)
    }

    /// Hard-feasible placement with the lowest weighted soft penalty, chosen
    /// uniformly among ties. `None` if every candidate breaks a hard constraint.
    fn best_placement(&mut self, event: &Event, index: usize, timetable: &Timetable) -> Option<Placement> {
        let weight = compactness_weight(index, self.problem.order().len());
        let others = timetable.all();

        let mut lowest = f64::INFINITY;
        let mut candidates = Vec::new();
        for (period, rooms) in
            self.problem
                .find_available_rooms(event.capacity, others.placements(), &event.available_periods)
        {
            for room in rooms {
                let placement = Placement::new(room, period);
                if self.checker.placed_hard_penalty(event, others, placement) != 0 {
                    continue;
                }
                let soft = f64::from(self.checker.room_capacity(event, room))
                    + weight * f64::from(self.checker.block_compactness(event, others, period))
                    + f64::from(self.checker.min_working_days(event, others, period.day))
                    + f64::from(self.checker.room_stability(event, others, room));
                if soft < lowest {
                    lowest = soft;
                    candidates.clear();
                    candidates.push(placement);
                } else if soft == lowest {
                    candidates.push(placement);
                }
            }
        }
        candidates.choose(&mut self.rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{build, course, input, room, unavailable};
    use crate::sink::{MemorySink, NullSink};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config(iterations: u64) -> SolverConfig {
        SolverConfig {
            hill_climbing_idle: 20,
            ..SolverConfig::default()
        }
        .with_iterations(iterations)
        .with_seed(5)
    }

    fn engine<'p>(problem: &'p Problem, iterations: u64) -> Mcts<'p, ChaCha8Rng, NullSink> {
        Mcts::new(
            problem,
            &config(iterations),
            ChaCha8Rng::seed_from_u64(5),
            NullSink,
            CancellationToken::new(),
        )
    }

    /// Two single-lecture courses, one room, two periods; both rooms too small
    /// so every complete timetable carries a soft penalty.
    fn two_slot_problem() -> Problem {
        let mut data = input(1, 2);
        data.courses = vec![course("a", "t1", 1, 1, 30), course("b", "t2", 1, 1, 20)];
        data.rooms = vec![room("r", 10)];
        build(&data)
    }

    #[test]
    fn normalisation_bounds() {
        assert_eq!(normalise(0, 0, 0), 1.0);
        assert_eq!(normalise(7, 7, 7), 0.5);
        assert!((normalise(3, 3, 10) - 1.0).abs() < 1e-12);
        assert!(normalise(10, 3, 10).abs() < 1e-12);

        let middle = normalise(6, 3, 10);
        assert!(middle > 0.0 && middle < 1.0);
        assert!(normalise(5, 3, 10) > middle);
    }

    #[test]
    fn compactness_weight_grows_to_one() {
        assert_eq!(compactness_weight(0, 5), 0.0);
        assert_eq!(compactness_weight(2, 5), 0.5);
        assert_eq!(compactness_weight(4, 5), 1.0);
        assert_eq!(compactness_weight(0, 1), 1.0);
    }

    #[test]
    fn dead_nodes_are_never_selected_again() {
        let problem = two_slot_problem();
        let mut mcts = engine(&problem, 10);
        assert_eq!(mcts.tree.root().expansion_limit, 2);

        let _ = mcts.iterate(None);
        let first = mcts.tree.root().children[0];
        mcts.tree.get_mut(first).mark_dead();

        let _ = mcts.iterate(None);
        let second = mcts.tree.root().children[1];
        assert!(mcts.tree.root().is_fully_expanded());

        for _ in 0..5 {
            let selected = mcts.select();
            assert_ne!(selected, Some(first));
            assert_ne!(selected, Some(NodeId::ROOT));
        }
        assert!(mcts.tree.get(first).children.is_empty());

        mcts.tree.get_mut(second).mark_dead();
        assert_eq!(mcts.select(), None);
        assert!(mcts.tree.root().is_dead());
        assert_eq!(mcts.iterate(None), ControlFlow::Break(StopReason::TreeExhausted));
    }

    #[test]
    fn rollout_result_becomes_incumbent_and_is_published() {
        let problem = two_slot_problem();
        let mut sink = MemorySink::default();
        let outcome = Mcts::new(
            &problem,
            &config(1),
            ChaCha8Rng::seed_from_u64(5),
            &mut sink,
            CancellationToken::new(),
        )
        .run();

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.stop_reason, StopReason::IterationBudget);
        assert_eq!(outcome.timetable.len(), 2);
        // 20 + 10 seats short, nothing else to fix
        assert_eq!(outcome.score, Score::new(0, 30));
        assert_eq!(outcome.best_path.len(), 1);
        assert_eq!(sink.latest().map(|s| s.score), Some(outcome.score));

        let checker = ConflictsChecker::new(&problem);
        assert_eq!(checker.evaluate(&outcome.timetable, 0), outcome.score);
    }

    #[test]
    fn search_exhausts_small_tree() {
        let problem = two_slot_problem();
        let outcome = engine(&problem, 1_000).run();

        assert_eq!(outcome.stop_reason, StopReason::TreeExhausted);
        // root, two first-level children, one leaf each
        assert_eq!(outcome.tree_size, 5);
        assert_eq!(outcome.score, Score::new(0, 30));
        assert!(outcome.iterations < 1_000);
    }

    #[test]
    fn zero_budget_returns_everything_unassigned() {
        let problem = two_slot_problem();
        let outcome = engine(&problem, 0).run();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.stop_reason, StopReason::IterationBudget);
        assert!(outcome.timetable.is_empty());
        assert_eq!(outcome.score, Score::new(2, 0));
        assert!(outcome.best_path.is_empty());
    }

    #[test]
    fn cancellation_stops_before_the_first_iteration() {
        let problem = two_slot_problem();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = Mcts::new(&problem, &config(100), ChaCha8Rng::seed_from_u64(5), NullSink, cancel).run();

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn stops_at_proven_optimum() {
        let mut data = input(2, 2);
        data.courses = vec![course("a", "t1", 2, 2, 10), course("b", "t2", 1, 1, 10)];
        data.rooms = vec![room("r", 10)];
        let problem = build(&data);
        let outcome = engine(&problem, 1_000).run();

        assert_eq!(outcome.stop_reason, StopReason::Optimal);
        assert!(outcome.score.is_optimal());
        assert_eq!(outcome.timetable.len(), 3);
    }

    #[test]
    fn blocked_course_costs_only_its_own_lectures() {
        let mut data = input(1, 5);
        data.courses = vec![
            course("blocked", "t0", 1, 1, 10),
            course("a", "t1", 1, 1, 10),
            course("b", "t2", 1, 1, 10),
            course("c", "t3", 1, 1, 10),
            course("d", "t4", 1, 1, 10),
        ];
        data.rooms = vec![room("r", 10)];
        data.unavailability = (0..5).map(|slot| unavailable("blocked", 0, slot)).collect();
        let problem = build(&data);
        let outcome = engine(&problem, 200).run();

        assert_eq!(outcome.score, Score::new(1, 0));
        assert_eq!(outcome.timetable.len(), 4);
        assert!(!outcome.timetable.contains(0));
        assert!((1..5).all(|id| outcome.timetable.contains(id)));
    }
}
