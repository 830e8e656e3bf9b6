use log::{info, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use crate::config::SolverConfig;
use crate::conflicts::ConflictsChecker;
use crate::data::{ProblemInput, ScheduledLecture, SolveOutput};
use crate::error::SolveError;
use crate::mcts::Mcts;
use crate::model::Problem;
use crate::sink::{BestSolutionSink, CancellationToken, NullSink};

/// Solves the timetabling problem with MCTS and hill climbing.
pub fn solve(input: &ProblemInput, config: &SolverConfig) -> Result<SolveOutput, SolveError> {
    solve_with(input, config, NullSink, CancellationToken::new())
}

/// Like [`solve`], publishing every new best timetable to `sink` and stopping
/// early once `cancel` is set. Cancellation still yields the best timetable found.
pub fn solve_with<S: BestSolutionSink>(
    input: &ProblemInput,
    config: &SolverConfig,
    sink: S,
    cancel: CancellationToken,
) -> Result<SolveOutput, SolveError> {
    let start_time = Instant::now();
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let problem = Problem::build(input, &mut rng)?;
    info!(
        "Solving {:?} ({} unavailability constraints) with C = {}, iterations {:?}, time limit {}s",
        problem.name,
        problem.constraints().len(),
        config.exploration_constant,
        config.iterations,
        config.time_limit_secs
    );

    let outcome = Mcts::new(&problem, config, rng, sink, cancel).run();
    trace!(
        "Best tree path commits {} of {} lectures over {} nodes",
        outcome.best_path.len(),
        problem.num_events(),
        outcome.tree_size
    );

    let lectures: Vec<ScheduledLecture> = problem
        .events()
        .iter()
        .map(|event| {
            let placement = outcome.timetable.get(event.id);
            ScheduledLecture {
                event_id: event.id,
                course: event.name.clone(),
                room: placement.map(|p| problem.room(p.room).id.clone()),
                day: placement.map(|p| p.period.day),
                timeslot: placement.map(|p| p.period.timeslot),
            }
        })
        .collect();
    let soft_breakdown = ConflictsChecker::new(&problem).soft_breakdown(&outcome.timetable);

    let unassigned = lectures.iter().filter(|l| l.room.is_none()).count();
    info!(
        "Finished in {:.2?}: {} lectures, {} unassigned, hard penalty {}, soft penalty {}",
        start_time.elapsed(),
        lectures.len(),
        unassigned,
        outcome.score.hard,
        outcome.score.soft
    );

    Ok(SolveOutput {
        lectures,
        hard_penalty: outcome.score.hard,
        soft_penalty: outcome.score.soft,
        soft_breakdown,
        iterations: outcome.iterations,
        elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
        stop_reason: outcome.stop_reason,
    })
}
