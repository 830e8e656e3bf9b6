use serde_json::json;
use timetable_mcts::sink::{CancellationToken, MemorySink};
use timetable_mcts::{ProblemInput, SolverConfig, StopReason, solve, solve_with};

fn problem(value: serde_json::Value) -> ProblemInput {
    serde_json::from_value(value).unwrap()
}

fn config() -> SolverConfig {
    SolverConfig::default().with_iterations(500).with_seed(42)
}

#[test]
fn trivial_instance_is_solved_optimally() {
    let input = problem(json!({
        "name": "trivial",
        "days": 1,
        "periodsPerDay": 1,
        "courses": [{"name": "c1", "teacher": "t1", "lectures": 1, "minWorkingDays": 1, "students": 20}],
        "rooms": [{"id": "r1", "capacity": 30}]
    }));

    let output = solve(&input, &config()).unwrap();

    assert_eq!(output.hard_penalty, 0);
    assert_eq!(output.soft_penalty, 0);
    assert_eq!(output.stop_reason, StopReason::Optimal);
    assert_eq!(output.lectures.len(), 1);
    assert_eq!(output.lectures[0].to_string(), "c1 r1 0 0");
}

#[test]
fn two_courses_share_one_room_over_two_timeslots() {
    let input = problem(json!({
        "days": 1,
        "periodsPerDay": 2,
        "courses": [
            {"name": "c1", "teacher": "t1", "lectures": 1, "minWorkingDays": 1, "students": 20},
            {"name": "c2", "teacher": "t2", "lectures": 1, "minWorkingDays": 1, "students": 25}
        ],
        "rooms": [{"id": "r1", "capacity": 30}]
    }));

    let output = solve(&input, &config()).unwrap();

    assert_eq!((output.hard_penalty, output.soft_penalty), (0, 0));
    assert_eq!(output.stop_reason, StopReason::Optimal);
    assert!(output.lectures.iter().all(|l| l.room.as_deref() == Some("r1")));
    assert_ne!(output.lectures[0].timeslot, output.lectures[1].timeslot);
}

#[test]
fn course_without_periods_leaves_the_rest_placed() {
    let input = problem(json!({
        "days": 1,
        "periodsPerDay": 5,
        "courses": [
            {"name": "blocked", "teacher": "t0", "lectures": 1, "minWorkingDays": 1, "students": 10},
            {"name": "c1", "teacher": "t1", "lectures": 1, "minWorkingDays": 1, "students": 10},
            {"name": "c2", "teacher": "t2", "lectures": 1, "minWorkingDays": 1, "students": 10},
            {"name": "c3", "teacher": "t3", "lectures": 1, "minWorkingDays": 1, "students": 10},
            {"name": "c4", "teacher": "t4", "lectures": 1, "minWorkingDays": 1, "students": 10}
        ],
        "rooms": [{"id": "r1", "capacity": 10}],
        "unavailability": [
            {"course": "blocked", "day": 0, "period": 0},
            {"course": "blocked", "day": 0, "period": 1},
            {"course": "blocked", "day": 0, "period": 2},
            {"course": "blocked", "day": 0, "period": 3},
            {"course": "blocked", "day": 0, "period": 4}
        ]
    }));

    let output = solve(&input, &SolverConfig::default().with_iterations(200).with_seed(42)).unwrap();

    assert_eq!(output.hard_penalty, 1);
    assert_eq!(output.soft_penalty, 0);
    assert_eq!(output.lectures[0].room, None);
    assert!(output.lectures[1..].iter().all(|l| l.room.is_some()));
}

#[test]
fn teacher_clash_in_single_period_terminates_with_hard_penalty() {
    let input = problem(json!({
        "days": 1,
        "periodsPerDay": 1,
        "courses": [
            {"name": "c1", "teacher": "t1", "lectures": 1, "minWorkingDays": 1, "students": 10},
            {"name": "c2", "teacher": "t1", "lectures": 1, "minWorkingDays": 1, "students": 10}
        ],
        "rooms": [{"id": "r1", "capacity": 10}, {"id": "r2", "capacity": 10}]
    }));

    let output = solve(&input, &config()).unwrap();

    assert_eq!(output.hard_penalty, 1);
    assert_eq!(output.stop_reason, StopReason::TreeExhausted);
    assert_eq!(output.lectures.len(), 2);
    assert_eq!(output.lectures.iter().filter(|l| l.room.is_none()).count(), 1);
}

#[test]
fn missing_working_day_costs_five() {
    let input = problem(json!({
        "days": 2,
        "periodsPerDay": 2,
        "courses": [{"name": "c1", "teacher": "t1", "lectures": 3, "minWorkingDays": 3, "students": 10}],
        "rooms": [{"id": "r1", "capacity": 10}]
    }));

    let output = solve(&input, &config()).unwrap();

    assert_eq!(output.hard_penalty, 0);
    assert_eq!(output.soft_penalty, 5);
    assert_eq!(output.soft_breakdown.min_working_days, 5);
    assert_ne!(output.stop_reason, StopReason::Optimal);
    assert!(output.lectures.iter().all(|l| l.room.is_some()));
}

fn curriculum_instance() -> ProblemInput {
    problem(json!({
        "name": "small",
        "days": 3,
        "periodsPerDay": 3,
        "courses": [
            {"name": "algebra", "teacher": "ada", "lectures": 3, "minWorkingDays": 3, "students": 40},
            {"name": "calculus", "teacher": "ada", "lectures": 2, "minWorkingDays": 2, "students": 35},
            {"name": "physics", "teacher": "max", "lectures": 2, "minWorkingDays": 2, "students": 25},
            {"name": "history", "teacher": "eve", "lectures": 1, "minWorkingDays": 1, "students": 60}
        ],
        "rooms": [{"id": "small", "capacity": 30}, {"id": "large", "capacity": 50}],
        "curricula": [
            {"id": "y1", "courses": ["algebra", "physics"]},
            {"id": "y2", "courses": ["calculus", "history"]}
        ],
        "unavailability": [
            {"course": "history", "day": 0, "period": 0},
            {"course": "history", "day": 0, "period": 1}
        ]
    }))
}

#[test]
fn published_snapshots_improve_lexicographically() {
    let input = curriculum_instance();
    let mut sink = MemorySink::default();

    let output = solve_with(&input, &config(), &mut sink, CancellationToken::new()).unwrap();

    assert!(!sink.snapshots.is_empty());
    for pair in sink.snapshots.windows(2) {
        assert!(pair[1].score < pair[0].score);
    }
    let last = sink.latest().unwrap();
    assert_eq!((last.score.hard, last.score.soft), (output.hard_penalty, output.soft_penalty));
    assert_eq!(output.hard_penalty, 0);
    assert_eq!(output.lectures.len(), 8);
}

#[test]
fn same_seed_gives_same_timetable() {
    let input = curriculum_instance();
    let config = SolverConfig::default().with_iterations(50).with_seed(9);

    let first = solve(&input, &config).unwrap();
    let second = solve(&input, &config).unwrap();

    assert_eq!(first.lectures, second.lectures);
    assert_eq!(first.soft_penalty, second.soft_penalty);
}

#[test]
fn cancelled_solve_still_reports_every_lecture() {
    let input = curriculum_instance();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let output = solve_with(&input, &config(), MemorySink::default(), cancel).unwrap();

    assert_eq!(output.stop_reason, StopReason::Cancelled);
    assert_eq!(output.iterations, 0);
    assert_eq!(output.lectures.len(), 8);
    assert_eq!(output.hard_penalty, 8);
}
