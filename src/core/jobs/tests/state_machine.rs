use crate::core::jobs::{JobStatus, can_transition};

const ALL: [JobStatus; 6] = [
    JobStatus::Pending,
    JobStatus::Scheduled,
    JobStatus::Running,
    JobStatus::Completed,
    JobStatus::Failed,
    JobStatus::Cancelled,
];

#[test]
fn queued_jobs_can_start_or_cancel() {
    for from in [JobStatus::Pending, JobStatus::Scheduled] {
        assert!(can_transition(from, JobStatus::Running));
        assert!(can_transition(from, JobStatus::Cancelled));
        assert!(!can_transition(from, JobStatus::Completed));
        assert!(!can_transition(from, JobStatus::Failed));
    }
}

#[test]
fn running_jobs_only_finish() {
    assert!(can_transition(JobStatus::Running, JobStatus::Completed));
    assert!(can_transition(JobStatus::Running, JobStatus::Failed));
    assert!(!can_transition(JobStatus::Running, JobStatus::Cancelled));
    assert!(!can_transition(JobStatus::Running, JobStatus::Pending));
}

#[test]
fn terminal_states_never_resurrect() {
    for from in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
        for to in ALL {
            if to == from {
                continue;
            }
            assert!(!can_transition(from, to), "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn same_state_is_a_noop_transition() {
    for status in ALL {
        assert!(can_transition(status, status));
    }
}

#[test]
fn status_labels_round_trip_through_serde() {
    for status in ALL {
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, format!("\"{}\"", status.as_str()));
        let back: JobStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}

#[test]
fn cancellable_matches_queued_states() {
    for status in ALL {
        assert_eq!(
            status.is_cancellable(),
            matches!(status, JobStatus::Pending | JobStatus::Scheduled)
        );
    }
}
