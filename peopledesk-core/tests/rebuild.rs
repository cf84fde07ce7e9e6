use peopledesk_core::maintenance::{
    ChecklistProgress, Projection, RebuildOptions, Rebuilder, SurveyResponses,
};
use peopledesk_core::models::*;
use peopledesk_core::{Database, MaintenanceError};
use rusqlite::Connection;
use tempfile::TempDir;
use uuid::Uuid;

struct Fixture {
    _dir: TempDir,
    path: std::path::PathBuf,
    db: Database,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("peopledesk.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        Self { _dir: dir, path, db }
    }

    /// A second, independent connection to the same file.
    fn raw(&self) -> Connection {
        let conn = Connection::open(&self.path).unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    fn user(&self, name: &str) -> User {
        self.db
            .create_user(CreateUserInput {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                role: None,
            })
            .unwrap()
    }

    fn checklist(&self, items: &[&str]) -> (Checklist, Vec<ChecklistItem>) {
        let checklist = self
            .db
            .create_checklist(CreateChecklistInput {
                title: "Onboarding".into(),
                description: None,
            })
            .unwrap();
        let items = items
            .iter()
            .map(|description| {
                self.db
                    .add_checklist_item(
                        checklist.id,
                        CreateChecklistItemInput {
                            description: description.to_string(),
                            position: None,
                        },
                    )
                    .unwrap()
            })
            .collect();
        (checklist, items)
    }

    fn assign(&self, checklist: &Checklist, user: &User) {
        self.db
            .assign_checklist(checklist.id, AssignChecklistInput { user_id: user.id })
            .unwrap();
    }

    fn rebuild(&self, projection: &dyn Projection) -> RebuildSummary {
        Rebuilder::new(&self.db)
            .run(projection, RebuildOptions::default())
            .unwrap()
            .summary
    }
}

fn summary(inserted: usize, deleted: usize, unchanged: usize) -> RebuildSummary {
    RebuildSummary {
        inserted,
        deleted,
        unchanged,
    }
}

#[test]
fn rebuild_creates_progress_for_every_assigned_item() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let grace = fx.user("Grace");
    let (checklist, items) = fx.checklist(&["Laptop", "Badge", "Payroll"]);
    fx.assign(&checklist, &ada);
    fx.assign(&checklist, &grace);

    assert_eq!(fx.rebuild(&ChecklistProgress), summary(6, 0, 0));

    let progress = fx.db.get_progress_for_user(ada.id).unwrap();
    assert_eq!(progress.len(), 3);
    assert!(progress.iter().all(|p| !p.completed
        && p.note.is_none()
        && p.verification == VerificationStatus::Unverified));
    assert_eq!(progress[0].item_id, items[0].id);
}

#[test]
fn second_rebuild_is_idempotent() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let (checklist, _) = fx.checklist(&["Laptop", "Badge"]);
    fx.assign(&checklist, &ada);

    fx.rebuild(&ChecklistProgress);
    let second = fx.rebuild(&ChecklistProgress);

    assert_eq!(second, summary(0, 0, 2));
    assert!(second.is_noop());
}

#[test]
fn user_payload_survives_rebuild() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let (checklist, items) = fx.checklist(&["A"]);
    fx.assign(&checklist, &ada);
    fx.rebuild(&ChecklistProgress);

    fx.db
        .update_progress(
            ada.id,
            items[0].id,
            UpdateProgressInput {
                completed: Some(true),
                note: Some(Some("picked up on day one".into())),
                verification: Some(VerificationStatus::Verified),
            },
        )
        .unwrap();

    // Item B is added to the checklist afterwards.
    fx.db
        .add_checklist_item(
            checklist.id,
            CreateChecklistItemInput {
                description: "B".into(),
                position: None,
            },
        )
        .unwrap();

    assert_eq!(fx.rebuild(&ChecklistProgress), summary(1, 0, 1));

    let a = fx.db.get_progress(ada.id, items[0].id).unwrap().unwrap();
    assert!(a.completed);
    assert_eq!(a.note.as_deref(), Some("picked up on day one"));
    assert_eq!(a.verification, VerificationStatus::Verified);
}

#[test]
fn unassigning_removes_only_that_users_rows() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let grace = fx.user("Grace");
    let (checklist, _) = fx.checklist(&["Laptop", "Badge"]);
    fx.assign(&checklist, &ada);
    fx.assign(&checklist, &grace);
    fx.rebuild(&ChecklistProgress);

    fx.db.unassign_checklist(checklist.id, grace.id).unwrap();

    assert_eq!(fx.rebuild(&ChecklistProgress), summary(0, 2, 2));
    assert!(fx.db.get_progress_for_user(grace.id).unwrap().is_empty());
    assert_eq!(fx.db.get_progress_for_user(ada.id).unwrap().len(), 2);
}

#[test]
fn empty_sources_purge_all_progress() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let labels: Vec<String> = (0..10).map(|n| format!("Step {n}")).collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    let (checklist, _) = fx.checklist(&labels);
    fx.assign(&checklist, &ada);
    assert_eq!(fx.rebuild(&ChecklistProgress), summary(10, 0, 0));

    fx.db.unassign_checklist(checklist.id, ada.id).unwrap();
    let purge = fx.rebuild(&ChecklistProgress);

    assert_eq!(purge, summary(0, 10, 0));
    assert!(!purge.is_noop());
    assert_eq!(fx.db.count_progress().unwrap(), 0);

    let again = fx.rebuild(&ChecklistProgress);
    assert_eq!(again, summary(0, 0, 0));
    assert!(again.is_noop());
}

#[test]
fn failed_insert_rolls_back_whole_plan() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let grace = fx.user("Grace");
    let (checklist, _) = fx.checklist(&["Laptop", "Badge"]);
    fx.assign(&checklist, &ada);
    fx.rebuild(&ChecklistProgress);
    let before = fx.db.count_progress().unwrap();
    fx.db.unassign_checklist(checklist.id, ada.id).unwrap();
    fx.assign(&checklist, &grace);

    // The plan deletes Ada's two rows, then inserts two for Grace; the second
    // insert aborts.
    fx.raw()
        .execute_batch(
            "CREATE TRIGGER fail_second_insert BEFORE INSERT ON checklist_progress
             WHEN (SELECT COUNT(*) FROM checklist_progress) >= 1
             BEGIN SELECT RAISE(ABORT, 'simulated insert failure'); END;",
        )
        .unwrap();

    let err = Rebuilder::new(&fx.db)
        .run(&ChecklistProgress, RebuildOptions::default())
        .unwrap_err();

    assert!(matches!(err, MaintenanceError::PlanApplication { .. }));
    assert_eq!(fx.db.count_progress().unwrap(), before);
    assert_eq!(fx.db.get_progress_for_user(ada.id).unwrap().len(), 2);
    assert!(fx.db.get_progress_for_user(grace.id).unwrap().is_empty());
    assert_eq!(fx.db.get_recent_runs(10).unwrap().len(), 1);
}

#[test]
fn dry_run_reports_plan_without_writing() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let (checklist, _) = fx.checklist(&["Laptop", "Badge"]);
    fx.assign(&checklist, &ada);

    let report = Rebuilder::new(&fx.db)
        .run(&ChecklistProgress, RebuildOptions { dry_run: true })
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.summary, summary(2, 0, 0));
    assert!(report.run_id.is_none());
    assert_eq!(fx.db.count_progress().unwrap(), 0);
    assert!(fx.db.get_recent_runs(10).unwrap().is_empty());
}

#[test]
fn committed_runs_are_recorded() {
    let fx = Fixture::new();
    let ada = fx.user("Ada");
    let (checklist, _) = fx.checklist(&["Laptop"]);
    fx.assign(&checklist, &ada);

    let report = Rebuilder::new(&fx.db)
        .run(&ChecklistProgress, RebuildOptions::default())
        .unwrap();

    let runs = fx.db.get_recent_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(Some(runs[0].id), report.run_id);
    assert_eq!(runs[0].projection, "checklist_progress");
    assert_eq!(runs[0].summary, summary(1, 0, 0));
}

#[test]
fn rebuild_refused_while_gate_held() {
    let fx = Fixture::new();
    let _lease = fx.db.gate().try_acquire().unwrap();

    let err = Rebuilder::new(&fx.db)
        .run(&ChecklistProgress, RebuildOptions::default())
        .unwrap_err();
    assert!(matches!(err, MaintenanceError::MaintenanceInProgress));

    let err = fx
        .db
        .update_progress(Uuid::new_v4(), Uuid::new_v4(), UpdateProgressInput::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MaintenanceError>(),
        Some(MaintenanceError::MaintenanceInProgress)
    ));
}

#[test]
fn writer_on_another_connection_waits_for_rebuild_lock() {
    let fx = Fixture::new();
    let other = fx.raw();
    other
        .busy_timeout(std::time::Duration::from_millis(0))
        .unwrap();
    other.execute_batch("BEGIN IMMEDIATE;").unwrap();

    // The rebuild cannot take the write lock while another writer holds it.
    let db = Database::open_with(&peopledesk_core::Config {
        db_path: fx.path.clone(),
        busy_timeout: std::time::Duration::from_millis(50),
    })
    .unwrap();
    let err = Rebuilder::new(&db)
        .run(&ChecklistProgress, RebuildOptions::default())
        .unwrap_err();
    assert!(matches!(err, MaintenanceError::Store(_)));

    other.execute_batch("ROLLBACK;").unwrap();
    Rebuilder::new(&db)
        .run(&ChecklistProgress, RebuildOptions::default())
        .unwrap();
}

mod surveys {
    use super::*;

    fn survey(fx: &Fixture, title: &str) -> SurveyWithQuestions {
        fx.db
            .create_survey(CreateSurveyInput {
                title: title.into(),
                questions: vec!["How was your week?".into(), "Any blockers?".into()],
            })
            .unwrap()
    }

    fn respond(fx: &Fixture, survey: &SurveyWithQuestions, user: &User) {
        fx.db
            .submit_response(
                survey.survey.id,
                SubmitResponseInput {
                    respondent_id: user.id,
                    answers: survey
                        .questions
                        .iter()
                        .map(|q| AnswerInput {
                            question_id: q.id,
                            value: "ok".into(),
                        })
                        .collect(),
                },
            )
            .unwrap();
    }

    #[test]
    fn reset_purges_responses_and_answers() {
        let fx = Fixture::new();
        let ada = fx.user("Ada");
        let grace = fx.user("Grace");
        let pulse = survey(&fx, "Pulse");
        respond(&fx, &pulse, &ada);
        respond(&fx, &pulse, &grace);
        assert_eq!(fx.db.count_survey_rows().unwrap(), (2, 4));

        let result = fx.rebuild(&SurveyResponses::all());

        assert_eq!(result, summary(0, 2, 0));
        assert_eq!(fx.db.count_survey_rows().unwrap(), (0, 0));
        let raw = fx.raw();
        let mut stmt = raw.prepare("PRAGMA foreign_key_check").unwrap();
        let violations = stmt.query_map([], |_| Ok(())).unwrap().count();
        assert_eq!(violations, 0);
    }

    #[test]
    fn scoped_reset_leaves_other_surveys_untouched() {
        let fx = Fixture::new();
        let ada = fx.user("Ada");
        let pulse = survey(&fx, "Pulse");
        let exit = survey(&fx, "Exit interview");
        respond(&fx, &pulse, &ada);
        respond(&fx, &exit, &ada);

        let result = fx.rebuild(&SurveyResponses::for_survey(pulse.survey.id));

        assert_eq!(result, summary(0, 1, 1));
        assert!(fx.db.get_responses(pulse.survey.id).unwrap().is_empty());
        let remaining = fx.db.get_responses(exit.survey.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].answers.len(), 2);
    }

    #[test]
    fn reset_with_no_responses_is_noop() {
        let fx = Fixture::new();
        survey(&fx, "Pulse");

        let result = fx.rebuild(&SurveyResponses::all());

        assert!(result.is_noop());
        assert_eq!(result, summary(0, 0, 0));
    }

    #[test]
    fn reset_tolerates_unrelated_dangling_rows() {
        let fx = Fixture::new();
        let ada = fx.user("Ada");
        let pulse = survey(&fx, "Pulse");
        respond(&fx, &pulse, &ada);

        let raw = fx.raw();
        raw.pragma_update(None, "foreign_keys", "OFF").unwrap();
        raw.execute(
            "INSERT INTO checklist_progress (user_id, item_id, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                ada.id.to_string(),
                Uuid::new_v4().to_string(),
                "2024-01-01T00:00:00Z"
            ],
        )
        .unwrap();

        let report = Rebuilder::new(&fx.db)
            .run(&SurveyResponses::all(), RebuildOptions::default())
            .unwrap();

        assert_eq!(report.summary, summary(0, 1, 0));
        assert_eq!(fx.db.count_survey_rows().unwrap(), (0, 0));
        let mut stmt = raw.prepare("PRAGMA foreign_key_check").unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["checklist_progress".to_string()]);
    }

    /// Same deletes, but without asking for the integrity guard.
    struct Unguarded(SurveyResponses);

    impl Projection for Unguarded {
        fn name(&self) -> &'static str {
            "survey_responses_unguarded"
        }

        fn required_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
            self.0.required_keys(conn)
        }

        fn current_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
            self.0.current_keys(conn)
        }

        fn insert_default(
            &self,
            conn: &Connection,
            key: &ProjectionKey,
        ) -> peopledesk_core::MaintenanceResult<()> {
            self.0.insert_default(conn, key)
        }

        fn delete(
            &self,
            conn: &Connection,
            key: &ProjectionKey,
        ) -> peopledesk_core::MaintenanceResult<()> {
            self.0.delete(conn, key)
        }
    }

    #[test]
    fn reset_without_guard_fails_and_rolls_back() {
        let fx = Fixture::new();
        let ada = fx.user("Ada");
        let pulse = survey(&fx, "Pulse");
        respond(&fx, &pulse, &ada);

        let err = Rebuilder::new(&fx.db)
            .run(&Unguarded(SurveyResponses::all()), RebuildOptions::default())
            .unwrap_err();

        match err {
            MaintenanceError::PlanApplication { projection, .. } => {
                assert_eq!(projection, "survey_responses_unguarded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.db.count_survey_rows().unwrap(), (1, 2));
    }
}
