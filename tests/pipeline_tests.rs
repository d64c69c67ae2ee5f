//! Orchestration tests: phase ordering, cardinality and failure policies.

mod common;

use common::RecordingWarehouse;
use wikisqoop::engine::InvocationKind;
use wikisqoop::plan::RunRequest;
use wikisqoop::report::{JobStatus, Phase, RunState};
use wikisqoop::{EtlError, FailurePolicy, Pipeline, PipelineOptions};

fn options(policy: FailurePolicy) -> PipelineOptions {
    PipelineOptions {
        policy,
        run_id: Some("run".to_string()),
        ..PipelineOptions::default()
    }
}

fn target_of(kind: &InvocationKind) -> String {
    match kind {
        InvocationKind::BulkImport { target, .. } | InvocationKind::Materialize { target, .. } => {
            target.to_string()
        }
        InvocationKind::DropTable { table } => table.to_string(),
        InvocationKind::CreateNamespace { namespace } => namespace.clone(),
    }
}

#[test]
fn test_two_languages_two_tables_job_matrix() {
    let mut pipeline = Pipeline::new(RecordingWarehouse::new(), options(FailurePolicy::AttemptAll))
        .expect("pipeline");
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en,fr", "page,redirect"))
        .expect("run should not hit a fatal error");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.phase_jobs(Phase::Import).count(), 4);
    assert_eq!(report.phase_jobs(Phase::Normalize).count(), 4);

    let warehouse = pipeline.runner();
    assert_eq!(warehouse.bulk_imports().len(), 4);
    assert_eq!(warehouse.materializations().len(), 4);

    // Every import precedes every materialization.
    let last_import = warehouse
        .events
        .iter()
        .rposition(|e| e.invocation.is_bulk_import())
        .unwrap();
    let first_materialize = warehouse
        .events
        .iter()
        .position(|e| matches!(e.invocation.kind, InvocationKind::Materialize { .. }))
        .unwrap();
    assert!(last_import < first_materialize);

    // Redirect normalizations see both languages' page tables.
    for event in warehouse.materializations() {
        if target_of(&event.invocation.kind).ends_with("_redirect") {
            assert!(event.existing.contains("wmf.en_page_raw"));
            assert!(event.existing.contains("wmf.fr_page_raw"));
        }
    }

    for table in ["en_page", "en_redirect", "fr_page", "fr_redirect"] {
        assert!(warehouse.has_table(&format!("wmf.{}", table)), "{} missing", table);
        assert!(warehouse.has_table(&format!("wmf.{}_raw", table)));
    }
}

#[test]
fn test_every_create_is_preceded_by_a_drop_of_the_same_table() {
    let mut pipeline = Pipeline::new(RecordingWarehouse::new(), options(FailurePolicy::AttemptAll))
        .expect("pipeline");
    pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page,revision"))
        .unwrap();

    let events = &pipeline.runner().events;
    assert!(matches!(
        events[0].invocation.kind,
        InvocationKind::CreateNamespace { .. }
    ));
    for (i, event) in events.iter().enumerate() {
        let creates = matches!(
            event.invocation.kind,
            InvocationKind::BulkImport { .. } | InvocationKind::Materialize { .. }
        );
        if creates {
            let previous = &events[i - 1];
            assert!(matches!(previous.invocation.kind, InvocationKind::DropTable { .. }));
            assert_eq!(
                target_of(&previous.invocation.kind),
                target_of(&event.invocation.kind)
            );
        }
    }
}

#[test]
fn test_failed_page_import_still_attempts_normalization() {
    let warehouse = RecordingWarehouse::new().fail_creating("wmf.fr_page_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::AttemptAll)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en,fr", "page,redirect"))
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    // All four normalizations were attempted.
    assert_eq!(pipeline.runner().materializations().len(), 4);

    let fr_redirect = report
        .phase_jobs(Phase::Normalize)
        .find(|j| j.language == "fr" && j.table == "redirect")
        .unwrap();
    assert_eq!(fr_redirect.status, JobStatus::Failed);

    let failures = report.failures();
    assert!(failures
        .iter()
        .any(|f| f.phase == "import" && f.language == "fr" && f.table == "page" && f.exit_code == Some(1)));

    match report.into_result() {
        Err(EtlError::RunFailed { failures, .. }) => {
            // fr/page import, fr/page and fr/redirect normalizations.
            assert_eq!(failures.len(), 3);
            assert_eq!(failures[0].phase, "import");
        }
        other => panic!("expected RunFailed, got {:?}", other),
    }
}

#[test]
fn test_skip_dependents_skips_languages_without_page_table() {
    let warehouse = RecordingWarehouse::new().fail_creating("wmf.fr_page_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::SkipDependents)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en,fr", "page,redirect"))
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(pipeline.runner().materializations().len(), 2);
    for job in report.phase_jobs(Phase::Normalize) {
        let expected = if job.language == "fr" {
            JobStatus::Skipped
        } else {
            JobStatus::Succeeded
        };
        assert_eq!(job.status, expected, "{}/{}", job.language, job.table);
    }
}

#[test]
fn test_skip_dependents_skips_only_the_failed_table() {
    let warehouse = RecordingWarehouse::new().fail_creating("wmf.en_revision_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::SkipDependents)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page,revision,page_props"))
        .unwrap();

    let skipped: Vec<_> = report
        .jobs
        .iter()
        .filter(|j| j.status == JobStatus::Skipped)
        .map(|j| j.table.as_str())
        .collect();
    assert_eq!(skipped, vec!["revision"]);
}

#[test]
fn test_fail_fast_stops_issuing_jobs() {
    let warehouse = RecordingWarehouse::new().fail_creating("wmf.fr_page_raw", 7);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::FailFast)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en,fr", "page,redirect"))
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    // en/page, en/redirect, fr/page attempted; fr/redirect and all
    // normalizations skipped.
    assert_eq!(pipeline.runner().bulk_imports().len(), 3);
    assert!(pipeline.runner().materializations().is_empty());
    assert_eq!(report.skipped_count(), 5);
    assert_eq!(report.jobs.len(), 8);

    // The normalize phase is never entered: no catalog call touches a
    // normalized table.
    let normalized_drops = pipeline
        .runner()
        .events
        .iter()
        .filter(|e| match &e.invocation.kind {
            InvocationKind::DropTable { table } => !table.table.ends_with("_raw"),
            _ => false,
        })
        .count();
    assert_eq!(normalized_drops, 0);
}

#[test]
fn test_fail_fast_with_last_import_failing_skips_normalize_phase() {
    let warehouse = RecordingWarehouse::new().fail_creating("wmf.en_redirect_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::FailFast)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page,redirect"))
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(pipeline.runner().bulk_imports().len(), 2);
    assert!(pipeline.runner().materializations().is_empty());
    assert!(report
        .phase_jobs(Phase::Normalize)
        .all(|j| j.status == JobStatus::Skipped));
}

#[test]
fn test_unknown_table_makes_no_external_call() {
    let mut pipeline =
        Pipeline::new(RecordingWarehouse::new(), options(FailurePolicy::AttemptAll)).unwrap();
    let err = pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page,langlinks"))
        .unwrap_err();
    match err {
        EtlError::UnknownTable { ref name, .. } => assert_eq!(name, "langlinks"),
        ref other => panic!("expected UnknownTable, got {:?}", other),
    }
    assert!(err.hint().is_some());
    assert!(pipeline.runner().events.is_empty());
}

#[test]
fn test_failed_drop_aborts_run() {
    let warehouse = RecordingWarehouse::new().fail_dropping("wmf.en_page_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::AttemptAll)).unwrap();
    let err = pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page"))
        .unwrap_err();
    assert_eq!(err.kind(), "RunAborted");
    match err {
        EtlError::RunAborted { source, report } => {
            assert_eq!(source.kind(), "Catalog");
            assert_eq!(report.state, RunState::Failed);
            assert!(report.jobs.is_empty());
        }
        other => panic!("expected RunAborted, got {:?}", other),
    }
    assert!(pipeline.runner().bulk_imports().is_empty());
}

#[test]
fn test_abort_keeps_failures_recorded_before_it() {
    let warehouse = RecordingWarehouse::new()
        .fail_creating("wmf.en_page_raw", 9)
        .fail_dropping("wmf.en_revision_raw", 1);
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::AttemptAll)).unwrap();
    let err = pipeline
        .run(&RunRequest::from_lists("wmf", "en", "page,redirect,revision"))
        .unwrap_err();

    assert!(err.to_string().contains("DROP TABLE IF EXISTS wmf.en_revision_raw;"));
    assert!(err.hint().is_some());
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        (failures[0].table.as_str(), failures[0].exit_code),
        ("page", Some(9))
    );

    let report = err.report().expect("partial report");
    assert_eq!(report.state, RunState::Failed);
    assert!(report.finished_at.is_some());
    let tables: Vec<_> = report.jobs.iter().map(|j| j.table.as_str()).collect();
    assert_eq!(tables, vec!["page", "redirect"]);
    assert_eq!(pipeline.runner().bulk_imports().len(), 2);
    assert!(pipeline.runner().materializations().is_empty());
}

#[test]
fn test_unreachable_engine_fails_only_that_job() {
    let warehouse = RecordingWarehouse::new().unreachable_creating("wmf.fr_page_raw");
    let mut pipeline = Pipeline::new(warehouse, options(FailurePolicy::AttemptAll)).unwrap();
    let report = pipeline
        .run(&RunRequest::from_lists("wmf", "en,fr", "page"))
        .expect("job-level engine errors are not fatal");

    assert_eq!(report.state, RunState::Failed);
    // en import, en and fr normalizations all ran.
    assert_eq!(pipeline.runner().bulk_imports().len(), 1);
    assert_eq!(pipeline.runner().materializations().len(), 2);

    let fr_import = report
        .phase_jobs(Phase::Import)
        .find(|j| j.language == "fr")
        .unwrap();
    assert_eq!(fr_import.status, JobStatus::Failed);
    assert_eq!(fr_import.exit_code, None);
    assert!(fr_import.reason.as_deref().unwrap().contains("sqoop"));

    let failures = report.failures();
    assert_eq!(failures[0].reason, fr_import.reason);
    assert!(failures[0].to_string().contains("not available"));
}

#[test]
fn test_rerun_replaces_outputs() {
    let mut pipeline =
        Pipeline::new(RecordingWarehouse::new(), options(FailurePolicy::AttemptAll)).unwrap();
    let request = RunRequest::from_lists("wmf", "en", "page,pagelinks");
    let first = pipeline.run(&request).unwrap();
    let second = pipeline.run(&request).unwrap();
    assert_eq!(first.state, RunState::Done);
    assert_eq!(second.state, RunState::Done);

    // Fingerprints are identical across runs with the same run id.
    let prints = |r: &wikisqoop::report::RunReport| -> Vec<Option<String>> {
        r.jobs.iter().map(|j| j.fingerprint.clone()).collect()
    };
    assert_eq!(prints(&first), prints(&second));
}
