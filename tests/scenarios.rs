//! End-to-end scenarios from the design's testable-properties section,
//! driven entirely through the public [`beads_core::Workspace`] facade.

use std::path::Path;

use beads_core::persistence::{canonical, wal, WorkspacePaths};
use beads_core::time::FixedClock;
use beads_core::{Config, DependencyKind, NewIssue, Workspace};
use rand::rngs::mock::StepRng;
use tempfile::tempdir;

fn workspace(dir: &Path) -> Workspace {
    Workspace::init(dir, Config::default())
        .unwrap()
        .with_clock_and_rng(Box::new(FixedClock::new(1_700_000_000)), Box::new(StepRng::new(1, 1)))
}

#[test]
fn scenario_init_then_create_two_issues() {
    let root = tempdir().unwrap();
    let dir = root.path().join(".beads");
    let mut ws = workspace(&dir);

    let login = ws.add(NewIssue { title: "Fix login".to_string(), ..Default::default() }).unwrap();
    let build = ws.add(NewIssue { title: "Ship build".to_string(), ..Default::default() }).unwrap();

    let paths = WorkspacePaths::under(&dir);
    let wal_records: Vec<_> = wal::iter(&paths.wal).unwrap().collect();
    assert_eq!(wal_records.len(), 2);
    assert!(wal_records.iter().all(|r| matches!(r.op, wal::WalOp::Add(_))));

    ws.flush().unwrap();
    let canonical_issues = canonical::read_all(&paths.canonical).unwrap();
    let mut ids: Vec<_> = canonical_issues.iter().map(|i| i.id.as_str().to_string()).collect();
    ids.sort();
    let mut expected = vec![login.as_str().to_string(), build.as_str().to_string()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(canonical_issues.iter().all(|i| i.status.as_str() == "open"));
    assert!(canonical_issues.iter().all(|i| i.priority.value() == 2));
    assert!(canonical_issues.iter().all(|i| i.issue_type.as_str() == "task"));

    let ready_ids: Vec<_> = ws.ready().iter().map(|i| i.id.as_str().to_string()).collect();
    assert_eq!(ready_ids.len(), 2);
    assert!(ws.blocked().is_empty());
}

#[test]
fn scenario_blocker_relationship() {
    let root = tempdir().unwrap();
    let mut ws = workspace(root.path());

    let x = ws.add(NewIssue { title: "X".to_string(), ..Default::default() }).unwrap();
    let y = ws.add(NewIssue { title: "Y".to_string(), ..Default::default() }).unwrap();

    ws.dep_add(&y, &x, DependencyKind::Blocks).unwrap();

    let ready_ids: Vec<_> = ws.ready().iter().map(|i| i.id.clone()).collect();
    assert_eq!(ready_ids, vec![x.clone()]);
    let blocked_ids: Vec<_> = ws.blocked().iter().map(|i| i.id.clone()).collect();
    assert_eq!(blocked_ids, vec![y.clone()]);

    ws.close(&x).unwrap();
    let ready_ids: Vec<_> = ws.ready().iter().map(|i| i.id.clone()).collect();
    assert_eq!(ready_ids, vec![y]);
}

#[test]
fn scenario_cycle_rejection_leaves_state_unchanged() {
    let root = tempdir().unwrap();
    let dir = root.path().join(".beads");
    let mut ws = workspace(&dir);

    let a = ws.add(NewIssue { title: "A".to_string(), ..Default::default() }).unwrap();
    let b = ws.add(NewIssue { title: "B".to_string(), ..Default::default() }).unwrap();
    let c = ws.add(NewIssue { title: "C".to_string(), ..Default::default() }).unwrap();

    ws.dep_add(&b, &a, DependencyKind::Blocks).unwrap();
    ws.dep_add(&c, &b, DependencyKind::Blocks).unwrap();

    let paths = WorkspacePaths::under(&dir);
    let ops_before = wal::iter(&paths.wal).unwrap().count();

    let err = ws.dep_add(&a, &c, DependencyKind::Blocks).unwrap_err();
    assert!(err.to_string().contains("cycle"));
    let beads_core::BeadsError::Graph(beads_core::error::GraphError::CycleDetected(path)) = err else {
        panic!("expected a CycleDetected error, got {err:?}");
    };
    assert_eq!(path, vec![a.clone(), c.clone(), b.clone(), a.clone()], "cycle path must start and end at the rejected edge's source");

    let ops_after = wal::iter(&paths.wal).unwrap().count();
    assert_eq!(ops_before, ops_after, "a rejected add_edge must not append a WAL record");

    assert_eq!(ws.dependents(&a), vec![b]);
    assert_eq!(ws.dependents(&b), vec![c]);
}

#[test]
fn scenario_compaction_equivalence() {
    let root = tempdir().unwrap();
    let dir = root.path().join(".beads");
    let mut ws = workspace(&dir);

    let mut ids = Vec::new();
    for i in 0..200 {
        ids.push(ws.add(NewIssue { title: format!("issue {i}"), ..Default::default() }).unwrap());
    }
    for id in ids.iter().take(100) {
        ws.close(id).unwrap();
    }
    for id in ids.iter().skip(100) {
        ws.update(id, |issue| issue.notes = Some("touched".to_string())).unwrap();
    }

    let before: Vec<_> = ids.iter().map(|id| ws.get(id).unwrap().clone()).collect();

    ws.compact().unwrap();

    let paths = WorkspacePaths::under(&dir);
    let canonical_issues = canonical::read_all(&paths.canonical).unwrap();
    assert_eq!(canonical_issues.len(), 200);
    let mut sorted_ids: Vec<_> = canonical_issues.iter().map(|i| i.id.clone()).collect();
    let mut expected_sorted = sorted_ids.clone();
    expected_sorted.sort();
    assert_eq!(sorted_ids, expected_sorted, "canonical file must be sorted by identifier");
    sorted_ids.dedup();
    assert_eq!(sorted_ids.len(), 200, "no duplicate identifiers after compaction");

    assert_eq!(wal::iter(&paths.wal).unwrap().count(), 0);

    drop(ws);
    let reopened = Workspace::open(&dir, Config::default()).unwrap();
    for (id, prior) in ids.iter().zip(before.iter()) {
        let after = reopened.get(id).unwrap();
        assert_eq!(serde_json::to_value(after).unwrap(), serde_json::to_value(prior).unwrap());
    }
}

#[test]
fn scenario_import_matches_by_fingerprint_after_identifier_rewrite() {
    let export_root = tempdir().unwrap();
    let mut source = workspace(export_root.path());
    let original_id = source.add(NewIssue { title: "Track renamed identifier".to_string(), ..Default::default() }).unwrap();
    source.flush().unwrap();

    let export_paths = WorkspacePaths::under(export_root.path());
    let mut exported = canonical::read_all(&export_paths.canonical).unwrap();
    assert_eq!(exported.len(), 1);
    exported[0].id = "bd-rewritten".parse().unwrap();
    // Bump `updated_at` (not part of the fingerprint) so the incoming side
    // strictly wins the merge tie-break, exercising the path where the
    // *winner* still has to give up its own id and keep the matched one.
    let incoming_updated_at = beads_core::time::Timestamp::from_secs(exported[0].updated_at.as_secs() + 3600);
    exported[0].updated_at = incoming_updated_at;

    let rewritten_path = export_root.path().join("rewritten.jsonl");
    canonical::write_all(&rewritten_path, &exported).unwrap();

    let report = source.import(&rewritten_path, false).unwrap();
    assert_eq!(report.inserted, Vec::<String>::new());
    assert_eq!(report.merged, vec![original_id.as_str().to_string()]);

    assert!(source.get(&original_id).is_some());
    assert!(source.get(&"bd-rewritten".parse().unwrap()).is_none());
    assert_eq!(
        source.get(&original_id).unwrap().updated_at,
        incoming_updated_at,
        "the incoming side's fields should win the tie-break even though its id is discarded"
    );
}

#[test]
fn scenario_crash_mid_write_leaves_a_valid_store_with_no_duplicate_ids() {
    let root = tempdir().unwrap();
    let dir = root.path().join(".beads");
    let paths;
    {
        let mut ws = workspace(&dir);
        for i in 0..10 {
            ws.add(NewIssue { title: format!("Chaos {i}"), ..Default::default() }).unwrap();
        }
        paths = WorkspacePaths::under(&dir);
    }

    // Simulate a SIGKILL mid-append: the last WAL record is torn off
    // part-way through, leaving an incomplete trailing line.
    let full = std::fs::read_to_string(&paths.wal).unwrap();
    let last_newline = full.trim_end_matches('\n').rfind('\n').unwrap();
    let torn = format!("{}\n{}", &full[..last_newline], &full[last_newline + 1..last_newline + 20]);
    std::fs::write(&paths.wal, torn).unwrap();

    let reopened = Workspace::open(&dir, Config::default()).unwrap();
    let surviving: Vec<_> = reopened.list(&beads_core::ListFilters::all());
    assert!(surviving.len() >= 9 && surviving.len() <= 10);
    assert!(surviving.iter().all(|i| i.id.as_str().starts_with("bd-")));
    let mut ids: Vec<_> = surviving.iter().map(|i| i.id.clone()).collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before, "no duplicate identifiers survive a torn WAL tail");
}
