//! Pull/push behaviour of the sync coordinator against an in-memory remote

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agenda_core::model::{NewTask, ProjectColor};
use agenda_core::storage::RecordStore;
use agenda_core::sync::{SyncCoordinator, SyncStage};
use common::{FakeRemote, project, task};
use tempfile::TempDir;

fn open_store() -> (TempDir, Arc<RecordStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RecordStore::open(dir.path()).unwrap());
    (dir, store)
}

#[tokio::test]
async fn test_pull_adopts_new_records() {
    let (_dir, store) = open_store();
    let remote = Arc::new(FakeRemote::with_records(
        vec![project(1, "Launch"), project(2, "Garden")],
        vec![task(10, 1, "Draft"), task(11, 2, "Weed")],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote);

    let report = coordinator.pull().await;
    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.projects_added, 2);
    assert_eq!(report.tasks_added, 2);
    assert_eq!(store.list_projects().len(), 2);
    assert_eq!(store.get_task(11).unwrap().title, "Weed");
}

#[tokio::test]
async fn test_pull_is_idempotent() {
    let (_dir, store) = open_store();
    let remote = Arc::new(FakeRemote::with_records(
        vec![project(1, "Launch")],
        vec![task(10, 1, "Draft")],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote);

    coordinator.pull().await;
    let before = (store.list_projects(), store.list_tasks());

    let report = coordinator.pull().await;
    assert!(report.is_success());
    assert_eq!(report.projects_added, 0);
    assert_eq!(report.tasks_added, 0);
    assert_eq!((store.list_projects(), store.list_tasks()), before);
}

#[tokio::test]
async fn test_pull_never_overwrites_local_records() {
    let (_dir, store) = open_store();
    let local = store.create_project("Local name", "", ProjectColor::Red).unwrap();

    let remote = Arc::new(FakeRemote::with_records(
        vec![project(local.id, "Remote name")],
        vec![],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote);

    let report = coordinator.pull().await;
    assert_eq!(report.projects_added, 0);
    let kept = store.get_project(local.id).unwrap();
    assert_eq!(kept.name, "Local name");
    assert_eq!(kept.color, ProjectColor::Red);
}

#[tokio::test]
async fn test_pull_merges_the_side_that_succeeded() {
    let (_dir, store) = open_store();
    let remote = Arc::new(FakeRemote::with_records(
        vec![project(1, "Launch")],
        vec![task(10, 1, "Draft")],
    ));
    remote.fail_fetch_tasks.store(true, Ordering::SeqCst);
    let coordinator = SyncCoordinator::new(store.clone(), remote);

    let report = coordinator.pull().await;
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, SyncStage::FetchTasks);
    assert_eq!(report.projects_added, 1);
    assert!(store.list_tasks().is_empty());
    assert!(report.summary().starts_with("Pull failed"));
}

#[tokio::test]
async fn test_pull_skips_tasks_for_unknown_projects() {
    let (_dir, store) = open_store();
    let remote = Arc::new(FakeRemote::with_records(
        vec![],
        vec![task(10, 99, "Orphan")],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote);

    let report = coordinator.pull().await;
    assert!(report.is_success());
    assert_eq!(report.tasks_skipped, 1);
    assert!(store.list_tasks().is_empty());
}

#[tokio::test]
async fn test_push_sends_only_missing_records() {
    let (_dir, store) = open_store();
    let launch = store.create_project("Launch", "", ProjectColor::Blue).unwrap();
    let garden = store.create_project("Garden", "", ProjectColor::Green).unwrap();
    let draft = store.create_task(NewTask::new("Draft", launch.id)).unwrap();
    let weed = store.create_task(NewTask::new("Weed", garden.id)).unwrap();

    let remote = Arc::new(FakeRemote::with_records(
        vec![project(launch.id, "Launch")],
        vec![task(draft.id, launch.id, "Draft")],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote.clone());

    let report = coordinator.push().await;
    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(remote.pushed_project_ids(), vec![garden.id]);
    assert_eq!(remote.pushed_task_ids(), vec![weed.id]);

    // A second push has nothing left to send
    let report = coordinator.push().await;
    assert_eq!(report.projects_pushed, 0);
    assert_eq!(report.tasks_pushed, 0);
    assert_eq!(remote.pushed_task_ids(), vec![weed.id]);
}

#[tokio::test]
async fn test_push_does_not_modify_the_store() {
    let (_dir, store) = open_store();
    let launch = store.create_project("Launch", "", ProjectColor::Blue).unwrap();
    store.create_task(NewTask::new("Draft", launch.id)).unwrap();
    let before = (store.list_projects(), store.list_tasks());

    let remote = Arc::new(FakeRemote::with_records(
        vec![project(50, "Remote only")],
        vec![task(60, 50, "Remote task")],
    ));
    let coordinator = SyncCoordinator::new(store.clone(), remote);
    coordinator.push().await;

    assert_eq!((store.list_projects(), store.list_tasks()), before);
}

#[tokio::test]
async fn test_push_failure_does_not_block_other_records() {
    let (_dir, store) = open_store();
    let launch = store.create_project("Launch", "", ProjectColor::Blue).unwrap();
    let first = store.create_task(NewTask::new("First", launch.id)).unwrap();
    let second = store.create_task(NewTask::new("Second", launch.id)).unwrap();

    let remote = Arc::new(FakeRemote::default());
    remote.reject_task_ids.lock().unwrap().insert(first.id);
    let coordinator = SyncCoordinator::new(store.clone(), remote.clone());

    let report = coordinator.push().await;
    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, SyncStage::PushTask(first.id));
    assert_eq!(report.failures[0].code, "E101");
    assert_eq!(report.projects_pushed, 1);
    assert_eq!(remote.pushed_task_ids(), vec![second.id]);
}

#[tokio::test]
async fn test_push_treats_unreadable_remote_as_empty() {
    let (_dir, store) = open_store();
    let launch = store.create_project("Launch", "", ProjectColor::Blue).unwrap();

    let remote = Arc::new(FakeRemote::default());
    remote.fail_fetch_projects.store(true, Ordering::SeqCst);
    let coordinator = SyncCoordinator::new(store.clone(), remote.clone());

    let report = coordinator.push().await;
    assert!(report.is_success());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].stage, SyncStage::FetchProjects);
    assert_eq!(remote.pushed_project_ids(), vec![launch.id]);
}

#[tokio::test(start_paused = true)]
async fn test_pull_and_push_never_overlap() {
    let (_dir, store) = open_store();
    let launch = store.create_project("Launch", "", ProjectColor::Blue).unwrap();
    store.create_task(NewTask::new("Draft", launch.id)).unwrap();

    let remote = Arc::new(FakeRemote {
        latency: Some(Duration::from_millis(50)),
        ..FakeRemote::with_records(vec![project(7, "Remote")], vec![])
    });
    let coordinator = Arc::new(SyncCoordinator::new(store.clone(), remote.clone()));

    let pull = coordinator.spawn_pull();
    let push = coordinator.spawn_push();
    let (pull, push) = tokio::join!(pull, push);

    assert!(pull.unwrap().is_success());
    assert!(push.unwrap().is_success());
    assert_eq!(remote.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(store.get_project(7).is_some());
}
