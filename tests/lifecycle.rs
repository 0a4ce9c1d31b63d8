//! Renderer pool identity, session lifecycle, and view teardown

mod common;

use std::rc::Rc;

use common::{tetra_stl, Harness, MemorySource};

use shelfview::animation::{AnimationSession, FrameLoop, SessionState};
use shelfview::host::{ContainerContent, ContainerId};
use shelfview::loader::MeshFormat;
use shelfview::math::Rect;
use shelfview::preview::{FileKind, SizeClass};
use shelfview::view::{View, ViewState};
use shelfview::visibility::{ContainerObservationRecord, ScheduledLoad, VisibilityScheduler, WatchOptions};

fn one_model_source(listed_size: u64) -> MemorySource {
    let mut source = MemorySource::new();
    source.add_model(1, "bracket", Some(10));
    source.add_file(1, 10, "bracket.stl", listed_size, tetra_stl(20.0));
    source
}

fn new_container(h: &Harness) -> ContainerId {
    h.containers
        .borrow_mut()
        .create(Rect::from_xywh(0.0, 0.0, 320.0, 240.0), "3D Preview")
}

#[test]
fn test_pool_identity_survives_release() {
    let h = Harness::new(MemorySource::new());
    let first = h.pool.borrow_mut().acquire().unwrap();
    let container = new_container(&h);
    h.pool.borrow_mut().start_session(container, || Ok(()));

    assert!(h.pool.borrow_mut().release(container));
    let second = h.pool.borrow_mut().acquire().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(h.pool.borrow().contexts_created(), 1);
}

#[test]
fn test_pool_identity_reset_by_dispose_all() {
    let h = Harness::new(MemorySource::new());
    let first = h.pool.borrow_mut().acquire().unwrap();
    h.pool.borrow_mut().dispose_all();
    assert!(first.borrow().is_disposed());
    assert!(!h.pool.borrow().has_context());

    let second = h.pool.borrow_mut().acquire().unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert!(!second.borrow().is_disposed());
    assert_eq!(h.pool.borrow().contexts_created(), 2);
}

#[test]
fn test_stop_twice_is_noop() {
    let frames = FrameLoop::new();
    let session = AnimationSession::new(ContainerId(1));
    assert!(session.start(&frames, || Ok(())));
    assert_eq!(frames.pending(), 1);

    session.stop(&frames);
    session.stop(&frames);
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(frames.pending(), 0);

    // Stopped sessions cannot be restarted
    assert!(!session.start(&frames, || Ok(())));
    assert_eq!(frames.tick(), 0);
}

#[tokio::test]
async fn test_rapid_requests_leave_one_session() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);

    // Both loads suspend on the fetch before either finishes
    tokio::join!(
        service.load_detail_preview(10, container),
        service.load_detail_preview(10, container),
    );

    assert_eq!(h.pool.borrow().active_sessions(), 1);
    assert_eq!(h.source.downloads.get(), 2);
    assert_eq!(h.containers.borrow().content(container), Some(&ContainerContent::Canvas));

    // One tick draws one frame into the container
    h.frames.tick();
    assert_eq!(h.containers.borrow().get(container).map(|c| c.blit_count()), Some(1));
}

#[tokio::test]
async fn test_sequential_requests_replace_session() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);

    service.load_card_preview(10, container).await;
    let first = h.pool.borrow().session(container).cloned().unwrap();
    assert!(first.is_running());

    service.load_detail_preview(10, container).await;
    let second = h.pool.borrow().session(container).cloned().unwrap();
    assert_eq!(first.state(), SessionState::Stopped);
    assert!(second.is_running());
    assert_eq!(h.pool.borrow().active_sessions(), 1);
    assert_eq!(h.pool.borrow().contexts_created(), 1);
}

#[tokio::test]
async fn test_released_sessions_evict_their_objects() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let first = new_container(&h);
    let second = new_container(&h);

    service.load_card_preview(10, first).await;
    service.load_card_preview(10, second).await;
    h.frames.tick();
    h.frames.tick();
    assert!(h.factory.evicted.borrow().is_empty());

    h.pool.borrow_mut().release(first);
    assert_eq!(h.factory.evicted.borrow().len(), 1);
    h.pool.borrow_mut().release_all();

    let evicted = h.factory.evicted.borrow();
    assert_eq!(evicted.len(), 2);
    assert_ne!(evicted[0], evicted[1]);
    assert_eq!(h.pool.borrow().contexts_created(), 1);
}

#[tokio::test]
async fn test_disposed_context_stops_running_sessions() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);

    service.load_card_preview(10, container).await;
    h.frames.tick();
    h.pool.borrow_mut().dispose_all();
    h.frames.tick();

    let session = h.pool.borrow().session(container).cloned().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.frames_drawn(), 1);
    assert_eq!(h.frames.pending(), 0);
}

#[tokio::test]
async fn test_view_switch_stops_sessions() {
    let h = Harness::new(one_model_source(1_000));
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(Rect::from_xywh(0.0, 0.0, 1200.0, 900.0));
    controller.run_loads(loads).await;
    assert_eq!(h.pool.borrow().active_sessions(), 1);
    let old: Vec<ContainerId> = controller.containers().ids();

    controller.switch_view(View::Libraries).await.unwrap();
    assert_eq!(h.pool.borrow().active_sessions(), 0);
    assert_eq!(h.frames.pending(), 0);
    assert!(old.iter().all(|id| !controller.containers().contains(*id)));
    assert_eq!(controller.scheduler().watch_count(), 0);
    assert!(matches!(controller.state(), Some(ViewState::Libraries { libraries }) if libraries.len() == 1));

    // The shared context outlives the view
    assert!(h.pool.borrow().has_context());
}

fn watched_load(h: &Harness, record: ContainerObservationRecord, size_class: SizeClass) -> (VisibilityScheduler, ScheduledLoad) {
    let mut scheduler = VisibilityScheduler::new();
    let options = WatchOptions { margin: 200.0, size_class, autoload_max_bytes: 10_000_000 };
    scheduler.watch([record], options);
    let mut loads = scheduler.observe(Rect::from_xywh(0.0, 0.0, 1024.0, 768.0), &h.containers.borrow());
    assert_eq!(loads.len(), 1);
    (scheduler, loads.remove(0))
}

/// Poll `fut` exactly once
async fn step<F: std::future::Future>(fut: std::pin::Pin<&mut F>) {
    tokio::select! {
        biased;
        _ = fut => panic!("load finished before it was suspended"),
        _ = std::future::ready(()) => {}
    }
}

#[tokio::test]
async fn test_unwatch_cancels_suspended_load() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);
    let stl = FileKind::Mesh(MeshFormat::Stl);
    let (mut scheduler, load) =
        watched_load(&h, ContainerObservationRecord::file(container, 10, stl, 1_000), SizeClass::Detail);

    let mut dispatch = std::pin::pin!(service.dispatch(load));
    // Suspended on the download
    step(dispatch.as_mut()).await;
    let stopped = scheduler.unwatch_all(&mut h.pool.borrow_mut(), &mut h.containers.borrow_mut());
    assert_eq!(stopped, 0);

    dispatch.await;
    assert_eq!(h.source.downloads.get(), 1);
    assert_eq!(h.pool.borrow().active_sessions(), 0);
    assert_eq!(h.frames.pending(), 0);
    assert_ne!(h.containers.borrow().content(container), Some(&ContainerContent::Canvas));
}

#[tokio::test]
async fn test_unwatch_cancels_suspended_model_card() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);
    let (mut scheduler, load) = watched_load(&h, ContainerObservationRecord::model(container, 1), SizeClass::Card);

    let mut dispatch = std::pin::pin!(service.dispatch(load));
    // Suspended on the model lookup
    step(dispatch.as_mut()).await;
    scheduler.unwatch_all(&mut h.pool.borrow_mut(), &mut h.containers.borrow_mut());

    dispatch.await;
    assert_eq!(h.source.downloads.get(), 0);
    assert_eq!(h.pool.borrow().active_sessions(), 0);
}

#[tokio::test]
async fn test_failure_after_container_removed_is_dropped() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);

    // Model 99 does not exist, so the lookup fails after the container is gone
    let mut card = std::pin::pin!(service.load_model_card(99, container));
    step(card.as_mut()).await;
    h.containers.borrow_mut().remove(container);
    card.await;

    assert!(!h.containers.borrow().contains(container));
    assert_eq!(h.pool.borrow().active_sessions(), 0);
}

#[tokio::test]
async fn test_load_into_removed_container_is_ignored() {
    let h = Harness::new(one_model_source(1_000));
    let service = h.service();
    let container = new_container(&h);
    h.containers.borrow_mut().remove(container);

    service.load_detail_preview(10, container).await;
    assert_eq!(h.pool.borrow().active_sessions(), 0);
    assert_eq!(h.source.downloads.get(), 0);
}

#[tokio::test]
async fn test_dashboard_lists_recent_models() {
    let mut source = MemorySource::new();
    for id in 1..=8 {
        source.add_model(id, &format!("model-{}", id), None);
    }
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::Dashboard).await.unwrap();
    let Some(ViewState::Dashboard { stats, recent }) = controller.state() else {
        panic!("expected dashboard");
    };
    assert_eq!(stats.models, 8);
    assert_eq!(stats.libraries, 1);
    assert_eq!(recent.len(), 6);
    assert_eq!(recent[0].model_id, 1);
    assert_eq!(controller.containers().len(), 6);
}

#[tokio::test]
async fn test_set_preview_reloads_detail() {
    let mut source = one_model_source(1_000);
    source.add_file(1, 11, "photo.jpg", 2_048, Vec::new());
    source.add_file(1, 12, "notes.txt", 100, Vec::new());
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let Some(ViewState::ModelDetail { files, .. }) = controller.state() else {
        panic!("expected detail view");
    };
    assert!(files[0].is_preview && !files[0].can_set_preview);
    assert!(files[1].can_set_preview);
    assert_eq!(files[1].size_label, "2.0 KB");
    assert!(!files[2].can_set_preview && files[2].container.is_none());
    assert_eq!(files[0].slicer_links.len(), 4);
    assert!(files[1].slicer_links.is_empty());

    controller.set_preview(1, 11).await.unwrap();
    assert_eq!(h.source.previews_set.borrow().as_slice(), &[(1, 11)]);
    assert_eq!(controller.current_view(), Some(View::ModelDetail(1)));
}

#[tokio::test]
async fn test_scan_library_notice() {
    let h = Harness::new(MemorySource::new());
    let controller = h.controller();
    assert_eq!(controller.scan_library(1).await, "Library scan started");
    assert_eq!(controller.scan_library(99).await, "Failed to scan library");
}
