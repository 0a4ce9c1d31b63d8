//! Visibility-driven preview loading, end to end through the view controller

mod common;

use common::{tetra_stl, two_tone_png, FlatFactory, Harness, MemorySource, MISSING_MTL_OBJ};

use shelfview::animation::SessionState;
use shelfview::host::{ContainerContent, ContainerId};
use shelfview::math::Rect;
use shelfview::view::{View, ViewState};
use shelfview::visibility::ScheduledLoad;

fn detail_containers(state: Option<&ViewState>) -> Vec<(i64, ContainerId)> {
    match state {
        Some(ViewState::ModelDetail { files, .. }) => {
            files.iter().filter_map(|f| f.container.map(|c| (f.file_id, c))).collect()
        }
        other => panic!("expected a detail view, got {:?}", other),
    }
}

fn only_container(state: Option<&ViewState>) -> (i64, ContainerId) {
    let ids = detail_containers(state);
    assert_eq!(ids.len(), 1, "one preview container expected");
    ids[0]
}

/// Viewport that covers everything laid out by the views
fn whole_page() -> Rect {
    Rect::from_xywh(0.0, 0.0, 4000.0, 40000.0)
}

#[tokio::test]
async fn test_small_stl_autoloads_and_runs() {
    let mut source = MemorySource::new();
    source.add_model(1, "bracket", None);
    source.add_file(1, 10, "bracket.stl", 5_000_000, tetra_stl(20.0));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let (file_id, container) = only_container(controller.state());
    assert_eq!(file_id, 10);
    assert_eq!(
        controller.containers().content(container),
        Some(&ContainerContent::Placeholder("Scroll to load...".into()))
    );

    // Nothing is loaded before the container is near the viewport
    assert!(controller.observe(Rect::from_xywh(0.0, 5000.0, 800.0, 600.0)).is_empty());

    let loads = controller.observe(whole_page());
    assert_eq!(loads.len(), 1);
    assert!(matches!(loads[0], ScheduledLoad::Preview(_)));
    controller.run_loads(loads).await;

    assert_eq!(controller.containers().content(container), Some(&ContainerContent::Canvas));
    let state = h.pool.borrow().session(container).map(|s| s.state());
    assert_eq!(state, Some(SessionState::Running));

    h.frames.tick();
    h.frames.tick();
    let registry = h.containers.borrow();
    let shown = registry.get(container).unwrap();
    assert_eq!(shown.blit_count(), 2);
    assert_eq!(shown.surface.as_ref().map(|s| s.dimensions()), Some((300, 300)));
}

#[tokio::test]
async fn test_large_stl_waits_for_manual_trigger() {
    let mut source = MemorySource::new();
    source.add_model(1, "statue", None);
    source.add_file(1, 11, "statue.stl", 15_000_000, tetra_stl(20.0));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let (_, container) = only_container(controller.state());

    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    assert_eq!(
        controller.containers().content(container),
        Some(&ContainerContent::ManualTrigger { label: "Load 3D Preview (14.3 MB)".into(), file_id: 11 })
    );
    assert_eq!(h.source.downloads.get(), 0);
    assert_eq!(h.pool.borrow().active_sessions(), 0);

    // The button loads it regardless of size
    controller.load_preview(11, container, true).await;
    assert_eq!(controller.containers().content(container), Some(&ContainerContent::Canvas));
    assert_eq!(h.pool.borrow().active_sessions(), 1);
}

#[tokio::test]
async fn test_autoload_threshold_is_inclusive() {
    let mut source = MemorySource::new();
    source.add_model(1, "edge", None);
    source.add_file(1, 12, "edge.stl", 10_000_000, tetra_stl(20.0));
    source.add_file(1, 13, "over.stl", 10_000_001, tetra_stl(20.0));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(whole_page());
    assert_eq!(loads.len(), 2);
    assert!(matches!(loads[0], ScheduledLoad::Preview(ref r) if r.file_id == 12));
    assert!(matches!(loads[1], ScheduledLoad::ManualTrigger { file_id: 13, .. }));
}

#[tokio::test]
async fn test_loaded_container_not_retriggered() {
    let mut source = MemorySource::new();
    source.add_model(1, "bracket", None);
    source.add_file(1, 10, "bracket.stl", 1_000, tetra_stl(20.0));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let first = controller.observe(whole_page());
    assert_eq!(first.len(), 1);
    controller.run_loads(first).await;

    // Scrolling away and back does nothing
    assert!(controller.observe(Rect::from_xywh(0.0, 9000.0, 10.0, 10.0)).is_empty());
    assert!(controller.observe(whole_page()).is_empty());
    assert_eq!(h.source.downloads.get(), 1);
}

#[tokio::test]
async fn test_obj_with_missing_material_library_is_gray() {
    let mut source = MemorySource::new();
    source.add_model(1, "wedge", None);
    source.add_file(1, 20, "wedge.obj", 200, MISSING_MTL_OBJ.as_bytes().to_vec());
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    let (_, container) = only_container(controller.state());
    assert_eq!(controller.containers().content(container), Some(&ContainerContent::Canvas));

    let object = shelfview::loader::decode_and_normalize(
        shelfview::loader::MeshFormat::Obj,
        MISSING_MTL_OBJ.as_bytes(),
        50.0,
    )
    .unwrap();
    for prim in &object.primitives {
        assert_eq!(prim.material, shelfview::scene::Material::neutral());
        assert_ne!(prim.material.base_color(), glam::Vec3::ZERO);
    }
}

#[tokio::test]
async fn test_broken_file_shows_failure_and_others_still_load() {
    let mut source = MemorySource::new();
    source.add_model(1, "mixed", None);
    source.add_file(1, 30, "broken.stl", 64, b"solid nothing here".to_vec());
    source.add_file(1, 31, "fine.stl", 1_000, tetra_stl(20.0));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let ids = detail_containers(controller.state());
    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    let containers = controller.containers();
    assert_eq!(containers.content(ids[0].1), Some(&ContainerContent::LoadFailed));
    assert_eq!(containers.content(ids[1].1), Some(&ContainerContent::Canvas));
}

#[tokio::test]
async fn test_missing_download_shows_failure() {
    let mut source = MemorySource::new();
    source.add_model(1, "gone", None);
    source.add_file(1, 40, "gone.stl", 1_000, Vec::new());
    source.blobs.remove(&40);
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    let (_, container) = only_container(controller.state());
    assert_eq!(controller.containers().content(container), Some(&ContainerContent::LoadFailed));
    assert_eq!(h.pool.borrow().active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_render_capability_shows_unavailable() {
    let mut source = MemorySource::new();
    source.add_model(1, "bracket", None);
    source.add_file(1, 10, "bracket.stl", 1_000, tetra_stl(20.0));
    let factory = FlatFactory { unavailable: true, ..Default::default() };
    let h = Harness::with_factory(source, factory);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    let (_, container) = only_container(controller.state());
    assert_eq!(controller.containers().content(container), Some(&ContainerContent::Unavailable));
    assert_eq!(h.source.downloads.get(), 0);
    assert!(!h.pool.borrow().has_context());
}

#[tokio::test]
async fn test_detail_image_is_letterboxed() {
    let mut source = MemorySource::new();
    source.add_model(1, "photo", None);
    source.add_file(1, 50, "photo.PNG", 4_000, two_tone_png(40, 20));
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::ModelDetail(1)).await.unwrap();
    let loads = controller.observe(whole_page());
    controller.run_loads(loads).await;

    let (_, container) = only_container(controller.state());
    let registry = h.containers.borrow();
    let shown = registry.get(container).unwrap();
    assert_eq!(shown.content, ContainerContent::Image);
    let surface = shown.surface.as_ref().unwrap();
    assert_eq!(surface.dimensions(), (300, 300));
    // 2:1 image in a square box leaves the top row empty
    assert_eq!(surface.get_pixel(150, 0)[3], 0);
    assert_eq!(surface.get_pixel(10, 150).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn test_model_cards_pick_their_preview_file() {
    let mut source = MemorySource::new();
    source.add_model(1, "bracket", None);
    source.add_file(1, 10, "notes.txt", 100, b"print at 0.2mm".to_vec());
    source.add_file(1, 11, "bracket.stl", 1_000, tetra_stl(20.0));
    source.add_model(2, "vase", Some(21));
    source.add_file(2, 20, "vase.stl", 1_000, tetra_stl(20.0));
    source.add_file(2, 21, "vase.png", 4_000, two_tone_png(20, 40));
    source.add_model(3, "readme-only", None);
    source.add_file(3, 30, "README.md", 10, b"#".to_vec());
    let h = Harness::new(source);
    let mut controller = h.controller();

    controller.switch_view(View::Models).await.unwrap();
    let cards = match controller.state() {
        Some(ViewState::Models { cards }) => cards.clone(),
        other => panic!("expected models view, got {:?}", other),
    };
    assert_eq!(cards.len(), 3);
    assert_eq!(cards[0].library, "Prints");
    assert_eq!(cards[0].created, "2024-03-01");
    assert_eq!(cards[0].description, "No description");

    let loads = controller.observe(whole_page());
    assert_eq!(loads.len(), 3);
    controller.run_loads(loads).await;

    let containers = controller.containers();
    assert_eq!(containers.content(cards[0].container), Some(&ContainerContent::Canvas));
    assert_eq!(containers.content(cards[1].container), Some(&ContainerContent::Image));
    assert_eq!(
        containers.get(cards[1].container).and_then(|c| c.surface.as_ref()).map(|s| s.dimensions()),
        Some((300, 300))
    );
    assert_eq!(
        containers.content(cards[2].container),
        Some(&ContainerContent::Placeholder("📦".into()))
    );
    drop(containers);
    assert_eq!(h.pool.borrow().active_sessions(), 1);
    assert_eq!(h.pool.borrow().contexts_created(), 1);
}

#[tokio::test]
async fn test_spawned_loads_run_on_local_set() {
    let mut source = MemorySource::new();
    for id in 1..=4 {
        source.add_model(id, &format!("part-{}", id), None);
        source.add_file(id, id * 10, "part.stl", 1_000, tetra_stl(10.0 + id as f32));
    }
    let h = Harness::new(source);
    let mut controller = h.controller();

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            controller.switch_view(View::Models).await.unwrap();
            let loads = controller.observe(whole_page());
            for handle in controller.spawn_loads(loads) {
                handle.await.unwrap();
            }
        })
        .await;

    assert_eq!(h.pool.borrow().active_sessions(), 4);
    assert_eq!(h.pool.borrow().contexts_created(), 1);
    assert_eq!(h.source.downloads.get(), 4);
}
