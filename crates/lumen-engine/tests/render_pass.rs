use glam::{Vec2, Vec3};

use lumen_engine::backend::{HeadlessBackend, HeadlessLog};
use lumen_engine::loader::{ImageData, LoadStatus, MeshData, ResourceKind, Topology};
use lumen_engine::scene::{Alignment, Material, Object};
use lumen_engine::shader::{flags, ShaderProgram};
use lumen_engine::{BackendError, Context, ContextConfig, RenderError};

fn headless(config: ContextConfig) -> (Context<'static>, HeadlessLog) {
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let mut ctx = Context::new(backend, config);
    ctx.resize(640, 480);
    (ctx, log)
}

fn no_shadows() -> ContextConfig {
    ContextConfig { shadows: false, ..ContextConfig::default() }
}

fn image(seed: u8) -> ImageData {
    ImageData::solid(4, 4, [seed, 128, 255, 255])
}

#[test]
fn empty_scene_issues_no_draws() {
    let (mut ctx, log) = headless(ContextConfig::default());
    let report = ctx.render_frame().unwrap();
    assert_eq!(report.draw_calls, 0);
    assert_eq!(report.shadow_draws, 0);
    assert!(report.degraded.is_empty());
    assert_eq!(log.frame_count(), 1);
    assert_eq!(log.last_frame().map(|f| f.draws.len()), Some(0));
}

#[test]
fn layers_draw_back_to_front_on_every_frame() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let front = ctx
        .add_object(Object::sprite(&loader, image(1), Vec2::splat(10.0)).with_z_order(2))
        .unwrap();
    let back = ctx
        .add_object(Object::sprite(&loader, image(2), Vec2::splat(10.0)).with_z_order(1))
        .unwrap();
    let back_tie = ctx
        .add_object(Object::sprite(&loader, image(3), Vec2::splat(10.0)).with_z_order(1))
        .unwrap();
    let world = ctx.add_object(Object::sphere(&loader, 1.0)).unwrap();

    for _ in 0..3 {
        ctx.render_frame().unwrap();
        let frame = log.last_frame().unwrap();
        assert_eq!(frame.objects(), vec![world, back, back_tie, front]);
    }
}

#[test]
fn pending_object_is_skipped_then_drawn() {
    let (mut ctx, log) = headless(ContextConfig { upload_budget: Some(1), ..no_shadows() });
    let loader = ctx.loader().clone();

    // Mesh and texture need two uploads; only one runs per frame.
    let id = ctx.add_object(Object::sprite(&loader, image(9), Vec2::ONE)).unwrap();

    let report = ctx.render_frame().unwrap();
    assert_eq!(report.draw_calls, 0);
    assert_eq!(report.skipped_pending, 1);
    assert_eq!(ctx.object_count(), 1);

    let report = ctx.render_frame().unwrap();
    assert_eq!(report.draw_calls, 1);
    assert_eq!(report.skipped_pending, 0);
    assert_eq!(log.last_frame().unwrap().objects(), vec![id]);
}

#[test]
fn pending_texture_keeps_object_out_of_the_shadow_pass() {
    let (mut ctx, log) =
        headless(ContextConfig { upload_budget: Some(1), ..ContextConfig::default() });
    let loader = ctx.loader().clone();

    // The mesh uploads on the first frame, the texture on the second.
    let id = ctx
        .add_object(Object::cuboid(&loader, 1.0, 1.0, 1.0).with_texture(image(6)))
        .unwrap();

    let report = ctx.render_frame().unwrap();
    assert_eq!(report.skipped_pending, 1);
    assert_eq!(report.draw_calls, 0);
    assert_eq!(report.shadow_draws, 0);
    assert!(log.last_frame().unwrap().draws.is_empty());

    let report = ctx.render_frame().unwrap();
    assert_eq!(report.shadow_draws, 1);
    assert_eq!(report.draw_calls, 1);
    assert_eq!(log.last_frame().unwrap().objects(), vec![id]);
}

#[test]
fn anchored_sprite_follows_the_window_corner_on_resize() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    ctx.add_object(
        Object::sprite(&loader, image(1), Vec2::splat(10.0))
            .with_alignment(Alignment::BottomRight)
            .with_position(Vec2::splat(-5.0)),
    )
    .unwrap();

    let center = |log: &HeadlessLog| {
        let m = log.last_frame().unwrap().draws[0].uniforms.model_view;
        Vec2::new(m[3][0], m[3][1])
    };

    ctx.render_frame().unwrap();
    assert!(center(&log).abs_diff_eq(Vec2::new(630.0, 470.0), 1e-4));

    ctx.resize(800, 600);
    ctx.render_frame().unwrap();
    assert!(center(&log).abs_diff_eq(Vec2::new(790.0, 590.0), 1e-4));
}

#[test]
fn equal_meshes_share_one_upload() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();
    ctx.add_object(Object::sphere(&loader, 1.0)).unwrap();
    ctx.add_object(Object::sphere(&loader, 3.0)).unwrap();

    ctx.render_frame().unwrap();
    let frame = log.last_frame().unwrap();
    assert_eq!(frame.draws.len(), 2);
    assert_eq!(frame.draws[0].mesh, frame.draws[1].mesh);
    assert_eq!(log.uploads_of(ResourceKind::Mesh), 1);
}

#[test]
fn shared_texture_survives_removal_of_one_owner() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let a = ctx.add_object(Object::sprite(&loader, image(5), Vec2::ONE)).unwrap();
    let b = ctx.add_object(Object::sprite(&loader, image(5), Vec2::ONE)).unwrap();
    ctx.render_frame().unwrap();
    assert_eq!(log.uploads_of(ResourceKind::Texture), 1);

    ctx.remove_object(a).unwrap();
    let report = ctx.render_frame().unwrap();
    assert_eq!(report.draw_calls, 1);
    assert!(log.freed().is_empty());

    let texture = ctx.object(b).and_then(Object::texture).unwrap();
    assert!(texture.is_resident());
    assert_eq!(texture.use_count(), 1);
    let draw = log.last_frame().unwrap().draws[0];
    assert_eq!(draw.object, b);
    assert!(draw.texture.is_some());
    assert_ne!(draw.uniforms.flags[0] & flags::TEXTURED, 0);
}

#[test]
fn release_then_request_creates_a_fresh_entry() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let first = loader.request_texture(image(7));
    let entry = first.entry();
    ctx.process_uploads().unwrap();
    let gpu = first.get().unwrap();

    loader.release(first);
    assert_eq!(loader.entry_count(), 0);
    let stats = ctx.process_uploads().unwrap();
    assert_eq!(stats.freed, 1);
    assert!(!log.is_live(gpu));

    let second = loader.request_texture(image(7));
    assert_ne!(second.entry(), entry);
    assert_eq!(second.status(), LoadStatus::Queued);
    assert_eq!(second.get(), Err(RenderError::NotReady));
}

#[test]
fn uploads_are_refused_off_the_owning_thread() {
    let (mut ctx, _log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let (handle, result) = std::thread::spawn(move || {
        // Requests are fine from anywhere; uploads are not.
        let handle = loader.request_texture(ImageData::solid(1, 1, [1, 2, 3, 4]));
        let result = loader.process_uploads(&mut HeadlessBackend::new());
        (handle, result)
    })
    .join()
    .unwrap();

    assert!(matches!(result, Err(RenderError::WrongThread { .. })));
    assert!(!handle.is_resident());

    ctx.process_uploads().unwrap();
    assert!(handle.is_resident());
}

#[test]
fn referenced_material_cannot_be_removed() {
    let (mut ctx, _log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let steel = ctx.add_material(Material::new("steel")).unwrap();
    let a = ctx.add_object(Object::cuboid(&loader, 1.0, 1.0, 1.0).with_material(steel)).unwrap();
    let b = ctx.add_object(Object::sphere(&loader, 1.0)).unwrap();
    ctx.assign_material(b, Some(steel)).unwrap();

    assert_eq!(
        ctx.remove_material(steel),
        Err(RenderError::DanglingMaterialReference { material: steel, count: 2 })
    );

    ctx.remove_object(a).unwrap();
    ctx.assign_material(b, None).unwrap();
    ctx.remove_material(steel).unwrap();
    assert_eq!(ctx.material_count(), 0);
}

#[test]
fn material_texture_is_bound_when_object_has_none() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let painted = ctx
        .add_material(Material::new("painted").with_texture(&loader, image(42)))
        .unwrap();
    ctx.add_object(Object::cuboid(&loader, 1.0, 1.0, 1.0).with_material(painted)).unwrap();

    ctx.render_frame().unwrap();
    let draw = log.last_frame().unwrap().draws[0];
    assert_eq!(draw.program, ShaderProgram::General3D);
    assert!(draw.texture.is_some());
}

#[test]
fn failed_uploads_degrade_without_aborting_the_frame() {
    let (mut ctx, log) = headless(no_shadows());
    let loader = ctx.loader().clone();

    let broken_mesh = MeshData {
        positions: vec![[0.0; 3]; 3],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        uvs: None,
        indices: vec![0, 1, 5],
        topology: Topology::TriangleList,
    };
    let broken = ctx.add_object(Object::model(&loader, broken_mesh)).unwrap();
    let bad_image = ImageData::new(2, 2, 4, vec![0; 3]);
    let untextured = ctx.add_object(Object::sprite(&loader, bad_image, Vec2::ONE)).unwrap();
    let fine = ctx.add_object(Object::sphere(&loader, 1.0)).unwrap();

    for _ in 0..2 {
        let report = ctx.render_frame().unwrap();
        assert_eq!(report.draw_calls, 2);
        let degraded: Vec<_> = report.degraded.iter().map(|(id, _)| *id).collect();
        assert_eq!(degraded, vec![broken, untextured]);
        assert!(matches!(
            report.degraded[0].1,
            RenderError::ResourceLoadFailed(BackendError::InvalidMesh(_))
        ));
    }

    let frame = log.last_frame().unwrap();
    assert_eq!(frame.objects(), vec![fine, untextured]);
    let sprite = frame.draws[1];
    assert!(sprite.texture.is_none());
    assert_eq!(sprite.uniforms.flags[0] & flags::TEXTURED, 0);
}

#[test]
fn shadow_pass_covers_world_geometry_only() {
    let (mut ctx, log) = headless(ContextConfig::default());
    let loader = ctx.loader().clone();

    ctx.add_object(Object::cuboid(&loader, 1.0, 1.0, 1.0)).unwrap();
    ctx.add_object(Object::line(&loader, Vec3::ZERO, Vec3::X, 0.1)).unwrap();
    ctx.add_object(Object::particle(&loader, Vec3::Z, 1.0, image(1))).unwrap();
    ctx.add_object(Object::sprite(&loader, image(2), Vec2::ONE)).unwrap();

    let report = ctx.render_frame().unwrap();
    assert_eq!(report.shadow_draws, 2);
    assert_eq!(report.draw_calls, 4);

    let frame = log.last_frame().unwrap();
    assert!(frame.globals.shadows);
    assert_eq!(
        frame.programs(),
        vec![
            ShaderProgram::ShadowMap,
            ShaderProgram::ShadowMap,
            ShaderProgram::General3D,
            ShaderProgram::Line3D,
            ShaderProgram::Particle,
            ShaderProgram::Sprite2D,
        ]
    );
}

#[test]
fn teardown_frees_every_gpu_resource() {
    let (mut ctx, log) = headless(ContextConfig::default());
    let loader = ctx.loader().clone();

    let kept = loader.request_texture(image(99));
    let m = ctx.add_material(Material::new("m").with_texture(&loader, image(3))).unwrap();
    ctx.add_object(Object::sphere(&loader, 1.0).with_material(m)).unwrap();
    ctx.add_object(Object::sprite(&loader, image(4), Vec2::ONE)).unwrap();
    ctx.render_frame().unwrap();
    assert!(log.live_count() > 0);

    ctx.teardown();
    assert_eq!(log.live_count(), 0);
    assert_eq!(kept.status(), LoadStatus::Failed(BackendError::ContextDropped));
}
