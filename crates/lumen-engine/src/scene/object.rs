use glam::{Mat4, Quat, Vec2, Vec3};

use crate::loader::{Descriptor, ImageData, MeshData, ResourceHandle, ResourceLoader};
use crate::math::Transform;
use crate::paint::Color;
use crate::text::{FontId, FontLoadError, FontSystem, TextAlign};

use super::geometry;
use super::{Alignment, MaterialId, ObjectId, ZIndex};

/// Screen-space shapes. Both render a textured unit quad.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape2D {
    Sprite,
    Text { content: String, font: FontId, px: f32, align: TextAlign },
}

/// Screen-space object in logical pixels, top-left origin, y down.
///
/// `translation` is an offset from the screen point named by `alignment`. The same point of
/// the unrotated rectangle lands there, except that text anchors horizontally by its
/// [`TextAlign`]. `rotation` (radians) turns the rectangle about its center.
#[derive(Debug, Clone, PartialEq)]
pub struct Object2D {
    pub translation: Vec2,
    pub rotation: f32,
    pub size: Vec2,
    pub z_order: ZIndex,
    pub alignment: Alignment,
    shape: Shape2D,
}

impl Object2D {
    fn new(size: Vec2, shape: Shape2D) -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: 0.0,
            size,
            z_order: ZIndex::default(),
            alignment: Alignment::default(),
            shape,
        }
    }

    pub fn shape(&self) -> &Shape2D {
        &self.shape
    }

    /// Point of the object's own rectangle placed on the aligned position, as a fraction of
    /// its size.
    pub fn anchor(&self) -> Vec2 {
        let mut anchor = self.alignment.factor();
        if let Shape2D::Text { align, .. } = &self.shape {
            anchor.x = align.factor();
        }
        anchor
    }

    /// Top-left corner of the unrotated rectangle on a `viewport`-sized screen.
    pub fn top_left(&self, viewport: Vec2) -> Vec2 {
        self.alignment.reference(viewport) + self.translation - self.size * self.anchor()
    }

    pub fn model_matrix(&self, viewport: Vec2) -> Mat4 {
        let center = self.top_left(viewport) + self.size * 0.5;
        Mat4::from_translation(center.extend(0.0))
            * Mat4::from_rotation_z(self.rotation)
            * Mat4::from_scale(self.size.extend(1.0))
    }
}

/// Built-in 3D shapes. Dimensions scale a shared unit mesh.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape3D {
    Cuboid { length: f32, breadth: f32, height: f32 },
    /// Axis along local Z.
    Cylinder { diameter: f32, length: f32 },
    Sphere { diameter: f32 },
    /// Imported mesh, drawn at its own scale.
    Model,
}

impl Shape3D {
    /// Scale applied to the unit mesh before the object transform.
    pub fn extent(&self) -> Vec3 {
        match *self {
            Shape3D::Cuboid { length, breadth, height } => Vec3::new(length, breadth, height),
            Shape3D::Cylinder { diameter, length } => Vec3::new(diameter, diameter, length),
            Shape3D::Sphere { diameter } => Vec3::splat(diameter),
            Shape3D::Model => Vec3::ONE,
        }
    }
}

/// Per-object surface response, used when no material is attached.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Surface {
    pub metalness: f32,
    pub roughness: f32,
    pub ambient_occlusion: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self { metalness: 0.0, roughness: 0.6, ambient_occlusion: 0.6 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object3D {
    pub transform: Transform,
    pub surface: Surface,
    shape: Shape3D,
    material: Option<MaterialId>,
}

impl Object3D {
    pub fn shape(&self) -> Shape3D {
        self.shape
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.transform.matrix() * Mat4::from_scale(self.shape.extent())
    }
}

/// Camera-facing textured square.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle3D {
    pub position: Vec3,
    pub size: f32,
}

impl Particle3D {
    /// Billboard matrix for a camera with the given world `right`/`up` axes.
    pub fn model_matrix(&self, right: Vec3, up: Vec3) -> Mat4 {
        let normal = right.cross(up);
        Mat4::from_cols(
            (right * self.size).extend(0.0),
            (-up * self.size).extend(0.0),
            normal.extend(0.0),
            self.position.extend(1.0),
        )
    }
}

/// Straight segment drawn as a square beam `thickness` wide.
#[derive(Debug, Clone, PartialEq)]
pub struct Line3D {
    pub start: Vec3,
    pub end: Vec3,
    pub thickness: f32,
}

impl Line3D {
    pub fn length(&self) -> f32 {
        (self.end - self.start).length()
    }

    pub fn model_matrix(&self) -> Mat4 {
        let delta = self.end - self.start;
        let length = delta.length();
        let rotation = match delta.try_normalize() {
            Some(dir) => Quat::from_rotation_arc(Vec3::X, dir),
            None => Quat::IDENTITY,
        };
        Mat4::from_scale_rotation_translation(
            Vec3::new(length, self.thickness, self.thickness),
            rotation,
            self.start,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Object2D(Object2D),
    Object3D(Object3D),
    Particle3D(Particle3D),
    Line3D(Line3D),
}

impl ObjectKind {
    /// True for screen-space objects (drawn after the world, sorted by layer).
    pub fn is_2d(&self) -> bool {
        matches!(self, ObjectKind::Object2D(_))
    }
}

/// A renderable scene entity.
///
/// An object is built against one context's [`ResourceLoader`] and requests its mesh and
/// texture at construction. It stays pending until the loader has uploaded both.
#[derive(Debug)]
pub struct Object {
    id: Option<ObjectId>,
    loader: ResourceLoader,
    color: Color,
    hidden: bool,
    mesh: ResourceHandle,
    texture: Option<ResourceHandle>,
    kind: ObjectKind,
}

impl Object {
    fn build(loader: &ResourceLoader, mesh: std::sync::Arc<Descriptor>, kind: ObjectKind) -> Self {
        Self {
            id: None,
            loader: loader.clone(),
            color: Color::WHITE,
            hidden: false,
            mesh: loader.request(mesh),
            texture: None,
            kind,
        }
    }

    fn build_3d(loader: &ResourceLoader, mesh: std::sync::Arc<Descriptor>, shape: Shape3D) -> Self {
        Self::build(
            loader,
            mesh,
            ObjectKind::Object3D(Object3D {
                transform: Transform::default(),
                surface: Surface::default(),
                shape,
                material: None,
            }),
        )
    }

    /// Image drawn in screen space at `size` logical pixels.
    pub fn sprite(loader: &ResourceLoader, image: ImageData, size: Vec2) -> Self {
        let mut object = Self::build(
            loader,
            geometry::unit_quad(),
            ObjectKind::Object2D(Object2D::new(size, Shape2D::Sprite)),
        );
        object.texture = Some(loader.request_texture(image));
        object
    }

    /// Text rendered with `font` at `px`. The quad takes the size of the rasterized string.
    pub fn text(
        loader: &ResourceLoader,
        fonts: &FontSystem,
        font: FontId,
        content: &str,
        px: f32,
    ) -> Result<Self, FontLoadError> {
        let bitmap = fonts.rasterize(font, content, px, TextAlign::Left)?;
        let size = Vec2::new(bitmap.width as f32, bitmap.height as f32);
        let shape = Shape2D::Text {
            content: content.to_owned(),
            font,
            px,
            align: TextAlign::Left,
        };
        let mut object = Self::build(
            loader,
            geometry::unit_quad(),
            ObjectKind::Object2D(Object2D::new(size, shape)),
        );
        object.texture = Some(loader.request_texture(bitmap));
        Ok(object)
    }

    pub fn cuboid(loader: &ResourceLoader, length: f32, breadth: f32, height: f32) -> Self {
        Self::build_3d(
            loader,
            geometry::unit_cube(),
            Shape3D::Cuboid { length, breadth, height },
        )
    }

    pub fn cylinder(loader: &ResourceLoader, diameter: f32, length: f32) -> Self {
        Self::build_3d(
            loader,
            geometry::unit_cylinder(),
            Shape3D::Cylinder { diameter, length },
        )
    }

    pub fn sphere(loader: &ResourceLoader, diameter: f32) -> Self {
        Self::build_3d(loader, geometry::unit_sphere(), Shape3D::Sphere { diameter })
    }

    /// Imported mesh, see [`crate::import::parse_obj`].
    pub fn model(loader: &ResourceLoader, mesh: MeshData) -> Self {
        Self::build_3d(loader, std::sync::Arc::new(Descriptor::Mesh(mesh)), Shape3D::Model)
    }

    pub fn particle(loader: &ResourceLoader, position: Vec3, size: f32, image: ImageData) -> Self {
        let mut object = Self::build(
            loader,
            geometry::unit_quad(),
            ObjectKind::Particle3D(Particle3D { position, size }),
        );
        object.texture = Some(loader.request_texture(image));
        object
    }

    pub fn line(loader: &ResourceLoader, start: Vec3, end: Vec3, thickness: f32) -> Self {
        Self::build(
            loader,
            geometry::unit_beam(),
            ObjectKind::Line3D(Line3D { start, end, thickness }),
        )
    }

    // ── builders ──────────────────────────────────────────────────────────

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_texture(mut self, image: ImageData) -> Self {
        self.set_texture(Some(image));
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Only meaningful for 3D shapes; ignored otherwise. Checked when the object is added.
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.set_material(Some(material));
        self
    }

    /// Only meaningful for 3D shapes; ignored otherwise.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        if let ObjectKind::Object3D(o) = &mut self.kind {
            o.transform = transform;
        }
        self
    }

    /// Only meaningful for 2D objects; ignored otherwise.
    pub fn with_position(mut self, translation: Vec2) -> Self {
        if let ObjectKind::Object2D(o) = &mut self.kind {
            o.translation = translation;
        }
        self
    }

    /// Only meaningful for 2D objects; ignored otherwise.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        if let ObjectKind::Object2D(o) = &mut self.kind {
            o.alignment = alignment;
        }
        self
    }

    /// Only meaningful for 2D objects; ignored otherwise.
    pub fn with_z_order(mut self, z: impl Into<ZIndex>) -> Self {
        if let ObjectKind::Object2D(o) = &mut self.kind {
            o.z_order = z.into();
        }
        self
    }

    // ── accessors ─────────────────────────────────────────────────────────

    /// Registry id, once the object has been added to a context.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn mesh(&self) -> &ResourceHandle {
        &self.mesh
    }

    pub fn texture(&self) -> Option<&ResourceHandle> {
        self.texture.as_ref()
    }

    pub fn material(&self) -> Option<MaterialId> {
        match &self.kind {
            ObjectKind::Object3D(o) => o.material,
            _ => None,
        }
    }

    /// Every loader handle held by this object.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceHandle> {
        std::iter::once(&self.mesh).chain(self.texture.iter())
    }

    pub fn as_2d(&self) -> Option<&Object2D> {
        match &self.kind {
            ObjectKind::Object2D(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_2d_mut(&mut self) -> Option<&mut Object2D> {
        match &mut self.kind {
            ObjectKind::Object2D(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_3d(&self) -> Option<&Object3D> {
        match &self.kind {
            ObjectKind::Object3D(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_3d_mut(&mut self) -> Option<&mut Object3D> {
        match &mut self.kind {
            ObjectKind::Object3D(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_particle_mut(&mut self) -> Option<&mut Particle3D> {
        match &mut self.kind {
            ObjectKind::Particle3D(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut Line3D> {
        match &mut self.kind {
            ObjectKind::Line3D(o) => Some(o),
            _ => None,
        }
    }

    // ── resource changes ──────────────────────────────────────────────────

    /// Requests a new texture from this object's loader and releases the previous one.
    /// `None` removes the texture.
    pub fn set_texture(&mut self, image: Option<ImageData>) {
        self.texture = image.map(|image| self.loader.request_texture(image));
    }

    /// Re-rasterizes a text object. Non-text objects are left untouched.
    pub fn set_text(&mut self, fonts: &FontSystem, content: &str) -> Result<(), FontLoadError> {
        self.retext(fonts, |current, _| *current = content.to_owned())
    }

    /// Changes how the lines of a text object are placed, re-rasterizing it. Non-text objects
    /// are left untouched.
    pub fn set_text_align(
        &mut self,
        fonts: &FontSystem,
        align: TextAlign,
    ) -> Result<(), FontLoadError> {
        self.retext(fonts, |_, current| *current = align)
    }

    fn retext(
        &mut self,
        fonts: &FontSystem,
        edit: impl FnOnce(&mut String, &mut TextAlign),
    ) -> Result<(), FontLoadError> {
        let ObjectKind::Object2D(o) = &mut self.kind else { return Ok(()) };
        let Shape2D::Text { content, font, px, align } = &mut o.shape else { return Ok(()) };

        let mut next_content = content.clone();
        let mut next_align = *align;
        edit(&mut next_content, &mut next_align);

        let bitmap = fonts.rasterize(*font, &next_content, *px, next_align)?;
        o.size = Vec2::new(bitmap.width as f32, bitmap.height as f32);
        *content = next_content;
        *align = next_align;
        self.texture = Some(self.loader.request_texture(bitmap));
        Ok(())
    }

    /// Returns false for objects that cannot carry a material.
    pub(crate) fn set_material(&mut self, material: Option<MaterialId>) -> bool {
        match &mut self.kind {
            ObjectKind::Object3D(o) => {
                o.material = material;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn assign_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    /// Copies this object for another context, requesting every resource again from `loader`.
    ///
    /// Material references are kept only when `loader` is this object's own loader.
    pub fn duplicate_into(&self, loader: &ResourceLoader) -> Object {
        let mut kind = self.kind.clone();
        if !self.loader.is_same(loader) {
            if let ObjectKind::Object3D(o) = &mut kind {
                if o.material.take().is_some() {
                    log::debug!("material reference dropped while duplicating across contexts");
                }
            }
        }

        Object {
            id: None,
            loader: loader.clone(),
            color: self.color,
            hidden: self.hidden,
            mesh: loader.request(std::sync::Arc::clone(self.mesh.descriptor())),
            texture: self
                .texture
                .as_ref()
                .map(|t| loader.request(std::sync::Arc::clone(t.descriptor()))),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::math::Euler;
    use glam::Vec4;

    #[test]
    fn shapes_share_unit_meshes() {
        let loader = ResourceLoader::new();
        let a = Object::cuboid(&loader, 1.0, 2.0, 3.0);
        let b = Object::cuboid(&loader, 4.0, 4.0, 4.0);
        assert_eq!(a.mesh().entry(), b.mesh().entry());
        assert_eq!(loader.entry_count(), 1);
    }

    #[test]
    fn cuboid_dimensions_scale_the_mesh() {
        let loader = ResourceLoader::new();
        let object = Object::cuboid(&loader, 2.0, 4.0, 6.0).with_transform(Transform {
            translation: Vec3::new(1.0, 0.0, 0.0),
            ..Transform::default()
        });
        let m = object.as_3d().unwrap().model_matrix();
        let corner = m.transform_point3(Vec3::splat(0.5));
        assert!(corner.abs_diff_eq(Vec3::new(2.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn euler_rotation_in_model_matrix() {
        let loader = ResourceLoader::new();
        let object = Object::cuboid(&loader, 1.0, 1.0, 1.0).with_transform(Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Euler::from_degrees(90.0, 90.0, 90.0),
            scale: Vec3::new(2.0, 1.0, 1.0),
        });
        let expected = Mat4::from_cols(
            Vec4::new(0.0, 0.0, -2.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(1.0, 2.0, 3.0, 1.0),
        );
        assert!(object.as_3d().unwrap().model_matrix().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn line_spans_its_endpoints() {
        let line = Line3D {
            start: Vec3::new(1.0, 1.0, 0.0),
            end: Vec3::new(1.0, 4.0, 0.0),
            thickness: 0.1,
        };
        let m = line.model_matrix();
        assert!(m.transform_point3(Vec3::ZERO).abs_diff_eq(line.start, 1e-6));
        assert!(m.transform_point3(Vec3::X).abs_diff_eq(line.end, 1e-5));
        assert!((line.length() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn sprite_rect_maps_to_pixels() {
        let mut o = Object2D::new(Vec2::new(100.0, 50.0), Shape2D::Sprite);
        o.translation = Vec2::new(10.0, 20.0);
        let m = o.model_matrix(Vec2::new(640.0, 480.0));
        assert!(m.transform_point3(Vec3::new(-0.5, -0.5, 0.0)).abs_diff_eq(Vec3::new(10.0, 20.0, 0.0), 1e-5));
        assert!(m.transform_point3(Vec3::new(0.5, 0.5, 0.0)).abs_diff_eq(Vec3::new(110.0, 70.0, 0.0), 1e-5));
    }

    #[test]
    fn aligned_sprite_follows_its_screen_corner() {
        let mut o = Object2D::new(Vec2::new(100.0, 50.0), Shape2D::Sprite);
        o.alignment = Alignment::BottomRight;
        o.translation = Vec2::new(-10.0, -20.0);

        assert_eq!(o.top_left(Vec2::new(640.0, 480.0)), Vec2::new(530.0, 410.0));
        assert_eq!(o.top_left(Vec2::new(800.0, 600.0)), Vec2::new(690.0, 530.0));

        o.alignment = Alignment::MiddleCenter;
        o.translation = Vec2::ZERO;
        let m = o.model_matrix(Vec2::new(640.0, 480.0));
        assert!(m.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(320.0, 240.0, 0.0), 1e-5));
    }

    #[test]
    fn text_anchors_horizontally_by_its_alignment() {
        let shape = Shape2D::Text {
            content: "hi".into(),
            font: FontId(0),
            px: 16.0,
            align: TextAlign::Right,
        };
        let mut o = Object2D::new(Vec2::new(40.0, 20.0), shape);
        o.alignment = Alignment::TopCenter;
        o.translation = Vec2::new(0.0, 8.0);

        assert_eq!(o.anchor(), Vec2::new(1.0, 0.0));
        assert_eq!(o.top_left(Vec2::new(200.0, 100.0)), Vec2::new(60.0, 8.0));
    }

    #[test]
    fn replacing_texture_releases_previous() {
        let loader = ResourceLoader::new();
        let mut sprite = Object::sprite(&loader, ImageData::solid(1, 1, [1, 1, 1, 255]), Vec2::ONE);
        assert_eq!(loader.entry_count(), 2);

        sprite.set_texture(Some(ImageData::solid(1, 1, [2, 2, 2, 255])));
        assert_eq!(loader.entry_count(), 2);

        sprite.set_texture(None);
        assert_eq!(loader.entry_count(), 1);
    }

    #[test]
    fn duplicate_requests_from_target_loader() {
        let source = ResourceLoader::new();
        let target = ResourceLoader::new();
        let mut backend = HeadlessBackend::new();

        let original = Object::sphere(&source, 1.0)
            .with_texture(ImageData::solid(2, 2, [9, 9, 9, 255]))
            .with_material(MaterialId(0));
        source.process_uploads(&mut backend).unwrap();

        let copy = original.duplicate_into(&target);
        assert!(copy.resources().all(|h| target.owns(h)));
        assert!(!copy.mesh().is_resident());
        assert_eq!(copy.material(), None);
        assert_eq!(target.entry_count(), 2);
        assert_eq!(original.mesh().use_count(), 1);
    }
}
