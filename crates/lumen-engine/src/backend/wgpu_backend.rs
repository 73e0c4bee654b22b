use std::collections::HashMap;
use std::num::NonZeroU64;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
use crate::error::BackendError;
use crate::loader::{ImageData, MeshData, Sampling, Topology};
use crate::paint::Color;
use crate::shader::{DrawUniforms, ShaderProgram};

use super::pipelines::{Pipelines, Vertex, DEPTH_FORMAT, TEXTURE_FORMAT};
use super::{DrawCall, FrameGlobals, GpuBackend, GpuHandle};

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    topology: Topology,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: PhysicalSize<u32>,
}

/// Renders into a window surface.
///
/// Draws are buffered between `begin_frame` and `end_frame`, then encoded as a shadow pass
/// (when enabled) followed by one main pass.
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,
    pipelines: Pipelines,

    meshes: HashMap<GpuHandle, GpuMesh>,
    textures: HashMap<GpuHandle, GpuTexture>,
    next_handle: u64,

    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    /// Bound when a draw has no texture.
    placeholder: GpuTexture,

    frame_ubo: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    _shadow_map: wgpu::Texture,
    shadow_view: wgpu::TextureView,
    depth: Option<DepthTarget>,

    draw_ubo: Option<wgpu::Buffer>,
    draw_bind_group: Option<wgpu::BindGroup>,
    draw_capacity: usize,
    draw_stride: u64,

    frame: Option<GpuFrame>,
    pending: Vec<DrawCall>,
    clear_color: Color,
    shadows: bool,
}

impl<'w> WgpuBackend<'w> {
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let gpu = Gpu::new(window, &init).await?;
        let device = gpu.device();
        let pipelines = Pipelines::new(device, gpu.surface_format());

        let linear_sampler = create_sampler(device, wgpu::FilterMode::Linear);
        let nearest_sampler = create_sampler(device, wgpu::FilterMode::Nearest);
        let placeholder = create_texture(
            &gpu,
            &pipelines.texture_layout,
            &nearest_sampler,
            &ImageData::solid(1, 1, [255; 4]),
        );

        let shadow_size = init.shadow_map_size.max(1);
        let shadow_map = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen shadow map"),
            size: wgpu::Extent3d {
                width: shadow_size,
                height: shadow_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let shadow_view = shadow_map.create_view(&wgpu::TextureViewDescriptor::default());
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let frame_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen frame ubo"),
            size: std::mem::size_of::<crate::shader::FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen frame bind group"),
            layout: &pipelines.frame_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: frame_ubo.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let align = u64::from(device.limits().min_uniform_buffer_offset_alignment).max(1);
        let draw_stride = (std::mem::size_of::<DrawUniforms>() as u64).div_ceil(align) * align;

        Ok(Self {
            gpu,
            pipelines,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            next_handle: 0,
            linear_sampler,
            nearest_sampler,
            placeholder,
            frame_ubo,
            frame_bind_group,
            _shadow_map: shadow_map,
            shadow_view,
            depth: None,
            draw_ubo: None,
            draw_bind_group: None,
            draw_capacity: 0,
            draw_stride,
            frame: None,
            pending: Vec::new(),
            clear_color: Color::BLACK,
            shadows: false,
        })
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    fn next_handle(&mut self) -> GpuHandle {
        self.next_handle += 1;
        GpuHandle::from_raw(self.next_handle)
    }

    fn ensure_depth(&mut self) {
        let size = self.gpu.size();
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }
        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen depth"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(DepthTarget { view, size });
    }

    fn ensure_draw_capacity(&mut self, required: usize) {
        if required <= self.draw_capacity && self.draw_ubo.is_some() {
            return;
        }

        let capacity = required.next_power_of_two().max(64);
        let device = self.gpu.device();
        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen draw ubo"),
            size: capacity as u64 * self.draw_stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen draw bind group"),
            layout: &self.pipelines.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &ubo,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        });

        log::debug!("draw uniform buffer grown to {capacity} slots");
        self.draw_ubo = Some(ubo);
        self.draw_bind_group = Some(bind_group);
        self.draw_capacity = capacity;
    }

    fn write_draw_uniforms(&self, calls: &[DrawCall]) {
        let Some(ubo) = self.draw_ubo.as_ref() else { return };
        if calls.is_empty() {
            return;
        }
        let stride = self.draw_stride as usize;
        let size = std::mem::size_of::<DrawUniforms>();
        let mut bytes = vec![0u8; stride * calls.len()];
        for (i, call) in calls.iter().enumerate() {
            bytes[i * stride..i * stride + size].copy_from_slice(bytemuck::bytes_of(&call.uniforms));
        }
        self.gpu.queue().write_buffer(ubo, 0, &bytes);
    }

    fn encode_shadow_pass(&self, encoder: &mut wgpu::CommandEncoder, calls: &[DrawCall]) {
        let Some(draw_bind_group) = self.draw_bind_group.as_ref() else { return };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumen shadow pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for (i, call) in calls.iter().enumerate() {
            if call.program != ShaderProgram::ShadowMap {
                continue;
            }
            let Some(mesh) = self.meshes.get(&call.mesh) else { continue };
            let Some(pipeline) = self.pipelines.get(call.program, mesh.topology) else { continue };

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, draw_bind_group, &[self.offset(i)]);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn encode_main_pass(&self, frame: &mut GpuFrame, calls: &[DrawCall]) {
        let Some(depth) = self.depth.as_ref() else { return };

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumen main pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let Some(draw_bind_group) = self.draw_bind_group.as_ref() else { return };

        for (i, call) in calls.iter().enumerate() {
            if call.program == ShaderProgram::ShadowMap {
                continue;
            }
            let Some(mesh) = self.meshes.get(&call.mesh) else {
                log::warn!("draw of {} skipped: unknown mesh {:?}", call.object, call.mesh);
                continue;
            };
            let Some(pipeline) = self.pipelines.get(call.program, mesh.topology) else { continue };
            let texture = call
                .texture
                .and_then(|t| self.textures.get(&t))
                .unwrap_or(&self.placeholder);

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(1, draw_bind_group, &[self.offset(i)]);
            pass.set_bind_group(2, &texture.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn offset(&self, slot: usize) -> u32 {
        (slot as u64 * self.draw_stride) as u32
    }
}

impl GpuBackend for WgpuBackend<'_> {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle, BackendError> {
        mesh.validate()?;
        let device = self.gpu.device();

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen mesh vbo"),
            contents: bytemuck::cast_slice(&Vertex::interleave(mesh)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen mesh ibo"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let gpu_mesh = GpuMesh {
            vertices,
            indices,
            index_count: mesh.index_count() as u32,
            topology: mesh.topology,
        };
        let handle = self.next_handle();
        self.meshes.insert(handle, gpu_mesh);
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<GpuHandle, BackendError> {
        image.validate()?;
        let max = self.gpu.device().limits().max_texture_dimension_2d;
        if image.width > max || image.height > max {
            return Err(BackendError::UnsupportedImage(format!(
                "{}x{} exceeds the device limit of {max}",
                image.width, image.height
            )));
        }

        let sampler = match image.sampling {
            Sampling::Linear => &self.linear_sampler,
            Sampling::Nearest => &self.nearest_sampler,
        };
        let texture = create_texture(&self.gpu, &self.pipelines.texture_layout, sampler, image);
        let handle = self.next_handle();
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn free(&mut self, handle: GpuHandle) {
        if self.meshes.remove(&handle).is_none() && self.textures.remove(&handle).is_none() {
            log::debug!("free of unknown {handle:?} ignored");
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    fn begin_frame(&mut self, globals: &FrameGlobals) -> Result<bool, BackendError> {
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            return Ok(false);
        }

        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("surface error: {err}");
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(false),
                    SurfaceErrorAction::Fatal => Err(BackendError::OutOfMemory),
                };
            }
        };

        self.gpu
            .queue()
            .write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(&globals.uniforms));
        self.clear_color = globals.clear_color;
        self.shadows = globals.shadows;
        self.pending.clear();
        self.frame = Some(frame);
        Ok(true)
    }

    fn draw(&mut self, call: &DrawCall) {
        if self.frame.is_none() {
            log::warn!("draw outside a frame ignored");
            return;
        }
        self.pending.push(*call);
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let Some(mut frame) = self.frame.take() else { return Ok(()) };
        let calls = std::mem::take(&mut self.pending);

        self.ensure_depth();
        self.ensure_draw_capacity(calls.len());
        for call in &calls {
            if let Some(mesh) = self.meshes.get(&call.mesh) {
                let topology = mesh.topology;
                self.pipelines.ensure(self.gpu.device(), call.program, topology);
            }
        }
        self.write_draw_uniforms(&calls);

        if self.shadows {
            self.encode_shadow_pass(&mut frame.encoder, &calls);
        }
        self.encode_main_pass(&mut frame, &calls);
        self.gpu.submit(frame);

        self.pending = calls;
        self.pending.clear();
        Ok(())
    }
}

fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("lumen texture sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

fn create_texture(
    gpu: &Gpu<'_>,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &ImageData,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.to_rgba8(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lumen texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    });

    GpuTexture { _texture: texture, bind_group }
}
