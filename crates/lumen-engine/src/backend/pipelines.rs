//! Bind group layouts and render pipelines for the wgpu backend.

use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::loader::{MeshData, Topology};
use crate::shader::{DrawUniforms, FrameUniforms, ShaderProgram};

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub(super) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2  // uv
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    /// Interleaves a validated mesh. Missing UVs become zero.
    pub(super) fn interleave(mesh: &MeshData) -> Vec<Vertex> {
        let uvs = mesh.uvs.as_deref();
        mesh.positions
            .iter()
            .zip(&mesh.normals)
            .enumerate()
            .map(|(i, (&position, &normal))| Vertex {
                position,
                normal,
                uv: uvs.and_then(|uv| uv.get(i)).copied().unwrap_or([0.0; 2]),
            })
            .collect()
    }
}

// ── blend ─────────────────────────────────────────────────────────────────

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    dynamic: bool,
    size: usize,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn topology(t: Topology) -> wgpu::PrimitiveTopology {
    match t {
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
    }
}

/// Depth and blend behavior per program in the main pass.
fn pass_state(program: ShaderProgram) -> (Option<wgpu::BlendState>, bool, wgpu::CompareFunction) {
    match program {
        ShaderProgram::General3D | ShaderProgram::Line3D | ShaderProgram::ShadowMap => {
            (None, true, wgpu::CompareFunction::Less)
        }
        ShaderProgram::Particle => (Some(premul_alpha_blend()), false, wgpu::CompareFunction::Less),
        ShaderProgram::Sprite2D => (Some(premul_alpha_blend()), false, wgpu::CompareFunction::Always),
    }
}

fn shader_source(program: ShaderProgram) -> &'static str {
    match program {
        ShaderProgram::General3D => include_str!("shaders/general.wgsl"),
        ShaderProgram::Line3D => include_str!("shaders/line.wgsl"),
        ShaderProgram::Particle => include_str!("shaders/particle.wgsl"),
        ShaderProgram::Sprite2D => include_str!("shaders/sprite.wgsl"),
        ShaderProgram::ShadowMap => include_str!("shaders/shadow.wgsl"),
    }
}

/// Layouts plus lazily built pipelines, one per (program, topology).
pub(super) struct Pipelines {
    surface_format: wgpu::TextureFormat,
    /// Group 0 of the main pass: frame uniforms, shadow map, comparison sampler.
    pub frame_layout: wgpu::BindGroupLayout,
    /// Group 1 of the main pass, group 0 of the shadow pass.
    pub draw_layout: wgpu::BindGroupLayout,
    /// Group 2 of the main pass: base color texture and sampler.
    pub texture_layout: wgpu::BindGroupLayout,
    main_layout: wgpu::PipelineLayout,
    shadow_layout: wgpu::PipelineLayout,
    modules: HashMap<ShaderProgram, wgpu::ShaderModule>,
    pipelines: HashMap<(ShaderProgram, Topology), wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen frame bgl"),
            entries: &[
                uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    false,
                    std::mem::size_of::<FrameUniforms>(),
                ),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen draw bgl"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                true,
                std::mem::size_of::<DrawUniforms>(),
            )],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let main_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen main pipeline layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout, &texture_layout],
            immediate_size: 0,
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen shadow pipeline layout"),
            bind_group_layouts: &[&draw_layout],
            immediate_size: 0,
        });

        Self {
            surface_format,
            frame_layout,
            draw_layout,
            texture_layout,
            main_layout,
            shadow_layout,
            modules: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn get(&self, program: ShaderProgram, topo: Topology) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(program, topo))
    }

    pub fn ensure(&mut self, device: &wgpu::Device, program: ShaderProgram, topo: Topology) {
        if self.pipelines.contains_key(&(program, topo)) {
            return;
        }

        let module: &wgpu::ShaderModule = self.modules.entry(program).or_insert_with(|| {
            log::debug!("compiling {} shader", program.label());
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(shader_source(program).into()),
            })
        });

        let (blend, depth_write_enabled, depth_compare) = pass_state(program);
        let shadow = program == ShaderProgram::ShadowMap;
        let targets = [Some(wgpu::ColorTargetState {
            format: self.surface_format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.label()),
            layout: Some(if shadow { &self.shadow_layout } else { &self.main_layout }),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: (!shadow).then(|| wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: topology(topo),
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: if shadow {
                    wgpu::DepthBiasState { constant: 2, slope_scale: 2.0, clamp: 0.0 }
                } else {
                    wgpu::DepthBiasState::default()
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert((program, topo), pipeline);
    }
}
