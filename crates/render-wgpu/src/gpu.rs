use crate::GpuError;
use crate::mesh::{GridVertex, Vertex, cube_mesh, grid_mesh};
use crate::shaders;
use crate::texture::{GpuTexture, TextureRole};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use mipview_common::ResourceId;
use mipview_material::{MaterialFrame, TextureBinding};
use mipview_render::VirtualCamera;
use mipview_scene::Scene;
use mipview_stream::MipChain;
use std::collections::BTreeMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct MaterialUniforms {
    lod: f32,
    uv_offset: f32,
    opacity: f32,
    roughness: f32,
    metalness: f32,
    has_normal: f32,
    has_roughness: f32,
    textured: f32,
}

impl MaterialUniforms {
    fn from_frame(frame: &MaterialFrame, textured: bool, has_normal: bool, has_roughness: bool) -> Self {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Self {
            lod: frame.mip_level.unwrap_or(0) as f32,
            uv_offset: frame.uv_offset,
            opacity: frame.opacity,
            roughness: frame.roughness,
            metalness: frame.metalness,
            has_normal: flag(has_normal),
            has_roughness: flag(has_roughness),
            textured: flag(textured),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
}

/// Texture ids the current material bind group samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct BoundTextures {
    base: Option<ResourceId>,
    normal: Option<ResourceId>,
    roughness: Option<ResourceId>,
}

/// wgpu renderer for the textured cube grid.
pub struct WgpuRenderer {
    cube_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    material_buffer: wgpu::Buffer,
    material_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    cube_vertex_buffer: wgpu::Buffer,
    cube_index_buffer: wgpu::Buffer,
    cube_index_count: u32,
    grid_vertex_buffer: wgpu::Buffer,
    grid_vertex_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    max_instances: u32,
    depth_texture: wgpu::TextureView,
    depth_size: (u32, u32),
    color_format: wgpu::TextureFormat,
    textures: BTreeMap<ResourceId, GpuTexture>,
    white: GpuTexture,
    flat_normal: GpuTexture,
    bound: BoundTextures,
}

impl std::fmt::Debug for WgpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRenderer")
            .field("color_format", &self.color_format)
            .field("instances", &self.instance_count)
            .field("textures", &self.textures.len())
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                camera_pos: [0.0; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Repeat wrapping, trilinear minification, anisotropy 16.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("map_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });

        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("material_uniforms"),
            contents: bytemuck::bytes_of(&MaterialUniforms::from_frame(
                &MaterialFrame {
                    binding: TextureBinding::Provisional,
                    aux: Default::default(),
                    mip_level: None,
                    uv_offset: 0.0,
                    opacity: 1.0,
                    roughness: 0.8,
                    metalness: 0.2,
                },
                false,
                false,
                false,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let white = GpuTexture::solid(device, queue, "white_texture", WHITE)?;
        let flat_normal = GpuTexture::solid(device, queue, "flat_normal_texture", FLAT_NORMAL)?;
        let material_bind_group = Self::material_bind_group(
            device,
            &material_layout,
            &material_buffer,
            &sampler,
            [white.view(), flat_normal.view(), white.view()],
        );

        let cube_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cube_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let grid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grid_pipeline_layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });

        // Cube pipeline
        let cube_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cube_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::CUBE_SHADER.into()),
        });

        let cube_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cube_pipeline"),
            layout: Some(&cube_layout),
            vertex: wgpu::VertexState {
                module: &cube_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                            2 => Float32x3,
                            3 => Float32x2,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x4,
                            7 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &cube_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    // Faces are translucent while the texture refines.
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        // Grid pipeline
        let grid_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grid_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::GRID_SHADER.into()),
        });

        let grid_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grid_pipeline"),
            layout: Some(&grid_layout),
            vertex: wgpu::VertexState {
                module: &grid_shader,
                entry_point: Some("vs_grid"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GridVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x4,
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &grid_shader,
                entry_point: Some("fs_grid"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        // Cube mesh
        let (cube_verts, cube_indices) = cube_mesh();
        let cube_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_vertex_buffer"),
            contents: bytemuck::cast_slice(&cube_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_index_buffer"),
            contents: bytemuck::cast_slice(&cube_indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let cube_index_count = cube_indices.len() as u32;

        // Grid floor just under the cubes
        let grid_verts = grid_mesh(50, 1.0, -0.51);
        let grid_vertex_count = grid_verts.len() as u32;
        let grid_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid_vertex_buffer"),
            contents: bytemuck::cast_slice(&grid_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Instance buffer (pre-allocated)
        let max_instances = 10_000u32;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (max_instances as u64) * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let depth_texture = Self::create_depth_texture(device, width, height);

        Ok(Self {
            cube_pipeline,
            grid_pipeline,
            frame_buffer,
            frame_bind_group,
            material_layout,
            material_buffer,
            material_bind_group,
            sampler,
            cube_vertex_buffer,
            cube_index_buffer,
            cube_index_count,
            grid_vertex_buffer,
            grid_vertex_count,
            instance_buffer,
            instance_count: 0,
            max_instances,
            depth_texture,
            depth_size: (width.max(1), height.max(1)),
            color_format,
            textures: BTreeMap::new(),
            white,
            flat_normal,
            bound: BoundTextures::default(),
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.ensure_depth(device, width, height);
    }

    /// Upload one model matrix per cube.
    pub fn set_scene(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let instances: Vec<InstanceData> = scene
            .cubes()
            .take(self.max_instances as usize)
            .map(|cube| {
                let t = &cube.transform;
                let cols = Mat4::from_scale_rotation_translation(t.scale, t.rotation, t.position)
                    .to_cols_array_2d();
                InstanceData {
                    model_0: cols[0],
                    model_1: cols[1],
                    model_2: cols[2],
                    model_3: cols[3],
                }
            })
            .collect();
        if instances.len() < scene.cube_count() {
            tracing::warn!(
                cubes = scene.cube_count(),
                drawn = instances.len(),
                "cube grid exceeds instance capacity"
            );
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        self.instance_count = instances.len() as u32;
    }

    pub fn has_texture(&self, id: ResourceId) -> bool {
        self.textures.contains_key(&id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Upload `chain` under `id` unless it is already resident.
    pub fn upload_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: ResourceId,
        chain: &MipChain,
        role: TextureRole,
    ) -> Result<bool, GpuError> {
        if self.textures.contains_key(&id) {
            return Ok(false);
        }
        let texture = GpuTexture::upload(device, queue, &format!("texture_{id}"), chain, role)?;
        self.textures.insert(id, texture);
        Ok(true)
    }

    /// Free one texture's GPU memory. Idempotent.
    pub fn release_texture(&mut self, id: ResourceId) -> bool {
        match self.textures.remove(&id) {
            Some(mut texture) => texture.release(),
            None => false,
        }
    }

    /// Free every uploaded texture. Materials fall back to the built-in
    /// placeholders until new textures are applied.
    pub fn release_all(&mut self, device: &wgpu::Device) {
        let released = self
            .textures
            .values_mut()
            .map(GpuTexture::release)
            .filter(|r| *r)
            .count();
        self.textures.clear();
        if released > 0 {
            tracing::debug!(textures = released, "GPU textures released");
        }
        self.bound = BoundTextures::default();
        self.material_bind_group = Self::material_bind_group(
            device,
            &self.material_layout,
            &self.material_buffer,
            &self.sampler,
            [self.white.view(), self.flat_normal.view(), self.white.view()],
        );
    }

    /// Bring GPU material state in line with `frame`, uploading any texture
    /// it references through `chains`. Textures that cannot be uploaded are
    /// logged and replaced by placeholders.
    pub fn apply_material<F>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &MaterialFrame,
        chains: F,
    ) where
        F: Fn(ResourceId) -> Option<Arc<MipChain>>,
    {
        let base_id = match frame.binding {
            TextureBinding::Provisional => None,
            TextureBinding::Streamed(id) | TextureBinding::Fallback(id) => Some(id),
        };
        let wanted = BoundTextures {
            base: base_id.filter(|id| self.ensure(device, queue, *id, TextureRole::BaseColor, &chains)),
            normal: frame
                .aux
                .normal
                .filter(|id| self.ensure(device, queue, *id, TextureRole::Data, &chains)),
            roughness: frame
                .aux
                .roughness
                .filter(|id| self.ensure(device, queue, *id, TextureRole::Data, &chains)),
        };

        let uniforms = MaterialUniforms::from_frame(
            frame,
            wanted.base.is_some(),
            wanted.normal.is_some(),
            wanted.roughness.is_some(),
        );
        queue.write_buffer(&self.material_buffer, 0, bytemuck::bytes_of(&uniforms));

        if wanted != self.bound {
            let base = resident(&self.textures, wanted.base, &self.white);
            let normal = resident(&self.textures, wanted.normal, &self.flat_normal);
            let roughness = resident(&self.textures, wanted.roughness, &self.white);
            let bind_group = Self::material_bind_group(
                device,
                &self.material_layout,
                &self.material_buffer,
                &self.sampler,
                [base.view(), normal.view(), roughness.view()],
            );
            self.material_bind_group = bind_group;
            tracing::debug!(bound = ?wanted, "material textures rebound");
            self.bound = wanted;
        }
    }

    /// Draw the grid floor and cubes through `camera` into `target`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        camera: &VirtualCamera,
    ) {
        self.ensure_depth(device, camera.viewport.x, camera.viewport.y);
        queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms {
                view_proj: camera.view_proj().to_cols_array_2d(),
                camera_pos: camera.position.extend(1.0).to_array(),
            }),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.15,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            // Draw grid floor
            pass.set_pipeline(&self.grid_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_vertex_buffer(0, self.grid_vertex_buffer.slice(..));
            pass.draw(0..self.grid_vertex_count, 0..1);

            // Draw cubes
            if self.instance_count > 0 {
                pass.set_pipeline(&self.cube_pipeline);
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                pass.set_bind_group(1, &self.material_bind_group, &[]);
                pass.set_vertex_buffer(0, self.cube_vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                pass.set_index_buffer(self.cube_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..self.cube_index_count, 0, 0..self.instance_count);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Whether `id` is resident, uploading it first if its chain is known.
    fn ensure<F>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: ResourceId,
        role: TextureRole,
        chains: &F,
    ) -> bool
    where
        F: Fn(ResourceId) -> Option<Arc<MipChain>>,
    {
        if self.textures.contains_key(&id) {
            return true;
        }
        let Some(chain) = chains(id) else {
            return false;
        };
        match self.upload_texture(device, queue, id, &chain, role) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%id, error = %e, "texture upload failed, using placeholder");
                false
            }
        }
    }

    fn ensure_depth(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size != self.depth_size {
            self.depth_texture = Self::create_depth_texture(device, size.0, size.1);
            self.depth_size = size;
        }
    }

    fn material_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
        views: [&wgpu::TextureView; 3],
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

fn resident<'a>(
    textures: &'a BTreeMap<ResourceId, GpuTexture>,
    id: Option<ResourceId>,
    placeholder: &'a GpuTexture,
) -> &'a GpuTexture {
    id.and_then(|id| textures.get(&id)).unwrap_or(placeholder)
}
