use crate::{
    enums::{Axis, TextureFilter},
    render_state::RenderState,
    volume::{VOLUME_SIZE, Volume},
};

use glam::Mat4;
use log::debug;
use std::{borrow::Cow, sync::Arc};
use thiserror::Error;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Number of view-aligned quads compositing the volume, two per voxel layer.
const SLICE_QUADS: usize = 2 * VOLUME_SIZE;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// Fixed light, not user controllable: half-intensity white ambient, full
// white diffuse, placed in front of the volume.
const LIGHT_AMBIENT: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
const LIGHT_DIFFUSE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const LIGHT_POSITION: [f32; 4] = [0.0, 0.0, 2.0, 1.0];

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("could not create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible graphics adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("could not acquire graphics device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface exposes no texture formats")]
    NoSurfaceFormat,

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    mvp: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_ambient: [f32; 4],
    light_diffuse: [f32; 4],
    light_position: [f32; 4],
    flags: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 3],
    tex_coord: [f32; 3],
    normal: [f32; 3],
}

/// Draws the volume as a stack of textured quads merged per pixel with a
/// maximum-intensity blend state.
///
/// Owns the GPU resources and the live [`RenderState`]; the blend and depth
/// toggles select between prebuilt pipeline permutations, the filter cycle
/// selects between per-sampler bind groups.
pub struct SliceStackRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    // Indexed by [blending][depth_test].
    pipelines: [[wgpu::RenderPipeline; 2]; 2],
    // One bind group per texture filter mode.
    bind_groups: [wgpu::BindGroup; 3],
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    depth_view: wgpu::TextureView,
    projection: Mat4,
    state: RenderState,
}

impl SliceStackRenderer {
    /// Set up the GPU context and upload `volume` as a 3D texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface, adapter, or device cannot be
    /// obtained, or the surface reports no usable format.
    pub async fn new(window: Arc<Window>, volume: &Volume) -> Result<Self, RendererError> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("slice-stack device"),
                ..Default::default()
            })
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(RendererError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let volume_view = Self::upload_volume_texture(&device, &queue, volume);

        let state = RenderState::default();
        let projection = orthographic_projection(width, height);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("slice-stack uniforms"),
            contents: bytemuck::bytes_of(&Uniforms::from_view(projection, &state)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let (vertices, indices) = build_slice_stack();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("slice-stack vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("slice-stack indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slice-stack bind group layout"),
            entries: &[
                // 3D volume texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_groups = [
            TextureFilter::Linear,
            TextureFilter::Nearest,
            TextureFilter::Trilinear,
        ]
        .map(|filter| {
            let sampler = Self::create_sampler(&device, filter);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("slice-stack bind group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&volume_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slice-stack shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/slice_stack.wgsl"
            ))),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("slice-stack pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |blending, depth_test| {
            Self::create_pipeline(&device, &shader, &pipeline_layout, format, blending, depth_test)
        };
        let pipelines = [
            [pipeline(false, false), pipeline(false, true)],
            [pipeline(true, false), pipeline(true, true)],
        ];

        let depth_view = Self::create_depth_texture(&device, width, height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipelines,
            bind_groups,
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            depth_view,
            projection,
            state,
        })
    }

    /// Reconfigure the surface and projection for a new viewport size.
    ///
    /// A zero width is substituted by 1 so the aspect ratio stays defined.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = Self::create_depth_texture(&self.device, width, height);
        self.projection = orthographic_projection(width, height);
    }

    /// Draw one frame of the quad stack under the current render state.
    ///
    /// # Errors
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped; any
    /// other surface failure is unrecoverable and propagated.
    pub fn render_frame(&mut self) -> Result<(), RendererError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_uniforms();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slice-stack encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("slice-stack pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(self.active_pipeline());
            pass.set_bind_group(0, self.active_bind_group(), &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..self.index_count, 0, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Accumulate a rotation delta in whole degrees about `axis`.
    pub fn rotate(&mut self, axis: Axis, delta_degrees: i32) {
        self.state.rotate(axis, delta_degrees);
    }

    /// Advance the texture filter cycle and switch the active sampler.
    pub fn cycle_filter_mode(&mut self) -> TextureFilter {
        let filter = self.state.cycle_filter();
        debug!("texture filter: {filter:?}");
        filter
    }

    pub fn toggle_lighting(&mut self) -> bool {
        let enabled = self.state.toggle_lighting();
        // Takes effect on the GPU at once, not at the next frame.
        self.write_uniforms();
        debug!("lighting: {enabled}");
        enabled
    }

    pub fn toggle_blending(&mut self) -> bool {
        let enabled = self.state.toggle_blending();
        debug!("max blending: {enabled}");
        enabled
    }

    pub fn toggle_depth_test(&mut self) -> bool {
        let enabled = self.state.toggle_depth_test();
        debug!("depth test: {enabled}");
        enabled
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    fn active_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipelines[self.state.blending() as usize][self.state.depth_test() as usize]
    }

    fn active_bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_groups[filter_index(self.state.filter())]
    }

    fn write_uniforms(&self) {
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms::from_view(self.projection, &self.state)),
        );
    }

    fn upload_volume_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        volume: &Volume,
    ) -> wgpu::TextureView {
        let (depth, height, width) = volume.dim();
        let texture_size = wgpu::Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: depth as u32,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume 3D texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels = volume.as_texels();
        queue.write_texture(
            wgpu::TexelCopyTextureInfoBase {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(2 * width as u32),
                rows_per_image: Some(height as u32),
            },
            texture_size,
        );

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_sampler(device: &wgpu::Device, filter: TextureFilter) -> wgpu::Sampler {
        let (mag_filter, min_filter, mipmap_filter) = match filter {
            TextureFilter::Nearest => (
                wgpu::FilterMode::Nearest,
                wgpu::FilterMode::Nearest,
                wgpu::FilterMode::Nearest,
            ),
            TextureFilter::Linear => (
                wgpu::FilterMode::Linear,
                wgpu::FilterMode::Linear,
                wgpu::FilterMode::Nearest,
            ),
            TextureFilter::Trilinear => (
                wgpu::FilterMode::Linear,
                wgpu::FilterMode::Linear,
                wgpu::FilterMode::Linear,
            ),
        };

        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter,
            min_filter,
            mipmap_filter,
            ..Default::default()
        })
    }

    fn create_pipeline(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        format: wgpu::TextureFormat,
        blending: bool,
        depth_test: bool,
    ) -> wgpu::RenderPipeline {
        // MAX compositing keeps, per pixel, the brightest sample of the
        // stack; the result is order independent.
        let blend = blending.then_some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Max,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Max,
            },
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("slice-stack pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 12,
                            shader_location: 1,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 24,
                            shader_location: 2,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_test,
                depth_compare: if depth_test {
                    wgpu::CompareFunction::Less
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("slice-stack depth texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

impl Uniforms {
    fn from_view(projection: Mat4, state: &RenderState) -> Self {
        let model = state.model_matrix();
        Self {
            mvp: (projection * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_ambient: LIGHT_AMBIENT,
            light_diffuse: LIGHT_DIFFUSE,
            light_position: LIGHT_POSITION,
            flags: [state.lighting() as u32, 0, 0, 0],
        }
    }
}

fn filter_index(filter: TextureFilter) -> usize {
    match filter {
        TextureFilter::Linear => 0,
        TextureFilter::Nearest => 1,
        TextureFilter::Trilinear => 2,
    }
}

/// Orthographic projection spanning `[-4, 4]` horizontally with the vertical
/// extent scaled by the viewport aspect ratio.
///
/// The cube itself spans `[-1, 1]³`; the margin keeps every rotation of it
/// in view. A zero width is substituted by 1.
fn orthographic_projection(width: u32, height: u32) -> Mat4 {
    let width = width.max(1);
    let aspect = height as f32 / width as f32;
    Mat4::orthographic_rh(-4.0, 4.0, -4.0 * aspect, 4.0 * aspect, -100.0, 100.0)
}

/// Build the static quad stack: quad `k` sits at depth `d = -1 + k/256` and
/// carries 3D texture coordinates mapping its corners and depth into
/// `[0, 1]³`.
fn build_slice_stack() -> (Vec<QuadVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(SLICE_QUADS * 4);
    let mut indices = Vec::with_capacity(SLICE_QUADS * 6);

    for k in 0..SLICE_QUADS {
        let d = -1.0 + k as f32 / VOLUME_SIZE as f32;
        let td = (d + 1.0) / 2.0;
        let base = vertices.len() as u32;

        for (x, y) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(QuadVertex {
                position: [x, y, d],
                tex_coord: [(x + 1.0) / 2.0, (y + 1.0) / 2.0, td],
                normal: [0.0, 0.0, 1.0],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_projection_matches_unit_width() {
        assert_eq!(
            orthographic_projection(0, 480),
            orthographic_projection(1, 480)
        );
    }

    #[test]
    fn projection_preserves_aspect_ratio() {
        let wide = orthographic_projection(800, 400);
        let expected = Mat4::orthographic_rh(-4.0, 4.0, -2.0, 2.0, -100.0, 100.0);
        assert_eq!(wide, expected);
    }

    #[test]
    fn slice_stack_covers_the_unit_cube() {
        let (vertices, indices) = build_slice_stack();
        assert_eq!(vertices.len(), SLICE_QUADS * 4);
        assert_eq!(indices.len(), SLICE_QUADS * 6);

        // First quad at the back face, last one step short of the front.
        assert_eq!(vertices[0].position[2], -1.0);
        let last = vertices.last().unwrap();
        assert!((last.position[2] - (1.0 - 1.0 / VOLUME_SIZE as f32)).abs() < 1e-6);

        for vertex in &vertices {
            let [x, y, d] = vertex.position;
            let [u, v, w] = vertex.tex_coord;
            assert_eq!(u, (x + 1.0) / 2.0);
            assert_eq!(v, (y + 1.0) / 2.0);
            assert_eq!(w, (d + 1.0) / 2.0);
            assert!((0.0..1.0).contains(&w));
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn every_filter_mode_has_a_bind_group_slot() {
        let mut filter = TextureFilter::default();
        let mut seen = [false; 3];
        for _ in 0..3 {
            seen[filter_index(filter)] = true;
            filter = filter.next();
        }
        assert_eq!(seen, [true, true, true]);
    }
}
