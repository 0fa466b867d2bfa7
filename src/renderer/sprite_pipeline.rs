//! Instanced sprite render pipeline
//!
//! Each batch category owns one instance buffer sized to its capacity. A
//! frame uploads whatever the category's [`UploadPlan`] asks for and then
//! issues a single instanced draw per category.

use wgpu::util::DeviceExt;

use super::batch::{BatchCategory, BatchSet, UploadPlan};
use super::instance::{BACKGROUND, SpriteInstance};
use super::uniforms::{Globals, UniformBlock};
use crate::atlas::AtlasImage;
use crate::error::RenderError;

/// Vertices per sprite quad (two triangles)
const QUAD_VERTICES: u32 = 6;

/// Byte offset and instances for each `write_buffer` a plan needs
pub fn upload_slices<'a>(
    plan: &UploadPlan,
    instances: &'a [SpriteInstance],
) -> Vec<(wgpu::BufferAddress, &'a [SpriteInstance])> {
    match plan {
        UploadPlan::None => Vec::new(),
        UploadPlan::Full => vec![(0, instances)],
        UploadPlan::Ranges(ranges) => ranges
            .iter()
            .filter(|r| r.end <= instances.len())
            .map(|r| (r.start as u64 * SpriteInstance::STRIDE, &instances[r.clone()]))
            .collect(),
    }
}

/// Turn whatever a validation error scope caught into a startup error
pub fn check_program(caught: Option<wgpu::Error>) -> Result<(), RenderError> {
    match caught {
        None => Ok(()),
        Some(e) => {
            log::error!("Sprite program rejected: {e}");
            Err(RenderError::Program(e.to_string()))
        }
    }
}

/// Instance buffer for one category
struct CategoryBuffer {
    category: BatchCategory,
    buffer: wgpu::Buffer,
}

pub struct SpriteRenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// In draw order
    buffers: Vec<CategoryBuffer>,

    pub size: (u32, u32),
}

impl SpriteRenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        batches: &BatchSet,
        atlas: Option<&AtlasImage>,
    ) -> Result<Self, RenderError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("bit-tiles-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Shader and pipeline validation errors come back here instead of panicking
        let program_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sprite_shader.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let atlas_view = Self::create_atlas_texture(&device, &queue, atlas);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SpriteInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        check_program(program_scope.pop().await)?;

        let buffers = BatchCategory::ALL
            .into_iter()
            .map(|category| {
                let capacity = batches.get(category).capacity().max(1) as u64;
                log::info!("{category:?} batch: {capacity} slots");
                CategoryBuffer {
                    category,
                    buffer: device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(match category {
                            BatchCategory::Menu => "menu_instances",
                            BatchCategory::Play => "play_instances",
                        }),
                        size: capacity * SpriteInstance::STRIDE,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                }
            })
            .collect();

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            globals_buffer,
            bind_group,
            buffers,
            size: (width, height),
        })
    }

    /// Upload the atlas, or a single white texel when there is none
    fn create_atlas_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        atlas: Option<&AtlasImage>,
    ) -> wgpu::TextureView {
        let white = AtlasImage {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        };
        let image = atlas.unwrap_or(&white);
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure after the surface was lost or outdated
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Upload changed uniforms and slots, then draw every category
    pub fn render(
        &mut self,
        uniforms: &mut UniformBlock,
        batches: &mut BatchSet,
        partial: bool,
    ) -> Result<(), wgpu::SurfaceError> {
        if let Some(globals) = uniforms.take_dirty() {
            self.queue
                .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
        }

        for target in &self.buffers {
            let batch = batches.get_mut(target.category);
            let plan = batch.plan_upload(partial);
            let live = &batch.instances()[..batch.instance_count() as usize];
            for (offset, slice) in upload_slices(&plan, live) {
                self.queue
                    .write_buffer(&target.buffer, offset, bytemuck::cast_slice(slice));
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprite_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            for target in &self.buffers {
                let count = batches.get(target.category).instance_count();
                if count == 0 {
                    continue;
                }
                render_pass.set_vertex_buffer(0, target.buffer.slice(..));
                render_pass.draw(0..QUAD_VERTICES, 0..count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(n: usize) -> Vec<SpriteInstance> {
        (0..n)
            .map(|i| SpriteInstance {
                scale: i as f32,
                ..SpriteInstance::HIDDEN
            })
            .collect()
    }

    #[test]
    fn test_no_upload_when_clean() {
        assert!(upload_slices(&UploadPlan::None, &instances(4)).is_empty());
    }

    #[test]
    fn test_full_upload_starts_at_zero() {
        let data = instances(4);
        let slices = upload_slices(&UploadPlan::Full, &data);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].0, 0);
        assert_eq!(slices[0].1.len(), 4);
    }

    #[test]
    fn test_ranges_map_to_byte_offsets() {
        let data = instances(10);
        let plan = UploadPlan::Ranges(vec![1..3, 7..8]);
        let slices = upload_slices(&plan, &data);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].0, SpriteInstance::STRIDE);
        assert_eq!(slices[0].1.len(), 2);
        assert_eq!(slices[0].1[0].scale, 1.0);
        assert_eq!(slices[1].0, 7 * SpriteInstance::STRIDE);
        assert_eq!(slices[1].1[0].scale, 7.0);
    }

    #[test]
    fn test_batch_plan_drives_partial_upload() {
        let mut batches = BatchSet::new(4, 16);
        for _ in 0..6 {
            batches.acquire_slot(BatchCategory::Play).unwrap();
        }
        let batch = batches.get_mut(BatchCategory::Play);
        batch.plan_upload(true);
        batch.mark_dirty(2);
        batch.mark_dirty(3);
        batch.mark_dirty(5);

        let plan = batch.plan_upload(true);
        let live = &batch.instances()[..batch.instance_count() as usize];
        let offsets: Vec<u64> = upload_slices(&plan, live).iter().map(|s| s.0).collect();
        assert_eq!(offsets, vec![2 * SpriteInstance::STRIDE, 5 * SpriteInstance::STRIDE]);
    }

    #[test]
    fn test_clean_program_scope_passes() {
        assert!(check_program(None).is_ok());
    }

    #[test]
    fn test_validation_error_becomes_program_error() {
        let caught = wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: "entry point 'vs_main' not found".to_string(),
        };
        match check_program(Some(caught)) {
            Err(RenderError::Program(msg)) => assert!(msg.contains("vs_main")),
            other => panic!("expected a program error, got {other:?}"),
        }
    }
}
