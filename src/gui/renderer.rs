//! Presents RGBA8 images in windows with `wgpu`.

use std::rc::Rc;

use anyhow::anyhow;
use wgpu::*;
use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder},
};

use crate::image::Resolution;

/// The graphics device shared by all windows.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        // Vulkan, Metal or DX12. The GL backend is unreliable with winit 0.28.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| anyhow!("no compatible graphics adapter"))?;

        let info = adapter.get_info();
        log::info!(
            "rendering on {} ({:?} via {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        // Webcam frames can exceed the downlevel texture size limit.
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("handsign"),
                    features: Features::empty(),
                    limits,
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// An uploaded image together with the bind group the shader reads it through.
struct Frame {
    texture: Texture,
    bind_group: BindGroup,
}

impl Frame {
    fn new(gpu: &Gpu, layout: &BindGroupLayout, sampler: &Sampler, size: Extent3d) -> Self {
        let texture = gpu.device.create_texture(&TextureDescriptor {
            label: Some("frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            texture,
            bind_group,
        }
    }

    fn size(&self) -> Extent3d {
        self.texture.size()
    }

    fn upload(&self, gpu: &Gpu, data: &[u8]) {
        let size = self.size();
        gpu.queue.write_texture(
            ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );
    }
}

/// A window that shows one image stretched over its whole client area.
pub struct Renderer {
    gpu: Rc<Gpu>,
    layout: BindGroupLayout,
    sampler: Sampler,
    pipeline: RenderPipeline,
    frame: Frame,
    surface_config: SurfaceConfiguration,
    title: String,
    // Declared before `window`, so that it is dropped first.
    surface: Surface,
    window: Window,
}

impl Renderer {
    /// Opens a fixed-size window of `resolution` pixels.
    pub fn open<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
        gpu: Rc<Gpu>,
    ) -> anyhow::Result<Self> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_resizable(false)
            .build(target)?;

        // SAFETY: `surface` is dropped before `window`, see the field order of `Renderer`.
        let surface = unsafe { gpu.instance.create_surface(&window)? };
        let format = surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .copied()
            .ok_or_else(|| anyhow!("graphics adapter cannot present to '{title}'"))?;
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: resolution.width(),
            height: resolution.height(),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };

        let layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("frame"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let sampler = gpu.device.create_sampler(&SamplerDescriptor::default());
        let pipeline = create_pipeline(&gpu.device, &layout, format);
        let frame = Frame::new(&gpu, &layout, &sampler, Extent3d::default());

        let renderer = Self {
            gpu,
            layout,
            sampler,
            pipeline,
            frame,
            surface_config,
            title: title.to_string(),
            surface,
            window,
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Replaces the displayed image with `data`, tightly packed RGBA8 rows of `res`.
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        assert_eq!(data.len() as u64, res.num_pixels() * 4, "image data does not match {res}");

        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.frame.size() != size {
            log::trace!("allocating {res} frame texture for '{}'", self.title);
            self.frame = Frame::new(&self.gpu, &self.layout, &self.sampler, size);
        }
        self.frame.upload(&self.gpu, data);
    }

    pub fn redraw(&mut self) {
        let Some(output) = self.acquire() else {
            return;
        };
        let target = output.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("present frame"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit([encoder.finish()]);
        output.present();
    }

    /// Gets the next surface texture, reconfiguring the surface once if it went stale.
    fn acquire(&self) -> Option<SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(output) => return Some(output),
            Err(e @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("reconfiguring surface: {e}");
                self.configure_surface();
            }
            Err(e) => {
                log::error!("cannot draw to '{}': {e}", self.title);
                return None;
            }
        }
        self.surface
            .get_current_texture()
            .map_err(|e| log::error!("cannot draw to '{}': {e}", self.title))
            .ok()
    }

    fn configure_surface(&self) {
        let actual = self.window.inner_size();
        if (actual.width, actual.height) != (self.surface_config.width, self.surface_config.height)
        {
            // Some window managers resize windows regardless of `with_resizable(false)`.
            log::warn!(
                "window '{}' is {}x{}, expected {}x{}",
                self.title,
                actual.width,
                actual.height,
                self.surface_config.width,
                self.surface_config.height,
            );
        }
        self.surface.configure(&self.gpu.device, &self.surface_config);
    }
}

fn create_pipeline(
    device: &Device,
    layout: &BindGroupLayout,
    format: TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("frame"),
        source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("frame"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("frame"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "frag",
            targets: &[Some(ColorTargetState {
                format,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}
