//! GPU weight-table application via wgpu compute shaders.
//!
//! Host and device buffers are mirrored explicitly: every `apply_table`
//! uploads the input mesh and stencil table, dispatches the gather
//! kernel, and reads the result back before returning. There is no
//! implicit coherence between calls.

use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use tracing::warn;
use vfps_core::backend::{Backend, CpuBackend};
use vfps_core::sourcemap::WeightTable;
use vfps_types::error::{VfpsError, VfpsResult};

/// Uniform parameters passed to the compute shader.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuParams {
    cells: u32,
    width: u32,
    clamp_flag: u32,
    _pad: u32,
}

struct GpuBuffers {
    cells: usize,
    width: usize,
    input: wgpu::Buffer,
    indices: wgpu::Buffer,
    weights: wgpu::Buffer,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Accelerator backend applying precomputed weight tables on the GPU.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    param_buffer: wgpu::Buffer,
    buffers: Option<GpuBuffers>,
}

impl GpuBackend {
    /// Returns [`VfpsError::BackendUnavailable`] when no adapter or
    /// device can be acquired.
    pub fn new() -> VfpsResult<Self> {
        let instance = wgpu::Instance::default();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| {
            VfpsError::BackendUnavailable("no suitable GPU adapter found".to_string())
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("vfps-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| {
            VfpsError::BackendUnavailable(format!("GPU device request failed: {e}"))
        })?;

        let shader_source = include_str!("apply.wgsl");
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("apply_table"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shader_source)),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("apply_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("apply_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("apply_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let param_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("params"),
            size: std::mem::size_of::<GpuParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(GpuBackend {
            device,
            queue,
            pipeline,
            layout,
            param_buffer,
            buffers: None,
        })
    }

    fn ensure_buffers(&mut self, cells: usize, width: usize) {
        if let Some(b) = &self.buffers {
            if b.cells == cells && b.width == width {
                return;
            }
        }
        let f32_size = std::mem::size_of::<f32>() as u64;
        let mesh_bytes = cells as u64 * f32_size;
        let table_bytes = (cells * width) as u64 * f32_size;

        let mk_storage = |label: &str, size: u64, readback: bool| {
            let mut usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
            if readback {
                usage |= wgpu::BufferUsages::COPY_SRC;
            }
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };

        let input = mk_storage("mesh_in", mesh_bytes, false);
        let indices = mk_storage("indices", table_bytes, false);
        let weights = mk_storage("weights", table_bytes, false);
        let output = mk_storage("mesh_out", mesh_bytes, true);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: mesh_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("apply_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.param_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: weights.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: output.as_entire_binding(),
                },
            ],
        });

        self.buffers = Some(GpuBuffers {
            cells,
            width,
            input,
            indices,
            weights,
            output,
            staging,
            bind_group,
        });
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl Backend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn apply_table(
        &mut self,
        table: &WeightTable,
        input: &[f64],
        output: &mut [f64],
    ) -> VfpsResult<()> {
        let cells = table.cells();
        let width = table.width();
        if input.len() != cells || output.len() != cells {
            return Err(VfpsError::InvalidGeometry(format!(
                "weight table covers {cells} cells, buffers are {}/{}",
                input.len(),
                output.len()
            )));
        }
        self.ensure_buffers(cells, width);
        let buffers = self.buffers.as_ref().expect("buffers just ensured");

        // host → device
        let input_f32: Vec<f32> = input.iter().map(|&v| v as f32).collect();
        let mut idx = Vec::with_capacity(cells * width);
        let mut w = Vec::with_capacity(cells * width);
        for t in table.weights() {
            idx.push(t.src);
            w.push(t.weight as f32);
        }
        self.queue
            .write_buffer(&buffers.input, 0, bytemuck::cast_slice(&input_f32));
        self.queue
            .write_buffer(&buffers.indices, 0, bytemuck::cast_slice(&idx));
        self.queue
            .write_buffer(&buffers.weights, 0, bytemuck::cast_slice(&w));
        let params = GpuParams {
            cells: cells as u32,
            width: width as u32,
            clamp_flag: table.clamped() as u32,
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.param_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("apply_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("apply_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups((cells as u32).div_ceil(64), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &buffers.output,
            0,
            &buffers.staging,
            0,
            (cells * std::mem::size_of::<f32>()) as u64,
        );
        self.queue.submit(Some(encoder.finish()));

        // device → host
        let slice = buffers.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| {
                VfpsError::BackendUnavailable(format!("GPU readback channel error: {e}"))
            })?
            .map_err(|e| VfpsError::BackendUnavailable(format!("GPU buffer map failed: {e}")))?;
        {
            let data = slice.get_mapped_range();
            let values: &[f32] = bytemuck::cast_slice(&data);
            for (o, &v) in output.iter_mut().zip(values.iter()) {
                *o = v as f64;
            }
        }
        buffers.staging.unmap();
        Ok(())
    }
}

/// Check whether a GPU adapter is available without building a backend.
pub fn gpu_available() -> bool {
    let instance = wgpu::Instance::default();
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .is_some()
}

/// Adapter description, when one exists.
pub fn gpu_info() -> Option<String> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let info = adapter.get_info();
    Some(format!(
        "{} ({:?}, {:?})",
        info.name, info.backend, info.device_type
    ))
}

/// GPU backend when available, CPU otherwise (with a logged warning).
pub fn backend_or_cpu() -> Box<dyn Backend> {
    match GpuBackend::new() {
        Ok(gpu) => Box::new(gpu),
        Err(e) => {
            warn!(error = %e, "falling back to the CPU backend");
            Box::new(CpuBackend)
        }
    }
}
