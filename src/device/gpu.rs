//! wgpu device: the kernel runs as WGSL compute pipelines.
//!
//! [`GpuDevice`] is the session: adapter, device, queue and both
//! pipelines, built once. Populations keep a handle to it and are
//! advanced by submitting one compute pass per generation without ever
//! polling; the only wait happens in [`DevicePopulation::download`].
//!
//! Failures inside the generation loop are collected by a validation and
//! an out-of-memory error scope pushed before the first dispatch and
//! popped after the final sync.

use super::{check_upload, ComputeDevice, DevicePopulation, Download};
use crate::error::{Result, TspGaError};
use crate::kernel::{
    workgroup_count, GenerationParams, EVALUATE_ENTRY_POINT, GENERATION_ENTRY_POINT,
    KERNEL_SOURCE, WORKGROUP_SIZE,
};
use crate::tour::{CityTable, EncodedPopulation};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use wgpu::util::DeviceExt;

/// Uniform block of scalar kernel arguments (must match `Params` in WGSL).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    num_genes: u32,
    population_size: u32,
    prob_mutate: f32,
    prob_crossover: f32,
}

impl From<&GenerationParams> for KernelParams {
    fn from(p: &GenerationParams) -> Self {
        Self {
            num_genes: p.num_cities + 1,
            population_size: p.population_size,
            prob_mutate: p.prob_mutate,
            prob_crossover: p.prob_crossover,
        }
    }
}

/// Options for opening a [`GpuDevice`].
#[derive(Debug, Clone)]
pub struct GpuOptions {
    /// External WGSL file replacing the built-in kernel.
    pub kernel_path: Option<PathBuf>,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            kernel_path: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl GpuOptions {
    pub fn with_kernel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kernel_path = Some(path.into());
        self
    }

    pub fn with_power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }
}

struct Session {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    generation: wgpu::ComputePipeline,
    evaluate: wgpu::ComputePipeline,
    adapter_name: String,
    limits: wgpu::Limits,
}

/// GPU compute session. Cloning shares the session.
#[derive(Clone)]
pub struct GpuDevice {
    session: Arc<Session>,
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("adapter", &self.session.adapter_name)
            .finish()
    }
}

impl GpuDevice {
    /// Opens the default adapter with the built-in kernel.
    pub fn new() -> Result<Self> {
        Self::with_options(&GpuOptions::default())
    }

    pub fn with_options(options: &GpuOptions) -> Result<Self> {
        pollster::block_on(Self::new_async(options))
    }

    async fn new_async(options: &GpuOptions) -> Result<Self> {
        let source: Cow<'static, str> = match &options.kernel_path {
            Some(path) => {
                log::info!("loading kernel from {}", path.display());
                Cow::Owned(std::fs::read_to_string(path)?)
            }
            None => Cow::Borrowed(KERNEL_SOURCE),
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(TspGaError::NoDevice)?;

        let adapter_name = adapter.get_info().name;
        log::info!("GPU adapter: {adapter_name}");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tspga"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| {
                log::warn!("request_device failed: {e}");
                TspGaError::NoDevice
            })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tsp_generation"),
            source: wgpu::ShaderSource::Wgsl(source),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tspga layout"),
            entries: &[
                storage(0, true),  // cities
                storage(1, true),  // src tours
                storage(2, false), // dst tours
                storage(3, false), // distances
                storage(4, false), // survivors
                storage(5, false), // seed
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tspga pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point,
                compilation_options: Default::default(),
            })
        };
        let generation = pipeline(GENERATION_ENTRY_POINT);
        let evaluate = pipeline(EVALUATE_ENTRY_POINT);

        if let Some(err) = device.pop_error_scope().await {
            return Err(TspGaError::KernelBuild(err.to_string()));
        }
        log::info!("kernel built ({GENERATION_ENTRY_POINT}, {EVALUATE_ENTRY_POINT})");

        let limits = device.limits();
        Ok(Self {
            session: Arc::new(Session {
                device,
                queue,
                layout,
                generation,
                evaluate,
                adapter_name,
                limits,
            }),
        })
    }
}

impl ComputeDevice for GpuDevice {
    type Population = GpuPopulation;

    fn name(&self) -> String {
        format!("gpu ({})", self.session.adapter_name)
    }

    fn max_population(&self) -> usize {
        self.session.limits.max_compute_workgroups_per_dimension as usize
            * WORKGROUP_SIZE as usize
    }

    fn upload(
        &self,
        cities: &CityTable,
        population: &EncodedPopulation,
        seed: u32,
        params: &GenerationParams,
    ) -> Result<GpuPopulation> {
        check_upload(cities, population, params)?;
        let s = &self.session;
        let tour_bytes = std::mem::size_of_val(population.genes()) as u64;
        if tour_bytes > s.limits.max_storage_buffer_binding_size as u64 {
            return Err(TspGaError::PopulationTooLarge {
                size: population.population_size(),
                max: s.limits.max_storage_buffer_binding_size as usize
                    / (population.stride() * std::mem::size_of::<u32>()),
            });
        }
        let size = population.population_size();
        let slot_bytes = (size * std::mem::size_of::<u32>()) as u64;

        if size > WORKGROUP_SIZE as usize {
            log::warn!(
                "population of {size} spans {} workgroups of {WORKGROUP_SIZE}",
                workgroup_count(size as u32)
            );
        }
        log::debug!(
            "uploading {} bytes of tours and {} cities to {}",
            tour_bytes,
            cities.num_cities(),
            s.adapter_name
        );

        s.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        s.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let storage_init = |label: &str, contents: &[u8], extra: wgpu::BufferUsages| {
            s.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | extra,
            })
        };
        let readback = |label: &str, size: u64| {
            s.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        };

        let genes: &[u8] = bytemuck::cast_slice(population.genes());
        let city_buffer = storage_init(
            "cities",
            bytemuck::cast_slice(cities.points()),
            wgpu::BufferUsages::empty(),
        );
        let tours = [
            storage_init("tours a", genes, wgpu::BufferUsages::COPY_SRC),
            storage_init("tours b", genes, wgpu::BufferUsages::COPY_SRC),
        ];
        let zeros = vec![0u8; slot_bytes as usize];
        let distances = storage_init("distances", &zeros, wgpu::BufferUsages::COPY_SRC);
        let survivors = storage_init("survivors", &zeros, wgpu::BufferUsages::COPY_SRC);
        let seed_buffer = storage_init(
            "seed",
            bytemuck::bytes_of(&seed),
            wgpu::BufferUsages::empty(),
        );
        let params_buffer = s
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("params"),
                contents: bytemuck::bytes_of(&KernelParams::from(params)),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        // bind_groups[k] reads tours[k] and writes tours[1 - k]
        let bind_group = |src: &wgpu::Buffer, dst: &wgpu::Buffer| {
            s.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tspga bind group"),
                layout: &s.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: city_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: dst.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: distances.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: survivors.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: seed_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [
            bind_group(&tours[0], &tours[1]),
            bind_group(&tours[1], &tours[0]),
        ];

        let staging = Staging {
            distances: readback("distances staging", slot_bytes),
            survivors: readback("survivors staging", slot_bytes),
            tours: readback("tours staging", tour_bytes),
        };

        if let Some(err) = pollster::block_on(s.device.pop_error_scope()) {
            let _ = pollster::block_on(s.device.pop_error_scope());
            return Err(TspGaError::Dispatch(err.to_string()));
        }
        if let Some(err) = pollster::block_on(s.device.pop_error_scope()) {
            return Err(TspGaError::OutOfMemory(err.to_string()));
        }

        Ok(GpuPopulation {
            session: Arc::clone(&self.session),
            tours,
            distances,
            survivors,
            bind_groups,
            staging,
            num_cities: population.num_cities(),
            population_size: size,
            generations: 0,
            scopes_open: false,
        })
    }
}

struct Staging {
    distances: wgpu::Buffer,
    survivors: wgpu::Buffer,
    tours: wgpu::Buffer,
}

/// Population state resident on a [`GpuDevice`].
pub struct GpuPopulation {
    session: Arc<Session>,
    tours: [wgpu::Buffer; 2],
    distances: wgpu::Buffer,
    survivors: wgpu::Buffer,
    bind_groups: [wgpu::BindGroup; 2],
    staging: Staging,
    num_cities: usize,
    population_size: usize,
    generations: usize,
    scopes_open: bool,
}

impl GpuPopulation {
    fn open_scopes(&mut self) {
        if !self.scopes_open {
            let device = &self.session.device;
            device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            self.scopes_open = true;
        }
    }

    fn close_scopes(&mut self) -> Result<()> {
        let device = &self.session.device;
        self.scopes_open = false;
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(err) = oom {
            return Err(TspGaError::OutOfMemory(err.to_string()));
        }
        if let Some(err) = validation {
            return Err(TspGaError::Dispatch(err.to_string()));
        }
        Ok(())
    }

    /// Index of the buffer holding the current tours.
    fn front(&self) -> usize {
        self.generations % 2
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        label: &str,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_groups[self.front()], &[]);
        pass.dispatch_workgroups(workgroup_count(self.population_size as u32), 1, 1);
    }
}

type MapReceiver = mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>;

fn map_read(slice: wgpu::BufferSlice<'_>) -> MapReceiver {
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    rx
}

fn await_map(rx: MapReceiver) -> Result<()> {
    rx.recv()
        .map_err(|e| TspGaError::Dispatch(e.to_string()))?
        .map_err(|e| TspGaError::Dispatch(e.to_string()))
}

impl DevicePopulation for GpuPopulation {
    fn advance(&mut self) -> Result<()> {
        self.open_scopes();
        let s = Arc::clone(&self.session);
        let mut encoder = s
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tspga generation"),
            });
        self.encode_pass(&mut encoder, &s.generation, GENERATION_ENTRY_POINT);
        s.queue.submit(Some(encoder.finish()));
        self.generations += 1;
        Ok(())
    }

    fn generations(&self) -> usize {
        self.generations
    }

    fn download(mut self) -> Result<Download> {
        self.open_scopes();
        let s = Arc::clone(&self.session);
        let slot_bytes = (self.population_size * std::mem::size_of::<u32>()) as u64;
        let tour_bytes =
            (self.population_size * (self.num_cities + 1) * std::mem::size_of::<u32>()) as u64;

        let mut encoder = s
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tspga download"),
            });
        self.encode_pass(&mut encoder, &s.evaluate, EVALUATE_ENTRY_POINT);
        encoder.copy_buffer_to_buffer(&self.distances, 0, &self.staging.distances, 0, slot_bytes);
        encoder.copy_buffer_to_buffer(&self.survivors, 0, &self.staging.survivors, 0, slot_bytes);
        encoder.copy_buffer_to_buffer(
            &self.tours[self.front()],
            0,
            &self.staging.tours,
            0,
            tour_bytes,
        );
        s.queue.submit(Some(encoder.finish()));

        let distances_rx = map_read(self.staging.distances.slice(..));
        let survivors_rx = map_read(self.staging.survivors.slice(..));
        let tours_rx = map_read(self.staging.tours.slice(..));
        let _ = s.device.poll(wgpu::Maintain::Wait);
        self.close_scopes()?;
        await_map(distances_rx)?;
        await_map(survivors_rx)?;
        await_map(tours_rx)?;

        let fitness = {
            let view = self.staging.distances.slice(..).get_mapped_range();
            bytemuck::cast_slice::<u8, f32>(&view).to_vec()
        };
        let survivors: Vec<bool> = {
            let view = self.staging.survivors.slice(..).get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&view)
                .iter()
                .map(|&flag| flag != 0)
                .collect()
        };
        let genes = {
            let view = self.staging.tours.slice(..).get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&view).to_vec()
        };
        self.staging.distances.unmap();
        self.staging.survivors.unmap();
        self.staging.tours.unmap();

        log::debug!(
            "downloaded {} individuals after {} generations",
            self.population_size,
            self.generations
        );

        Ok(Download {
            fitness,
            survivors,
            population: EncodedPopulation::from_raw(genes, self.num_cities, self.population_size),
            generations: self.generations,
        })
    }
}

impl Drop for GpuPopulation {
    fn drop(&mut self) {
        // an aborted run leaves its scopes on the device's stack
        if self.scopes_open {
            let _ = self.close_scopes();
        }
    }
}
