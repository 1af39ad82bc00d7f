// ============================================================================
// GPU CONTEXT — headless wgpu device for offscreen flip rendering
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;

/// Which adapter to ask for first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuPreference {
    #[default]
    HighPerformance,
    LowPower,
    /// Skip hardware and go straight to the software rasterizer.
    Software,
}

impl FromStr for GpuPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "high performance" | "high-performance" | "discrete" => Ok(Self::HighPerformance),
            "low power" | "low-power" | "integrated" => Ok(Self::LowPower),
            "software" | "cpu" => Ok(Self::Software),
            other => Err(format!("unknown GPU preference '{other}'")),
        }
    }
}

/// Device and queue owned by one `WgpuBackend`.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// True when running on a CPU rasterizer (lavapipe, WARP, ...).
    pub is_software: bool,
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Hardware adapter per `preference`, then the software fallback.
    pub fn new(preference: GpuPreference) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let power = match preference {
            GpuPreference::LowPower => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        if preference != GpuPreference::Software {
            if let Some(ctx) = pollster::block_on(Self::request(&instance, power, false)) {
                return Some(ctx);
            }
            log::warn!("no hardware adapter, trying software fallback");
        }
        pollster::block_on(Self::request(&instance, power, true))
    }

    async fn request(instance: &wgpu::Instance, power: wgpu::PowerPreference, software: bool) -> Option<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None,
                force_fallback_adapter: software,
            })
            .await?;

        let info = adapter.get_info();
        let max_texture_dim = adapter.limits().max_texture_dimension_2d;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("PageFlip GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: max_texture_dim,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| log::warn!("{} refused a device: {e}", info.name))
            .ok()?;

        log::info!("GPU adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);
        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            is_software: software || info.device_type == wgpu::DeviceType::Cpu,
            adapter_name: info.name,
            max_texture_dim,
        })
    }

    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
