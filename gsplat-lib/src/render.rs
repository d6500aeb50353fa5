//! Frame loop for splat clouds.
//!
//! Draws run off one of two instance buffers per component while the depth
//! sorter refills the other. A refill is scheduled when the camera's forward
//! axis drifts past a threshold, at most one in flight; the active buffer
//! swaps only after the device reports the upload complete, so a draw never
//! samples a half-written buffer.

use crate::error::SplatError;
use crate::gpu::{
    BlendMode, GraphicsDevice, ProgramHandle, RenderState, ResourceStatus, UniformHandle,
    UniformKind, UploadId, ViewId,
};
use crate::scene::{SplatRenderComponent, SplatScene};
use crate::sort::{DepthSorter, SortOrder};
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use zerocopy::IntoBytes;

/// Forward-axis deviation that forces a resort, as `|dot - 1|` of unit axes.
pub const DEFAULT_RESORT_THRESHOLD: f32 = 0.01;

/// One pass of the frame loop.
pub trait Renderer {
    /// Creates device resources. Called once before the first frame.
    fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SplatError>;

    /// Publishes the camera transforms for this renderer's view.
    fn update_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        view: &[f32; 16],
        projection: &[f32; 16],
    );

    /// Draws one frame's worth of work.
    fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut dyn SplatScene,
        delta_time: f32,
    ) -> Result<(), SplatError>;
}

/// Runs its renderers in registration order, once per frame.
#[derive(Default)]
pub struct RenderPipeline {
    renderers: Vec<Box<dyn Renderer>>,
}

impl RenderPipeline {
    pub fn new() -> RenderPipeline {
        RenderPipeline {
            renderers: Vec::new(),
        }
    }

    pub fn add_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderers.push(renderer);
    }

    pub fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SplatError> {
        for renderer in &mut self.renderers {
            renderer.init(device)?;
        }
        Ok(())
    }

    pub fn frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut dyn SplatScene,
        delta_time: f32,
    ) -> Result<(), SplatError> {
        let camera = scene.camera();
        for renderer in &mut self.renderers {
            renderer.update_view(device, &camera.view, &camera.projection);
            renderer.render(device, scene, delta_time)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GaussianRendererConfig {
    pub sort_order: SortOrder,
    pub blend: BlendMode,
    pub resort_threshold: f32,
}

impl Default for GaussianRendererConfig {
    fn default() -> GaussianRendererConfig {
        GaussianRendererConfig {
            sort_order: SortOrder::default(),
            blend: BlendMode::default(),
            resort_threshold: DEFAULT_RESORT_THRESHOLD,
        }
    }
}

/// Instanced splat renderer with deferred sorted-buffer handoff.
pub struct GaussianRenderer {
    view_id: ViewId,
    config: GaussianRendererConfig,
    program: Option<ProgramHandle>,
    u_focal: Option<UniformHandle>,
    dependent_programs: Vec<ProgramHandle>,
    sorter: DepthSorter,
    active_buffer: AtomicUsize,
    sort_in_flight: AtomicBool,
    pending_swap: Option<(UploadId, usize)>,
    last_sort_axis: Option<[f32; 3]>,
    completed: Vec<UploadId>,
}

impl GaussianRenderer {
    pub fn new(view_id: ViewId, config: GaussianRendererConfig) -> GaussianRenderer {
        GaussianRenderer {
            view_id,
            config,
            program: None,
            u_focal: None,
            dependent_programs: Vec::new(),
            sorter: DepthSorter::new(),
            active_buffer: AtomicUsize::new(0),
            sort_in_flight: AtomicBool::new(false),
            pending_swap: None,
            last_sort_axis: None,
            completed: Vec::new(),
        }
    }

    /// Index of the instance buffer draws currently read from.
    #[inline]
    pub fn active_buffer(&self) -> usize {
        self.active_buffer.load(Ordering::Acquire)
    }

    #[inline]
    pub fn sort_in_flight(&self) -> bool {
        self.sort_in_flight.load(Ordering::Acquire)
    }

    /// Applies the buffer swap once the device has finished the upload.
    fn drain_uploads(&mut self, device: &mut dyn GraphicsDevice) {
        self.completed.clear();
        device.drain_completed_uploads(&mut self.completed);

        if let Some((upload, next)) = self.pending_swap {
            if self.completed.contains(&upload) {
                self.active_buffer.store(next, Ordering::Release);
                self.sort_in_flight.store(false, Ordering::Release);
                self.pending_swap = None;
            }
        }
    }

    fn ready(&self, device: &dyn GraphicsDevice) -> bool {
        self.dependent_programs
            .iter()
            .all(|&p| device.program_status(p) == ResourceStatus::Ready)
    }

    /// Schedules a resort into the inactive buffer when the forward axis
    /// has drifted far enough and no other sort is in flight. A dropped
    /// trigger fires again next frame since the last axis stays unchanged.
    fn maybe_sort(
        &mut self,
        device: &mut dyn GraphicsDevice,
        component: &mut SplatRenderComponent,
        axis: [f32; 3],
    ) {
        let deviation = match self.last_sort_axis {
            Some(last) => {
                (last[0] * axis[0] + last[1] * axis[1] + last[2] * axis[2] - 1.0).abs()
            }
            None => f32::INFINITY,
        };
        if deviation <= self.config.resort_threshold {
            return;
        }
        if self
            .sort_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let next = 1 - self.active_buffer();
        self.sorter
            .sort_instances(&component.instances, axis, self.config.sort_order);
        self.sorter
            .permute_into(&component.instances, &mut component.scratch);
        let upload = device.update_dynamic_vertex_buffer(
            component.instance_buffers[next],
            component.scratch.as_bytes(),
        );

        self.pending_swap = Some((upload, next));
        self.last_sort_axis = Some(axis);
        debug!(
            "scheduled resort of {} instances into buffer {}",
            component.instances.len(),
            next
        );
    }
}

impl Renderer for GaussianRenderer {
    fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), SplatError> {
        let program = device.create_program("vs_gaussian_splatting", "fs_gaussian_splatting")?;
        let u_focal = device.create_uniform("u_focal", UniformKind::Vec4)?;

        self.dependent_programs.push(program);
        self.program = Some(program);
        self.u_focal = Some(u_focal);
        Ok(())
    }

    fn update_view(
        &mut self,
        device: &mut dyn GraphicsDevice,
        view: &[f32; 16],
        projection: &[f32; 16],
    ) {
        device.set_view_transform(self.view_id, view, projection);
    }

    fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut dyn SplatScene,
        _delta_time: f32,
    ) -> Result<(), SplatError> {
        self.drain_uploads(device);

        let (program, u_focal) = match (self.program, self.u_focal) {
            (Some(p), Some(u)) => (p, u),
            _ => return Ok(()),
        };
        // Waiting on shader compilation is not an error, the frame just
        // draws without splats.
        if !self.ready(device) {
            return Ok(());
        }

        let camera = scene.camera();
        let [fx, fy] = camera.focal();
        let axis = camera.forward_axis();
        let state = RenderState::splat(self.config.blend);
        let active = self.active_buffer();

        for entity in scene.splat_entities() {
            let world = scene.world_transform(entity);
            let component = match scene.splat_component_mut(entity) {
                Some(c) => c,
                None => continue,
            };
            if component.splat_count == 0 {
                continue;
            }

            device.set_transform(&world);
            device.set_texture(0, component.texture);
            device.set_uniform(u_focal, &[fx, fy, 0.0, 0.0]);
            device.set_vertex_buffer(component.quad_vb);
            device.set_instance_buffer(component.instance_buffers[active], component.splat_count);
            device.submit(self.view_id, program, state);

            self.maybe_sort(device, component, axis);
        }
        Ok(())
    }
}
