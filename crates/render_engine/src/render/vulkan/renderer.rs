//! Frame orchestrator
//!
//! Drives the per-frame protocol: fence wait, image acquire, uniform update,
//! command recording through each pipeline, a single submission, and
//! presentation — plus the swapchain recreation path that keeps GPU
//! resources consistent with a live, resizable surface.
//!
//! The CPU never runs more than `max_frames_in_flight` frames ahead; the
//! per-slot fence is the only backpressure mechanism. Semaphores order GPU
//! work only: acquire-before-color-write and color-write-before-present.

use ash::vk;

use crate::assets::RgbaImage;
use crate::config::RendererConfig;
use crate::render::mesh::Mesh;
use crate::render::vulkan::frame::{
    acquire_action, present_needs_recreate, AcquireAction, FrameCycle, PresentOutcome,
};
use crate::render::vulkan::pipelines::{FrameInput, OverlayPipeline, Pipeline, ViewportPipeline};
use crate::render::vulkan::{
    CommandPool, FrameSync, Model, Swapchain, TextureImage, VulkanContext, VulkanError,
    VulkanResult,
};
use crate::render::window::Window;

/// The renderer: owns every GPU resource and the frame state machine.
///
/// Field declaration order is teardown order — pipelines and sync objects go
/// before the swapchain, the swapchain before the context.
pub struct Renderer {
    viewport: ViewportPipeline,
    overlay: OverlayPipeline,
    frames: Vec<FrameSync>,
    command_pool: CommandPool,
    swapchain: Swapchain,
    context: VulkanContext,
    cycle: FrameCycle,
}

impl Renderer {
    /// Build the full rendering stack for a window. Any failure here is
    /// fatal to startup; there is no partial-success mode.
    pub fn new(
        window: &mut Window,
        config: &RendererConfig,
        mesh: &Mesh,
        texture_pixels: &RgbaImage,
    ) -> VulkanResult<Self> {
        let slots = config.max_frames_in_flight;
        let context = VulkanContext::new(window, &config.application_name)?;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;

        let command_pool = CommandPool::new(
            context.raw_device(),
            context.queue_families().graphics_family(),
        )?;

        let model = Model::new(&context, &command_pool, mesh)?;
        let texture = TextureImage::from_pixels(&context, &command_pool, texture_pixels)?;

        let mut viewport = ViewportPipeline::new(
            &context,
            &swapchain,
            &config.shader_dir,
            config.clear_color,
            slots,
            model,
            texture,
        )?;
        let mut overlay = OverlayPipeline::new(
            &context,
            &swapchain,
            &config.shader_dir,
            slots,
            viewport.scene_sampler(),
        )?;

        viewport.init_resources(&context, &command_pool, slots)?;
        overlay.init_resources(&context, &command_pool, slots)?;
        overlay.set_scene_views(viewport.color_views());

        let frames = (0..slots)
            .map(|_| FrameSync::new(context.raw_device()))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "renderer ready: {}x{} swapchain, {} images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count(),
            slots
        );

        Ok(Self {
            viewport,
            overlay,
            frames,
            command_pool,
            swapchain,
            context,
            cycle: FrameCycle::new(slots),
        })
    }

    /// Run one iteration of the frame loop.
    ///
    /// A stale swapchain (out-of-date or suboptimal acquire, flagged resize)
    /// is absorbed here: the swapchain and all dependent resources are
    /// rebuilt and the iteration ends without a submission. All other
    /// per-frame failures propagate and are fatal to the caller.
    pub fn draw_frame(&mut self, window: &mut Window, input: &FrameInput<'_>) -> VulkanResult<()> {
        let slot = self.cycle.slot();

        // 1. Bound CPU lookahead: wait until the GPU released this slot.
        self.frames[slot].in_flight.wait()?;

        // 2. Acquire, or fall into the recreation path.
        let outcome = self
            .swapchain
            .acquire_next_image(self.frames[slot].image_available.handle())?;
        let image_index = match acquire_action(outcome, window.framebuffer_resized()) {
            AcquireAction::Proceed(index) => index,
            AcquireAction::AbortAndRecreate => {
                window.take_framebuffer_resized();
                self.recreate_swapchain(window)?;
                // The abandoned acquire may have left a signal pending on
                // this slot's semaphore; replace it.
                self.frames[slot].recreate_image_available(self.context.raw_device())?;
                return Ok(());
            }
        };

        // 3. Per-frame data through the persistent mappings.
        let extent = self.swapchain.extent();
        self.viewport.begin_frame(&self.context, slot, input, extent)?;
        self.overlay.begin_frame(&self.context, slot, input, extent)?;

        // 4. Reset the fence only once work for this slot is certain, then
        // have every pipeline re-record against the acquired image.
        self.frames[slot].in_flight.reset()?;
        let command_buffers = [
            self.viewport.record_buffer(&self.context, slot, image_index)?,
            self.overlay.record_buffer(&self.context, slot, image_index)?,
        ];

        // 5. One submission for all pipelines.
        let wait_semaphores = [self.frames[slot].image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.frames[slot].render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    self.frames[slot].in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        // 6. Present, waiting on the render-finished semaphore.
        let present_outcome = self.present(image_index, signal_semaphores[0])?;
        if present_needs_recreate(present_outcome, window.framebuffer_resized()) {
            window.take_framebuffer_resized();
            self.recreate_swapchain(window)?;
        }

        // 7. The frame completed (recreated or not): advance the slot.
        self.viewport.end_frame(slot);
        self.overlay.end_frame(slot);
        self.cycle.advance();

        Ok(())
    }

    fn present(
        &self,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Tear down and rebuild the swapchain and every dependent resource.
    ///
    /// Blocks while the window is minimized (zero-sized framebuffer) and
    /// always waits for device idle before touching anything, so no in-flight
    /// frame can reference the old resources.
    pub fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let mut size = window.framebuffer_size();
        while size.0 == 0 || size.1 == 0 {
            window.wait_events();
            size = window.framebuffer_size();
        }

        self.context.wait_idle()?;

        let extent = vk::Extent2D {
            width: size.0,
            height: size.1,
        };
        let new_swapchain = Swapchain::recreate(&self.context, extent, &self.swapchain)?;
        // Old views and chain are destroyed here, after the idle wait.
        self.swapchain = new_swapchain;

        // Recreation is a barrier: every pipeline rebuilds before any new
        // frame is recorded.
        self.viewport.recreate_resources(&self.context, &self.swapchain)?;
        self.overlay.recreate_resources(&self.context, &self.swapchain)?;
        self.overlay.set_scene_views(self.viewport.color_views());

        log::debug!(
            "swapchain recreated at {}x{}",
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Block until the GPU is idle. Call before dropping the renderer while
    /// frames may still be in flight.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Frames-in-flight count.
    pub fn frames_in_flight(&self) -> usize {
        self.cycle.in_flight()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Shutdown is the terminal state: drain the GPU, then let the fields
        // drop in declaration order (pipelines, sync, pool, swapchain,
        // context).
        let _ = self.context.wait_idle();
    }
}
