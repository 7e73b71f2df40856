//! Presentation-facing overlay pipeline
//!
//! Composites the offscreen viewport image and the frame's immediate-mode UI
//! geometry into the swapchain image. Wraps the swapchain views (never owns
//! them) and rebuilds its framebuffers on every swapchain recreation.
//!
//! UI vertices live in host-visible per-slot buffers that are rewritten each
//! frame; the slot's fence wait guarantees the GPU is done with them before
//! the rewrite.

use ash::vk;
use ash::Device;
use std::path::Path;

use crate::foundation::math;
use crate::render::ui::UiVertex;
use crate::render::vulkan::framebuffers::{FramebufferSet, ImageSettings};
use crate::render::vulkan::shader::{
    DescriptorSetLayout, GraphicsPipeline, PipelineSettings, RenderPass,
};
use crate::render::vulkan::{
    Buffer, CommandPool, Swapchain, VulkanContext, VulkanError, VulkanResult,
};

use super::{FrameInput, OverlayUbo, Pipeline};

/// Initial capacity of the per-slot UI geometry buffers, in elements.
const INITIAL_UI_VERTICES: usize = 4096;
const INITIAL_UI_INDICES: usize = 8192;

/// Per-slot dynamic UI geometry
struct UiSlot {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    index_count: u32,
}

/// Swapchain-facing UI overlay pass
pub struct OverlayPipeline {
    device: Device,
    render_pass: RenderPass,
    framebuffers: FramebufferSet,
    descriptor_layout: DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<Buffer>,
    ui_slots: Vec<UiSlot>,
    pipeline: GraphicsPipeline,
    command_buffers: Vec<vk::CommandBuffer>,
    /// Viewport color views to sample, indexed by image index
    scene_views: Vec<vk::ImageView>,
    /// Sampler used for the scene texture
    scene_sampler: vk::Sampler,
    /// Whether to draw the full-screen scene quad behind the UI
    viewport_quad: bool,
}

impl OverlayPipeline {
    /// Pass name; shaders load from `overlay.vert.spv` / `overlay.frag.spv`.
    pub const PASS_NAME: &'static str = "overlay";

    /// Create the pass against the swapchain. The scene views to composite
    /// are wired afterwards with [`OverlayPipeline::set_scene_views`].
    pub fn new(
        context: &VulkanContext,
        swapchain: &Swapchain,
        shader_dir: &Path,
        slots: usize,
        scene_sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let color_format = swapchain.format().format;

        let settings = ImageSettings {
            extent: swapchain.extent(),
            format: color_format,
        };

        let probe_depth = crate::render::vulkan::texture::DepthImage::new(context, settings.extent)?;
        let depth_format = probe_depth.format();
        drop(probe_depth);

        let render_pass = RenderPass::new_present_pass(device.clone(), color_format, depth_format)?;

        let framebuffers = FramebufferSet::new_presentation(
            context,
            render_pass.handle(),
            settings,
            swapchain.image_views(),
        )?;

        let descriptor_layout = DescriptorSetLayout::new(device.clone())?;

        let memory_properties = &context.physical_device().memory_properties;
        let uniform_buffers = (0..slots)
            .map(|_| {
                Buffer::persistent(
                    device.clone(),
                    memory_properties,
                    std::mem::size_of::<OverlayUbo>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let ui_slots = (0..slots)
            .map(|_| UiSlot::new(&device, memory_properties))
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_pool = super::viewport::create_descriptor_pool(&device, slots as u32)?;
        let descriptor_sets = super::viewport::allocate_descriptor_sets(
            &device,
            descriptor_pool,
            descriptor_layout.handle(),
            slots,
        )?;

        for (slot, &set) in descriptor_sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform_buffers[slot].handle())
                .offset(0)
                .range(std::mem::size_of::<OverlayUbo>() as vk::DeviceSize)
                .build();
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info))
                .build();
            unsafe { device.update_descriptor_sets(&[write], &[]) };
        }

        let bindings = [UiVertex::binding_description()];
        let attributes = UiVertex::attribute_descriptions();
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            &[descriptor_layout.handle()],
            &PipelineSettings {
                shader_dir,
                pass_name: Self::PASS_NAME,
                bindings: &bindings,
                attributes: &attributes,
                cull_mode: vk::CullModeFlags::NONE,
                blend_enabled: true,
                depth_test: false,
            },
        )?;

        Ok(Self {
            device,
            render_pass,
            framebuffers,
            descriptor_layout,
            descriptor_pool,
            descriptor_sets,
            uniform_buffers,
            ui_slots,
            pipeline,
            command_buffers: Vec::new(),
            scene_views: Vec::new(),
            scene_sampler,
            viewport_quad: true,
        })
    }

    /// Wire the offscreen color views this pass composites. Must be called
    /// at startup and again after every swapchain recreation.
    pub fn set_scene_views(&mut self, views: Vec<vk::ImageView>) {
        self.scene_views = views;
    }

    /// Toggle the full-screen scene quad behind the UI.
    pub fn set_viewport_quad(&mut self, enabled: bool) {
        self.viewport_quad = enabled;
    }
}

impl UiSlot {
    fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> VulkanResult<Self> {
        Ok(Self {
            vertex_buffer: Buffer::persistent(
                device.clone(),
                memory_properties,
                (INITIAL_UI_VERTICES * std::mem::size_of::<UiVertex>()) as vk::DeviceSize,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?,
            index_buffer: Buffer::persistent(
                device.clone(),
                memory_properties,
                (INITIAL_UI_INDICES * std::mem::size_of::<u32>()) as vk::DeviceSize,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?,
            vertex_capacity: INITIAL_UI_VERTICES,
            index_capacity: INITIAL_UI_INDICES,
            index_count: 0,
        })
    }

    /// Upload this frame's UI geometry, growing the buffers when the frame
    /// needs more room. Safe because the slot's fence has been waited on.
    fn upload(
        &mut self,
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        vertices: &[UiVertex],
        indices: &[u32],
    ) -> VulkanResult<()> {
        if vertices.len() > self.vertex_capacity {
            let capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = Buffer::persistent(
                device.clone(),
                memory_properties,
                (capacity * std::mem::size_of::<UiVertex>()) as vk::DeviceSize,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;
            self.vertex_capacity = capacity;
        }
        if indices.len() > self.index_capacity {
            let capacity = indices.len().next_power_of_two();
            self.index_buffer = Buffer::persistent(
                device.clone(),
                memory_properties,
                (capacity * std::mem::size_of::<u32>()) as vk::DeviceSize,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?;
            self.index_capacity = capacity;
        }

        if !vertices.is_empty() {
            self.vertex_buffer.write_slice(vertices)?;
            self.index_buffer.write_slice(indices)?;
        }
        self.index_count = indices.len() as u32;
        Ok(())
    }
}

impl Pipeline for OverlayPipeline {
    fn init_resources(
        &mut self,
        _context: &VulkanContext,
        pool: &CommandPool,
        slots: usize,
    ) -> VulkanResult<()> {
        self.command_buffers = pool.allocate_command_buffers(slots as u32)?;
        Ok(())
    }

    fn begin_frame(
        &mut self,
        context: &VulkanContext,
        slot: usize,
        input: &FrameInput<'_>,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let ubo = OverlayUbo {
            projection: math::ortho_pixels(extent.width as f32, extent.height as f32).into(),
        };
        self.uniform_buffers[slot].write_slice(&[ubo])?;

        // The scene quad is regular overlay geometry drawn first, covering
        // the framebuffer with the viewport texture.
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        if self.viewport_quad {
            let (w, h) = (extent.width as f32, extent.height as f32);
            vertices.extend_from_slice(&[
                UiVertex { position: [0.0, 0.0], tex_coord: [0.0, 0.0], color: [1.0; 4] },
                UiVertex { position: [w, 0.0], tex_coord: [1.0, 0.0], color: [1.0; 4] },
                UiVertex { position: [w, h], tex_coord: [1.0, 1.0], color: [1.0; 4] },
                UiVertex { position: [0.0, h], tex_coord: [0.0, 1.0], color: [1.0; 4] },
            ]);
            indices.extend_from_slice(&[0, 1, 2, 2, 3, 0]);
        }
        let base = vertices.len() as u32;
        vertices.extend_from_slice(&input.ui.vertices);
        indices.extend(input.ui.indices.iter().map(|&index| index + base));

        self.ui_slots[slot].upload(
            &self.device,
            &context.physical_device().memory_properties,
            &vertices,
            &indices,
        )
    }

    fn record_buffer(
        &mut self,
        _context: &VulkanContext,
        slot: usize,
        image_index: u32,
    ) -> VulkanResult<vk::CommandBuffer> {
        // Point this slot's scene binding at the acquired image's viewport
        // target. The slot's fence wait makes the descriptor update safe.
        if let Some(&view) = self.scene_views.get(image_index as usize) {
            let image_info = vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(view)
                .sampler(self.scene_sampler)
                .build();
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(self.descriptor_sets[slot])
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&image_info))
                .build();
            unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        } else {
            return Err(VulkanError::InitializationFailed(
                "overlay scene views not wired".to_string(),
            ));
        }

        let command_buffer = self.command_buffers[slot];
        let extent = self.framebuffers.extent();

        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: [0.0, 0.0, 0.0, 1.0],
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];
            let render_pass_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass.handle())
                .framebuffer(self.framebuffers.framebuffer(image_index))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            let slot_data = &self.ui_slots[slot];
            if slot_data.index_count > 0 {
                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
                let scissor = vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                };
                self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);

                self.device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.handle(),
                );
                self.device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.layout(),
                    0,
                    &[self.descriptor_sets[slot]],
                    &[],
                );
                self.device.cmd_bind_vertex_buffers(
                    command_buffer,
                    0,
                    &[slot_data.vertex_buffer.handle()],
                    &[0],
                );
                self.device.cmd_bind_index_buffer(
                    command_buffer,
                    slot_data.index_buffer.handle(),
                    0,
                    vk::IndexType::UINT32,
                );
                self.device
                    .cmd_draw_indexed(command_buffer, slot_data.index_count, 1, 0, 0, 0);
            }

            self.device.cmd_end_render_pass(command_buffer);
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        Ok(command_buffer)
    }

    fn end_frame(&mut self, _slot: usize) {}

    fn recreate_resources(
        &mut self,
        context: &VulkanContext,
        swapchain: &Swapchain,
    ) -> VulkanResult<()> {
        // Fresh swapchain views replace the borrowed ones; the caller re-wires
        // the scene views afterwards.
        self.scene_views.clear();
        self.framebuffers.recreate(
            context,
            self.render_pass.handle(),
            swapchain.extent(),
            Some(swapchain.image_views()),
        )
    }
}

impl Drop for OverlayPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}
