//! Offscreen viewport pipeline
//!
//! Draws the textured model into an offscreen color target that the overlay
//! pass samples. Owns its color images, the model and texture, and one
//! uniform buffer + descriptor set + command buffer per frame slot.

use ash::vk;
use ash::Device;
use std::path::Path;

use crate::render::mesh::Vertex;
use crate::render::vulkan::framebuffers::{FramebufferSet, ImageSettings};
use crate::render::vulkan::shader::{
    DescriptorSetLayout, GraphicsPipeline, PipelineSettings, RenderPass,
};
use crate::render::vulkan::texture::TextureImage;
use crate::render::vulkan::{
    Buffer, CommandPool, Model, Swapchain, VulkanContext, VulkanError, VulkanResult,
};

use super::{FrameInput, Pipeline, SceneUbo};

/// Offscreen textured-mesh pass
pub struct ViewportPipeline {
    device: Device,
    render_pass: RenderPass,
    framebuffers: FramebufferSet,
    descriptor_layout: DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: Vec<Buffer>,
    pipeline: GraphicsPipeline,
    command_buffers: Vec<vk::CommandBuffer>,
    model: Model,
    texture: TextureImage,
    clear_color: [f32; 4],
}

impl ViewportPipeline {
    /// Pass name; shaders load from `viewport.vert.spv` / `viewport.frag.spv`.
    pub const PASS_NAME: &'static str = "viewport";

    /// Create the pass with its model and texture. Call
    /// [`Pipeline::init_resources`] before the first frame.
    pub fn new(
        context: &VulkanContext,
        swapchain: &Swapchain,
        shader_dir: &Path,
        clear_color: [f32; 4],
        slots: usize,
        model: Model,
        texture: TextureImage,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let color_format = swapchain.format().format;

        let settings = ImageSettings {
            extent: swapchain.extent(),
            format: color_format,
        };

        // The render pass and framebuffer set must agree on the depth
        // format; probe it once before building either.
        let probe_depth = crate::render::vulkan::texture::DepthImage::new(context, settings.extent)?;
        let depth_format = probe_depth.format();
        drop(probe_depth);

        let render_pass =
            RenderPass::new_offscreen_pass(device.clone(), color_format, depth_format)?;

        let framebuffers = FramebufferSet::new_offscreen(
            context,
            render_pass.handle(),
            settings,
            swapchain.image_count(),
        )?;

        let descriptor_layout = DescriptorSetLayout::new(device.clone())?;

        let uniform_buffers = (0..slots)
            .map(|_| {
                Buffer::persistent(
                    device.clone(),
                    &context.physical_device().memory_properties,
                    std::mem::size_of::<SceneUbo>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_pool = create_descriptor_pool(&device, slots as u32)?;
        let descriptor_sets = allocate_descriptor_sets(
            &device,
            descriptor_pool,
            descriptor_layout.handle(),
            slots,
        )?;

        for (slot, &set) in descriptor_sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform_buffers[slot].handle())
                .offset(0)
                .range(std::mem::size_of::<SceneUbo>() as vk::DeviceSize)
                .build();
            let image_info = vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(texture.view())
                .sampler(texture.sampler())
                .build();

            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&buffer_info))
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(&image_info))
                    .build(),
            ];
            unsafe { device.update_descriptor_sets(&writes, &[]) };
        }

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            &[descriptor_layout.handle()],
            &PipelineSettings {
                shader_dir,
                pass_name: Self::PASS_NAME,
                bindings: &bindings,
                attributes: &attributes,
                cull_mode: vk::CullModeFlags::BACK,
                blend_enabled: false,
                depth_test: true,
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
            pipeline,
            command_buffers: Vec::new(),
            model,
            texture,
            clear_color,
        })
    }

    /// Color views the overlay pass samples, indexed by image index.
    pub fn color_views(&self) -> Vec<vk::ImageView> {
        (0..self.framebuffers.len() as u32)
            .map(|index| self.framebuffers.color_view(index))
            .collect()
    }

    /// Sampler shared with the overlay pass for scene sampling.
    pub fn scene_sampler(&self) -> vk::Sampler {
        self.texture.sampler()
    }
}

pub(super) fn create_descriptor_pool(device: &Device, slots: u32) -> VulkanResult<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: slots,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: slots,
        },
    ];
    let create_info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(&pool_sizes)
        .max_sets(slots);

    unsafe {
        device
            .create_descriptor_pool(&create_info, None)
            .map_err(VulkanError::Api)
    }
}

pub(super) fn allocate_descriptor_sets(
    device: &Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    slots: usize,
) -> VulkanResult<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; slots];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    unsafe {
        device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(VulkanError::Api)
    }
}

impl Pipeline for ViewportPipeline {
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
        _context: &VulkanContext,
        slot: usize,
        input: &FrameInput<'_>,
        _extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let ubo = SceneUbo {
            model: input.model.into(),
            view: input.view.into(),
            projection: input.projection.into(),
        };
        self.uniform_buffers[slot].write_slice(&[ubo])
    }

    fn record_buffer(
        &mut self,
        _context: &VulkanContext,
        slot: usize,
        image_index: u32,
    ) -> VulkanResult<vk::CommandBuffer> {
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
                        float32: self.clear_color,
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

            self.model.record_draw(&self.device, command_buffer);

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
        // Offscreen targets track the presentation extent; the pipeline uses
        // dynamic viewport state and survives the resize untouched.
        self.framebuffers
            .recreate(context, self.render_pass.handle(), swapchain.extent(), None)
    }
}

impl Drop for ViewportPipeline {
    fn drop(&mut self) {
        unsafe {
            // Sets are returned with the pool; buffers, framebuffers and the
            // pipeline clean up through their own Drop impls.
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}
