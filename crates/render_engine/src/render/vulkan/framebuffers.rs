//! Framebuffer management for presentation and offscreen targets
//!
//! A [`FramebufferSet`] owns one framebuffer per swapchain image plus the
//! shared depth attachment. It runs in one of two modes: wrapping externally
//! supplied swapchain image views (presentation pass), or owning its color
//! images outright (offscreen viewport target that a later pass samples).
//!
//! Cleanup ordering is load-bearing: framebuffers go before the views they
//! reference, views before the images that back them. Swapchain-backed views
//! are borrowed and never destroyed here.

use ash::vk;
use ash::Device;

use crate::render::vulkan::texture::DepthImage;
use crate::render::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// Dimensions and format the framebuffers are built from. Framebuffer size
/// comes from here, never re-derived from the render pass.
#[derive(Debug, Clone, Copy)]
pub struct ImageSettings {
    /// Attachment extent
    pub extent: vk::Extent2D,
    /// Color attachment format
    pub format: vk::Format,
}

/// Offscreen color target owned by the set: image, memory, view.
struct OwnedTarget {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl OwnedTarget {
    fn new(context: &VulkanContext, settings: ImageSettings) -> VulkanResult<Self> {
        let device = context.raw_device();

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: settings.extent.width,
                height: settings.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(settings.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            // Rendered by the viewport pass, sampled by the overlay pass
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            device
                .create_image(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match context
            .find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        {
            Some(index) => index,
            None => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::NoSuitableMemoryType);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(settings.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
        })
    }
}

impl Drop for OwnedTarget {
    fn drop(&mut self) {
        unsafe {
            // View before image, image before memory.
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

enum ColorTargets {
    /// Set owns the color images (offscreen render target)
    Owned(Vec<OwnedTarget>),
    /// Set wraps swapchain image views it must never destroy
    Borrowed(Vec<vk::ImageView>),
}

impl ColorTargets {
    fn views(&self) -> Vec<vk::ImageView> {
        match self {
            ColorTargets::Owned(targets) => targets.iter().map(|t| t.view).collect(),
            ColorTargets::Borrowed(views) => views.clone(),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColorTargets::Owned(targets) => targets.len(),
            ColorTargets::Borrowed(views) => views.len(),
        }
    }
}

/// Per-swapchain-image framebuffers plus the shared depth attachment
pub struct FramebufferSet {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
    targets: ColorTargets,
    depth: DepthImage,
    settings: ImageSettings,
}

impl FramebufferSet {
    /// Create a set that owns its color images (offscreen mode).
    pub fn new_offscreen(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        settings: ImageSettings,
        count: usize,
    ) -> VulkanResult<Self> {
        let targets = (0..count)
            .map(|_| OwnedTarget::new(context, settings))
            .collect::<VulkanResult<Vec<_>>>()?;
        Self::from_targets(context, render_pass, settings, ColorTargets::Owned(targets))
    }

    /// Create a set wrapping externally supplied swapchain views
    /// (presentation mode).
    pub fn new_presentation(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        settings: ImageSettings,
        swapchain_views: &[vk::ImageView],
    ) -> VulkanResult<Self> {
        Self::from_targets(
            context,
            render_pass,
            settings,
            ColorTargets::Borrowed(swapchain_views.to_vec()),
        )
    }

    fn from_targets(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        settings: ImageSettings,
        targets: ColorTargets,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let depth = DepthImage::new(context, settings.extent)?;
        let framebuffers =
            Self::create_framebuffers(&device, render_pass, settings, &targets, &depth)?;

        Ok(Self {
            device,
            framebuffers,
            targets,
            depth,
            settings,
        })
    }

    fn create_framebuffers(
        device: &Device,
        render_pass: vk::RenderPass,
        settings: ImageSettings,
        targets: &ColorTargets,
        depth: &DepthImage,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        let mut framebuffers = Vec::with_capacity(targets.len());
        for (index, color_view) in targets.views().into_iter().enumerate() {
            // Per-image color view first, shared attachments after.
            let attachments = [color_view, depth.view()];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(settings.extent.width)
                .height(settings.extent.height)
                .layers(1);

            match unsafe { device.create_framebuffer(&create_info, None) } {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(e) => {
                    log::error!("framebuffer {} creation failed: {:?}", index, e);
                    for framebuffer in framebuffers {
                        unsafe { device.destroy_framebuffer(framebuffer, None) };
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }
        Ok(framebuffers)
    }

    /// Rebuild the set for a new extent after swapchain recreation.
    ///
    /// Framebuffers and the depth image are always rebuilt; owned color
    /// images are recreated at the new size, borrowed views are replaced by
    /// the caller's fresh swapchain views.
    pub fn recreate(
        &mut self,
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        swapchain_views: Option<&[vk::ImageView]>,
    ) -> VulkanResult<()> {
        self.destroy_framebuffers();
        self.settings.extent = extent;
        let settings = self.settings;

        match (&mut self.targets, swapchain_views) {
            (ColorTargets::Borrowed(views), Some(fresh)) => {
                *views = fresh.to_vec();
            }
            (ColorTargets::Owned(targets), None) => {
                // Old targets drop here (views before images before memory)
                let count = targets.len();
                *targets = (0..count)
                    .map(|_| OwnedTarget::new(context, settings))
                    .collect::<VulkanResult<Vec<_>>>()?;
            }
            _ => {
                return Err(VulkanError::InitializationFailed(
                    "framebuffer recreation mode mismatch".to_string(),
                ))
            }
        }

        self.depth = DepthImage::new(context, extent)?;
        self.framebuffers = Self::create_framebuffers(
            &self.device,
            render_pass,
            self.settings,
            &self.targets,
            &self.depth,
        )?;
        Ok(())
    }

    fn destroy_framebuffers(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    /// Framebuffer for an acquired image index.
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Color view for an image index. For owned targets this is the view a
    /// later pass samples.
    pub fn color_view(&self, image_index: u32) -> vk::ImageView {
        match &self.targets {
            ColorTargets::Owned(targets) => targets[image_index as usize].view,
            ColorTargets::Borrowed(views) => views[image_index as usize],
        }
    }

    /// Attachment extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    /// Number of framebuffers.
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Chosen depth format.
    pub fn depth_format(&self) -> vk::Format {
        self.depth.format()
    }
}

impl Drop for FramebufferSet {
    fn drop(&mut self) {
        // Framebuffers first; owned targets and depth drop afterwards via
        // their own Drop impls. Borrowed swapchain views are left alone.
        self.destroy_framebuffers();
    }
}
