//! Vulkan swapchain management
//!
//! Owns the chain of presentable images and their views. The swapchain is the
//! one GPU resource that is routinely destroyed and recreated at runtime
//! (window resize, out-of-date signal), so creation is parameterized on an
//! optional old swapchain and teardown is strictly ordered: image views
//! first, then the chain itself. Framebuffers referencing these views belong
//! to the pipelines and must already be gone by then.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use ash::Device;

use crate::render::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// Swapchain wrapper with automatic view cleanup
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

/// Pick the presentation extent.
///
/// When the surface reports a defined current extent it must be used exactly;
/// the `u32::MAX` sentinel means the window manager lets us choose, clamped
/// to the reported bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Pick the number of swapchain images: one more than the minimum for
/// headroom, clamped to the maximum when the surface reports one
/// (`max_image_count == 0` means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Prefer sRGB B8G8R8A8 for gamma-correct output; fall back to whatever the
/// surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Prefer low-latency MAILBOX; FIFO is the guaranteed fallback.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

impl Swapchain {
    /// Create a swapchain sized to the window.
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        Self::create(context, window_extent, vk::SwapchainKHR::null())
    }

    /// Create a replacement swapchain, handing the driver the old chain so
    /// in-flight presentation can be retired cleanly. The caller must have
    /// waited for device idle and destroyed dependent framebuffers first.
    pub fn recreate(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        old: &Swapchain,
    ) -> VulkanResult<Self> {
        Self::create(context, window_extent, old.swapchain)
    }

    fn create(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let physical = context.physical_device().device;
        let surface = context.surface();
        let surface_loader = context.surface_loader();

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical, surface)
                .map_err(VulkanError::Api)?
        };

        let format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&capabilities, window_extent);
        let image_count = choose_image_count(&capabilities);

        let families = context.queue_families();
        let graphics_family = families.graphics_family();
        let present_family = families.present.expect("present family checked at selection");
        let family_indices = [graphics_family, present_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Concurrent sharing only when graphics and present live on
        // different families; exclusive otherwise.
        create_info = if graphics_family != present_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let device = context.raw_device();
        let image_views = Self::create_image_views(&device, &images, format.format)?;

        log::debug!(
            "created swapchain: {}x{}, {} images, {:?}/{:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format,
            present_mode
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    fn create_image_views(
        device: &Device,
        images: &[vk::Image],
        format: vk::Format,
    ) -> VulkanResult<Vec<vk::ImageView>> {
        images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe {
                    device
                        .create_image_view(&create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    /// Acquire the next presentable image, signaling `semaphore` when it is
    /// ready. Staleness is reported through the result, not an error.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> VulkanResult<super::frame::AcquireOutcome> {
        match unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        } {
            Ok((index, false)) => Ok(super::frame::AcquireOutcome::Ready(index)),
            Ok((index, true)) => Ok(super::frame::AcquireOutcome::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(super::frame::AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Current extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Chosen surface format.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Presentable image views, indexed by acquired image index.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        current: Option<(u32, u32)>,
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: match current {
                Some((w, h)) => vk::Extent2D { width: w, height: h },
                None => vk::Extent2D { width: u32::MAX, height: u32::MAX },
            },
            min_image_extent: vk::Extent2D { width: min_extent.0, height: min_extent.1 },
            max_image_extent: vk::Extent2D { width: max_extent.0, height: max_extent.1 },
            ..Default::default()
        }
    }

    #[test]
    fn defined_current_extent_wins_regardless_of_window() {
        let caps = capabilities((1, 1), (4096, 4096), Some((1024, 768)), 2, 8);
        for window in [(0, 0), (640, 480), (10_000, 10_000)] {
            let chosen = choose_extent(&caps, vk::Extent2D { width: window.0, height: window.1 });
            assert_eq!((chosen.width, chosen.height), (1024, 768));
        }
    }

    #[test]
    fn undefined_extent_clamps_window_size() {
        let caps = capabilities((100, 200), (800, 600), None, 2, 8);

        let small = choose_extent(&caps, vk::Extent2D { width: 10, height: 10 });
        assert_eq!((small.width, small.height), (100, 200));

        let large = choose_extent(&caps, vk::Extent2D { width: 5000, height: 5000 });
        assert_eq!((large.width, large.height), (800, 600));

        let inside = choose_extent(&caps, vk::Extent2D { width: 640, height: 480 });
        assert_eq!((inside.width, inside.height), (640, 480));
    }

    #[test]
    fn chosen_extent_always_within_bounds() {
        let caps = capabilities((320, 240), (1920, 1080), None, 2, 0);
        for width in [0u32, 1, 320, 1000, 1920, 99_999] {
            for height in [0u32, 1, 240, 700, 1080, 99_999] {
                let chosen = choose_extent(&caps, vk::Extent2D { width, height });
                assert!((320..=1920).contains(&chosen.width));
                assert!((240..=1080).contains(&chosen.height));
            }
        }
    }

    #[test]
    fn image_count_is_min_plus_one_when_room() {
        let caps = capabilities((1, 1), (100, 100), None, 2, 8);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamped_to_max() {
        let caps = capabilities((1, 1), (100, 100), None, 3, 3);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn zero_max_image_count_means_unbounded() {
        let caps = capabilities((1, 1), (100, 100), None, 5, 0);
        assert_eq!(choose_image_count(&caps), 6);
    }

    #[test]
    fn preferred_surface_format_selected_when_available() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_is_fallback() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_prefers_mailbox_with_fifo_fallback() {
        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&with_mailbox), vk::PresentModeKHR::MAILBOX);

        let without = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&without), vk::PresentModeKHR::FIFO);
    }
}
