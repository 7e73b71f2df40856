//! Image resources: textures, depth buffers, layout transitions, mipmaps
//!
//! Layout transitions are whitelisted. The renderer only ever needs three
//! transitions; asking for anything else is a programming error and fails
//! loudly before any barrier is submitted.

use ash::vk;
use ash::{Device, Instance};

use crate::assets::RgbaImage;
use crate::render::vulkan::{Buffer, CommandPool, VulkanContext, VulkanError, VulkanResult};

/// Resolve the access masks and pipeline stages for a layout transition.
///
/// The supported set is exactly:
/// * undefined -> transfer-dst (pre-upload)
/// * transfer-dst -> shader-read-only (post-upload)
/// * undefined -> shader-read-only (attachment handed straight to sampling;
///   same masks as the post-upload case)
///
/// Any other pair returns [`VulkanError::UnsupportedLayoutTransition`].
pub fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<(
    vk::AccessFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        | (vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        (old, new) => Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Whether a format supports linear-filtered blits with optimal tiling.
/// Mipmap generation requires this.
pub fn supports_linear_blit(properties: &vk::FormatProperties) -> bool {
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
}

/// First candidate format whose properties support the requested tiling and
/// features. Exhausting the candidates is a fatal configuration error.
pub fn find_supported_format(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
) -> VulkanResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let properties =
                unsafe { instance.get_physical_device_format_properties(physical_device, format) };
            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                _ => properties.optimal_tiling_features.contains(features),
            }
        })
        .ok_or(VulkanError::NoSupportedFormat)
}

/// Mip chain length for a base extent.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn create_image(
    device: &Device,
    context: &VulkanContext,
    extent: vk::Extent2D,
    mip_levels: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
    let create_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(mip_levels)
        .array_layers(1)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = unsafe {
        device
            .create_image(&create_info, None)
            .map_err(VulkanError::Api)?
    };

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type_index = match context.find_memory_type(
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) {
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

    Ok((image, memory))
}

fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device
            .create_image_view(&create_info, None)
            .map_err(VulkanError::Api)
    }
}

/// Sampled texture: image, memory, view, sampler, full mip chain
pub struct TextureImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    mip_levels: u32,
}

impl TextureImage {
    /// Upload RGBA8 pixels into a mip-mapped, sampled device-local texture.
    pub fn from_pixels(
        context: &VulkanContext,
        pool: &CommandPool,
        pixels: &RgbaImage,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let extent = vk::Extent2D {
            width: pixels.width,
            height: pixels.height,
        };
        let format = vk::Format::R8G8B8A8_SRGB;
        let mip_levels = mip_level_count(pixels.width, pixels.height);

        let staging = Buffer::new(
            device.clone(),
            &context.physical_device().memory_properties,
            pixels.byte_len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(&pixels.pixels)?;

        let (image, memory) = create_image(
            &device,
            context,
            extent,
            mip_levels,
            format,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
        )?;

        transition_image_layout(
            context,
            pool,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            mip_levels,
        )?;

        copy_buffer_to_image(context, pool, staging.handle(), image, extent)?;

        if mip_levels > 1 {
            generate_mipmaps(context, pool, image, format, extent, mip_levels)?;
        } else {
            transition_image_layout(
                context,
                pool,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                mip_levels,
            )?;
        }

        let view = create_view(&device, image, format, vk::ImageAspectFlags::COLOR, mip_levels)?;
        let sampler = Self::create_sampler(&device, context, mip_levels)?;

        log::debug!(
            "uploaded texture {}x{} with {} mip levels",
            pixels.width,
            pixels.height,
            mip_levels
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
            sampler,
            mip_levels,
        })
    }

    fn create_sampler(
        device: &Device,
        context: &VulkanContext,
        mip_levels: u32,
    ) -> VulkanResult<vk::Sampler> {
        let max_anisotropy = context
            .physical_device()
            .properties
            .limits
            .max_sampler_anisotropy;

        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(mip_levels as f32)
            .mip_lod_bias(0.0);

        unsafe {
            device
                .create_sampler(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Image view for descriptor binding.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler for descriptor binding.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for TextureImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Issue a whitelisted layout transition as a blocking one-shot submission.
pub fn transition_image_layout(
    context: &VulkanContext,
    pool: &CommandPool,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    mip_levels: u32,
) -> VulkanResult<()> {
    // Resolve masks up front: unsupported pairs fail before submission.
    let (src_access, dst_access, src_stage, dst_stage) = transition_masks(old, new)?;

    pool.single_time_commands(context.graphics_queue(), |command_buffer| {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            context.device().device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }
    })
}

fn copy_buffer_to_image(
    context: &VulkanContext,
    pool: &CommandPool,
    buffer: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) -> VulkanResult<()> {
    pool.single_time_commands(context.graphics_queue(), |command_buffer| {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });

        unsafe {
            context.device().device.cmd_copy_buffer_to_image(
                command_buffer,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }
    })
}

/// Fill the mip chain by blitting each level from the one above it.
///
/// Level 0 must be in TRANSFER_DST layout on entry. Each source level is
/// transitioned to transfer-src after it is written, blitted down, then moved
/// to shader-read-only; the final level goes straight from transfer-dst to
/// shader-read-only.
fn generate_mipmaps(
    context: &VulkanContext,
    pool: &CommandPool,
    image: vk::Image,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
) -> VulkanResult<()> {
    let format_properties = unsafe {
        context
            .instance()
            .get_physical_device_format_properties(context.physical_device().device, format)
    };
    if !supports_linear_blit(&format_properties) {
        return Err(VulkanError::InitializationFailed(format!(
            "format {:?} does not support linear-filtered blits for mipmap generation",
            format
        )));
    }

    let device = context.device().device.clone();
    pool.single_time_commands(context.graphics_queue(), |command_buffer| {
        let subresource = |mip_level: u32| vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let mut mip_width = extent.width as i32;
        let mut mip_height = extent.height as i32;

        for level in 1..mip_levels {
            // Previous level becomes the blit source
            let to_src = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource(level - 1))
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ);

            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_src.build()],
                );
            }

            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: mip_width, y: mip_height, z: 1 },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: next_width, y: next_height, z: 1 },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit.build()],
                    vk::Filter::LINEAR,
                );
            }

            // Source level is done; make it shader-readable
            let to_shader = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource(level - 1))
                .src_access_mask(vk::AccessFlags::TRANSFER_READ)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);

            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_shader.build()],
                );
            }

            mip_width = next_width;
            mip_height = next_height;
        }

        // Last level never became a blit source
        let final_barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource(mip_levels - 1))
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ);

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[final_barrier.build()],
            );
        }
    })
}

/// Depth attachment: image, memory, view
pub struct DepthImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
}

impl DepthImage {
    /// Pick a depth format the device supports and create the attachment.
    /// The render pass transitions it from undefined each frame, so no
    /// explicit layout transition is needed here.
    pub fn new(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let format = find_supported_format(
            context.instance(),
            context.physical_device().device,
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let device = context.raw_device();
        let (image, memory) = create_image(
            &device,
            context,
            extent,
            1,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let view = create_view(&device, image, format, vk::ImageAspectFlags::DEPTH, 1)?;

        Ok(Self {
            device,
            image,
            memory,
            view,
            format,
        })
    }

    /// Depth view for framebuffer attachment.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Chosen depth format.
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for DepthImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_transitions_resolve() {
        assert!(transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        )
        .is_ok());
        assert!(transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        )
        .is_ok());
        assert!(transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        )
        .is_ok());
    }

    #[test]
    fn undefined_to_shader_read_uses_upload_masks() {
        let direct = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        let post_upload = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(direct.0, post_upload.0);
        assert_eq!(direct.1, post_upload.1);
    }

    #[test]
    fn other_transitions_are_rejected() {
        let rejected = [
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::UNDEFINED),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            (vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ];
        for (old, new) in rejected {
            match transition_masks(old, new) {
                Err(VulkanError::UnsupportedLayoutTransition { old: o, new: n }) => {
                    assert_eq!(o, old);
                    assert_eq!(n, new);
                }
                other => panic!("expected rejection for {:?} -> {:?}, got {:?}", old, new, other.err()),
            }
        }
    }

    #[test]
    fn mip_count_covers_full_chain() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(3, 1), 2);
    }

    #[test]
    fn linear_blit_support_reads_optimal_features() {
        let with = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        let without = vk::FormatProperties::default();
        assert!(supports_linear_blit(&with));
        assert!(!supports_linear_blit(&without));
    }
}
