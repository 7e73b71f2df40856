//! Vulkan context management
//!
//! Owns the instance, physical/logical device selection, queue family
//! resolution and memory-type queries. This is the leaf dependency every
//! other render component borrows; nothing here depends on the swapchain or
//! pipelines.

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::collections::HashSet;
use std::ffi::{CStr, CString};

use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::render::window::Window;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance with the window system's required
    /// extensions, plus validation layers in debug builds.
    pub fn new(window: &Window, app_name: &str) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to load Vulkan: {:?}", e))
        })?;

        let app_name_cstr = CString::new(app_name).unwrap();
        let engine_name_cstr = CString::new("render_engine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("required extensions: {}", e))
        })?;
        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        extensions.push(DebugUtils::name().as_ptr());

        let layer_names: Vec<CString> = if cfg!(debug_assertions) {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(messenger))
        };

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Routes validation layer output through the log crate.
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Queue family indices resolved for a physical device.
///
/// Graphics and present are assigned to the first matching family and never
/// overwritten. Compute keeps the last matching family. Transfer goes to the
/// transfer-capable family with the fewest other capabilities (first found on
/// ties); the tie-break order is load-bearing for some drivers and is kept
/// as observed rather than cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for graphics submissions; must be assigned
    pub graphics: Option<u32>,
    /// Family used for presentation; may equal `graphics`
    pub present: Option<u32>,
    /// Family used for compute work, when any exists
    pub compute: Option<u32>,
    /// Family used for transfer work, when any exists
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    /// Resolve queue family assignments from a family table and a
    /// present-support predicate.
    pub fn resolve<F>(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: F,
    ) -> VulkanResult<Self>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let mut indices = Self::default();
        let mut transfer_score = u32::MAX;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && indices.graphics.is_none() {
                indices.graphics = Some(index);
            }

            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }

            if family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                indices.compute = Some(index);
            }

            if family.queue_flags.contains(vk::QueueFlags::TRANSFER) {
                // Prefer the most dedicated transfer family: score counts the
                // other capabilities it carries.
                let mut score = 0;
                if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    score += 1;
                }
                if family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                    score += 1;
                }
                if score < transfer_score {
                    transfer_score = score;
                    indices.transfer = Some(index);
                }
            }
        }

        if indices.graphics.is_none() {
            return Err(VulkanError::InitializationFailed(
                "no graphics queue family found".to_string(),
            ));
        }

        Ok(indices)
    }

    /// Graphics family index; resolution guarantees presence.
    pub fn graphics_family(&self) -> u32 {
        self.graphics.expect("graphics family checked at resolve")
    }
}

/// Deterministic suitability score for a physical device.
///
/// Discrete GPUs are strongly preferred; in debug builds a CPU implementation
/// is acceptable as a weak fallback. Devices missing required features or the
/// swapchain extension are unusable and score zero.
pub fn rate_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
    has_required_extensions: bool,
) -> u32 {
    if features.geometry_shader == vk::FALSE || features.sampler_anisotropy == vk::FALSE {
        return 0;
    }
    if !has_required_extensions {
        return 0;
    }

    let mut score = 1;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 100;
    }
    if cfg!(debug_assertions) && properties.device_type == vk::PhysicalDeviceType::CPU {
        score += 10;
    }
    score
}

/// Linear scan of the memory-type table for the first type whose bit is set
/// in `type_bits` and whose property flags are a superset of `required`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

/// Physical device selection result and cached capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory-type table, cached for allocation queries
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Resolved queue family assignments
    pub families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Enumerate physical devices, score each, and pick the strictly-highest
    /// scorer. Ties keep the first-found device.
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut best: Option<(u32, Self)> = None;
        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let features = unsafe { instance.get_physical_device_features(device) };
            let has_extensions = Self::supports_required_extensions(instance, device)?;

            let score = rate_device(&properties, &features, has_extensions);
            if score == 0 {
                continue;
            }
            if best.as_ref().map_or(false, |(best_score, _)| score <= *best_score) {
                continue;
            }

            let family_props =
                unsafe { instance.get_physical_device_queue_family_properties(device) };
            let families = match QueueFamilyIndices::resolve(&family_props, |index| unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)
            }) {
                Ok(families) => families,
                Err(_) => continue,
            };
            if families.present.is_none() {
                continue;
            }

            let memory_properties =
                unsafe { instance.get_physical_device_memory_properties(device) };

            best = Some((
                score,
                Self {
                    device,
                    properties,
                    features,
                    memory_properties,
                    families,
                },
            ));
        }

        let (_, info) = best.ok_or_else(|| {
            VulkanError::InitializationFailed("no suitable GPU found".to_string())
        })?;

        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
        });
        Ok(info)
    }

    fn supports_required_extensions(
        instance: &Instance,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<bool> {
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };

        let required = [SwapchainLoader::name()];
        Ok(required.iter().all(|required| {
            extensions.iter().any(|available| {
                let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
                name == *required
            })
        }))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Queue family assignments this device was built with
    pub families: QueueFamilyIndices,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per unique family index.
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let graphics_family = physical.families.graphics_family();
        let present_family = physical.families.present.ok_or_else(|| {
            VulkanError::InitializationFailed("no present queue family found".to_string())
        })?;

        let unique_families: HashSet<u32> =
            [graphics_family, present_family].iter().copied().collect();

        let queue_priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .sample_rate_shading(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            families: physical.families,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Root Vulkan context owning instance, surface, and devices.
///
/// Constructed once at startup and borrowed by every other component; no
/// component may destroy the handles it exposes.
pub struct VulkanContext {
    /// Presentation surface bound to the window
    surface: vk::SurfaceKHR,
    /// Surface extension loader
    surface_loader: Surface,
    /// Selected physical device and cached capabilities
    physical_device: PhysicalDeviceInfo,
    // Declaration order matters for Drop: the logical device must be
    // destroyed before the instance it was created from.
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create the full context for a window.
    pub fn new(window: &mut Window, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("surface creation: {}", e)))?;

        let physical_device =
            PhysicalDeviceInfo::select(&instance.instance, surface, &surface_loader)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// Raw instance reference.
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Surface handle.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader.
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Selected physical device info.
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Logical device wrapper.
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Cloned raw device handle for components that need to outlive borrows.
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Swapchain extension loader.
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Graphics queue handle.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue handle.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Resolved queue family assignments.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.families
    }

    /// Memory-type lookup against this device's memory table.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        find_memory_type(&self.physical_device.memory_properties, type_bits, required)
    }

    /// Block until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: device before instance.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn graphics_and_present_keep_first_match() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn compute_keeps_last_match() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.compute, Some(2));
    }

    #[test]
    fn transfer_prefers_dedicated_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.transfer, Some(1));
    }

    #[test]
    fn transfer_tie_keeps_first_found() {
        let families = [
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |_| Ok(true)).unwrap();
        // Both score 1; the first one found wins.
        assert_eq!(indices.transfer, Some(0));
    }

    #[test]
    fn missing_graphics_family_fails() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        assert!(QueueFamilyIndices::resolve(&families, |_| Ok(true)).is_err());
    }

    #[test]
    fn present_only_assigned_where_supported() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |index| Ok(index == 1)).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
    }

    fn device_features(geometry: bool, anisotropy: bool) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures {
            geometry_shader: geometry as vk::Bool32,
            sampler_anisotropy: anisotropy as vk::Bool32,
            ..Default::default()
        }
    }

    fn device_properties(device_type: vk::PhysicalDeviceType) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            device_type,
            ..Default::default()
        }
    }

    #[test]
    fn discrete_gpu_outscores_integrated() {
        let features = device_features(true, true);
        let discrete = rate_device(
            &device_properties(vk::PhysicalDeviceType::DISCRETE_GPU),
            &features,
            true,
        );
        let integrated = rate_device(
            &device_properties(vk::PhysicalDeviceType::INTEGRATED_GPU),
            &features,
            true,
        );
        assert!(discrete > integrated);
    }

    #[test]
    fn missing_features_or_extensions_score_zero() {
        let properties = device_properties(vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(rate_device(&properties, &device_features(false, true), true), 0);
        assert_eq!(rate_device(&properties, &device_features(true, false), true), 0);
        assert_eq!(rate_device(&properties, &device_features(true, true), false), 0);
    }

    fn memory_table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &property_flags) in flags.iter().enumerate() {
            properties.memory_types[i] = vk::MemoryType {
                property_flags,
                heap_index: 0,
            };
        }
        properties
    }

    #[test]
    fn memory_type_respects_type_bits_and_flags() {
        let table = memory_table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        // Type 1 matches the flags, and its bit is set
        assert_eq!(
            find_memory_type(&table, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        // Flags match type 1 but the bit mask excludes it
        assert_eq!(
            find_memory_type(&table, 0b01, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
        // No type carries the requested flag combination
        assert_eq!(
            find_memory_type(
                &table,
                0b11,
                vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE
            ),
            None
        );
    }

    #[test]
    fn memory_type_returns_superset_matches() {
        let table = memory_table(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        let found = find_memory_type(&table, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(found, 0);
        assert!(table.memory_types[found as usize]
            .property_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
    }
}
