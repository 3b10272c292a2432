//! Vulkan renderer backend.
//!
//! Owns the instance, surface, and logical device, and resolves queue
//! families through the selection policy in [`device`]. Teardown order is
//! explicit: the surface dies with the backend, the device and instance die
//! with their wrappers, declared so field drop order destroys the device
//! before the instance.

pub mod device;

use std::collections::HashSet;
use std::ffi::{CStr, CString};

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Entry, Instance};
use slotmap::SlotMap;

use self::device::{DeviceCandidate, DeviceRequirements, QueueCaps, QueueFamilyIndices, QueueFamilyInfo};
use super::backend::{
    GlobalState, RendererBackend, RendererError, RendererResult, TextureDescriptor, TextureHandle,
};
use crate::platform::Platform;
use nalgebra::Matrix4;

#[cfg(debug_assertions)]
const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with RAII cleanup.
struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    fn new(application_name: &str, required_extensions: &[String]) -> RendererResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            RendererError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e))
        })?;

        let app_name = CString::new(application_name).map_err(|_| {
            RendererError::InitializationFailed(format!(
                "application name {:?} contains an interior NUL",
                application_name
            ))
        })?;
        let engine_name = CString::new("Keel Engine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| {
                CString::new(ext.as_str()).map_err(|_| {
                    RendererError::InitializationFailed(format!(
                        "platform extension {:?} contains an interior NUL",
                        ext
                    ))
                })
            })
            .collect::<RendererResult<_>>()?;

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        extensions.push(DebugUtils::name().as_ptr());

        #[cfg(debug_assertions)]
        Self::verify_validation_layer(&entry)?;

        #[cfg(debug_assertions)]
        let layer_names = vec![CString::new(VALIDATION_LAYER).unwrap()];
        #[cfg(not(debug_assertions))]
        let layer_names: Vec<CString> = vec![];

        let layer_name_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_name_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        };

        log::info!("Vulkan instance created");

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    /// Debug builds refuse to run without the Khronos validation layer.
    #[cfg(debug_assertions)]
    fn verify_validation_layer(entry: &Entry) -> RendererResult<()> {
        let available = entry.enumerate_instance_layer_properties()?;
        let found = available.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_string_lossy() == VALIDATION_LAYER
        });
        if found {
            Ok(())
        } else {
            Err(RendererError::InitializationFailed(format!(
                "validation layer {} is not installed",
                VALIDATION_LAYER
            )))
        }
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(
        debug_utils: &DebugUtils,
    ) -> RendererResult<vk::DebugUtilsMessengerEXT> {
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
            .pfn_user_callback(Some(vulkan_debug_callback));

        Ok(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Validation layer message relay.
#[cfg(debug_assertions)]
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Logical device wrapper with RAII cleanup.
struct LogicalDevice {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
}

impl LogicalDevice {
    fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        indices: &QueueFamilyIndices,
    ) -> RendererResult<Self> {
        let (graphics_family, present_family, transfer_family) =
            match (indices.graphics, indices.present, indices.transfer) {
                (Some(g), Some(p), Some(t)) => (g, p, t),
                _ => return Err(RendererError::NoSuitableDevice),
            };

        let unique_families: HashSet<u32> = [graphics_family, present_family, transfer_family]
            .iter()
            .cloned()
            .chain(indices.compute)
            .collect();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&[1.0])
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None)? };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let transfer_queue = unsafe { device.get_device_queue(transfer_family, 0) };

        log::info!("Vulkan logical device created");

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            transfer_queue,
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

/// The Vulkan implementation of the renderer operation table.
pub struct VulkanBackend {
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    physical_device: vk::PhysicalDevice,
    queue_indices: QueueFamilyIndices,
    device: LogicalDevice,
    instance: VulkanInstance,
    framebuffer_size: (u32, u32),
    textures: SlotMap<TextureHandle, TextureDescriptor>,
    surface_destroyed: bool,
}

impl VulkanBackend {
    /// Brings up instance, surface, and device against `platform`'s window.
    pub fn new(application_name: &str, platform: &mut dyn Platform) -> RendererResult<Self> {
        let required_extensions = platform.required_vulkan_extensions()?;
        let instance = VulkanInstance::new(application_name, &required_extensions)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = platform.create_vulkan_surface(instance.instance.handle())?;

        let (devices, candidates) =
            gather_candidates(&instance.instance, surface, &surface_loader)?;
        let requirements = DeviceRequirements::default();
        let (position, queue_indices) = device::select_device(&candidates, &requirements)
            .ok_or(RendererError::NoSuitableDevice)?;
        let physical_device = devices[position];
        log_device_info(&instance.instance, physical_device, &queue_indices);

        let device = LogicalDevice::new(&instance.instance, physical_device, &queue_indices)?;
        let framebuffer_size = platform.framebuffer_size();

        log::info!("Vulkan renderer backend initialized");

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            queue_indices,
            device,
            instance,
            framebuffer_size,
            textures: SlotMap::with_key(),
            surface_destroyed: false,
        })
    }

    /// The selected physical device.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Queue family assignments resolved at selection time.
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_indices
    }

    /// The graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// The present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// The transfer queue.
    pub fn transfer_queue(&self) -> vk::Queue {
        self.device.transfer_queue
    }

    fn destroy_surface(&mut self) {
        if self.surface_destroyed {
            return;
        }
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        self.surface_destroyed = true;
    }
}

impl RendererBackend for VulkanBackend {
    fn shutdown(&mut self) {
        log::debug!("Vulkan renderer backend shutting down");
        self.textures.clear();
        self.destroy_surface();
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.framebuffer_size = (width, height);
        log::debug!("Vulkan backend resized to {}x{}", width, height);
        // TODO: recreate the swapchain here once the swapchain layer lands.
    }

    fn begin_frame(&mut self, delta_time: f32) -> bool {
        if self.surface_destroyed {
            return false;
        }
        // A zero-area framebuffer means the window is minimized; nothing to
        // present against until the next real resize.
        let (width, height) = self.framebuffer_size;
        if width == 0 || height == 0 {
            return false;
        }
        log::trace!("begin_frame dt={:.4}", delta_time);
        true
    }

    fn update_global_state(&mut self, state: &GlobalState) {
        log::trace!("global state updated, mode={}", state.mode);
    }

    fn update_object(&mut self, _model: &Matrix4<f32>) {
        log::trace!("object transform updated");
    }

    fn end_frame(&mut self, delta_time: f32) -> bool {
        log::trace!("end_frame dt={:.4}", delta_time);
        true
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        _pixels: &[u8],
    ) -> RendererResult<TextureHandle> {
        // TODO: upload via a staging buffer once the buffer layer lands.
        let handle = self.textures.insert(descriptor.clone());
        log::debug!(
            "registered texture {} ({}x{})",
            descriptor.name,
            descriptor.width,
            descriptor.height
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<()> {
        match self.textures.remove(handle) {
            Some(descriptor) => {
                log::debug!("destroyed texture {}", descriptor.name);
                Ok(())
            }
            None => Err(RendererError::UnknownTexture),
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        self.destroy_surface();
        // device and instance wrappers drop after this body, in declaration
        // order, so the device is destroyed before the instance.
    }
}

/// Snapshot every physical device into plain selection data.
fn gather_candidates(
    instance: &Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &Surface,
) -> RendererResult<(Vec<vk::PhysicalDevice>, Vec<DeviceCandidate>)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    let mut candidates = Vec::with_capacity(devices.len());

    for &physical_device in &devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let features = unsafe { instance.get_physical_device_features(physical_device) };
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let mut queue_families = Vec::with_capacity(families.len());
        for (index, family) in families.iter().enumerate() {
            let mut caps = QueueCaps::empty();
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                caps |= QueueCaps::GRAPHICS;
            }
            if family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                caps |= QueueCaps::COMPUTE;
            }
            if family.queue_flags.contains(vk::QueueFlags::TRANSFER) {
                caps |= QueueCaps::TRANSFER;
            }

            let present_support = unsafe {
                surface_loader.get_physical_device_surface_support(
                    physical_device,
                    index as u32,
                    surface,
                )?
            };
            if present_support {
                caps |= QueueCaps::PRESENT;
            }

            queue_families.push(QueueFamilyInfo {
                caps,
                queue_count: family.queue_count,
            });
        }

        let extensions =
            unsafe { instance.enumerate_device_extension_properties(physical_device)? }
                .iter()
                .map(|ext| {
                    unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();

        let surface_format_count = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        }
        .len() as u32;
        let present_mode_count = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        }
        .len() as u32;

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        candidates.push(DeviceCandidate {
            name,
            discrete: properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families,
            extensions,
            surface_format_count,
            present_mode_count,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        });
    }

    Ok((devices, candidates))
}

/// Log the selected device the way a driver report reads.
fn log_device_info(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    indices: &QueueFamilyIndices,
) {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let memory = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    let device_type = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
        vk::PhysicalDeviceType::CPU => "cpu",
        _ => "other",
    };
    log::info!("GPU type: {}", device_type);
    log::info!(
        "GPU driver version: {}.{}.{}",
        vk::api_version_major(properties.driver_version),
        vk::api_version_minor(properties.driver_version),
        vk::api_version_patch(properties.driver_version)
    );
    log::info!(
        "Vulkan API version: {}.{}.{}",
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );

    for heap in &memory.memory_heaps[..memory.memory_heap_count as usize] {
        let size_gib = heap.size as f32 / (1024.0 * 1024.0 * 1024.0);
        if heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL) {
            log::info!("Local GPU memory: {:.2} GiB", size_gib);
        } else {
            log::info!("Shared system memory: {:.2} GiB", size_gib);
        }
    }

    log::info!(
        "Queue families | graphics: {:?} present: {:?} compute: {:?} transfer: {:?}",
        indices.graphics,
        indices.present,
        indices.compute,
        indices.transfer
    );
}
