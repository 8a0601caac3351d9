// Device context - the GPU connection
//
// Owns everything up to the logical device: instance, optional debug
// messenger, presentable surface, physical device, device, queues, and the
// upload helper. Built first, destroyed last.
//
// Device selection is first-match: a device qualifies when it offers a
// graphics queue family, a present-capable queue family (possibly the same)
// and VK_KHR_swapchain. No scoring among multiple matches.

use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::error::{vk_check, GfxError, Result};
use super::upload::Uploader;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct CreateInfo {
    pub enable_validation: bool,
    pub enable_debug_utils: bool,
}

pub struct DeviceContext {
    _entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_queue_family: u32,
    present_queue_family: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    uploader: Uploader,
    destroyed: bool,
}

impl DeviceContext {
    /// Establish the GPU connection end-to-end. On failure every
    /// already-created piece is torn down before the error is returned.
    pub fn init(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        info: &CreateInfo,
    ) -> Result<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            GfxError::Unsupported(format!("failed to load the Vulkan library: {e}"))
        })?;

        let instance = create_instance(&entry, display, info)?;

        let debug_utils = match setup_debug_messenger(&entry, &instance, info) {
            Ok(d) => d,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let surface_loader = khr::Surface::new(&entry, &instance);

        let (display05, window05) = match (
            super::rwh_compat::display_to_05(display),
            super::rwh_compat::window_to_05(window),
        ) {
            (Ok(d), Ok(w)) => (d, w),
            (Err(e), _) | (_, Err(e)) => {
                destroy_partial(&instance, &surface_loader, vk::SurfaceKHR::null(), debug_utils);
                return Err(e);
            }
        };

        let surface = match vk_check(
            unsafe { ash_window::create_surface(&entry, &instance, display05, window05, None) },
            "vkCreateSurfaceKHR",
        ) {
            Ok(s) => s,
            Err(e) => {
                destroy_partial(&instance, &surface_loader, vk::SurfaceKHR::null(), debug_utils);
                return Err(e);
            }
        };

        let (physical_device, graphics_queue_family, present_queue_family) =
            match pick_physical_device(&instance, &surface_loader, surface) {
                Ok(p) => p,
                Err(e) => {
                    destroy_partial(&instance, &surface_loader, surface, debug_utils);
                    return Err(e);
                }
            };

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!("Selected GPU: {}", name.to_string_lossy());
        log::debug!(
            "Queue families: graphics={graphics_queue_family} present={present_queue_family}"
        );

        let (device, graphics_queue, present_queue) = match create_device(
            &instance,
            physical_device,
            graphics_queue_family,
            present_queue_family,
        ) {
            Ok(d) => d,
            Err(e) => {
                destroy_partial(&instance, &surface_loader, surface, debug_utils);
                return Err(e);
            }
        };

        let uploader = match Uploader::init(&device, graphics_queue_family) {
            Ok(u) => u,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                destroy_partial(&instance, &surface_loader, surface, debug_utils);
                return Err(e);
            }
        };

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Ok(Self {
            _entry: entry,
            instance,
            debug_utils,
            surface_loader,
            surface,
            physical_device,
            device,
            graphics_queue,
            present_queue,
            graphics_queue_family,
            present_queue_family,
            memory_properties,
            uploader,
            destroyed: false,
        })
    }

    /// Release everything in reverse dependency order:
    /// uploader, device, surface, debug messenger, instance.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.destroyed {
            return;
        }

        self.uploader.shutdown(&self.device);

        unsafe {
            self.device.destroy_device(None);

            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
                self.surface = vk::SurfaceKHR::null();
            }

            if let Some((utils, messenger)) = self.debug_utils.take() {
                utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }

        self.destroyed = true;
    }

    pub fn wait_idle(&self) -> Result<()> {
        vk_check(unsafe { self.device.device_wait_idle() }, "vkDeviceWaitIdle")
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &khr::Surface {
        &self.surface_loader
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    pub fn present_queue_family(&self) -> u32 {
        self.present_queue_family
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }
}

fn destroy_partial(
    instance: &ash::Instance,
    surface_loader: &khr::Surface,
    surface: vk::SurfaceKHR,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
) {
    unsafe {
        if surface != vk::SurfaceKHR::null() {
            surface_loader.destroy_surface(surface, None);
        }
        if let Some((utils, messenger)) = debug_utils {
            utils.destroy_debug_utils_messenger(messenger, None);
        }
        instance.destroy_instance(None);
    }
}

fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    info: &CreateInfo,
) -> Result<ash::Instance> {
    let app_info = vk::ApplicationInfo::builder()
        .application_name(c"meshview")
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"meshview")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_1);

    // Surface extensions come from the windowing layer.
    let display05 = super::rwh_compat::display_to_05(display)?;
    let required = vk_check(
        ash_window::enumerate_required_extensions(display05),
        "enumerate_required_extensions",
    )?;
    let mut extensions = required.to_vec();

    if info.enable_validation && info.enable_debug_utils {
        extensions.push(DebugUtils::name().as_ptr());
    }

    let mut layers = Vec::new();
    if info.enable_validation {
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    vk_check(
        unsafe { entry.create_instance(&create_info, None) },
        "vkCreateInstance",
    )
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    info: &CreateInfo,
) -> Result<Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>> {
    if !(info.enable_validation && info.enable_debug_utils) {
        return Ok(None);
    }

    let utils = DebugUtils::new(entry, instance);

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

    let messenger = vk_check(
        unsafe { utils.create_debug_utils_messenger(&create_info, None) },
        "vkCreateDebugUtilsMessengerEXT",
    )?;

    Ok(Some((utils, messenger)))
}

fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &khr::Surface,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, u32)> {
    let devices = vk_check(
        unsafe { instance.enumerate_physical_devices() },
        "vkEnumeratePhysicalDevices",
    )?;

    if devices.is_empty() {
        return Err(GfxError::Unsupported(
            "no Vulkan physical devices found".into(),
        ));
    }

    for pd in devices {
        let Some((graphics, present)) = find_queue_families(instance, surface_loader, surface, pd)?
        else {
            continue;
        };
        if !has_device_extension(instance, pd, khr::Swapchain::name())? {
            continue;
        }
        return Ok((pd, graphics, present));
    }

    Err(GfxError::Unsupported(
        "no physical device offers graphics, presentation and VK_KHR_swapchain".into(),
    ))
}

/// First queue family with graphics support and first with presentation
/// support to the given surface. They may coincide.
fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &khr::Surface,
    surface: vk::SurfaceKHR,
    pd: vk::PhysicalDevice,
) -> Result<Option<(u32, u32)>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(pd) };

    let mut graphics = None;
    let mut present = None;

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;

        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(i);
        }

        if present.is_none() {
            let supported = vk_check(
                unsafe {
                    surface_loader.get_physical_device_surface_support(pd, i, surface)
                },
                "vkGetPhysicalDeviceSurfaceSupportKHR",
            )?;
            if supported {
                present = Some(i);
            }
        }

        if let (Some(g), Some(p)) = (graphics, present) {
            return Ok(Some((g, p)));
        }
    }

    Ok(None)
}

fn has_device_extension(
    instance: &ash::Instance,
    pd: vk::PhysicalDevice,
    name: &CStr,
) -> Result<bool> {
    let props = vk_check(
        unsafe { instance.enumerate_device_extension_properties(pd) },
        "vkEnumerateDeviceExtensionProperties",
    )?;
    Ok(props
        .iter()
        .any(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) } == name))
}

fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
    present_queue_family: u32,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let priorities = [1.0f32];

    let mut queue_infos = vec![vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(&priorities)
        .build()];
    if present_queue_family != graphics_queue_family {
        queue_infos.push(
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(present_queue_family)
                .queue_priorities(&priorities)
                .build(),
        );
    }

    let mut extensions = vec![khr::Swapchain::name().as_ptr()];
    if has_device_extension(instance, physical_device, vk::KhrPortabilitySubsetFn::name())? {
        extensions.push(vk::KhrPortabilitySubsetFn::name().as_ptr());
    }

    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = vk_check(
        unsafe { instance.create_device(physical_device, &create_info, None) },
        "vkCreateDevice",
    )?;

    let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
    let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

    Ok((device, graphics_queue, present_queue))
}

// Forwards driver diagnostics to the logger; never alters control flow.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
