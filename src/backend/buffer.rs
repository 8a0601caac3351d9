// GPU buffers
//
// One VkDeviceMemory allocation per buffer, no sub-allocation. Buffers are
// move-only and hold no device handle, so teardown is an explicit
// shutdown(ctx) call; the handles are nulled afterwards and shutdown is
// idempotent.

use ash::vk;

use super::device::DeviceContext;
use super::error::{vk_check, GfxError, Result};

/// Select a memory type index satisfying both the driver-reported type mask
/// and the requested property flags. First match wins; no scoring.
pub fn find_memory_type(
    mem: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    props: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for i in 0..mem.memory_type_count {
        let type_ok = (type_bits & (1 << i)) != 0;
        let props_ok = mem.memory_types[i as usize].property_flags.contains(props);
        if type_ok && props_ok {
            return Ok(i);
        }
    }
    Err(GfxError::Unsupported(format!(
        "no memory type matches mask {type_bits:#x} with properties {props:?}"
    )))
}

#[derive(Default)]
pub struct Buffer {
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    pub fn init(
        ctx: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_props: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        if size == 0 {
            return Err(GfxError::Unsupported("buffer size must be non-zero".into()));
        }

        let device = ctx.device();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let handle = vk_check(
            unsafe { device.create_buffer(&buffer_info, None) },
            "vkCreateBuffer",
        )?;

        let requirements = unsafe { device.get_buffer_memory_requirements(handle) };

        let memory = match find_memory_type(
            ctx.memory_properties(),
            requirements.memory_type_bits,
            memory_props,
        )
        .and_then(|index| {
            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(index);
            vk_check(
                unsafe { device.allocate_memory(&alloc_info, None) },
                "vkAllocateMemory",
            )
        }) {
            Ok(m) => m,
            Err(e) => {
                unsafe { device.destroy_buffer(handle, None) };
                return Err(e);
            }
        };

        if let Err(e) = vk_check(
            unsafe { device.bind_buffer_memory(handle, memory, 0) },
            "vkBindBufferMemory",
        ) {
            unsafe {
                device.free_memory(memory, None);
                device.destroy_buffer(handle, None);
            }
            return Err(e);
        }

        Ok(Self {
            handle,
            memory,
            size,
        })
    }

    /// Build a device-local buffer from host data via a temporary staging
    /// buffer and a blocking one-shot copy. The staging buffer is destroyed
    /// before this returns, on success and on failure alike.
    pub fn init_device_local(
        ctx: &DeviceContext,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let size = data.len() as vk::DeviceSize;

        let mut staging = Buffer::init(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        if let Err(e) = staging.upload(ctx, data, 0) {
            staging.shutdown(ctx);
            return Err(e);
        }

        let mut dst = match Buffer::init(
            ctx,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(b) => b,
            Err(e) => {
                staging.shutdown(ctx);
                return Err(e);
            }
        };

        if let Err(e) = copy_buffer(ctx, staging.handle, dst.handle, size) {
            dst.shutdown(ctx);
            staging.shutdown(ctx);
            return Err(e);
        }

        staging.shutdown(ctx);
        Ok(dst)
    }

    /// Copy bytes into a host-visible buffer. Maps, copies, unmaps.
    pub fn upload(&self, ctx: &DeviceContext, data: &[u8], offset: vk::DeviceSize) -> Result<()> {
        let len = data.len() as vk::DeviceSize;
        if offset + len > self.size {
            return Err(GfxError::Unsupported(format!(
                "upload of {len} bytes at offset {offset} exceeds buffer of {} bytes",
                self.size
            )));
        }

        let device = ctx.device();
        unsafe {
            let mapped = vk_check(
                device.map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty()),
                "vkMapMemory",
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            device.unmap_memory(self.memory);
        }
        Ok(())
    }

    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        unsafe {
            if self.handle != vk::Buffer::null() {
                device.destroy_buffer(self.handle, None);
                self.handle = vk::Buffer::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }
        self.size = 0;
    }

    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }
}

fn copy_buffer(
    ctx: &DeviceContext,
    src: vk::Buffer,
    dst: vk::Buffer,
    size: vk::DeviceSize,
) -> Result<()> {
    let cb = ctx.uploader().begin(ctx.device())?;

    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size,
    };
    unsafe {
        ctx.device().cmd_copy_buffer(cb, src, dst, &[region]);
    }

    ctx.uploader()
        .end_and_submit(ctx.device(), ctx.graphics_queue(), cb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[(vk::MemoryPropertyFlags, u32)]) -> vk::PhysicalDeviceMemoryProperties {
        let mut mem = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &(flags, heap)) in types.iter().enumerate() {
            mem.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: heap,
            };
        }
        mem
    }

    #[test]
    fn picks_first_matching_type() {
        let mem = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
        ]);
        let index = find_memory_type(&mem, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_type_mask() {
        let mem = memory_properties(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
        ]);
        // Only bit 1 allowed by the requirements mask.
        let index = find_memory_type(&mem, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn requested_flags_must_all_be_present() {
        let mem = memory_properties(&[(vk::MemoryPropertyFlags::HOST_VISIBLE, 0)]);
        let wanted =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert!(find_memory_type(&mem, 0b1, wanted).is_err());
    }

    #[test]
    fn unsupported_combination_is_an_error_not_a_wrong_index() {
        let mem = memory_properties(&[(vk::MemoryPropertyFlags::DEVICE_LOCAL, 0)]);
        let err = find_memory_type(&mem, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, GfxError::Unsupported(_)));
    }
}
