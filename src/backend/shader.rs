// SPIR-V loading
//
// Shaders are consumed as precompiled binaries. A valid blob is non-empty
// and a whole number of 4-byte words.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::error::{vk_check, GfxError, Result};

/// Read a SPIR-V file and decode it into 4-byte code units.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|e| GfxError::Shader {
        path: path.to_path_buf(),
        reason: format!("failed to read: {e}"),
    })?;

    if bytes.is_empty() {
        return Err(GfxError::Shader {
            path: path.to_path_buf(),
            reason: "file is empty".into(),
        });
    }
    if bytes.len() % 4 != 0 {
        return Err(GfxError::Shader {
            path: path.to_path_buf(),
            reason: format!("size {} is not a multiple of 4", bytes.len()),
        });
    }

    // read_spv handles the alignment of the underlying byte buffer.
    ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|e| GfxError::Shader {
        path: path.to_path_buf(),
        reason: format!("failed to decode: {e}"),
    })
}

pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
    vk_check(
        unsafe { device.create_shader_module(&create_info, None) },
        "vkCreateShaderModule",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("meshview-shader-test-{name}"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn missing_file_fails() {
        let err = load_spirv(Path::new("/definitely/not/here.spv")).unwrap_err();
        assert!(matches!(err, GfxError::Shader { .. }));
    }

    #[test]
    fn empty_file_fails() {
        let path = temp_file("empty.spv", &[]);
        let err = load_spirv(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn misaligned_file_fails() {
        let path = temp_file("odd.spv", &[1, 2, 3]);
        let err = load_spirv(&path).unwrap_err();
        assert!(err.to_string().contains("multiple of 4"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn words_decode_in_native_order() {
        // SPIR-V magic number followed by one zero word.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0723_0203u32.to_ne_bytes());
        bytes.extend_from_slice(&0u32.to_ne_bytes());
        let path = temp_file("ok.spv", &bytes);
        let words = load_spirv(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203, 0]);
        std::fs::remove_file(path).ok();
    }
}
