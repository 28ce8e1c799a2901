//! Pre-compiled shader blob loading

use std::path::Path;
use crate::assets::AssetError;

/// Read a compiled shader binary from disk
///
/// The bytes are returned untouched; the driver validates them when the shader
/// module is created.
pub fn load_shader<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, AssetError> {
    let path_ref = path.as_ref();
    log::debug!("[SHADER] Loading shader from: {:?}", path_ref);

    let bytes = std::fs::read(path_ref).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssetError::NotFound(path_ref.display().to_string()),
        _ => AssetError::IoError(e),
    })?;

    log::debug!("[SHADER] Read {} bytes from {:?}", bytes.len(), path_ref);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_bytes_verbatim() {
        let path = std::env::temp_dir().join(format!("vk_renderer_blob_{}.spv", std::process::id()));
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0xAA]).unwrap();

        let bytes = load_shader(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(bytes, vec![0x03, 0x02, 0x23, 0x07, 0xAA]);
    }

    #[test]
    fn test_missing_shader_is_not_found() {
        let result = load_shader("missing/shader.vert.spv");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}
