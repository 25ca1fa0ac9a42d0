//! Image probing.
//!
//! Reads just enough of an image file to learn its format and pixel size, and
//! enforces the limits a tree image must satisfy before it is embedded.

use crate::error::ProbeError;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions accepted for embedded images.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Maximum image file size: 10 MiB
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// Size limits for an embedded image.
#[derive(Debug, Clone, Copy)]
pub struct ProbeLimits {
    pub max_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ProbeLimits {
    /// Limits for the main tree picture.
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
            max_width: 2000,
            max_height: 2000,
        }
    }
}

/// A probed image, ready to embed.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Resolve a record's image path under the image root.
///
/// Absolute paths and `..` components are refused: records are untrusted and
/// the image root is the only place images are read from.
pub fn resolve_image_path(image_root: &Path, relative: &str) -> Result<PathBuf, ProbeError> {
    let rel = Path::new(relative);
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if relative.trim().is_empty() || escapes {
        return Err(ProbeError::OutsideRoot(relative.to_string()));
    }
    Ok(image_root.join(rel))
}

/// Load and check an image against `limits`.
pub fn probe_image(path: &Path, limits: &ProbeLimits) -> Result<ImageInfo, ProbeError> {
    let metadata = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(ProbeError::Missing(path.to_path_buf())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProbeError::Missing(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };

    let ext_allowed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !ext_allowed {
        return Err(ProbeError::UnsupportedExtension {
            path: path.to_path_buf(),
            allowed: ALLOWED_EXTENSIONS.join(", "),
        });
    }

    if metadata.len() > limits.max_bytes {
        return Err(ProbeError::TooLarge {
            size: metadata.len(),
            max: limits.max_bytes,
        });
    }

    let bytes = fs::read(path)?;
    let (format, width, height) =
        sniff_dimensions(&bytes).ok_or_else(|| ProbeError::Unrecognized(path.to_path_buf()))?;

    if width > limits.max_width || height > limits.max_height {
        return Err(ProbeError::TooManyPixels {
            width,
            height,
            max_width: limits.max_width,
            max_height: limits.max_height,
        });
    }

    Ok(ImageInfo {
        format,
        width,
        height,
        bytes,
    })
}

/// Detect the image format from its magic bytes and read the pixel size.
pub fn sniff_dimensions(bytes: &[u8]) -> Option<(ImageFormat, u32, u32)> {
    if bytes.starts_with(PNG_SIGNATURE) {
        // IHDR is always the first chunk
        if bytes.get(12..16)? != b"IHDR" {
            return None;
        }
        let width = be_u32(bytes, 16)?;
        let height = be_u32(bytes, 20)?;
        return nonzero(ImageFormat::Png, width, height);
    }

    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        let width = le_u16(bytes, 6)? as u32;
        let height = le_u16(bytes, 8)? as u32;
        return nonzero(ImageFormat::Gif, width, height);
    }

    if bytes.starts_with(b"BM") {
        let width = le_i32(bytes, 18)?.unsigned_abs();
        // negative height marks a top-down bitmap
        let height = le_i32(bytes, 22)?.unsigned_abs();
        return nonzero(ImageFormat::Bmp, width, height);
    }

    if bytes.starts_with(&[0xFF, 0xD8]) {
        return jpeg_dimensions(bytes);
    }

    None
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(ImageFormat, u32, u32)> {
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        // skip fill bytes
        while *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            // standalone markers carry no length
            0x01 | 0xD0..=0xD8 => pos += 2,
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(bytes, pos + 5)? as u32;
                let width = be_u16(bytes, pos + 7)? as u32;
                return nonzero(ImageFormat::Jpeg, width, height);
            }
            _ => {
                let len = be_u16(bytes, pos + 2)? as usize;
                if len < 2 {
                    return None;
                }
                pos += 2 + len;
            }
        }
    }
}

fn nonzero(format: ImageFormat, width: u32, height: u32) -> Option<(ImageFormat, u32, u32)> {
    (width > 0 && height > 0).then_some((format, width, height))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn le_i32(bytes: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Minimal valid-header PNG of the given size, for tests in this workspace.
#[doc(hidden)]
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sniff_png() {
        assert_eq!(
            sniff_dimensions(&png_header(800, 600)),
            Some((ImageFormat::Png, 800, 600))
        );
    }

    #[test]
    fn test_sniff_gif() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&300u16.to_le_bytes());
        gif.extend_from_slice(&200u16.to_le_bytes());
        assert_eq!(sniff_dimensions(&gif), Some((ImageFormat::Gif, 300, 200)));
    }

    #[test]
    fn test_sniff_bmp_top_down() {
        let mut bmp = vec![0u8; 26];
        bmp[0] = b'B';
        bmp[1] = b'M';
        bmp[18..22].copy_from_slice(&640i32.to_le_bytes());
        bmp[22..26].copy_from_slice(&(-480i32).to_le_bytes());
        assert_eq!(sniff_dimensions(&bmp), Some((ImageFormat::Bmp, 640, 480)));
    }

    #[test]
    fn test_sniff_jpeg_skips_app_segments() {
        let mut jpeg = vec![0xFF, 0xD8];
        // APP0 with 4 bytes of payload
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
        // SOF0: length, precision, height, width
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        jpeg.extend_from_slice(&120u16.to_be_bytes());
        jpeg.extend_from_slice(&160u16.to_be_bytes());
        assert_eq!(sniff_dimensions(&jpeg), Some((ImageFormat::Jpeg, 160, 120)));
    }

    #[test]
    fn test_sniff_garbage() {
        assert_eq!(sniff_dimensions(b"not an image"), None);
        assert_eq!(sniff_dimensions(&[0xFF, 0xD8, 0x00]), None);
        assert_eq!(sniff_dimensions(&png_header(0, 10)), None);
    }

    #[test]
    fn test_resolve_image_path_refuses_escape() {
        let root = Path::new("/srv/imagenes");
        assert_eq!(
            resolve_image_path(root, "arboles/roble.png").unwrap(),
            root.join("arboles/roble.png")
        );
        assert!(resolve_image_path(root, "../secret.png").is_err());
        assert!(resolve_image_path(root, "/etc/passwd").is_err());
        assert!(resolve_image_path(root, "").is_err());
    }

    #[test]
    fn test_probe_missing() {
        let dir = TempDir::new().unwrap();
        let err = probe_image(&dir.path().join("nope.png"), &ProbeLimits::default()).unwrap_err();
        assert!(matches!(err, ProbeError::Missing(_)));
    }

    #[test]
    fn test_probe_limits() {
        let dir = TempDir::new().unwrap();
        let ok = dir.path().join("ok.png");
        std::fs::write(&ok, png_header(1200, 800)).unwrap();
        let info = probe_image(&ok, &ProbeLimits::default()).unwrap();
        assert_eq!((info.width, info.height), (1200, 800));

        let huge = dir.path().join("huge.png");
        std::fs::write(&huge, png_header(4000, 100)).unwrap();
        assert!(matches!(
            probe_image(&huge, &ProbeLimits::default()),
            Err(ProbeError::TooManyPixels { .. })
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, png_header(10, 10)).unwrap();
        assert!(matches!(
            probe_image(&text, &ProbeLimits::default()),
            Err(ProbeError::UnsupportedExtension { .. })
        ));

        let tiny = ProbeLimits {
            max_bytes: 4,
            ..ProbeLimits::default()
        };
        assert!(matches!(
            probe_image(&ok, &tiny),
            Err(ProbeError::TooLarge { .. })
        ));
    }
}
