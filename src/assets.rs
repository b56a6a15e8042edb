use crate::error::CanvasError;
use base64::Engine;
use image::GenericImageView;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fetches raw asset bytes for a URL. Implementations must be shareable across
/// threads since the background and logo are fetched concurrently.
pub trait AssetLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Vec<u8>, CanvasError>;
}

/// Resolves `data:` URIs, `file://` URLs and plain paths (relative ones against
/// an optional base directory).
#[derive(Debug, Clone, Default)]
pub struct FsAssetLoader {
    base_dir: Option<PathBuf>,
}

impl FsAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl AssetLoader for FsAssetLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, CanvasError> {
        if url.starts_with("data:") {
            return parse_data_uri(url);
        }
        if let Some((scheme, _)) = url.split_once("://") {
            if scheme.eq_ignore_ascii_case("file") {
                let raw = &url[scheme.len() + 3..];
                return std::fs::read(raw).map_err(|err| CanvasError::asset(url, err.to_string()));
            }
            return Err(CanvasError::asset(
                url,
                format!("unsupported url scheme '{scheme}'"),
            ));
        }
        std::fs::read(self.resolve_path(url)).map_err(|err| CanvasError::asset(url, err.to_string()))
    }
}

/// Serves assets from memory, keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLoader {
    assets: BTreeMap<String, Vec<u8>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        self.assets.insert(url.into(), data);
        self
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, CanvasError> {
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| CanvasError::asset(url, "no such asset"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEncoding {
    // JPEG bytes embedded as-is.
    Dct { data: Vec<u8>, gray: bool },
    // 8-bit RGB samples with an optional 8-bit alpha plane.
    Raw { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
}

impl DecodedImage {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

pub fn decode_image_bytes(url: &str, data: &[u8]) -> Result<DecodedImage, CanvasError> {
    let format = image::guess_format(data).map_err(|err| CanvasError::asset(url, err.to_string()))?;
    let decoded =
        image::load_from_memory(data).map_err(|err| CanvasError::asset(url, err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(CanvasError::asset(url, "image has no pixels"));
    }

    if format == image::ImageFormat::Jpeg {
        let gray = matches!(
            decoded.color(),
            image::ColorType::L8 | image::ColorType::La8
        );
        return Ok(DecodedImage {
            width,
            height,
            encoding: ImageEncoding::Dct {
                data: data.to_vec(),
                gray,
            },
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(DecodedImage {
        width,
        height,
        encoding: ImageEncoding::Raw {
            rgb,
            alpha: has_alpha.then_some(alpha),
        },
    })
}

pub fn load_image(loader: &dyn AssetLoader, url: &str) -> Result<Arc<DecodedImage>, CanvasError> {
    let bytes = loader.load(url)?;
    decode_image_bytes(url, &bytes).map(Arc::new)
}

/// Images a generation needs before any drawing starts.
#[derive(Debug, Clone, Default)]
pub struct LoadedAssets {
    pub background: Option<Arc<DecodedImage>>,
    pub logo: Option<Arc<DecodedImage>>,
}

/// Fetches and decodes the background and logo concurrently. Either failure
/// fails the whole load; the background error wins when both fail.
pub fn load_page_assets(
    loader: &dyn AssetLoader,
    background: Option<&str>,
    logo: Option<&str>,
) -> Result<LoadedAssets, CanvasError> {
    let (background, logo) = rayon::join(
        || background.map(|url| load_image(loader, url)).transpose(),
        || logo.map(|url| load_image(loader, url)).transpose(),
    );
    Ok(LoadedAssets {
        background: background?,
        logo: logo?,
    })
}

/// Payload bytes of a `data:` URI. The media type is not needed since images
/// are sniffed from their bytes.
fn parse_data_uri(uri: &str) -> Result<Vec<u8>, CanvasError> {
    let Some((header, data_part)) = uri.split_once(',') else {
        return Err(CanvasError::asset(
            truncate_url(uri),
            "data uri is missing a ',' separator",
        ));
    };
    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .map_err(|err| CanvasError::asset(truncate_url(uri), err.to_string()))
    } else {
        Ok(data_part.as_bytes().to_vec())
    }
}

fn truncate_url(url: &str) -> &str {
    match url.char_indices().nth(48) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, alpha]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).expect("encode png");
        out.into_inner()
    }

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height, 255))
        )
    }

    #[test]
    fn data_uri_png_decodes_to_raw_rgb() {
        let uri = png_data_uri(3, 2);
        let image = load_image(&FsAssetLoader::new(), &uri).expect("decode");
        assert_eq!((image.width, image.height), (3, 2));
        match &image.encoding {
            ImageEncoding::Raw { rgb, alpha } => {
                assert_eq!(rgb.len(), 3 * 2 * 3);
                assert_eq!(&rgb[..3], &[10, 20, 30]);
                assert!(alpha.is_none());
            }
            other => panic!("unexpected encoding {other:?}"),
        }
    }

    #[test]
    fn translucent_png_keeps_alpha_plane() {
        let bytes = png_bytes(2, 2, 128);
        let image = decode_image_bytes("mem://logo", &bytes).expect("decode");
        match image.encoding {
            ImageEncoding::Raw { alpha: Some(alpha), .. } => assert_eq!(alpha, vec![128; 4]),
            other => panic!("expected alpha, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_bytes_are_asset_errors() {
        let err = decode_image_bytes("bg.jpg", b"definitely not an image").expect_err("bad");
        assert!(matches!(err, CanvasError::AssetLoad { ref url, .. } if url == "bg.jpg"));
    }

    #[test]
    fn fs_loader_reports_missing_files_and_schemes() {
        let loader = FsAssetLoader::with_base_dir(std::env::temp_dir());
        let missing = format!(
            "canvasform_missing_{}_{}.png",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        );
        let err = loader.load(&missing).expect_err("missing");
        assert!(matches!(err, CanvasError::AssetLoad { .. }));

        let err = loader.load("https://example.com/bg.jpg").expect_err("scheme");
        assert!(err.to_string().contains("unsupported url scheme"));
    }

    #[test]
    fn fs_loader_reads_relative_paths_against_base_dir() {
        let dir = std::env::temp_dir().join(format!(
            "canvasform_assets_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("logo.png"), png_bytes(4, 4, 255)).expect("write");
        let loader = FsAssetLoader::with_base_dir(&dir);
        let image = load_image(&loader, "logo.png").expect("load");
        assert_eq!(image.width, 4);
        let url = format!("file://{}", dir.join("logo.png").display());
        assert_eq!(loader.load(&url).expect("file url").len(), png_bytes(4, 4, 255).len());
    }

    #[test]
    fn page_assets_fail_when_either_fetch_fails() {
        let loader = MemoryAssetLoader::new().insert("bg", png_bytes(8, 4, 255));
        let assets = load_page_assets(&loader, Some("bg"), None).expect("bg only");
        assert!(assets.background.is_some());
        assert!(assets.logo.is_none());

        let err = load_page_assets(&loader, Some("bg"), Some("logo")).expect_err("logo missing");
        assert!(matches!(err, CanvasError::AssetLoad { ref url, .. } if url == "logo"));
    }

    #[test]
    fn malformed_data_uri_is_rejected() {
        let err = FsAssetLoader::new()
            .load("data:image/png;base64")
            .expect_err("no comma");
        assert!(err.to_string().contains("separator"));
        let err = FsAssetLoader::new()
            .load("data:image/png;base64,@@@")
            .expect_err("bad base64");
        assert!(matches!(err, CanvasError::AssetLoad { .. }));
    }

    #[test]
    fn data_uri_payload_is_returned_as_bytes() {
        let loader = FsAssetLoader::new();
        assert_eq!(loader.load("data:,plain").expect("plain"), b"plain");
        assert_eq!(
            loader.load("data:text/plain;base64,aGk=").expect("base64"),
            b"hi"
        );
    }
}
