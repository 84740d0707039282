use anyhow::{Context, Result, anyhow};
use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

use super::stext::{StextPage, parse_stext};
use super::{ImageInfo, PageSize, Raster, SourceDocument, TextSpan};

/// Scale used to rasterize pages when cropping embedded images for OCR.
const IMAGE_CROP_SCALE: f32 = 2.0;

/// A PDF opened through the MuPDF command line tool.
///
/// The structured text of every page is read once on open; rasters are
/// rendered on demand.
pub struct MutoolDocument {
    path: PathBuf,
    pages: Vec<StextPage>,
    page_cache: RefCell<Option<(usize, Raster)>>,
}

impl MutoolDocument {
    pub fn open(path: &Path) -> Result<Self> {
        if !command_exists("mutool") {
            return Err(anyhow!(
                "pdf parsing requires mutool (install mupdf-tools)"
            ));
        }
        let dir = tempfile::tempdir().with_context(|| "failed to create temp dir for mutool")?;
        let stext_path = dir.path().join("document.stext.xml");
        let output = Command::new("mutool")
            .arg("draw")
            .arg("-q")
            .arg("-F")
            .arg("stext")
            .arg("-O")
            .arg("preserve-images")
            .arg("-o")
            .arg(&stext_path)
            .arg(path)
            .output()
            .with_context(|| "failed to run mutool draw")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mutool draw failed: {}", stderr.trim()));
        }
        let xml = fs::read_to_string(&stext_path)
            .with_context(|| "failed to read mutool structured text")?;
        let pages = parse_stext(&xml)
            .with_context(|| format!("failed to read text layer of {}", path.display()))?;
        debug!("opened {} ({} pages)", path.display(), pages.len());
        Ok(Self {
            path: path.to_path_buf(),
            pages,
            page_cache: RefCell::new(None),
        })
    }

    fn page(&self, index: usize) -> Result<&StextPage> {
        self.pages.get(index).ok_or_else(|| {
            anyhow!(
                "page index {} out of range ({} pages)",
                index,
                self.pages.len()
            )
        })
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<Raster> {
        self.page(index)?;
        let dir = TempDir::new().with_context(|| "failed to create temp dir for rendering")?;
        let output_path = dir.path().join("page.png");
        let dpi = (72.0 * scale).round().max(1.0);
        let output = Command::new("mutool")
            .arg("draw")
            .arg("-q")
            .arg("-r")
            .arg(format!("{}", dpi))
            .arg("-o")
            .arg(&output_path)
            .arg(&self.path)
            .arg((index + 1).to_string())
            .output()
            .with_context(|| "failed to run mutool")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mutool failed: {}", stderr.trim()));
        }
        let bytes = fs::read(&output_path).with_context(|| "failed to read rendered pdf page")?;
        Raster::decode(&bytes)
    }
}

impl SourceDocument for MutoolDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width,
            height: page.height,
        })
    }

    fn text_layer(&self, index: usize) -> Result<Vec<TextSpan>> {
        Ok(self.page(index)?.spans.clone())
    }

    fn images(&self, index: usize) -> Result<Vec<ImageInfo>> {
        let page = self.page(index)?;
        Ok(page
            .images
            .iter()
            .enumerate()
            .map(|(n, bbox)| ImageInfo {
                id: image_id(index, n),
                bbox: Some(*bbox),
            })
            .collect())
    }

    /// Image pixels are cropped from the rendered page, so they include
    /// anything painted over the image.
    fn image_bytes(&self, id: &str) -> Result<Vec<u8>> {
        let (index, n) = parse_image_id(id)?;
        let bbox = self
            .page(index)?
            .images
            .get(n)
            .copied()
            .ok_or_else(|| anyhow!("unknown image '{}'", id))?;

        let mut cache = self.page_cache.borrow_mut();
        let cached = matches!(cache.as_ref(), Some((page, _)) if *page == index);
        if !cached {
            *cache = Some((index, self.render_page(index, IMAGE_CROP_SCALE)?));
        }
        let (_, raster) = cache
            .as_ref()
            .ok_or_else(|| anyhow!("page raster cache is empty"))?;
        raster.crop(&bbox.scaled(IMAGE_CROP_SCALE))?.to_png()
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<Raster> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(anyhow!("invalid raster scale {}", scale));
        }
        self.render_page(index, scale)
    }
}

fn image_id(page_index: usize, n: usize) -> String {
    format!("{}:{}", page_index + 1, n)
}

fn parse_image_id(id: &str) -> Result<(usize, usize)> {
    let (page, n) = id
        .split_once(':')
        .ok_or_else(|| anyhow!("malformed image id '{}'", id))?;
    let page: usize = page
        .parse()
        .with_context(|| format!("malformed image id '{}'", id))?;
    let n: usize = n
        .parse()
        .with_context(|| format!("malformed image id '{}'", id))?;
    if page == 0 {
        return Err(anyhow!("malformed image id '{}'", id));
    }
    Ok((page - 1, n))
}

pub(crate) fn command_exists(cmd: &str) -> bool {
    let path = Path::new(cmd);
    if path.components().count() > 1 {
        return is_executable(path);
    }
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    #[cfg(windows)]
    let candidates = [format!("{}.exe", cmd), cmd.to_string()];
    #[cfg(not(windows))]
    let candidates = [cmd.to_string()];

    env::split_paths(&path_var)
        .any(|dir| candidates.iter().any(|name| is_executable(&dir.join(name))))
}

fn is_executable(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(value) => value,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
