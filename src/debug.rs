//! Layout debug overlays: the page raster with every block's region stroked
//! in a color per origin, plus a JSON dump of the page's blocks.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tiny_skia::Pixmap;
use tracing::{debug, warn};
use usvg::{Options, Tree};

use crate::backend::SourceDocument;
use crate::document::{BBox, Document, Origin, Page};

pub const DEFAULT_DEBUG_SCALE: f32 = 1.5;

pub fn origin_color(origin: Origin) -> &'static str {
    match origin {
        Origin::Digital => "#00c853",
        Origin::OcrImage => "#ff9100",
        Origin::OcrPage => "#d50000",
    }
}

/// Writes `page-<n>.png` and `page-<n>.json` for every page into `dir`.
/// Returns the written paths.
pub fn write_layout_overlays(
    document: &Document,
    source: &dyn SourceDocument,
    scale: f32,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create debug directory {}", dir.display()))?;
    let mut written = Vec::new();
    for page in &document.pages {
        let Some(index) = page
            .number
            .checked_sub(1)
            .filter(|index| *index < source.page_count())
        else {
            warn!("debug overlay: page {} is not in the source", page.number);
            continue;
        };
        let raster = source
            .rasterize(index, scale)
            .with_context(|| format!("failed to rasterize page {} for debug", page.number))?;
        let svg = render_layout_svg(&raster.to_png()?, raster.width(), raster.height(), scale, page);
        let png = render_svg_png(&svg)?;

        let png_path = dir.join(format!("page-{}.png", page.number));
        fs::write(&png_path, png)
            .with_context(|| format!("failed to write {}", png_path.display()))?;
        let json_path = dir.join(format!("page-{}.json", page.number));
        let json = serde_json::to_string_pretty(page)
            .with_context(|| "failed to serialize page blocks")?;
        fs::write(&json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        debug!("debug overlay written: {}", png_path.display());
        written.push(png_path);
        written.push(json_path);
    }
    Ok(written)
}

/// Page raster as background, one stroked rect per block. Blocks without a
/// region outline the whole page.
pub fn render_layout_svg(png: &[u8], width: u32, height: u32, scale: f32, page: &Page) -> String {
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(png));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    let page_box = BBox::new(0.0, 0.0, width as f32, height as f32);
    for block in &page.blocks {
        let rect = match block.bbox {
            Some(bbox) if !bbox.is_degenerate() => bbox.scaled(scale),
            _ => page_box,
        };
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{color}" stroke-width="2"/>"#,
            x = rect.x0,
            y = rect.y0,
            w = rect.width(),
            h = rect.height(),
            color = origin_color(block.origin)
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn render_svg_png(svg: &str) -> Result<Vec<u8>> {
    let options = Options::default();
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode debug overlay")?;
    Ok(bytes)
}
