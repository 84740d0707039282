use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const PDF_MIME: &str = "application/pdf";
const SNIFF_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInput {
    pub path: PathBuf,
    pub size: u64,
}

/// Checks that `path` names an existing, size-bounded PDF file.
pub fn load_pdf(path: &Path, max_file_size_mb: u64) -> Result<PdfInput> {
    if !path.is_file() {
        return Err(anyhow!("input file not found: {}", path.display()));
    }
    let has_pdf_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !has_pdf_extension {
        return Err(anyhow!("input file must have a .pdf extension: {}", path.display()));
    }

    let size = path
        .metadata()
        .with_context(|| format!("failed to read metadata of {}", path.display()))?
        .len();
    let limit = max_file_size_mb.saturating_mul(1024 * 1024);
    if size > limit {
        return Err(anyhow!(
            "input file is {:.1} MB, larger than the {} MB limit",
            size as f64 / (1024.0 * 1024.0),
            max_file_size_mb
        ));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match infer::get(&head).map(|kind| kind.mime_type()) {
        Some(PDF_MIME) => {}
        Some(other) => {
            return Err(anyhow!(
                "input file is not a PDF (detected '{}'): {}",
                other,
                path.display()
            ));
        }
        None => return Err(anyhow!("input file is not a PDF: {}", path.display())),
    }

    Ok(PdfInput {
        path: path.to_path_buf(),
        size,
    })
}
