mod common;

use common::{
    CanvasOp, DictionaryEngine, FakePage, FakeSource, FixedPitchFonts, LETTER, RecordingCanvas,
    SpyOcr, fixed_width, png, span,
};
use pdf_translator_rust::backend::{
    FontHandle, FontResolver, ImageInfo, PageSize, Rgb, StandardFont,
};
use pdf_translator_rust::document::{BBox, Document, Origin, validate_translations};
use pdf_translator_rust::extract::{ExtractConfig, ExtractionPath, Extractor};
use pdf_translator_rust::reconstruct::{
    DEFAULT_MIN_FONT_SIZE, FitConfig, ReconstructConfig, Reconstructor, fit_font_size,
};
use pdf_translator_rust::translate::BatchCoordinator;

fn hello_world_source() -> FakeSource {
    FakeSource::new(vec![FakePage {
        spans: vec![span(
            "Hello, world!",
            BBox::new(100.0, 738.0, 241.0, 750.0),
            "Helvetica",
            12.0,
        )],
        ..FakePage::default()
    }])
}

#[test]
fn digital_pages_never_reach_ocr() {
    let mut source = hello_world_source();
    source.pages[0].images.push((
        ImageInfo {
            id: "1:0".to_string(),
            bbox: Some(BBox::new(0.0, 0.0, 50.0, 50.0)),
        },
        png(10, 10),
    ));
    let ocr = SpyOcr::new("should not be used");
    let document = Extractor::new(&ocr, ExtractConfig::default())
        .extract(&source)
        .expect("extract");

    assert_eq!(ocr.call_count(), 0);
    assert!(source.rasterized.borrow().is_empty());
    assert_eq!(document.pages[0].blocks.len(), 1);
    assert_eq!(document.pages[0].blocks[0].origin, Origin::Digital);
    assert_eq!(document.pages[0].images.len(), 1);
}

#[test]
fn blank_pages_get_one_whole_page_ocr_at_the_configured_scale() {
    let source = FakeSource::new(vec![FakePage::default()]);
    let ocr = SpyOcr::new("Scanned paragraph");
    let config = ExtractConfig {
        page_ocr_scale: 3.0,
        ..ExtractConfig::default()
    };
    let extractor = Extractor::new(&ocr, config);
    let (page, path) = extractor.extract_page(&source, 0).expect("extract");

    assert_eq!(path, ExtractionPath::PageOcr);
    assert_eq!(source.rasterized.borrow().as_slice(), &[(0, 3.0)]);
    assert_eq!(ocr.call_count(), 1);
    assert_eq!(page.blocks.len(), 1);
    assert_eq!(page.blocks[0].origin, Origin::OcrPage);
    assert_eq!(page.blocks[0].bbox, None);
    assert_eq!(page.blocks[0].font, "Times-Roman");
}

#[test]
fn default_page_ocr_scale_is_two() {
    let source = FakeSource::new(vec![FakePage::default()]);
    let ocr = SpyOcr::new("");
    let (page, _) = Extractor::new(&ocr, ExtractConfig::default())
        .extract_page(&source, 0)
        .expect("extract");
    assert_eq!(source.rasterized.borrow().as_slice(), &[(0, 2.0)]);
    assert_eq!(ocr.call_count(), 1);
    assert!(page.blocks.is_empty());
}

#[test]
fn image_pages_are_ocrd_per_image() {
    let images = vec![
        (
            ImageInfo {
                id: "1:0".to_string(),
                bbox: Some(BBox::new(10.0, 10.0, 200.0, 60.0)),
            },
            png(40, 10),
        ),
        (
            ImageInfo {
                id: "1:1".to_string(),
                bbox: Some(BBox::new(10.0, 100.0, 200.0, 160.0)),
            },
            png(30, 12),
        ),
    ];
    let source = FakeSource::new(vec![FakePage {
        images,
        ..FakePage::default()
    }]);
    let ocr = SpyOcr::new("Caption");
    let (page, path) = Extractor::new(&ocr, ExtractConfig::default())
        .extract_page(&source, 0)
        .expect("extract");

    assert_eq!(path, ExtractionPath::ImageOcr);
    assert_eq!(ocr.calls.borrow().as_slice(), &[(40, 10), (30, 12)]);
    assert!(source.rasterized.borrow().is_empty());
    let boxes: Vec<_> = page.blocks.iter().map(|block| block.bbox).collect();
    assert_eq!(
        boxes,
        vec![
            Some(BBox::new(10.0, 10.0, 200.0, 60.0)),
            Some(BBox::new(10.0, 100.0, 200.0, 160.0)),
        ]
    );
    assert!(page.blocks.iter().all(|block| block.origin == Origin::OcrImage));
}

#[tokio::test]
async fn batch_count_is_ceil_of_translatable_blocks() {
    let texts = [
        "Introduction", "1", "Some text here", "x", "More text", "2024", "Closing words",
        "a = b", "Appendix", "References", "§", "Index",
    ];
    let spans = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let y = 20.0 * i as f32;
            span(text, BBox::new(10.0, y, 300.0, y + 12.0), "Helvetica", 10.0)
        })
        .collect();
    let source = FakeSource::new(vec![FakePage {
        spans,
        ..FakePage::default()
    }]);
    let ocr = SpyOcr::new("");
    let mut document = Extractor::new(&ocr, ExtractConfig::default())
        .extract(&source)
        .expect("extract");

    let engine = DictionaryEngine::default();
    for batch_size in [1usize, 3, 5, 16] {
        let mut copy = document.clone();
        let engine = DictionaryEngine::default();
        let stats = BatchCoordinator::new(batch_size)
            .translate_document(&mut copy, &engine)
            .await
            .expect("translate");
        // Five pass-through blocks: "1", "x", "2024", "a = b", "§".
        assert_eq!(stats.passed_through, 5);
        assert_eq!(engine.batch_count(), 7usize.div_ceil(batch_size));
    }

    BatchCoordinator::new(4)
        .translate_document(&mut document, &engine)
        .await
        .expect("translate");
    let blocks = &document.pages[0].blocks;
    assert_eq!(blocks.len(), texts.len());
    for (block, text) in blocks.iter().zip(texts) {
        assert_eq!(block.source_text, text);
        let translated = block.translated_text().expect("translated");
        if pdf_translator_rust::classify::is_translatable(text) {
            assert_eq!(translated, format!("[{}]", text));
        } else {
            assert_eq!(translated, text);
        }
    }
    assert!(validate_translations(&document).is_complete());
}

#[test]
fn fitted_sizes_fit_or_hit_the_floor() {
    let fonts = FixedPitchFonts;
    let font = FontHandle::standard(StandardFont::Helvetica);
    let texts = ["Hi", "¡Hola, mundo!", "A much longer replacement sentence"];
    for text in texts {
        for width in [5.0f32, 40.0, 141.0, 600.0] {
            for original in [6.0f32, 9.5, 12.0, 24.0] {
                let outcome = fit_font_size(width, original, FitConfig::default(), |size| {
                    fonts.measure_text_width(&font, size, text)
                })
                .expect("fit");
                assert!(outcome.size <= original);
                let measured = fonts
                    .measure_text_width(&font, outcome.size, text)
                    .expect("measure");
                assert!(measured <= width || outcome.size == DEFAULT_MIN_FONT_SIZE);
                assert_eq!(outcome.fits, measured <= width);
            }
        }
    }
}

fn translated_document() -> Document {
    let mut document = Document::default();
    let source = hello_world_source();
    let ocr = SpyOcr::new("");
    document.pages = Extractor::new(&ocr, ExtractConfig::default())
        .extract(&source)
        .expect("extract")
        .pages;
    for page in &mut document.pages {
        for block in &mut page.blocks {
            block.set_translation("¡Hola, mundo!");
        }
    }
    document
}

#[test]
fn reconstruction_is_deterministic() {
    let document = translated_document();
    let source = hello_world_source();
    let reconstructor = Reconstructor::new(&FixedPitchFonts, ReconstructConfig::default());

    let mut first = RecordingCanvas::default();
    let mut second = RecordingCanvas::default();
    let a = reconstructor
        .reconstruct(&document, &source, &mut first)
        .expect("first run");
    let b = reconstructor
        .reconstruct(&document, &source, &mut second)
        .expect("second run");
    assert_eq!(first.ops, second.ops);
    assert_eq!(a, b);
}

#[tokio::test]
async fn hello_world_end_to_end() {
    let source = hello_world_source();
    let ocr = SpyOcr::new("unused");
    let mut document = Extractor::new(&ocr, ExtractConfig::default())
        .extract(&source)
        .expect("extract");

    let engine = DictionaryEngine::with(&[("Hello, world!", "¡Hola, mundo!")]);
    let stats = BatchCoordinator::default()
        .translate_document(&mut document, &engine)
        .await
        .expect("translate");
    assert_eq!(stats.batches, 1);

    // Round trip through the snapshot format between stages.
    let document = Document::from_json(&document.to_json().expect("json")).expect("parse");

    let mut canvas = RecordingCanvas::default();
    let report = Reconstructor::new(&FixedPitchFonts, ReconstructConfig::default())
        .reconstruct(&document, &source, &mut canvas)
        .expect("reconstruct");

    let bbox = BBox::new(100.0, 738.0, 241.0, 750.0);
    assert_eq!(canvas.pages(), vec![LETTER]);
    assert!(canvas.ops.contains(&CanvasOp::Rect(bbox, Rgb::WHITE)));
    let text_ops: Vec<_> = canvas
        .ops
        .iter()
        .filter_map(|op| match op {
            CanvasOp::Text {
                bbox,
                text,
                font,
                size,
            } => Some((*bbox, text.clone(), font.clone(), *size)),
            _ => None,
        })
        .collect();
    assert_eq!(text_ops.len(), 1);
    let (drawn_box, text, font, size) = &text_ops[0];
    assert_eq!(*drawn_box, bbox);
    assert_eq!(text, "¡Hola, mundo!");
    assert_eq!(font, "Helvetica");
    assert!(*size <= 12.0);
    assert!(fixed_width(text, *size) <= bbox.width());
    assert_eq!(report.placed(), 1);
    assert_eq!(ocr.call_count(), 0);
}

#[test]
fn output_pages_follow_source_sizes() {
    let a4 = PageSize {
        width: 595.0,
        height: 842.0,
    };
    let source = FakeSource::new(vec![
        FakePage {
            size: Some(a4),
            ..FakePage::default()
        },
        FakePage::default(),
    ]);
    let ocr = SpyOcr::new("");
    let document = Extractor::new(&ocr, ExtractConfig::default())
        .extract(&source)
        .expect("extract");
    let mut canvas = RecordingCanvas::default();
    let report = Reconstructor::new(&FixedPitchFonts, ReconstructConfig::default())
        .reconstruct(&document, &source, &mut canvas)
        .expect("reconstruct");
    assert_eq!(canvas.pages(), vec![a4, LETTER]);
    assert_eq!(report.placed(), 0);
}

#[test]
fn writer_produces_a_pdf_for_the_rebuilt_document() {
    use pdf_translator_rust::backend::PdfWriter;

    let document = translated_document();
    let source = hello_world_source();
    let mut writer = PdfWriter::new("hello");
    Reconstructor::new(&FixedPitchFonts, ReconstructConfig::default())
        .reconstruct(&document, &source, &mut writer)
        .expect("reconstruct");
    assert_eq!(writer.page_count(), 1);
    let bytes = writer.finish().expect("pdf bytes");
    assert!(bytes.starts_with(b"%PDF"));
}
