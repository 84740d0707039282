use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::TextSpan;
use super::fonts::strip_subset_prefix;
use crate::document::BBox;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StextPage {
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
    pub images: Vec<BBox>,
}

#[derive(Default)]
struct SpanBuilder {
    text: String,
    bbox: Option<BBox>,
    font: String,
    size: f32,
}

impl SpanBuilder {
    fn push_char(&mut self, ch: &str, bbox: Option<BBox>) {
        self.text.push_str(ch);
        if let Some(bbox) = bbox {
            self.bbox = Some(match self.bbox {
                Some(current) => current.union(&bbox),
                None => bbox,
            });
        }
    }

    fn take(&mut self) -> Option<TextSpan> {
        let text = std::mem::take(&mut self.text);
        let Some(bbox) = self.bbox.take() else {
            if !text.trim().is_empty() {
                debug!("dropping span '{}': no char carries a usable quad or bbox", text);
            }
            return None;
        };
        if text.is_empty() {
            return None;
        }
        Some(TextSpan {
            text,
            bbox,
            font: self.font.clone(),
            size: self.size,
        })
    }
}

/// Parses the structured-text XML written by `mutool draw -F stext`.
pub(crate) fn parse_stext(xml: &str) -> Result<Vec<StextPage>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut pages = Vec::new();
    let mut page: Option<StextPage> = None;
    let mut span = SpanBuilder::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| anyhow!("failed to parse stext xml: {}", err))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"page" => {
                    page = Some(StextPage {
                        width: attr_f32(&e, b"width")?.unwrap_or(0.0),
                        height: attr_f32(&e, b"height")?.unwrap_or(0.0),
                        spans: Vec::new(),
                        images: Vec::new(),
                    });
                }
                b"font" => {
                    flush(&mut span, page.as_mut());
                    span.font = attr(&e, b"name")?
                        .map(|name| strip_subset_prefix(&name).to_string())
                        .unwrap_or_default();
                    span.size = attr_f32(&e, b"size")?.unwrap_or(0.0);
                }
                b"char" => push_char(&e, &mut span)?,
                b"image" => push_image(&e, page.as_mut())?,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"char" => push_char(&e, &mut span)?,
                b"image" => push_image(&e, page.as_mut())?,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"font" | b"line" | b"block" => flush(&mut span, page.as_mut()),
                b"page" => {
                    flush(&mut span, page.as_mut());
                    if let Some(done) = page.take() {
                        pages.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pages)
}

fn flush(span: &mut SpanBuilder, page: Option<&mut StextPage>) {
    let taken = span.take();
    if let (Some(done), Some(page)) = (taken, page) {
        page.spans.push(done);
    }
}

fn push_char(e: &BytesStart<'_>, span: &mut SpanBuilder) -> Result<()> {
    let Some(ch) = attr(e, b"c")? else {
        return Ok(());
    };
    let bbox = match attr(e, b"quad")? {
        Some(quad) => parse_quad(&quad),
        None => attr(e, b"bbox")?.as_deref().and_then(parse_rect),
    };
    if bbox.is_none() {
        debug!("char '{}' has no usable geometry", ch);
    }
    span.push_char(&ch, bbox);
    Ok(())
}

fn push_image(e: &BytesStart<'_>, page: Option<&mut StextPage>) -> Result<()> {
    let bbox = attr(e, b"bbox")?.as_deref().and_then(parse_rect);
    if let (Some(bbox), Some(page)) = (bbox, page) {
        page.images.push(bbox);
    }
    Ok(())
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| anyhow!("invalid stext attribute: {}", err))?;
        if attribute.key.as_ref() == name {
            let value = attribute
                .unescape_value()
                .map_err(|err| anyhow!("invalid stext attribute value: {}", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_f32(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<f32>> {
    Ok(attr(e, name)?.and_then(|value| value.trim().parse::<f32>().ok()))
}

fn parse_numbers(value: &str) -> Vec<f32> {
    value
        .split_whitespace()
        .filter_map(|part| part.parse::<f32>().ok())
        .collect()
}

fn parse_rect(value: &str) -> Option<BBox> {
    match parse_numbers(value).as_slice() {
        [x0, y0, x1, y1] => Some(BBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

fn parse_quad(value: &str) -> Option<BBox> {
    let numbers = parse_numbers(value);
    if numbers.len() != 8 {
        return None;
    }
    let xs = [numbers[0], numbers[2], numbers[4], numbers[6]];
    let ys = [numbers[1], numbers[3], numbers[5], numbers[7]];
    let min = |values: &[f32]| values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = |values: &[f32]| values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some(BBox::new(min(&xs), min(&ys), max(&xs), max(&ys)))
}
