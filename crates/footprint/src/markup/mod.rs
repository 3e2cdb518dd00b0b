//! SVG mask payloads returned by the segmentation service.
//!
//! The service is a language model, so the payload may arrive wrapped in
//! markdown fences or chatter. [`validate_payload`] strips that wrapping and
//! checks the root element before anything is rasterized.

pub mod raster;

pub use raster::SvgMaskRasterizer;

use crate::error::{FootprintError, Result};

/// One element tag found while scanning markup
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub closing: bool,
    pub self_closing: bool,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a presentation property in the attribute first, then in `style`
    pub fn property(&self, name: &str) -> Option<String> {
        if let Some(value) = self.attr(name) {
            return Some(value.trim().to_string());
        }
        self.attr("style")?.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
    }
}

/// Coordinate space declared by the root `<svg>` element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    fn parse(text: &str) -> Option<Self> {
        let values: Vec<f64> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().ok())
            .collect::<Option<_>>()?;
        match values.as_slice() {
            &[min_x, min_y, width, height] if width > 0.0 && height > 0.0 => Some(Self {
                min_x,
                min_y,
                width,
                height,
            }),
            _ => None,
        }
    }
}

/// An SVG mask that passed the shape checks, ready to rasterize
#[derive(Debug, Clone)]
pub struct ValidatedMask {
    markup: String,
    view_box: ViewBox,
    width: u32,
    height: u32,
}

impl ValidatedMask {
    pub fn view_box(&self) -> ViewBox {
        self.view_box
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tags(&self) -> Result<Vec<Tag>> {
        scan_tags(&self.markup)
    }
}

/// Remove code fences, control characters and anything outside the outermost
/// `<svg ...>...</svg>` element.
pub fn sanitize_payload(raw: &str) -> String {
    let unfenced = raw
        .replace("```xml", "")
        .replace("```svg", "")
        .replace("```", "");

    let cleaned: String = unfenced
        .chars()
        .filter(|&c| (!c.is_control() || c.is_whitespace()) && c != '\u{feff}')
        .collect();

    match (cleaned.find("<svg"), cleaned.rfind("</svg>")) {
        (Some(start), Some(end)) if end > start => cleaned[start..end + "</svg>".len()].to_string(),
        _ => cleaned.trim().to_string(),
    }
}

fn invalid(reason: impl Into<String>, raw: &str) -> FootprintError {
    FootprintError::InvalidSegmentationPayload {
        reason: reason.into(),
        payload: raw.to_string(),
    }
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

/// Sanitize a raw payload and check it describes a `width`×`height` mask
pub fn validate_payload(raw: &str, width: u32, height: u32) -> Result<ValidatedMask> {
    let markup = sanitize_payload(raw);
    if markup.is_empty() {
        return Err(invalid("payload is empty", raw));
    }
    if !markup.starts_with("<svg") {
        return Err(invalid("payload does not start with <svg", raw));
    }
    if !markup.ends_with("</svg>") {
        return Err(invalid("payload does not end with </svg>", raw));
    }

    let root = scan_tags(&markup)
        .map_err(|e| invalid(format!("malformed markup: {e}"), raw))?
        .into_iter()
        .next()
        .filter(|tag| tag.name == "svg" && !tag.closing)
        .ok_or_else(|| invalid("missing <svg> root element", raw))?;

    let view_box = match root.attr("viewBox") {
        Some(text) => {
            ViewBox::parse(text).ok_or_else(|| invalid(format!("malformed viewBox {text:?}"), raw))?
        }
        None => {
            let w = root.attr("width").and_then(parse_length);
            let h = root.attr("height").and_then(parse_length);
            match (w, h) {
                (Some(w), Some(h)) => ViewBox {
                    min_x: 0.0,
                    min_y: 0.0,
                    width: w,
                    height: h,
                },
                _ => return Err(invalid("root element declares no coordinate space", raw)),
            }
        }
    };

    let matches = (view_box.width - width as f64).abs() < 1e-6
        && (view_box.height - height as f64).abs() < 1e-6;
    if !matches {
        return Err(invalid(
            format!(
                "coordinate space {}x{} does not match requested {}x{}",
                view_box.width, view_box.height, width, height
            ),
            raw,
        ));
    }

    Ok(ValidatedMask {
        markup,
        view_box,
        width,
        height,
    })
}

/// Split markup into element tags, skipping text, comments and declarations
pub fn scan_tags(markup: &str) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    let mut rest = markup;

    while let Some(open) = rest.find('<') {
        rest = &rest[open..];

        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or_else(|| FootprintError::Rasterization("unterminated comment".to_string()))?;
            rest = &rest[end + 3..];
            continue;
        }
        if rest.starts_with("<?") || rest.starts_with("<!") {
            let end = rest
                .find('>')
                .ok_or_else(|| FootprintError::Rasterization("unterminated declaration".to_string()))?;
            rest = &rest[end + 1..];
            continue;
        }

        let end = find_tag_end(rest)
            .ok_or_else(|| FootprintError::Rasterization("unterminated tag".to_string()))?;
        tags.push(parse_tag(&rest[1..end])?);
        rest = &rest[end + 1..];
    }

    Ok(tags)
}

/// Index of the `>` closing the tag at the start of `text`, ignoring quoted `>`
fn find_tag_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_tag(inner: &str) -> Result<Tag> {
    let mut body = inner.trim();
    let closing = body.starts_with('/');
    if closing {
        body = body[1..].trim_start();
    }
    let self_closing = body.ends_with('/');
    if self_closing {
        body = body[..body.len() - 1].trim_end();
    }

    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return Err(FootprintError::Rasterization(format!("tag without a name: <{inner}>")));
    }
    // Namespace prefixes such as svg:rect are dropped
    let name = name.rsplit(':').next().unwrap_or(name).to_string();

    Ok(Tag {
        name,
        attrs: parse_attrs(&body[name_end..])?,
        closing,
        self_closing,
    })
}

fn parse_attrs(text: &str) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_string();
        rest = rest[key_end..].trim_start();

        if !rest.starts_with('=') {
            // Bare attribute without a value
            attrs.push((key, String::new()));
            continue;
        }
        rest = rest[1..].trim_start();

        let value;
        match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let close = rest[1..].find(q).ok_or_else(|| {
                    FootprintError::Rasterization(format!("unterminated value for attribute {key}"))
                })?;
                value = rest[1..1 + close].to_string();
                rest = &rest[close + 2..];
            }
            _ => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                value = rest[..end].to_string();
                rest = &rest[end..];
            }
        }

        attrs.push((key, value));
        rest = rest.trim_start();
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASK: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 80"><rect width="100%" height="100%" fill="black"/><polygon points="10,10 40,10 40,30" fill="white"/></svg>"#;

    #[test]
    fn test_sanitize_strips_fences_and_chatter() {
        let raw = format!("Here is the mask:\n```svg\n{MASK}\n```\nLet me know!");
        assert_eq!(sanitize_payload(&raw), MASK);
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        let raw = format!("\u{feff}\u{0}{MASK}\u{7}");
        assert_eq!(sanitize_payload(&raw), MASK);
    }

    #[test]
    fn test_validate_accepts_matching_view_box() {
        let mask = validate_payload(MASK, 100, 80).expect("valid mask");
        assert_eq!(mask.view_box().width, 100.0);
        assert_eq!(mask.tags().expect("tags").len(), 4);
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let err = validate_payload(MASK, 100, 100).unwrap_err();
        match err {
            FootprintError::InvalidSegmentationPayload { reason, payload } => {
                assert!(reason.contains("does not match"), "reason was {reason}");
                assert_eq!(payload, MASK);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_non_svg() {
        assert!(matches!(
            validate_payload("I could not find any buildings.", 10, 10),
            Err(FootprintError::InvalidSegmentationPayload { .. })
        ));
        assert!(matches!(
            validate_payload("", 10, 10),
            Err(FootprintError::InvalidSegmentationPayload { .. })
        ));
        assert!(matches!(
            validate_payload(r#"<svg viewBox="0 0 10 10"><rect/>"#, 10, 10),
            Err(FootprintError::InvalidSegmentationPayload { .. })
        ));
    }

    #[test]
    fn test_validate_falls_back_to_width_height() {
        let svg = r#"<svg width="64px" height="32"></svg>"#;
        assert!(validate_payload(svg, 64, 32).is_ok());

        let bare = r#"<svg></svg>"#;
        assert!(validate_payload(bare, 64, 32).is_err());
    }

    #[test]
    fn test_scan_tags_handles_quotes_and_comments() {
        let tags = scan_tags(r#"<?xml version="1.0"?><!-- a > b --><g style='fill: white' data-x="a>b"><path d="M0 0"/></g>"#)
            .expect("scan");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, "g");
        assert_eq!(tags[0].property("fill").as_deref(), Some("white"));
        assert_eq!(tags[0].attr("data-x"), Some("a>b"));
        assert!(tags[1].self_closing);
        assert!(tags[2].closing);
    }
}
