use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};

use crate::{
    error::{FootprintError, Result},
    markup::{Tag, ValidatedMask, ViewBox},
};

/// Paints the filled shapes of a validated SVG mask onto a grayscale grid.
///
/// Covers the subset segmentation masks use: `rect`, `polygon`, `path`,
/// `circle` and `ellipse` with solid fills, inherited through `g`. Curve
/// segments in paths are approximated by their end points; transforms are
/// not applied.
#[derive(Debug, Clone)]
pub struct SvgMaskRasterizer {
    /// Segments used to approximate circles and ellipses
    pub curve_segments: usize,
}

impl Default for SvgMaskRasterizer {
    fn default() -> Self {
        Self { curve_segments: 32 }
    }
}

struct Frame {
    view_box: ViewBox,
    scale_x: f64,
    scale_y: f64,
}

impl Frame {
    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.view_box.min_x) * self.scale_x, (y - self.view_box.min_y) * self.scale_y)
    }
}

impl SvgMaskRasterizer {
    /// Rasterize into a grid of exactly `mask.width()` × `mask.height()`
    pub fn rasterize(&self, mask: &ValidatedMask) -> Result<GrayImage> {
        let (width, height) = (mask.width(), mask.height());
        if width == 0 || height == 0 {
            return Err(FootprintError::Rasterization(format!(
                "cannot rasterize into an empty {width}x{height} grid"
            )));
        }

        let view_box = mask.view_box();
        let frame = Frame {
            view_box,
            scale_x: width as f64 / view_box.width,
            scale_y: height as f64 / view_box.height,
        };

        let mut canvas = GrayImage::new(width, height);
        // Fill inherited from enclosing <svg>/<g> elements; None means unset
        let mut fills: Vec<Option<Paint>> = Vec::new();

        for tag in mask.tags()? {
            let is_group = matches!(tag.name.as_str(), "svg" | "g");
            if tag.closing {
                if is_group {
                    fills.pop();
                }
                continue;
            }

            let inherited = fills.iter().rev().find_map(|f| *f);
            let own = tag.property("fill").map(|f| Paint::parse(&f)).transpose()?;

            if is_group {
                if !tag.self_closing {
                    fills.push(own.or(inherited));
                }
                continue;
            }

            // SVG default fill is black
            let paint = own.or(inherited).unwrap_or(Paint::Solid(0));
            let Paint::Solid(value) = paint else { continue };
            if tag.property("fill-opacity").and_then(|o| o.parse::<f64>().ok()) == Some(0.0) {
                continue;
            }
            if tag.attr("transform").is_some() {
                tracing::debug!(element = %tag.name, "ignoring transform attribute");
            }

            for outline in self.shape_outlines(&tag, &view_box)? {
                let pixels: Vec<(f64, f64)> = outline.iter().map(|&(x, y)| frame.to_pixel(x, y)).collect();
                fill_polygon(&mut canvas, &pixels, value)?;
            }
        }

        Ok(canvas)
    }

    /// Outlines in viewBox units; paths may yield several subpaths
    fn shape_outlines(&self, tag: &Tag, view_box: &ViewBox) -> Result<Vec<Vec<(f64, f64)>>> {
        let coord = |name: &str, reference: f64| -> Result<f64> {
            tag.attr(name).map_or(Ok(0.0), |v| parse_coordinate(v, reference))
        };

        let outlines = match tag.name.as_str() {
            "rect" => {
                let x = coord("x", view_box.width)?;
                let y = coord("y", view_box.height)?;
                let w = coord("width", view_box.width)?;
                let h = coord("height", view_box.height)?;
                if w <= 0.0 || h <= 0.0 {
                    return Ok(Vec::new());
                }
                vec![vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)]]
            }
            "polygon" => {
                let numbers = parse_numbers(tag.attr("points").unwrap_or_default())?;
                if numbers.len() % 2 != 0 {
                    return Err(FootprintError::Rasterization(
                        "polygon points has an odd number of values".to_string(),
                    ));
                }
                vec![numbers.chunks_exact(2).map(|p| (p[0], p[1])).collect()]
            }
            "path" => parse_path(tag.attr("d").unwrap_or_default())?,
            "circle" => {
                let r = coord("r", view_box.width)?;
                vec![self.ellipse(coord("cx", view_box.width)?, coord("cy", view_box.height)?, r, r)]
            }
            "ellipse" => vec![self.ellipse(
                coord("cx", view_box.width)?,
                coord("cy", view_box.height)?,
                coord("rx", view_box.width)?,
                coord("ry", view_box.height)?,
            )],
            _ => Vec::new(),
        };

        Ok(outlines)
    }

    fn ellipse(&self, cx: f64, cy: f64, rx: f64, ry: f64) -> Vec<(f64, f64)> {
        if rx <= 0.0 || ry <= 0.0 {
            return Vec::new();
        }
        let n = self.curve_segments.max(8);
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                (cx + rx * t.cos(), cy + ry * t.sin())
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Paint {
    None,
    Solid(u8),
}

impl Paint {
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim().to_ascii_lowercase();
        let paint = match text.as_str() {
            "none" | "transparent" => Paint::None,
            "white" => Paint::Solid(255),
            "black" => Paint::Solid(0),
            hex if hex.starts_with('#') => Paint::Solid(parse_hex(hex)?),
            rgb if rgb.starts_with("rgb(") && rgb.ends_with(')') => {
                let channels = parse_numbers(&rgb[4..rgb.len() - 1])?;
                match channels.as_slice() {
                    &[r, g, b] => Paint::Solid(luma(r, g, b)),
                    _ => return Err(FootprintError::Rasterization(format!("bad colour {text:?}"))),
                }
            }
            // Any other named colour counts as foreground
            _ => Paint::Solid(255),
        };
        Ok(paint)
    }
}

fn luma(r: f64, g: f64, b: f64) -> u8 {
    (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
}

fn parse_hex(hex: &str) -> Result<u8> {
    let digits = &hex[1..];
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(FootprintError::Rasterization(format!("bad colour {hex:?}"))),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .map(f64::from)
            .map_err(|_| FootprintError::Rasterization(format!("bad colour {hex:?}")))
    };
    Ok(luma(channel(0)?, channel(2)?, channel(4)?))
}

/// Length attribute; percentages are relative to `reference`
fn parse_coordinate(value: &str, reference: f64) -> Result<f64> {
    let value = value.trim();
    let parsed = if let Some(percent) = value.strip_suffix('%') {
        percent.trim().parse::<f64>().map(|p| p / 100.0 * reference)
    } else {
        value.trim_end_matches("px").parse::<f64>()
    };
    parsed.map_err(|_| FootprintError::Rasterization(format!("bad length {value:?}")))
}

/// Split a list of numbers separated by whitespace, commas or sign changes
fn parse_numbers(text: &str) -> Result<Vec<f64>> {
    let mut lexer = PathLexer::new(text);
    let mut numbers = Vec::new();
    while let Some(token) = lexer.next_token()? {
        match token {
            PathToken::Number(n) => numbers.push(n),
            PathToken::Command(c) => {
                return Err(FootprintError::Rasterization(format!("unexpected {c:?} in number list")));
            }
        }
    }
    Ok(numbers)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathToken {
    Command(char),
    Number(f64),
}

struct PathLexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> PathLexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn next_token(&mut self) -> Result<Option<PathToken>> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && (bytes[self.pos].is_ascii_whitespace() || bytes[self.pos] == b',') {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return Ok(None);
        }

        let c = bytes[self.pos];
        if c.is_ascii_alphabetic() && c != b'e' && c != b'E' {
            self.pos += 1;
            return Ok(Some(PathToken::Command(c as char)));
        }

        let start = self.pos;
        if c == b'+' || c == b'-' {
            self.pos += 1;
        }
        let mut seen_dot = false;
        let mut seen_exp = false;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'0'..=b'9' => {}
                b'.' if !seen_dot && !seen_exp => seen_dot = true,
                b'e' | b'E' if !seen_exp => {
                    seen_exp = true;
                    if matches!(bytes.get(self.pos + 1), Some(b'+') | Some(b'-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let literal = &self.text[start..self.pos];
        literal
            .parse::<f64>()
            .map(|n| Some(PathToken::Number(n)))
            .map_err(|_| FootprintError::Rasterization(format!("bad number {literal:?} at {start}")))
    }
}

/// Number of arguments per path command and the index of the end point's x
fn command_arity(command: char) -> Option<(usize, usize)> {
    match command.to_ascii_uppercase() {
        'M' | 'L' | 'T' => Some((2, 0)),
        'H' | 'V' => Some((1, 0)),
        'C' => Some((6, 4)),
        'S' | 'Q' => Some((4, 2)),
        'A' => Some((7, 5)),
        'Z' => Some((0, 0)),
        _ => None,
    }
}

/// Flatten path data into closed subpath outlines
fn parse_path(d: &str) -> Result<Vec<Vec<(f64, f64)>>> {
    let mut tokens = Vec::new();
    let mut lexer = PathLexer::new(d);
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    let mut subpaths: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut pen = (0.0, 0.0);
    let mut start = (0.0, 0.0);
    let mut command: Option<char> = None;
    let mut i = 0;

    while i < tokens.len() {
        if let PathToken::Command(c) = tokens[i] {
            command = Some(c);
            i += 1;
        }
        let c = command.ok_or_else(|| FootprintError::Rasterization("path data must start with a command".to_string()))?;
        let (arity, end_index) = command_arity(c)
            .ok_or_else(|| FootprintError::Rasterization(format!("unsupported path command {c:?}")))?;

        if arity == 0 {
            if current.len() >= 3 {
                subpaths.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            pen = start;
            command = None;
            continue;
        }

        let args: Vec<f64> = tokens
            .get(i..i + arity)
            .filter(|slice| slice.iter().all(|t| matches!(t, PathToken::Number(_))))
            .map(|slice| {
                slice
                    .iter()
                    .filter_map(|t| match t {
                        PathToken::Number(n) => Some(*n),
                        PathToken::Command(_) => None,
                    })
                    .collect()
            })
            .ok_or_else(|| FootprintError::Rasterization(format!("path command {c:?} is missing arguments")))?;
        i += arity;

        let relative = c.is_ascii_lowercase();
        let origin = if relative { pen } else { (0.0, 0.0) };
        pen = match c.to_ascii_uppercase() {
            'H' => (args[0] + if relative { pen.0 } else { 0.0 }, pen.1),
            'V' => (pen.0, args[0] + if relative { pen.1 } else { 0.0 }),
            _ => (origin.0 + args[end_index], origin.1 + args[end_index + 1]),
        };

        if c.eq_ignore_ascii_case(&'M') {
            if current.len() >= 3 {
                subpaths.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            start = pen;
            // Further coordinate pairs after a moveto are linetos
            command = Some(if relative { 'l' } else { 'L' });
        }
        current.push(pen);
    }

    if current.len() >= 3 {
        subpaths.push(current);
    }
    Ok(subpaths)
}

/// Fill a polygon given in pixel coordinates
fn fill_polygon(canvas: &mut GrayImage, outline: &[(f64, f64)], value: u8) -> Result<()> {
    if outline.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(FootprintError::Rasterization("non-finite coordinate in mask shape".to_string()));
    }

    let limit = 4.0 * canvas.width().max(canvas.height()) as f64;
    let mut points: Vec<Point<i32>> = Vec::with_capacity(outline.len());
    for &(x, y) in outline {
        let point = Point::new(
            x.round().clamp(-limit, limit) as i32,
            y.round().clamp(-limit, limit) as i32,
        );
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    // draw_polygon_mut expects an open ring
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return Ok(());
    }

    draw_polygon_mut(canvas, &points, Luma([value]));
    Ok(())
}
