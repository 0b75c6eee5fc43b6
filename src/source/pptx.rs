//! Raw `.pptx` parsing: the OOXML zip archive into per-slide shape records.
//!
//! A deck is a zip archive; slides live at `ppt/slides/slideN.xml` and the
//! deck-wide slide size in `ppt/presentation.xml`. The parser walks the
//! DrawingML events with `quick-xml` and keeps only what review payloads
//! need: shape kind, title placeholders, markdown-formatted text, and the
//! geometry and styling fields of [`GraphicalInfo`]. Offsets are converted
//! to percentages of the slide size here, so downstream code never sees
//! EMU coordinates.
//!
//! Element names are matched on their local part (`sp`, not `p:sp`), and
//! unrecognized subtrees are skipped wholesale so colours inside gradient
//! fills or style references never leak into the wrong field.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use crate::error::ReviewError;
use crate::unit::{
    FontDetail, GraphicalInfo, LineInfo, PositionInfo, SizeInfo, TableSize, UnitKind,
};

/// EMU dimensions of a 16:9 slide, used when `sldSz` is absent.
const DEFAULT_SLIDE_SIZE: (i64, i64) = (12_192_000, 6_858_000);

const EMU_PER_POINT: f64 = 12_700.0;

/// `a:xfrm` rotation unit: 60000ths of a degree.
const ROTATION_UNITS_PER_DEGREE: f64 = 60_000.0;

static RE_SLIDE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A parsed deck, slides in deck order.
#[derive(Debug)]
pub(crate) struct Deck {
    pub slides: Vec<ParsedSlide>,
}

#[derive(Debug)]
pub(crate) struct ParsedSlide {
    /// 1-based position in the deck.
    pub number: usize,
    /// `show="0"` on the slide root.
    pub hidden: bool,
    /// Shapes in document order; callers sort by [`ParsedShape::from_top`].
    pub shapes: Vec<ParsedShape>,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedShape {
    pub kind: UnitKind,
    /// True for title and centered-title placeholders.
    pub is_title: bool,
    /// Markdown-formatted text: bold runs wrapped in `**`, one trailing
    /// newline per paragraph, tables as cell grids.
    pub text: String,
    /// Vertical offset in EMU, the reading-order sort key. Shapes without
    /// an explicit frame sort first.
    pub from_top: i64,
    pub graphics: GraphicalInfo,
}

impl Deck {
    /// Read and parse a `.pptx` file. Blocking; callers run it on a
    /// blocking task.
    pub(crate) fn parse(path: &Path) -> Result<Deck, ReviewError> {
        let read_err = |detail: String| ReviewError::DocumentRead {
            path: path.to_path_buf(),
            detail,
        };

        let file = File::open(path).map_err(|e| read_err(e.to_string()))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| read_err(format!("not a pptx archive: {e}")))?;

        let mut entries: Vec<(usize, String)> = archive
            .file_names()
            .filter_map(|name| {
                let captures = RE_SLIDE_ENTRY.captures(name)?;
                let index: usize = captures[1].parse().ok()?;
                Some((index, name.to_string()))
            })
            .collect();
        entries.sort_unstable_by_key(|(index, _)| *index);

        let presentation = read_entry(&mut archive, "ppt/presentation.xml").map_err(&read_err)?;
        let slide_size = parse_slide_size(&presentation)
            .map_err(|e| read_err(format!("ppt/presentation.xml: {e}")))?;

        let mut slides = Vec::with_capacity(entries.len());
        for (position, (_, name)) in entries.iter().enumerate() {
            let xml = read_entry(&mut archive, name).map_err(&read_err)?;
            let slide = parse_slide(&xml, position + 1, slide_size)
                .map_err(|e| read_err(format!("{name}: {e}")))?;
            slides.push(slide);
        }
        debug!("parsed {} slides from '{}'", slides.len(), path.display());
        Ok(Deck { slides })
    }
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String, String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("{name}: {e}"))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("{name}: {e}"))?;
    Ok(xml)
}

fn parse_slide_size(xml: &str) -> Result<(i64, i64), quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldSz" => {
                let cx = int_attr(&e, "cx")?;
                let cy = int_attr(&e, "cy")?;
                if cx > 0 && cy > 0 {
                    return Ok((cx, cy));
                }
                return Ok(DEFAULT_SLIDE_SIZE);
            }
            Event::Eof => return Ok(DEFAULT_SLIDE_SIZE),
            _ => {}
        }
    }
}

fn parse_slide(
    xml: &str,
    number: usize,
    slide_size: (i64, i64),
) -> Result<ParsedSlide, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut hidden = false;
    let mut shapes = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sld" => hidden = attr(&e, "show")?.as_deref() == Some("0"),
                b"sp" => shapes.push(parse_sp(&mut reader, slide_size)?),
                b"graphicFrame" => shapes.push(parse_graphic_frame(&mut reader, slide_size)?),
                b"grpSp" => shapes.push(parse_group(&mut reader, slide_size)?),
                b"pic" => shapes.push(parse_pic(&mut reader, slide_size)?),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ParsedSlide {
        number,
        hidden,
        shapes,
    })
}

// ── Shape parsers ────────────────────────────────────────────────────────
//
// Each parser consumes events up to the end tag of the element its caller
// just opened. Nested same-named elements only occur for `grpSp`, which
// recurses, so the first end tag seen at a parser's own level is its own.

#[derive(Debug, Default)]
struct ShapeProperties {
    rotation: f64,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    fill: Option<String>,
    line: Option<LineInfo>,
}

#[derive(Debug, Default)]
struct TextBody {
    text: String,
    fonts: Vec<FontDetail>,
}

fn parse_sp(
    reader: &mut Reader<&[u8]>,
    slide_size: (i64, i64),
) -> Result<ParsedShape, quick_xml::Error> {
    let mut is_title = false;
    let mut properties = ShapeProperties::default();
    let mut body: Option<TextBody> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"nvSpPr" => is_title = parse_non_visual(reader)?,
                b"spPr" => properties = parse_shape_properties(reader, b"spPr")?,
                b"txBody" => body = Some(parse_text_body(reader)?),
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"sp" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    // A geometry-only `sp` with no text body reports as a plain shape,
    // like any other non-text element.
    let kind = if body.is_some() {
        UnitKind::TextBox
    } else {
        UnitKind::Shape
    };
    let body = body.unwrap_or_default();
    Ok(build_shape(
        kind,
        is_title,
        body.text,
        body.fonts,
        None,
        properties,
        slide_size,
    ))
}

/// Scan `nvSpPr` for a title or centered-title placeholder marker.
fn parse_non_visual(reader: &mut Reader<&[u8]>) -> Result<bool, quick_xml::Error> {
    let mut is_title = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if e.local_name().as_ref() == b"ph" {
                    if let Some(kind) = attr(&e, "type")? {
                        is_title |= kind == "title" || kind == "ctrTitle";
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"nvSpPr" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(is_title)
}

fn parse_shape_properties(
    reader: &mut Reader<&[u8]>,
    end: &[u8],
) -> Result<ShapeProperties, quick_xml::Error> {
    let mut properties = ShapeProperties::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"xfrm" => {
                    properties.rotation = rotation_degrees(&e)?;
                    parse_frame(reader, &mut properties)?;
                }
                b"solidFill" => properties.fill = Some(parse_color(reader, b"solidFill")?),
                b"ln" => properties.line = Some(parse_line(reader, &e)?),
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"xfrm" => {
                properties.rotation = rotation_degrees(&e)?;
            }
            Event::End(e) if e.local_name().as_ref() == end => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(properties)
}

fn parse_frame(
    reader: &mut Reader<&[u8]>,
    properties: &mut ShapeProperties,
) -> Result<(), quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"off" => properties.offset = Some((int_attr(&e, "x")?, int_attr(&e, "y")?)),
                b"ext" => properties.extent = Some((int_attr(&e, "cx")?, int_attr(&e, "cy")?)),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"xfrm" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Resolve the colour child of a fill element: `#RRGGBB` for explicit RGB,
/// `scheme:{name}` for theme colours, `transparent` otherwise.
fn parse_color(reader: &mut Reader<&[u8]>,end: &[u8]) -> Result<String, quick_xml::Error> {
    let mut color = String::from("transparent");
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"srgbClr" => {
                    if let Some(value) = attr(&e, "val")? {
                        color = format!("#{value}");
                    }
                }
                b"schemeClr" => {
                    if let Some(value) = attr(&e, "val")? {
                        color = format!("scheme:{value}");
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == end => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(color)
}

fn parse_line(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> Result<LineInfo, quick_xml::Error> {
    let line_width_points = attr(start, "w")?
        .and_then(|value| value.parse::<f64>().ok())
        .map(|emu| (emu / EMU_PER_POINT) as f32);
    let mut line_color = None;
    let mut is_dash_style = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"solidFill" => line_color = Some(parse_color(reader, b"solidFill")?),
                b"custDash" => {
                    is_dash_style = true;
                    skip(reader, &e)?;
                }
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"prstDash" => {
                is_dash_style = attr(&e, "val")?.is_some_and(|value| value != "solid");
            }
            Event::End(e) if e.local_name().as_ref() == b"ln" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(LineInfo {
        line_color,
        is_dash_style,
        line_width_points,
    })
}

fn parse_text_body(reader: &mut Reader<&[u8]>) -> Result<TextBody, quick_xml::Error> {
    let mut body = TextBody::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => parse_paragraph(reader, &mut body)?,
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"p" => body.text.push('\n'),
            Event::End(e) if e.local_name().as_ref() == b"txBody" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    // Adjacent bold runs produce back-to-back markers; collapsing them
    // merges the runs into one bold span.
    body.text = body.text.replace("****", "");
    Ok(body)
}

fn parse_paragraph(
    reader: &mut Reader<&[u8]>,
    body: &mut TextBody,
) -> Result<(), quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => parse_run(reader, body)?,
                // Fields (slide numbers, dates) are layout furniture, not
                // authored content.
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"p" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    body.text.push('\n');
    Ok(())
}

fn parse_run(reader: &mut Reader<&[u8]>,body: &mut TextBody) -> Result<(), quick_xml::Error> {
    let mut raw = String::new();
    let mut bold = false;
    let mut font = FontDetail {
        font_name: None,
        text_color: None,
        font_size: None,
        text_impacted: String::new(),
    };
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"rPr" => {
                    bold = run_attributes(&e, &mut font)?;
                    parse_run_properties(reader, &mut font)?;
                }
                b"t" => raw.push_str(&reader.read_text(e.to_end().name())?),
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"rPr" => {
                bold = run_attributes(&e, &mut font)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"r" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    let text = RE_WHITESPACE.replace_all(&raw, " ").into_owned();
    if bold && !text.is_empty() && text != " " {
        body.text.push_str(&format!("**{text}**"));
    } else {
        body.text.push_str(&text);
    }
    font.text_impacted = text;
    body.fonts.push(font);
    Ok(())
}

/// Bold flag and font size live as attributes on `rPr` itself.
fn run_attributes(e: &BytesStart, font: &mut FontDetail) -> Result<bool, quick_xml::Error> {
    font.font_size = attr(e, "sz")?
        .and_then(|value| value.parse::<f64>().ok())
        .map(|hundredths| (hundredths / 100.0) as f32);
    Ok(attr(e, "b")?.is_some_and(|value| value == "1" || value == "true"))
}

fn parse_run_properties(
    reader: &mut Reader<&[u8]>,
    font: &mut FontDetail,
) -> Result<(), quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"solidFill" => font.text_color = Some(parse_color(reader, b"solidFill")?),
                b"latin" => {
                    font.font_name = attr(&e, "typeface")?;
                    skip(reader, &e)?;
                }
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"latin" => {
                font.font_name = attr(&e, "typeface")?;
            }
            Event::End(e) if e.local_name().as_ref() == b"rPr" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn parse_graphic_frame(
    reader: &mut Reader<&[u8]>,
    slide_size: (i64, i64),
) -> Result<ParsedShape, quick_xml::Error> {
    let mut properties = ShapeProperties::default();
    let mut table: Option<(String, TableSize)> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"xfrm" => {
                    properties.rotation = rotation_degrees(&e)?;
                    parse_frame(reader, &mut properties)?;
                }
                // The table sits under graphic/graphicData; descend.
                b"graphic" | b"graphicData" => {}
                b"tbl" => table = Some(parse_table(reader)?),
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"graphicFrame" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    // Frames holding charts or diagrams instead of a table carry no
    // reviewable text.
    match table {
        Some((text, size)) => Ok(build_shape(
            UnitKind::Table,
            false,
            text,
            Vec::new(),
            Some(size),
            properties,
            slide_size,
        )),
        None => Ok(build_shape(
            UnitKind::Shape,
            false,
            String::new(),
            Vec::new(),
            None,
            properties,
            slide_size,
        )),
    }
}

fn parse_table(reader: &mut Reader<&[u8]>) -> Result<(String, TableSize), quick_xml::Error> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tr" => rows.push(parse_table_row(reader)?),
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"tbl" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    let size = TableSize {
        number_cols: rows.first().map(|row| row.len()).unwrap_or(0),
        number_rows: rows.len(),
    };
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        lines.push(format!("| {} |", row.join(" | ")));
        if index == 0 {
            lines.push(format!("| {} |", vec!["---"; row.len()].join(" | ")));
        }
    }
    Ok((lines.join("\n"), size))
}

fn parse_table_row(reader: &mut Reader<&[u8]>) -> Result<Vec<String>, quick_xml::Error> {
    let mut cells = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tc" => cells.push(parse_table_cell(reader)?),
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"tr" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}

/// Cell text is flattened to one line: paragraphs joined by spaces, bold
/// markers dropped.
fn parse_table_cell(reader: &mut Reader<&[u8]>) -> Result<String, quick_xml::Error> {
    let mut pieces: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"txBody" => {
                    let body = parse_text_body(reader)?;
                    let plain = body.text.replace("**", "");
                    pieces.extend(plain.lines().filter(|l| !l.is_empty()).map(String::from));
                }
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"tc" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pieces.join(" "))
}

fn parse_group(
    reader: &mut Reader<&[u8]>,
    slide_size: (i64, i64),
) -> Result<ParsedShape, quick_xml::Error> {
    let mut properties = ShapeProperties::default();
    let mut texts: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"grpSpPr" => properties = parse_shape_properties(reader, b"grpSpPr")?,
                b"sp" => texts.push(parse_sp(reader, slide_size)?.text),
                b"grpSp" => texts.push(parse_group(reader, slide_size)?.text),
                // Pictures and frames inside a group contribute no text.
                b"pic" => {
                    parse_pic(reader, slide_size)?;
                }
                b"graphicFrame" => {
                    parse_graphic_frame(reader, slide_size)?;
                }
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"grpSp" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(build_shape(
        UnitKind::Group,
        false,
        texts.join("\n"),
        Vec::new(),
        None,
        properties,
        slide_size,
    ))
}

fn parse_pic(
    reader: &mut Reader<&[u8]>,
    slide_size: (i64, i64),
) -> Result<ParsedShape, quick_xml::Error> {
    let mut properties = ShapeProperties::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"spPr" => properties = parse_shape_properties(reader, b"spPr")?,
                _ => skip(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"pic" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(build_shape(
        UnitKind::Picture,
        false,
        String::new(),
        Vec::new(),
        None,
        properties,
        slide_size,
    ))
}

fn build_shape(
    kind: UnitKind,
    is_title: bool,
    text: String,
    fonts: Vec<FontDetail>,
    table_size: Option<TableSize>,
    properties: ShapeProperties,
    slide_size: (i64, i64),
) -> ParsedShape {
    let (slide_width, slide_height) = (slide_size.0 as f64, slide_size.1 as f64);
    let position = properties.offset.map(|(x, y)| PositionInfo {
        from_left: (x as f64 * 100.0 / slide_width) as f32,
        from_top: (y as f64 * 100.0 / slide_height) as f32,
    });
    let size = properties.extent.map(|(cx, cy)| SizeInfo {
        width: (cx as f64 * 100.0 / slide_width) as f32,
        height: (cy as f64 * 100.0 / slide_height) as f32,
    });
    ParsedShape {
        kind,
        is_title,
        text,
        from_top: properties.offset.map(|(_, y)| y).unwrap_or(0),
        graphics: GraphicalInfo {
            rotation_degrees: Some(properties.rotation as f32),
            shape_fore_color: Some(
                properties
                    .fill
                    .unwrap_or_else(|| "transparent".to_string()),
            ),
            line: properties.line,
            position,
            size,
            font_details: (!fonts.is_empty()).then_some(fonts),
            table_size,
        },
    }
}

// ── XML helpers ──────────────────────────────────────────────────────────

/// Consume the subtree the caller just opened.
fn skip(reader: &mut Reader<&[u8]>,start: &BytesStart) -> Result<(), quick_xml::Error> {
    reader.read_to_end(start.to_end().name())?;
    Ok(())
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>, quick_xml::Error> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn int_attr(e: &BytesStart, name: &str) -> Result<i64, quick_xml::Error> {
    Ok(attr(e, name)?
        .and_then(|value| value.parse().ok())
        .unwrap_or(0))
}

fn rotation_degrees(e: &BytesStart) -> Result<f64, quick_xml::Error> {
    Ok(attr(e, "rot")?
        .and_then(|value| value.parse::<f64>().ok())
        .map(|units| units / ROTATION_UNITS_PER_DEGREE)
        .unwrap_or(0.0))
}
