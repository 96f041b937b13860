//! GPX reading into the generic track model.
//!
//! Only what the pipeline needs is read: the creator string, track names,
//! segments, and per point the position, time, elevation and every leaf
//! element under `<extensions>`. Extension values are kept as text keyed by
//! their qualified name, `{namespace}local`.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracknorm::{AuxFields, RawPoint, SourceFile, SourceTrack};

use crate::error::{DriveLogError, PathContext, Result};

/// Read and parse a GPX file from disk.
pub fn read_gpx_file(path: &Path) -> Result<SourceFile> {
    let xml = std::fs::read_to_string(path).with_path(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_gpx(&xml, &file_name)
}

/// Parse a GPX document.
///
/// A point without a time, or with an unreadable position, fails the whole
/// document.
pub fn parse_gpx(xml: &str, file_name: &str) -> Result<SourceFile> {
    let mut reader = NsReader::from_str(xml);
    reader.trim_text(true);

    let mut parser = GpxParser::new(file_name);
    loop {
        let event = reader.read_event().map_err(|e| DriveLogError::Parse {
            file: file_name.to_string(),
            message: format!("XML error at position {}: {}", reader.buffer_position(), e),
        })?;

        match event {
            Event::Start(e) => {
                let name = element_name(&reader, &e);
                parser.start(name, &e)?;
            }
            Event::Empty(e) => {
                let name = element_name(&reader, &e);
                parser.start(name, &e)?;
                parser.end()?;
            }
            Event::End(_) => parser.end()?,
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| parser.error(e.to_string()))?;
                parser.text.push_str(&text);
            }
            Event::CData(c) => parser.text.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    let file = parser.file;
    log::info!(
        "[Import] Read {}: {} tracks, {} points from {:?}, creator {:?}",
        file.file_name,
        file.tracks.len(),
        file.point_count(),
        file.start_time(),
        file.creator
    );
    Ok(file)
}

#[derive(Debug, Clone)]
struct ElementName {
    /// `{namespace}local`, or just `local` when unbound.
    qualified: String,
    local: String,
}

fn element_name(reader: &NsReader<&[u8]>, e: &BytesStart<'_>) -> ElementName {
    let (ns, local) = reader.resolve_element(e.name());
    let local = String::from_utf8_lossy(local.as_ref()).into_owned();
    let qualified = match ns {
        ResolveResult::Bound(Namespace(uri)) => {
            format!("{{{}}}{}", String::from_utf8_lossy(uri), local)
        }
        _ => local.clone(),
    };
    ElementName { qualified, local }
}

struct PointBuilder {
    latitude: f64,
    longitude: f64,
    time: Option<DateTime<Utc>>,
    elevation: Option<f64>,
    aux: AuxFields,
}

struct GpxParser<'a> {
    file_name: &'a str,
    file: SourceFile,
    track: Option<SourceTrack>,
    segment: Option<Vec<RawPoint>>,
    point: Option<PointBuilder>,
    stack: Vec<ElementName>,
    /// Stack depth of the current point's `<extensions>` element.
    extensions_depth: Option<usize>,
    text: String,
}

impl<'a> GpxParser<'a> {
    fn new(file_name: &'a str) -> Self {
        Self {
            file_name,
            file: SourceFile {
                file_name: file_name.to_string(),
                ..Default::default()
            },
            track: None,
            segment: None,
            point: None,
            stack: Vec::new(),
            extensions_depth: None,
            text: String::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> DriveLogError {
        DriveLogError::Parse {
            file: self.file_name.to_string(),
            message: message.into(),
        }
    }

    fn attribute(&self, e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
        let attr = e
            .try_get_attribute(name)
            .map_err(|err| self.error(err.to_string()))?;
        attr.map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .map_err(|err| self.error(err.to_string()))
        })
        .transpose()
    }

    fn coordinate(&self, e: &BytesStart<'_>, name: &str) -> Result<f64> {
        let text = self
            .attribute(e, name)?
            .ok_or_else(|| DriveLogError::MissingField {
                file: self.file_name.to_string(),
                field: format!("trkpt@{}", name),
            })?;
        text.trim()
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", name, text)))
    }

    fn start(&mut self, name: ElementName, e: &BytesStart<'_>) -> Result<()> {
        self.text.clear();

        if self.extensions_depth.is_none() {
            match name.local.as_str() {
                "gpx" => {
                    self.file.creator = self.attribute(e, "creator")?.unwrap_or_default();
                }
                "trk" => self.track = Some(SourceTrack::default()),
                "trkseg" => self.segment = Some(Vec::new()),
                "trkpt" => {
                    self.point = Some(PointBuilder {
                        latitude: self.coordinate(e, "lat")?,
                        longitude: self.coordinate(e, "lon")?,
                        time: None,
                        elevation: None,
                        aux: AuxFields::new(),
                    });
                }
                "extensions" if self.point.is_some() => {
                    self.extensions_depth = Some(self.stack.len());
                }
                _ => {}
            }
        }

        self.stack.push(name);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let Some(name) = self.stack.pop() else {
            return Ok(());
        };
        let text = std::mem::take(&mut self.text);
        let depth = self.stack.len();

        if let Some(ext_depth) = self.extensions_depth {
            if depth == ext_depth {
                self.extensions_depth = None;
            } else if !text.is_empty() {
                if let Some(point) = self.point.as_mut() {
                    point.aux.insert(name.qualified, text.trim().to_string());
                }
            }
            return Ok(());
        }

        let parent = self.stack.last().map(|p| p.local.clone());
        match (name.local.as_str(), parent.as_deref()) {
            ("time", Some("trkpt")) => {
                let time = parse_time(&text)
                    .ok_or_else(|| self.error(format!("invalid time '{}'", text)))?;
                if let Some(point) = self.point.as_mut() {
                    point.time = Some(time);
                }
            }
            ("ele", Some("trkpt")) => {
                let elevation = text
                    .trim()
                    .parse()
                    .map_err(|_| self.error(format!("invalid elevation '{}'", text)))?;
                if let Some(point) = self.point.as_mut() {
                    point.elevation = Some(elevation);
                }
            }
            ("name", Some("trk")) => {
                if let Some(track) = self.track.as_mut() {
                    track.name = Some(text);
                }
            }
            ("trkpt", _) => self.finish_point()?,
            ("trkseg", _) => {
                if let (Some(segment), Some(track)) = (self.segment.take(), self.track.as_mut()) {
                    track.segments.push(segment);
                }
            }
            ("trk", _) => {
                if let Some(track) = self.track.take() {
                    self.file.tracks.push(track);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_point(&mut self) -> Result<()> {
        let Some(builder) = self.point.take() else {
            return Ok(());
        };
        let time = builder.time.ok_or_else(|| DriveLogError::MissingField {
            file: self.file_name.to_string(),
            field: format!("time of point ({}, {})", builder.latitude, builder.longitude),
        })?;
        let Some(segment) = self.segment.as_mut() else {
            return Err(self.error("trkpt outside of a trkseg"));
        };

        let point = RawPoint {
            time,
            latitude: builder.latitude,
            longitude: builder.longitude,
            elevation: builder.elevation,
            speed: None,
            aux: builder.aux,
        };
        if point.is_valid() {
            segment.push(point);
        } else {
            log::warn!(
                "[Import] {}: dropping point at {} with coordinates ({}, {}) out of range",
                self.file_name,
                point.time,
                point.latitude,
                point.longitude
            );
        }
        Ok(())
    }
}

/// RFC 3339, or a time without offset taken as UTC.
pub(crate) fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|t| t.and_utc())
        })
}
