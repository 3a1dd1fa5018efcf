use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;

use log::{debug, info, warn};

use crate::container;
use crate::err::{DecodeError, Result};
use crate::format_version::{FormatVersion, IdWidth};
use crate::population::{DecodedResult, PopulationNode};
use crate::population_xml::populations_from_xml;
use crate::utils::RecordReader;
use crate::xml_tree::parse_document;

/// Name of the PR entry inside `.cyt` archives.
pub const DEFAULT_ARCHIVE_ENTRY: &str = "data.pr";

/// Never reserve more than this many slots up front for a declared count.
const MAX_PREALLOCATED_ITEMS: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// Let the embedded XML document replace the binary population table.
    xml_override: bool,
    /// Entry holding the PR stream inside a `.cyt` archive.
    archive_entry: String,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            xml_override: true,
            archive_entry: DEFAULT_ARCHIVE_ENTRY.to_owned(),
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// When disabled, the embedded XML document is not read at all.
    pub fn xml_override(mut self, enabled: bool) -> Self {
        self.xml_override = enabled;
        self
    }

    pub fn archive_entry(mut self, entry: impl Into<String>) -> Self {
        self.archive_entry = entry.into();
        self
    }

    pub fn should_override_with_xml(&self) -> bool {
        self.xml_override
    }

    pub fn get_archive_entry(&self) -> &str {
        &self.archive_entry
    }
}

/// Decodes PR streams.
///
/// ```ignore
/// let result = PrParser::new().decode_path("results.cyt")?;
/// for (event, population) in result.event_population_ids.iter().enumerate() {
///     println!("{event};{population}");
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct PrParser {
    settings: ParserSettings,
}

/// Decodes a PR stream with the default settings.
pub fn decode<R: Read>(source: R) -> Result<DecodedResult> {
    PrParser::new().decode(source)
}

impl PrParser {
    pub fn new() -> Self {
        PrParser::default()
    }

    pub fn with_configuration(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Opens a `.pr` file, or the PR entry of a `.cyt` archive, and decodes it.
    pub fn decode_path(&self, path: impl AsRef<Path>) -> Result<DecodedResult> {
        let data = container::read_pr_bytes(path.as_ref(), &self.settings)?;
        self.decode_bytes(&data)
    }

    pub fn decode_bytes(&self, data: &[u8]) -> Result<DecodedResult> {
        self.decode(Cursor::new(data))
    }

    pub fn decode<R: Read>(&self, source: R) -> Result<DecodedResult> {
        let mut reader = RecordReader::new(source);
        let version = FormatVersion::from_raw(reader.read_i16_named("version")?);
        debug!("PR version {} ({:?})", version.raw(), version);

        let (event_population_ids, binary_populations, xml_populations) = match version {
            FormatVersion::Legacy { .. } => (read_legacy_events(&mut reader)?, vec![], None),
            FormatVersion::Structured { id_width, .. } => {
                let events = read_event_table(&mut reader)?;
                let populations = read_population_table(&mut reader, id_width)?;
                let xml = if self.settings.should_override_with_xml() {
                    embedded_populations_or_absent(&mut reader)
                } else {
                    None
                };
                (events, populations, xml)
            }
        };

        let populations =
            select_populations(&event_population_ids, binary_populations, xml_populations);

        info!(
            "Decoded {} events and {} top-level populations",
            event_population_ids.len(),
            populations.len()
        );

        Ok(DecodedResult {
            event_population_ids,
            populations,
        })
    }
}

/// Reads ids until the stream is exhausted. A trailing partial integer is dropped.
fn read_legacy_events<R: Read>(reader: &mut RecordReader<R>) -> Result<Vec<i32>> {
    let mut events = Vec::new();
    loop {
        match reader.try_read_i32_named("event population id") {
            Ok(Some(id)) => events.push(id),
            Ok(None) => break,
            Err(DecodeError::UnexpectedEndOfData { offset, have, .. }) => {
                warn!(
                    "Offset {}: dropping {} trailing bytes after the last event",
                    offset, have
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }
    debug!("Legacy stream holds {} events", events.len());
    Ok(events)
}

fn read_event_table<R: Read>(reader: &mut RecordReader<R>) -> Result<Vec<i32>> {
    let count = reader.read_count_named("event count")?;
    debug!("Reading {} events", count);

    let mut events = Vec::with_capacity(count.min(MAX_PREALLOCATED_ITEMS));
    for _ in 0..count {
        events.push(reader.read_i32_named("event population id")?);
    }
    Ok(events)
}

fn read_population_table<R: Read>(
    reader: &mut RecordReader<R>,
    id_width: IdWidth,
) -> Result<Vec<PopulationNode>> {
    let count = reader.read_count_named("population count")?;
    debug!("Reading {} binary populations ({:?} ids)", count, id_width);

    let mut populations = Vec::with_capacity(count.min(MAX_PREALLOCATED_ITEMS));
    for _ in 0..count {
        let id = id_width.read_id(reader)?;
        let name = reader.read_utf8_string_named("population name")?;
        let color = reader.read_color_named("population color")?;
        populations.push(PopulationNode::from_binary(id, name, color));
    }
    Ok(populations)
}

/// Reads the optional trailing XML document.
///
/// `Ok(None)` when the document is missing or blank. Any error here only concerns the
/// trailing segment and is handled by [`embedded_populations_or_absent`].
fn read_embedded_populations<R: Read>(
    reader: &mut RecordReader<R>,
) -> Result<Option<Vec<PopulationNode>>> {
    let xml = match reader.read_long_utf8_string_named("population xml") {
        Ok(Some(xml)) => xml,
        Ok(None) => return Ok(None),
        // Missing entirely: the stream ended right after the population table.
        Err(DecodeError::UnexpectedEndOfData { have: 0, need: 1, .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    if xml.trim().is_empty() {
        return Ok(None);
    }

    let root = parse_document(&xml)?;
    Ok(Some(populations_from_xml(&root)))
}

fn embedded_populations_or_absent<R: Read>(
    reader: &mut RecordReader<R>,
) -> Option<Vec<PopulationNode>> {
    match read_embedded_populations(reader) {
        Ok(populations) => populations,
        Err(e @ DecodeError::UnexpectedEndOfData { .. }) => {
            debug!("Embedded population XML is truncated, ignoring it: {}", e);
            None
        }
        Err(e) => {
            warn!("Ignoring embedded population XML: {}", e);
            None
        }
    }
}

/// The XML forest wins when it has at least one population, then the binary table,
/// and otherwise one population is synthesized per distinct event id.
fn select_populations(
    event_population_ids: &[i32],
    binary: Vec<PopulationNode>,
    xml: Option<Vec<PopulationNode>>,
) -> Vec<PopulationNode> {
    if let Some(xml) = xml.filter(|populations| !populations.is_empty()) {
        debug!("Using {} populations from embedded XML", xml.len());
        return xml;
    }
    if !binary.is_empty() {
        return binary;
    }
    synthesize_populations(event_population_ids)
}

/// One flat population per distinct id, in order of first occurrence.
pub fn synthesize_populations(event_population_ids: &[i32]) -> Vec<PopulationNode> {
    let mut seen = HashSet::new();
    let populations: Vec<PopulationNode> = event_population_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .map(PopulationNode::synthesized)
        .collect();

    debug!("Synthesized {} populations from events", populations.len());
    populations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use crate::population::Rgb;
    use pretty_assertions::assert_eq;

    fn be16(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }

    fn be32(v: i32) -> [u8; 4] {
        v.to_be_bytes()
    }

    fn structured(version: u16, events: &[i32]) -> Vec<u8> {
        let mut out = be16(version).to_vec();
        out.extend(be32(events.len() as i32));
        for e in events {
            out.extend(be32(*e));
        }
        out
    }

    #[test]
    fn test_synthesis_keeps_first_occurrence_order() {
        let populations = synthesize_populations(&[9, 3, 9, 1, 3]);
        let ids: Vec<i32> = populations.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![9, 3, 1]);
        assert!(populations.iter().all(|p| p.color == Some(Rgb::GRAY)));
    }

    #[test]
    fn test_xml_wins_over_binary_only_when_non_empty() {
        let binary = vec![PopulationNode::from_binary(1, "a".into(), Rgb::GRAY)];
        let xml = vec![PopulationNode::synthesized(2)];

        assert_eq!(
            select_populations(&[], binary.clone(), Some(xml.clone())),
            xml
        );
        assert_eq!(
            select_populations(&[], binary.clone(), Some(vec![])),
            binary
        );
        assert_eq!(select_populations(&[], binary.clone(), None), binary);
        assert_eq!(
            select_populations(&[4], vec![], Some(vec![])),
            vec![PopulationNode::synthesized(4)]
        );
    }

    #[test]
    fn test_structured_stream_without_populations() {
        ensure_env_logger_initialized();
        let mut data = structured(225, &[5, 5, 7]);
        data.extend(be32(0));

        let result = PrParser::new().decode_bytes(&data).unwrap();
        assert_eq!(result.event_population_ids, vec![5, 5, 7]);
        assert_eq!(
            result.populations,
            vec![PopulationNode::synthesized(5), PopulationNode::synthesized(7)]
        );
    }

    #[test]
    fn test_disabled_xml_override_keeps_binary_table() {
        ensure_env_logger_initialized();
        let mut data = structured(300, &[1]);
        data.extend(be32(1));
        data.extend(be16(1));
        data.extend(be16(1));
        data.push(b'A');
        data.extend(be32(0x00FF0000));
        let xml = b"<population><id>99</id></population>";
        data.push(1);
        data.extend(be32(xml.len() as i32));
        data.extend(xml);

        let parser = PrParser::new().with_configuration(ParserSettings::new().xml_override(false));
        let result = parser.decode_bytes(&data).unwrap();
        assert_eq!(
            result.populations,
            vec![PopulationNode::from_binary(1, "A".into(), Rgb::new(255, 0, 0))]
        );

        let result = PrParser::new().decode_bytes(&data).unwrap();
        assert_eq!(result.populations[0].id, 99);
    }

    #[test]
    fn test_empty_stream_is_an_error() {
        assert!(matches!(
            PrParser::new().decode_bytes(&[]),
            Err(DecodeError::UnexpectedEndOfData { what: "version", .. })
        ));
    }

    #[test]
    fn test_legacy_drops_partial_trailing_integer() {
        let mut data = be16(100).to_vec();
        data.extend(be32(3));
        data.extend([0, 0]);
        let result = decode(Cursor::new(data)).unwrap();
        assert_eq!(result.event_population_ids, vec![3]);
    }
}
