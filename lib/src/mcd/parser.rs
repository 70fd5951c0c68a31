use std::collections::HashMap;

use quick_xml::events::Event;

use crate::error::Result;

/// The kinds of top-level records in the MCD schema which are needed to assemble slides
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordType {
    Slide,
    Panorama,
    Acquisition,
    AcquisitionChannel,
    AcquisitionROI,
}

impl RecordType {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"Slide" => Some(RecordType::Slide),
            b"Panorama" => Some(RecordType::Panorama),
            b"Acquisition" => Some(RecordType::Acquisition),
            b"AcquisitionChannel" => Some(RecordType::AcquisitionChannel),
            b"AcquisitionROI" => Some(RecordType::AcquisitionROI),
            _ => None,
        }
    }
}

/// A top-level record of the schema: each child element becomes one field (element name -> text)
#[derive(Debug)]
pub(crate) struct Record {
    pub(crate) record_type: RecordType,
    pub(crate) fields: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ParserState {
    Start,
    ProcessingSchema,
    ProcessingRecord,
    ProcessingField,
    Finished,
}

/// Event-driven parser collecting the records of interest from the MCD schema XML.
///
/// Records are the direct children of the `MCDSchema` root; their fields the children of each record.
/// Records of other types (calibrations, ROI points, ...) are skipped.
pub(crate) struct McdParser {
    state: ParserState,
    depth: usize,

    current_record: Option<Record>,
    current_field: Option<String>,
    current_text: String,

    records: Vec<Record>,
}

impl McdParser {
    pub(crate) fn new() -> Self {
        McdParser {
            state: ParserState::Start,
            depth: 0,
            current_record: None,
            current_field: None,
            current_text: String::new(),
            records: Vec::new(),
        }
    }

    pub(crate) fn current_state(&self) -> ParserState {
        self.state
    }

    pub(crate) fn records(self) -> Vec<Record> {
        self.records
    }

    pub(crate) fn process(&mut self, ev: Event) -> Result<()> {
        match &ev {
            Event::Start(e) => {
                self.depth += 1;

                match self.depth {
                    1 => self.state = ParserState::ProcessingSchema,
                    2 => {
                        self.current_record =
                            RecordType::from_tag(e.local_name().as_ref()).map(|record_type| {
                                Record {
                                    record_type,
                                    fields: HashMap::new(),
                                }
                            });
                        self.state = ParserState::ProcessingRecord;
                    }
                    3 if self.current_record.is_some() => {
                        self.current_field =
                            Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                        self.current_text.clear();
                        self.state = ParserState::ProcessingField;
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                // An empty field, e.g. <ChannelLabel />
                if self.depth == 2 {
                    if let Some(record) = self.current_record.as_mut() {
                        record.fields.insert(
                            String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                            String::new(),
                        );
                    }
                }
            }
            Event::Text(e) => {
                if self.state == ParserState::ProcessingField && self.depth == 3 {
                    self.current_text.push_str(&e.unescape()?);
                }
            }
            Event::End(_) => {
                match self.depth {
                    3 => {
                        if let (Some(record), Some(field)) =
                            (self.current_record.as_mut(), self.current_field.take())
                        {
                            record
                                .fields
                                .insert(field, std::mem::take(&mut self.current_text));
                        }
                        self.state = ParserState::ProcessingRecord;
                    }
                    2 => {
                        if let Some(record) = self.current_record.take() {
                            self.records.push(record);
                        }
                        self.state = ParserState::ProcessingSchema;
                    }
                    1 => self.state = ParserState::Finished,
                    _ => {}
                }

                self.depth = self.depth.saturating_sub(1);
            }
            Event::Eof => self.state = ParserState::Finished,
            _ => (),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Vec<Record>> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.trim_text(true);

        let mut parser = McdParser::new();
        while parser.current_state() != ParserState::Finished {
            parser.process(reader.read_event()?)?;
        }

        Ok(parser.records())
    }

    #[test]
    fn collects_fields_of_known_records() -> Result<()> {
        let records = parse(
            r#"<MCDSchema xmlns="http://www.fluidigm.com/IMC/MCDSchema_V2_0.xsd">
                <Slide><ID>0</ID><Description>Slide &amp; tissue</Description></Slide>
                <CalibrationFinal><ID>7</ID></CalibrationFinal>
                <AcquisitionChannel><ID>1</ID><ChannelName>Ir(191)</ChannelName><ChannelLabel /></AcquisitionChannel>
            </MCDSchema>"#,
        )?;

        assert_eq!(records.len(), 2);

        assert_eq!(records[0].record_type, RecordType::Slide);
        assert_eq!(records[0].fields["ID"], "0");
        assert_eq!(records[0].fields["Description"], "Slide & tissue");

        assert_eq!(records[1].record_type, RecordType::AcquisitionChannel);
        assert_eq!(records[1].fields["ChannelName"], "Ir(191)");
        assert_eq!(records[1].fields["ChannelLabel"], "");

        Ok(())
    }
}
