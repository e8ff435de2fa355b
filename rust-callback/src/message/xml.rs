//! Minimal writer for platform-style `<xml>` reply documents.
//!
//! String values are written as CDATA sections and numbers as plain text,
//! which is the shape the platform itself produces.

use std::fmt::Display;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const ROOT: &str = "xml";

pub(crate) struct XmlDocument {
    writer: Writer<Vec<u8>>,
}

impl XmlDocument {
    pub(crate) fn new() -> quick_xml::Result<Self> {
        let mut writer = Writer::new(Vec::with_capacity(512));
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        Ok(Self { writer })
    }

    /// `<name><![CDATA[value]]></name>`
    pub(crate) fn cdata(&mut self, name: &str, value: &str) -> quick_xml::Result<&mut Self> {
        self.open(name)?;
        // A literal "]]>" would end the section early; split it across two.
        let value = value.replace("]]>", "]]]]><![CDATA[>");
        self.writer
            .write_event(Event::CData(BytesCData::new(value.as_str())))?;
        self.close(name)
    }

    /// `<name>value</name>` with XML escaping.
    pub(crate) fn text(&mut self, name: &str, value: impl Display) -> quick_xml::Result<&mut Self> {
        self.open(name)?;
        let value = value.to_string();
        self.writer
            .write_event(Event::Text(BytesText::new(value.as_str())))?;
        self.close(name)
    }

    pub(crate) fn open(&mut self, name: &str) -> quick_xml::Result<&mut Self> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(self)
    }

    pub(crate) fn close(&mut self, name: &str) -> quick_xml::Result<&mut Self> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(self)
    }

    pub(crate) fn finish(mut self) -> quick_xml::Result<Vec<u8>> {
        self.writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
        Ok(self.writer.into_inner())
    }
}
