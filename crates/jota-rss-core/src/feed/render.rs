use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::models::Article;
use crate::{Error, Result};

/// Channel-level metadata of a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl ChannelInfo {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
        }
    }
}

/// Serialize articles as an RSS 2.0 document, items in the given order
pub fn render(channel: &ChannelInfo, articles: &[Article]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("rss").with_attributes([("version", "2.0")])),
    )?;
    write(&mut writer, Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;

    for article in articles {
        write(&mut writer, Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &article.title)?;
        write_text_element(&mut writer, "link", &article.url)?;
        write_text_element(&mut writer, "pubDate", &article.published_at.to_rfc2822())?;
        write_text_element(&mut writer, "description", &article.description())?;
        write(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")))?;
    write(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Render(format!("Rendered feed is not UTF-8: {}", e)))?;
    xml.push('\n');
    Ok(xml)
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Render(e.to_string()))
}

/// `<name>text</name>`, with the text escaped
fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}
