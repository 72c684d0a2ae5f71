//! WebDAV XML bodies: multistatus rendering and request parsing

use crate::dav::{href, DavProperties, PropValue};
use quick_xml::events::Event;
use quick_xml::Reader;

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";
const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Incrementally built `<multistatus>` document.
pub struct Multistatus {
    xml: String,
}

impl Multistatus {
    pub fn new() -> Self {
        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECL);
        xml.push_str("<multistatus xmlns=\"DAV:\">");
        Self { xml }
    }

    /// Append one PROPFIND `<response>` listing every defined property.
    pub fn push_properties(&mut self, key: &str, props: &DavProperties) {
        self.open_response(&href(key, props.collection));
        for (name, value) in props.entries() {
            match value {
                PropValue::Text(text) => {
                    self.xml
                        .push_str(&format!("<{0}>{1}</{0}>", name, escape_xml(&text)));
                }
                PropValue::Xml(fragment) => {
                    self.xml.push_str(&format!("<{0}>{1}</{0}>", name, fragment));
                }
            }
        }
        self.close_response();
    }

    /// Append one PROPPATCH acknowledgement for a single property.
    pub fn push_property_status(&mut self, href: &str, property: &str) {
        self.open_response(href);
        self.xml.push_str(&format!("<{} />", property));
        self.close_response();
    }

    fn open_response(&mut self, href: &str) {
        self.xml.push_str("\n  <response><href>");
        self.xml.push_str(&escape_xml(href));
        self.xml.push_str("</href><propstat><prop>");
    }

    fn close_response(&mut self) {
        self.xml.push_str("</prop><status>");
        self.xml.push_str(STATUS_OK);
        self.xml.push_str("</status></propstat></response>");
    }

    pub fn finish(mut self) -> String {
        self.xml.push_str("\n</multistatus>\n");
        self.xml
    }
}

impl Default for Multistatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-discovery body for a LOCK response.
pub fn lock_discovery(token: &str, root_href: &str, owner: Option<&str>) -> String {
    let owner = owner
        .map(|o| {
            format!(
                "\n      <D:owner><D:href>{}</D:href></D:owner>",
                escape_xml(o)
            )
        })
        .unwrap_or_default();
    format!(
        r#"{decl}<D:prop xmlns:D="DAV:">
  <D:lockdiscovery>
    <D:activelock>
      <D:locktype><D:write/></D:locktype>
      <D:lockscope><D:exclusive/></D:lockscope>
      <D:depth>infinity</D:depth>{owner}
      <D:timeout>Second-3600</D:timeout>
      <D:locktoken><D:href>{token}</D:href></D:locktoken>
      <D:lockroot><D:href>{root}</D:href></D:lockroot>
    </D:activelock>
  </D:lockdiscovery>
</D:prop>"#,
        decl = XML_DECL,
        owner = owner,
        token = escape_xml(token),
        root = escape_xml(root_href),
    )
}

/// Property changes requested by a PROPPATCH `<propertyupdate>` body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PropertyUpdate {
    /// Property names and trimmed values, first-seen order, last value wins
    pub set: Vec<(String, String)>,
    pub remove: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Set,
    Remove,
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Parse a `<propertyupdate>` body. Elements outside `set`/`remove` blocks
/// are ignored; a property's value is its trimmed text content.
pub fn parse_property_update(body: &[u8]) -> Result<PropertyUpdate, quick_xml::Error> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(false);

    let mut update = PropertyUpdate::default();
    let mut block: Option<Block> = None;
    // Element depth below <prop>; 1 means a property element
    let mut prop_depth: Option<usize> = None;
    let mut current: Option<(String, String)> = None;
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                depth += 1;
                saw_root = true;
                let name = local_name(e.local_name().as_ref());
                match prop_depth {
                    Some(d) => {
                        if d == 0 && block.is_some() {
                            current = Some((name, String::new()));
                        }
                        prop_depth = Some(d + 1);
                    }
                    None => match name.as_str() {
                        "set" => block = Some(Block::Set),
                        "remove" => block = Some(Block::Remove),
                        "prop" if block.is_some() => prop_depth = Some(0),
                        _ => {}
                    },
                }
            }
            Event::Empty(ref e) => {
                saw_root = true;
                if prop_depth == Some(0) {
                    let name = local_name(e.local_name().as_ref());
                    apply(&mut update, block, name, String::new());
                }
            }
            Event::Text(ref e) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&e.unescape()?);
                }
            }
            Event::CData(ref e) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e[..]));
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                match prop_depth {
                    Some(0) => prop_depth = None,
                    Some(1) => {
                        if let Some((name, value)) = current.take() {
                            apply(&mut update, block, name, value.trim().to_string());
                        }
                        prop_depth = Some(0);
                    }
                    Some(d) => prop_depth = Some(d - 1),
                    None => {
                        let name = local_name(e.local_name().as_ref());
                        if name == "set" || name == "remove" {
                            block = None;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root || depth != 0 {
        return Err(quick_xml::Error::Syntax(
            quick_xml::errors::SyntaxError::UnclosedTag,
        ));
    }
    Ok(update)
}

fn apply(update: &mut PropertyUpdate, block: Option<Block>, name: String, value: String) {
    match block {
        Some(Block::Set) => match update.set.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => update.set.push((name, value)),
        },
        Some(Block::Remove) => {
            if !update.remove.contains(&name) {
                update.remove.push(name);
            }
        }
        None => {}
    }
}

/// Extract the `<owner>` of a LOCK request body, preferring its `<href>`.
/// Unparseable or absent bodies yield `None`; LOCK never fails on its body.
pub fn parse_lock_owner(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut in_owner = false;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(ref e) if local_name(e.local_name().as_ref()) == "owner" => {
                in_owner = true;
            }
            Event::End(ref e) if local_name(e.local_name().as_ref()) == "owner" => break,
            Event::Text(ref e) if in_owner => {
                text.push_str(&e.unescape().ok()?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
