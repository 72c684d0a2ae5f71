//! Live property derivation for PROPFIND

use crate::types::{http_date, StoredObject, COLLECTION_MARKER};
use chrono::{DateTime, SecondsFormat, Utc};

/// Content type reported for collections.
pub const DIRECTORY_CONTENT_TYPE: &str = "httpd/unix-directory";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Capability advertisement; locks are accepted but never enforced.
pub const SUPPORTED_LOCK: &str =
    "<lockentry><lockscope><exclusive/></lockscope><locktype><write/></locktype></lockentry>";

/// What a PROPFIND response block describes.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// The virtual root collection, which has no backing object
    Root,
    Object(&'a StoredObject),
    /// OS-generated placeholder path, never stored
    Placeholder(&'a str),
}

impl Resource<'_> {
    pub fn key(&self) -> &str {
        match self {
            Resource::Root => "",
            Resource::Object(obj) => &obj.key,
            Resource::Placeholder(key) => key,
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            Resource::Root => true,
            Resource::Object(obj) => obj.is_collection(),
            Resource::Placeholder(_) => false,
        }
    }
}

/// A property value: text (escaped when rendered) or a fixed XML fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Text(String),
    Xml(&'static str),
}

/// The live property set of one resource. Undefined properties are `None`
/// and are omitted from responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavProperties {
    pub creationdate: String,
    pub displayname: Option<String>,
    pub getcontentlanguage: Option<String>,
    pub getcontentlength: u64,
    pub getcontenttype: Option<String>,
    pub getetag: String,
    pub getlastmodified: String,
    pub collection: bool,
    /// Zero-value quota, reported for collections only
    pub quota: Option<u64>,
    pub executable: Option<bool>,
}

impl DavProperties {
    /// Derive the property set. `now` stands in for timestamps of resources
    /// without a backing object.
    pub fn derive(resource: Resource<'_>, now: DateTime<Utc>) -> Self {
        match resource {
            Resource::Root => Self {
                creationdate: creation_date(&now),
                displayname: None,
                getcontentlanguage: None,
                getcontentlength: 0,
                getcontenttype: Some(DIRECTORY_CONTENT_TYPE.to_string()),
                getetag: "\"directory-root\"".to_string(),
                getlastmodified: http_date(&now),
                collection: true,
                quota: Some(0),
                executable: Some(true),
            },
            Resource::Placeholder(_) => Self {
                creationdate: creation_date(&now),
                displayname: None,
                getcontentlanguage: None,
                getcontentlength: 0,
                getcontenttype: Some(DEFAULT_CONTENT_TYPE.to_string()),
                getetag: "\"platform-placeholder\"".to_string(),
                getlastmodified: http_date(&now),
                collection: false,
                quota: None,
                executable: None,
            },
            Resource::Object(obj) => {
                let collection = obj.is_collection();
                let getcontenttype = if collection {
                    DIRECTORY_CONTENT_TYPE.to_string()
                } else {
                    obj.transport
                        .content_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
                };
                let getetag = if obj.etag.is_empty() {
                    format!("\"{}-{}\"", obj.key, obj.size)
                } else {
                    obj.http_etag()
                };
                Self {
                    creationdate: creation_date(&obj.uploaded),
                    displayname: Some(
                        obj.transport
                            .content_disposition
                            .clone()
                            .unwrap_or_else(|| obj.basename().to_string()),
                    ),
                    getcontentlanguage: obj.transport.content_language.clone(),
                    getcontentlength: if collection { 0 } else { obj.size },
                    getcontenttype: Some(getcontenttype),
                    getetag,
                    getlastmodified: http_date(&obj.uploaded),
                    collection,
                    quota: collection.then_some(0),
                    executable: Some(collection),
                }
            }
        }
    }

    /// Defined properties in wire order.
    pub fn entries(&self) -> Vec<(&'static str, PropValue)> {
        let mut out = Vec::with_capacity(13);
        out.push(("creationdate", PropValue::Text(self.creationdate.clone())));
        if let Some(name) = &self.displayname {
            out.push(("displayname", PropValue::Text(name.clone())));
        }
        if let Some(lang) = &self.getcontentlanguage {
            out.push(("getcontentlanguage", PropValue::Text(lang.clone())));
        }
        out.push((
            "getcontentlength",
            PropValue::Text(self.getcontentlength.to_string()),
        ));
        if let Some(ct) = &self.getcontenttype {
            out.push(("getcontenttype", PropValue::Text(ct.clone())));
        }
        out.push(("getetag", PropValue::Text(self.getetag.clone())));
        out.push(("getlastmodified", PropValue::Text(self.getlastmodified.clone())));
        out.push((
            "resourcetype",
            PropValue::Xml(if self.collection { COLLECTION_MARKER } else { "" }),
        ));
        out.push(("lockdiscovery", PropValue::Xml("")));
        out.push(("supportedlock", PropValue::Xml(SUPPORTED_LOCK)));
        if let Some(quota) = self.quota {
            out.push(("quota", PropValue::Text(quota.to_string())));
            out.push(("quotaused", PropValue::Text(quota.to_string())));
        }
        if let Some(exec) = self.executable {
            out.push(("executable", PropValue::Text(if exec { "T" } else { "F" }.to_string())));
        }
        out
    }
}

/// RFC 3339 timestamp, as `creationdate` requires.
fn creation_date(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Absolute href for a key: each segment percent-encoded, collections end in `/`.
pub fn href(key: &str, collection: bool) -> String {
    if key.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(key.len() + 2);
    for segment in key.split('/') {
        out.push('/');
        out.push_str(&urlencoding::encode(segment));
    }
    if collection {
        out.push('/');
    }
    out
}
