//! WebDAV protocol engine over the object store: listing, virtual
//! hierarchy, live properties and recursive transfers.

pub mod hierarchy;
pub mod listing;
pub mod properties;
pub mod transfer;

pub use hierarchy::{is_placeholder, PathClass};
pub use listing::{collect_entries, list_entries, list_pages, ListMode};
pub use properties::{href, DavProperties, PropValue, Resource};
