//! XML serialization.
//!
//! Trees are serialized by replaying them as SAX events into an
//! [`XmlWriter`], the same sink a rewrite chain writes into.

pub mod xml;

pub use xml::{serialize, serialize_with_options, SerializeOptions, XmlWriter};
