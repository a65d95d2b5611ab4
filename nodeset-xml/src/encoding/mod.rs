mod reader;

pub use reader::{ElementEvent, ElementStart, XmlReadError, XmlStreamReader};
