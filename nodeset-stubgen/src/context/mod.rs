//! Projection of a selection tree into the generic value tree consumed by
//! the template engine.

mod projector;
mod value;

pub use projector::ContextProjector;
pub(crate) use value::render_map;
pub use value::{RenderMap, RenderValue};
