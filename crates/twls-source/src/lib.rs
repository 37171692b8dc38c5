//! Source-level primitives shared by the template crates: byte spans,
//! line/column positions, template identifiers and diagnostic rendering.

mod collections;
mod line_index;
mod render;
mod span;
mod template_id;

pub use collections::FxDashMap;
pub use line_index::LineIndex;
pub use render::Label;
pub use render::Report;
pub use render::ReportRenderer;
pub use render::Severity;
pub use span::ByteOffset;
pub use span::LineCol;
pub use span::Span;
pub use template_id::normalize;
pub use template_id::TemplateId;
