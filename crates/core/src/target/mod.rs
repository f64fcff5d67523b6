pub use resolver::{resolve, resolved_length, spans_intersect, Span};

mod resolver;
