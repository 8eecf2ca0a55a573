// src/parser/mod.rs

//! Field parser: pure text-to-value functions and record normalization.
//!
//! Nothing in here performs I/O. Page functions use the label helpers while
//! reading a frame; the pipeline uses [`Normalizer`] once records are back.

pub mod dates;
pub mod description;
pub mod labels;
pub mod normalize;

pub use dates::{TimeRange, WeekContext, parse_tag, to_24_hour};
pub use description::{RevisionDetails, parse_revision_description};
pub use labels::{CalendarLabel, KNOWN_FIELD_NAMES, parse_calendar_label, split_compound_header};
pub use normalize::{Normalizer, detect_tier, round_duration, short_name, source_id};
