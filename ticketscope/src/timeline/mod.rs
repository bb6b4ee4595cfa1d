mod dates;
mod document;
mod events;

pub use dates::extract_date;
pub use document::{group_title, SlideText, TimelineDate, TimelineDocument, TimelineSlide};
pub use events::{timeline, TimelineEvents};
