mod summary;
mod ticket;
mod timeline;

pub use summary::*;
pub use ticket::*;
pub use timeline::*;
