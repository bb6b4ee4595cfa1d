mod summaries;

pub use summaries::SummaryRepository;
