mod analyze;
mod ingest;
mod report;

pub use analyze::{AnalyzeReport, PendingAnalyzer, DEFAULT_BATCH_SIZE};
pub use ingest::{EntryOutcome, IngestReport, IngestionPipeline};
pub use report::{compose_digest, ReportOutcome, Reporter};
