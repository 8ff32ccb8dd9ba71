pub mod error;
pub mod extractor;
pub mod ytdlp;

pub use error::ExtractorError;
pub use extractor::MediaExtractor;
pub use ytdlp::{YtDlpConfig, YtDlpExtractor};
