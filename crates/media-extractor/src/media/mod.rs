pub mod media_format;
pub mod media_info;

pub use media_format::FormatDescriptor;
pub use media_info::{CommentInfo, MediaInfo, PlaylistEntry, RelatedEntry, Thumbnail};
