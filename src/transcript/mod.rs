pub mod reader;
pub mod types;

pub use reader::{filter_messages, format_context, get_messages_in_window, read_transcript, FilteredMessage};
pub use types::TranscriptEntry;
