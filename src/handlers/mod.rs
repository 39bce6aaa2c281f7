pub mod chat;
pub mod multipart;
pub mod transcribe;
pub mod upload;

pub use chat::chat;
pub use transcribe::transcribe_audio;
pub use upload::upload_file;
