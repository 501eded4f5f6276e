//! Off-chain content: addressing and voice payloads

pub mod address;
pub mod voice;

pub use address::{content_address, parse_content_address, sha256_tag};
pub use voice::{
    parse_range_header, StoredVoice, VoiceBlob, VoiceUpload, DEFAULT_MAX_VOICE_BYTES,
};
