//! Peripheral collaborators behind narrow interfaces
//!
//! The workflow engine talks to the microphone/speaker bus, the blob
//! store, and the HTTP transport exclusively through the traits in this
//! module. Production implementations live alongside them; tests swap in
//! scripted fakes.

mod audio;
mod store;
mod transport;

pub use audio::{AudioBus, CpalAudioBus};
pub use store::{BlobWriter, ByteStore, FsStore};
pub use transport::{
    read_to_string, ByteStream, HttpTransport, StreamResponse, TextResponse, Transport,
};
