pub mod client;
pub mod codec;
pub mod decoder;
pub mod escape;
pub mod paths;
pub mod protocol;

pub use client::{Session, SessionError, SessionOptions, SessionReport};
pub use codec::{EncodeContext, EncodeSummary};
pub use protocol::{DocumentRequest, ResponseEvent, Source, Toggle};
