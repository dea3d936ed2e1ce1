mod codec;
mod error;
mod sync;

pub use codec::{decode, encode, FrameDecoder};
pub use error::TransportError;
#[doc(inline)]
pub use sync::*;
