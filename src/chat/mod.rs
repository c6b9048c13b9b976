pub mod collection;
pub mod session;
pub mod transport;

pub use self::collection::ConversationCollection;
pub use self::session::{ ChatSession, SubmitOutcome, FAILED_REPLY };
pub use self::transport::{ ByteStream, HttpRelayTransport, RelayTransport };
