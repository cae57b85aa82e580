// crealink-api: wire protocol and websocket transport for Creality printers

pub mod error;
pub mod protocol;
pub mod token;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use protocol::{ControlMessage, InboundFrame, OutboundFrame, decode_frame};
pub use token::generate_token;
pub use transport::{
    Connector, FrameReader, FrameWriter, ReadOutcome, TransportConfig, device_url, read_until,
};
pub use websocket::{WsConnector, WsReader, WsWriter};
