pub mod codec;
pub mod connection;
pub mod injector;
pub mod interceptor;
pub mod packet;
pub mod pipeline;

pub use codec::{PacketReader, PacketWriter};
pub use connection::{ConnectionHandle, ConnectionManager, PlayerId};
pub use injector::PipelineInjector;
pub use interceptor::{CallbackListener, InboundInterceptor, PacketListener};
pub use packet::{Packet, PacketGroup, PacketKind, PacketSink};
pub use pipeline::{Frame, InboundHandler, Pipeline, PipelineError};
