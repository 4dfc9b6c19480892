//! Node handlers: one executor per [`NodeKind`](crate::definition::NodeKind),
//! looked up through [`HandlerRegistry`] by the dispatcher.

pub mod conditional;
pub mod registry;
pub mod remote_call;
pub mod transform;

pub use conditional::ConditionalHandler;
pub use registry::{HandlerRegistry, NodeHandler};
pub use remote_call::RemoteCallHandler;
pub use transform::TransformHandler;
