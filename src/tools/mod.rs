//! Handler tools: declared shapes, bound callables and the invoker.
//!
//! Tools are owned by their handler definition. Callers register them with
//! `ToolDefinition::from_fn` (in-process) or `HttpTool` (remote); the
//! dispatcher reaches them only through `ToolInvoker`.

mod definition;
mod http;
mod invoker;

pub use definition::{
    FnTool, ParameterType, ToolCallable, ToolDefinition, ToolDescriptor, ToolFuture, ToolParameter,
};
pub use http::HttpTool;
pub use invoker::ToolInvoker;
