// Shared error modeling for the registry, invoker, and server.
pub mod error;
