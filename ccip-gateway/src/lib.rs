pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod server;

pub use dispatcher::DispatchError;
pub use dispatcher::Dispatcher;
pub use dispatcher::Handler;
pub use dispatcher::SenderPolicy;
pub use server::Gateway;
