pub mod server;

pub use server::TestServer;
