mod server;

pub use server::SourceRackMcpServer;
