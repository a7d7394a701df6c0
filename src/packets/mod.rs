pub(crate) mod client;
pub(crate) mod parse;
pub(crate) mod server;
