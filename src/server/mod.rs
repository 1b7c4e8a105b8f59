mod pva_server;


pub use pva_server::*;
