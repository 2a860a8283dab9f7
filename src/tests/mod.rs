pub mod common;
mod http_lifecycle;
