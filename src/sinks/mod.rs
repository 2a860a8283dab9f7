pub mod sink_http;
