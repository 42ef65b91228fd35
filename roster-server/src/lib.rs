pub mod capture;
pub mod http;
pub mod request_log;
