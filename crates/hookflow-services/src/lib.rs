pub mod http;
pub mod upload;

pub use http::ReqwestTransport;
pub use upload::CloudinaryUploader;
