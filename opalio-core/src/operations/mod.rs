pub mod read_blob;
pub mod register_blob;
pub mod upload_blob;

pub use read_blob::{ReadBlobOperation, ReadBlobOperationRequest, ReadBlobOperationResult};
pub use register_blob::{
    RegisterBlobOperation, RegisterBlobOperationRequest, RegisterBlobOperationResult,
};
pub use upload_blob::{UploadBlobOperation, UploadBlobOperationRequest, UploadBlobOperationResult};
