pub mod request_documents_command;
pub mod upload_supplementary_command;

pub use request_documents_command::RequestDocumentsCommand;
pub use upload_supplementary_command::{
    ensure_can_upload, StoredSupplement, SupplementsRecorded, UploadSupplementaryCommand,
};
