//! Services layer - Business logic
//!
//! Services validate input, enforce capability checks and coordinate the
//! repositories with file storage. Handlers only translate HTTP to service
//! calls and back.

pub mod access;
pub mod bulk;
pub mod contact;
pub mod error;
pub mod media;
pub mod partner;
pub mod password;
pub mod setting;
pub mod slug;
pub mod storage;
pub mod testimonial;
pub mod user;
pub mod validate;

pub use bulk::{BulkDeleteResult, BulkItemError, BulkUpdateResult, MAX_BULK_IDS};
pub use contact::ContactService;
pub use error::ServiceError;
pub use media::MediaService;
pub use partner::PartnerService;
pub use password::{hash_password, verify_password};
pub use setting::SettingService;
pub use slug::generate_slug;
pub use storage::{FileStorage, LocalFileStorage, StorageError, StoredFile, UploadedFile};
pub use testimonial::TestimonialService;
pub use user::UserService;
