//! Data models
//!
//! Entities stored by the repositories, the inputs services accept, and the
//! summary types returned by the stats endpoints.

mod contact;
mod media;
mod pagination;
mod partner;
mod session;
mod setting;
mod testimonial;
mod user;

pub use contact::{Contact, ContactStats, ContactStatus, CreateContactInput, UpdateContactInput};
pub use media::{CreateMediaInput, MediaAsset, MediaStats, MediaType, UpdateMediaInput};
pub use pagination::PaginatedResult;
pub use partner::{CreatePartnerInput, Partner, PartnerCategory, PartnerStats, UpdatePartnerInput};
pub use session::Session;
pub use setting::{
    BulkSettingItem, CreateSettingInput, Setting, SettingStats, SettingValueType,
    UpdateSettingInput,
};
pub use testimonial::{
    CreateTestimonialInput, Testimonial, TestimonialStats, UpdateTestimonialInput, MAX_RATING,
    MIN_RATING,
};
pub use user::{CreateUserInput, User, UserRole};
