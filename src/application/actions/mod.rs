//! Actions the default gateway registers.

pub mod api;
pub mod capture;
pub mod credit_card_token;
pub mod refund_info;

pub use api::ApiAction;
pub use capture::CaptureAction;
pub use credit_card_token::CreateTokenForCreditCardAction;
pub use refund_info::RefundInfoAction;
