pub mod constants;
pub mod encoding;
pub mod error;
pub mod privacy;
pub mod types;
pub mod view;

pub use constants::*;
pub use error::{CrossError, RpcFailure};
pub use privacy::{Base64String, PrivacyGroup};
pub use types::*;
pub use view::SignedSubordinateView;
