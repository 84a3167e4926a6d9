//! Value objects - immutable types that represent domain concepts

mod direction;
mod message_id;
mod permissions;
mod retry_mode;
mod snowflake;
mod token_type;

pub use direction::Direction;
pub use message_id::MessageId;
pub use permissions::Permissions;
pub use retry_mode::RetryMode;
pub use snowflake::{Snowflake, SnowflakeParseError};
pub use token_type::TokenType;
