pub mod audit_log;
pub mod broadcast;
pub mod chat_message;
pub mod game;
pub mod license;
pub mod notification;
pub mod plan;
pub mod prediction;
pub mod prompt;
pub mod transaction;
pub mod user;

pub use chat_message::ChatSender;
pub use game::Game;
pub use prediction::{Feedback, PredictionSource};
pub use transaction::{TransactionStatus, TransactionType};
pub use user::UserRole;
