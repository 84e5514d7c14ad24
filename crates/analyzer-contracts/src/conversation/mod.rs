mod state;
mod turn;

pub use state::{Conversation, ConversationError};
pub use turn::Turn;
