mod record;
mod sqlite;

pub use record::{InteractionMeta, InteractionRecord, NewInteraction};
pub use sqlite::InteractionStore;
