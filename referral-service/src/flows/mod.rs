pub mod assess;
pub mod chat;
pub mod utils;

pub use assess::{AssessError, AssessmentCache, assess};
pub use chat::{DEFAULT_TOP_K, run_chat_turn};
pub use utils::RigModelClient;
