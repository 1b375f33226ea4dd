use std::sync::Arc;

use poise::Context as PoiseContext;

use crate::state::BotState;

// User data, which is stored and accessible in all command invocations
pub struct UserData {
    pub state: Arc<BotState>,
}

// Generic context available across Poise commands
pub type Context<'a> = PoiseContext<'a, UserData, crate::error::Error>;
