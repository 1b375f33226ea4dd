use std::sync::Arc;

use serenity::prelude::TypeMapKey;

use crate::state::BotState;

pub struct BotStateStorage;

impl TypeMapKey for BotStateStorage {
    type Value = Arc<BotState>;
}
