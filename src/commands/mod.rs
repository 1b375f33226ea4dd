pub mod clean;
pub mod context;
pub mod duration;
pub mod giveaway;
pub mod help;
pub mod poll;
pub mod purge;
pub mod remind;
pub mod setup;
pub mod warn;

use chrono::{DateTime, Utc};
use serenity::model::channel::Message;

pub use crate::commands::context::{Context, UserData};

// The full command list the framework registers at startup.
pub fn all() -> Vec<poise::Command<UserData, crate::error::Error>> {
    vec![
        help::help(),
        giveaway::giveaway(),
        poll::poll(),
        remind::remind(),
        purge::purge(),
        clean::clean(),
        warn::warn(),
        warn::warnings(),
        setup::setup(),
    ]
}

pub(crate) fn message_created_at(message: &Message) -> DateTime<Utc> {
    DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}
