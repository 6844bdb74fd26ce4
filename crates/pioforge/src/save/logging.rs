use async_trait::async_trait;

use super::methods::{
    alliance, arena, bounty, chat, compound_misc, crate_unlock, item, misc, purchase, quest, raid,
    survivor,
};
use super::{SaveContext, SaveSubHandler};
use crate::ServerError;

/// Accepts a group of saves the server does not act on yet.
///
/// The client does not wait on these, so nothing is sent back.
pub struct LoggingSaveHandler {
    name: &'static str,
    types: &'static [&'static str],
}

impl LoggingSaveHandler {
    /// Every save group without a dedicated handler.
    pub const GROUPS: [(&'static str, &'static [&'static str]); 12] = [
        ("alliance", alliance::ALL),
        ("arena", arena::ALL),
        ("bounty", bounty::ALL),
        ("chat", chat::ALL),
        ("compound_misc", compound_misc::ALL),
        ("crate", crate_unlock::ALL),
        ("item", item::ALL),
        ("misc", misc::ALL),
        ("purchase", purchase::ALL),
        ("quest", quest::ALL),
        ("raid", raid::ALL),
        ("survivor", survivor::ALL),
    ];

    pub fn new(name: &'static str, types: &'static [&'static str]) -> Self {
        Self { name, types }
    }
}

#[async_trait]
impl SaveSubHandler for LoggingSaveHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supported_types(&self) -> &[&'static str] {
        self.types
    }

    async fn handle(&self, ctx: SaveContext<'_>) -> Result<(), ServerError> {
        tracing::warn!(
            player_id = %ctx.player_id(),
            group = self.name,
            subtype = ctx.subtype,
            "save not implemented"
        );
        Ok(())
    }
}
