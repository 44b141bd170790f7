use std::{ops::Deref, sync::Arc};

use crate::config::BotConfig;
use crate::prompt::DecisionPrompts;
use crate::punishment::{LifecycleCoordinator, SweepRequest};
use poise::serenity_prelude as serenity;
use serenity::prelude::TypeMapKey;
use tokio::sync::mpsc::Sender;

/// Shared state handed to every command and event handler
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

// Implement TypeMapKey for Data to allow storing it in Serenity's data map
impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("open_prompts", &self.prompts_open())
            .field("sweep_running", &!self.sweep_tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    #[must_use]
    pub fn new(
        config: BotConfig,
        coordinator: LifecycleCoordinator,
        sweep_tx: Sender<SweepRequest>,
    ) -> Self {
        Self(Arc::new(DataInner {
            config,
            coordinator,
            prompts: DecisionPrompts::new(),
            sweep_tx,
        }))
    }

    /// Whether a member with `role_ids` may run moderation commands
    #[must_use]
    pub fn is_moderator(&self, role_ids: &[serenity::RoleId]) -> bool {
        role_ids
            .iter()
            .any(|role_id| self.config.is_moderator_role(role_id.get()))
    }

    fn prompts_open(&self) -> bool {
        !self.prompts.is_empty()
    }
}

pub struct DataInner {
    pub config: BotConfig,
    pub coordinator: LifecycleCoordinator,
    /// Reaction prompts waiting for a moderator's answer
    pub prompts: DecisionPrompts,
    /// Requests to the expiry sweep task
    pub sweep_tx: Sender<SweepRequest>,
}
