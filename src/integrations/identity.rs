use std::collections::{HashMap, HashSet};

pub trait IdentityResolver: Send + Sync {
    fn display_name(&self, player_id: &str) -> Option<String>;
    fn is_bot(&self, player_id: &str) -> bool;
}

/// The resolved name, or the raw identity when nothing is known.
pub fn display(resolver: &dyn IdentityResolver, player_id: &str) -> String {
    resolver
        .display_name(player_id)
        .unwrap_or_else(|| player_id.to_string())
}

/// Static name and bot tables.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    names: HashMap<String, String>,
    bots: HashSet<String>,
}

impl Directory {
    pub fn new(bot_ids: &[String]) -> Self {
        Self {
            names: HashMap::new(),
            bots: bot_ids.iter().cloned().collect(),
        }
    }

    pub fn with_name(mut self, player_id: &str, name: &str) -> Self {
        self.names.insert(player_id.to_string(), name.to_string());
        self
    }
}

impl IdentityResolver for Directory {
    fn display_name(&self, player_id: &str) -> Option<String> {
        self.names.get(player_id).cloned()
    }

    fn is_bot(&self, player_id: &str) -> bool {
        self.bots.contains(player_id)
    }
}
