use crate::slack::client::ConversationApi;
use std::collections::HashMap;
use tracing::warn;

/// Run-scoped author id → display name resolution. Each distinct id costs
/// at most one lookup; misses degrade to the raw id.
pub struct IdentityResolver<'a, A: ConversationApi + ?Sized> {
    api: &'a A,
    cache: HashMap<String, String>,
    lookups: usize,
}

impl<'a, A: ConversationApi + ?Sized> IdentityResolver<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    pub fn resolve(&mut self, author_id: &str) -> String {
        let author_id = author_id.trim();
        if author_id.is_empty() {
            return "unknown_user".to_string();
        }
        if let Some(name) = self.cache.get(author_id) {
            return name.clone();
        }

        self.lookups += 1;
        let name = match self.api.lookup_user(author_id) {
            Ok(user) => match user.preferred_name() {
                Some(name) => name,
                None => {
                    warn!(author_id, "user profile has no usable name, using raw id");
                    author_id.to_string()
                }
            },
            Err(e) => {
                warn!(author_id, error = %e, "user lookup failed, using raw id");
                author_id.to_string()
            }
        };
        self.cache.insert(author_id.to_string(), name.clone());
        name
    }

    /// Number of external lookups made so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}
