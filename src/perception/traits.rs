use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::{AppContext, UIElement};

/// Determines what the user is currently looking at.
/// Implementations must give up within their own deadline; `None` means unknown.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn detect(&self) -> Option<AppContext>;
}

/// Produces a point-in-time snapshot of interactable on-screen elements.
#[async_trait]
pub trait ElementSource: Send + Sync {
    async fn extract_elements(&self) -> PilotResult<Vec<UIElement>>;
}
