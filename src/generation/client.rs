use std::sync::Arc;
use std::time::Instant;

use crate::contacts::ContactDirectory;
use crate::errors::PilotResult;
use crate::executor::safety::{validate_generated, ScriptProfile};
use crate::generation::prompt::{build_launch_prompt, build_ui_prompt};
use crate::llm::types::ChatMessage;
use crate::llm::{ProviderRegistry, Role};
use crate::perception::types::{AppContext, UIElement};
use crate::script::ActionScript;

/// Single-shot language-model fallback with strict response validation.
pub struct GenerativeClient {
    registry: Arc<ProviderRegistry>,
    contacts: Option<Arc<ContactDirectory>>,
}

impl GenerativeClient {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            contacts: None,
        }
    }

    pub fn with_contacts(mut self, contacts: Arc<ContactDirectory>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// One model call, no retries. A known context selects the on-screen variant,
    /// otherwise the app-launch variant.
    pub async fn generate(
        &self,
        instruction: &str,
        ctx: Option<&AppContext>,
        elements: &[UIElement],
    ) -> PilotResult<ActionScript> {
        let (role, profile, prompt) = match ctx {
            Some(_) => (Role::Automation, ScriptProfile::Ui, build_ui_prompt(instruction, ctx, elements)),
            None => (Role::Launch, ScriptProfile::Launch, build_launch_prompt(instruction)),
        };

        let (provider, cfg) = self.registry.call_config_for_role(role)?;
        let started = Instant::now();
        let response = provider.chat(vec![ChatMessage::user(prompt)], &cfg).await?;
        tracing::info!(
            role = %role,
            provider = provider.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation response received"
        );
        tracing::debug!(raw = %response.content, "raw generation");

        let script = validate_generated(&response.content, profile)?;
        let script = match (profile, &self.contacts) {
            (ScriptProfile::Launch, Some(contacts)) => contacts.substitute_names(&script),
            _ => script,
        };
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;
    use crate::testing::{fake_registry, FakeProvider, FixedContacts};

    fn maps() -> AppContext {
        AppContext {
            package: "com.google.android.apps.maps".into(),
            screen: "com.google.android.maps.MapsActivity".into(),
            app_name: "Google Maps".into(),
            screen_description: "Map View".into(),
        }
    }

    #[tokio::test]
    async fn context_selects_ui_prompt() {
        let provider = Arc::new(FakeProvider::replying("input tap 540 200\nsleep 1"));
        let client = GenerativeClient::new(fake_registry(provider.clone()));
        let script = client.generate("tap search", Some(&maps()), &[]).await.unwrap();
        assert_eq!(script.len(), 2);
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Current App: Google Maps"));
    }

    #[tokio::test]
    async fn rejects_dangerous_response_without_partial_result() {
        let provider = Arc::new(FakeProvider::replying("input keyevent 4\nrm -rf /"));
        let client = GenerativeClient::new(fake_registry(provider));
        let err = client.generate("clean up", None, &[]).await.unwrap_err();
        assert!(matches!(err, PilotError::GenerationRejected(_)));
    }

    #[tokio::test]
    async fn ui_variant_refuses_launch_lines() {
        let provider = Arc::new(FakeProvider::replying("am start -n com.whatsapp/.HomeActivity"));
        let client = GenerativeClient::new(fake_registry(provider));
        assert!(client.generate("open chats", Some(&maps()), &[]).await.is_err());
    }

    #[tokio::test]
    async fn launch_scripts_get_contact_numbers() {
        let provider = Arc::new(FakeProvider::replying(
            "am start -a android.intent.action.VIEW -d 'https://api.whatsapp.com/send?phone=mom&text=hi'",
        ));
        let contacts = ContactDirectory::load(Arc::new(FixedContacts(vec![(
            "Mom".into(),
            "+1 555 123 4567".into(),
        )])))
        .await;
        let client = GenerativeClient::new(fake_registry(provider)).with_contacts(Arc::new(contacts));
        let script = client.generate("message mom hi", None, &[]).await.unwrap();
        assert!(script.to_string().contains("phone=15551234567&text=hi"));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let provider = Arc::new(FakeProvider::failing("503 upstream"));
        let client = GenerativeClient::new(fake_registry(provider));
        assert!(matches!(
            client.generate("x", None, &[]).await,
            Err(PilotError::LlmProvider(_))
        ));
    }
}
