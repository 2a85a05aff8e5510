//! Human-like timing for form interaction.

use anyhow::Result;
use fantoccini::elements::Element;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Produces human-like delays and per-key typing to reduce automation
/// signals on the portal's form.
#[derive(Debug, Clone, Default)]
pub struct TypingCadence {}

impl TypingCadence {
    pub fn new() -> Self {
        Self {}
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        let mut rng = OsRng;
        let ms = rng.gen_range(min..=max);
        sleep(Duration::from_millis(ms)).await;
    }

    /// Type the text one key at a time with small random gaps.
    pub async fn type_keys(&self, element: &Element, text: &str) -> Result<()> {
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(30, 150).await;
        }
        Ok(())
    }
}
