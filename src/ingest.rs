// src/ingest.rs
//! The ingestion pass: query a database, normalize and compile each page,
//! hand finished documents to a sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::api::ContentTreeLoader;
use crate::error::AppError;
use crate::formatting::{normalize_property, page_title, BlockTreeCompiler};
use crate::model::{Document, Page, PropertyValue};
use crate::types::{NormalizedValue, RenderMode};

/// Receives finished documents, one per page, in query order.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn emit(&self, document: Document) -> Result<(), AppError>;
}

/// What a slug generator mints for a page whose slug property is empty.
pub struct GeneratedSlug {
    /// The property name to write back to the workspace.
    pub notion_key: String,
    pub value: String,
    /// Optional link attached to the written rich text.
    pub url: Option<String>,
}

pub type SlugGenerator =
    Box<dyn Fn(&IndexMap<String, NormalizedValue>, &Page) -> GeneratedSlug + Send + Sync>;

/// Where slugs live and how missing ones get minted.
pub struct SlugPolicy {
    /// The normalized property name holding the slug.
    pub key: String,
    pub generator: SlugGenerator,
}

/// Rewrites a property name before it lands in the document.
pub type KeyConverter = Box<dyn Fn(&str, &PropertyValue) -> String + Send + Sync>;

/// Rewrites a normalized value before it lands in the document. Receives
/// the source property alongside, for converters that need the raw shape.
pub type ValueConverter =
    Box<dyn Fn(&str, &PropertyValue, NormalizedValue) -> NormalizedValue + Send + Sync>;

/// Runs ingestion passes over one database.
pub struct IngestionDriver {
    loader: ContentTreeLoader,
    sink: Arc<dyn DocumentSink>,
    compiler: BlockTreeCompiler,
    database_id: String,
    filter: Option<Value>,
    slug: Option<SlugPolicy>,
    key_converter: Option<KeyConverter>,
    value_converter: Option<ValueConverter>,
    props_to_preamble: bool,
    in_flight: AtomicBool,
}

impl IngestionDriver {
    pub fn new(
        loader: ContentTreeLoader,
        sink: Arc<dyn DocumentSink>,
        mode: RenderMode,
        lower_heading_level: bool,
        database_id: String,
        filter: Option<Value>,
    ) -> Self {
        Self {
            loader,
            sink,
            compiler: BlockTreeCompiler::new(mode, lower_heading_level),
            database_id,
            filter,
            slug: None,
            key_converter: None,
            value_converter: None,
            props_to_preamble: false,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_slug_policy(mut self, policy: SlugPolicy) -> Self {
        self.slug = Some(policy);
        self
    }

    pub fn with_key_converter(mut self, converter: KeyConverter) -> Self {
        self.key_converter = Some(converter);
        self
    }

    pub fn with_value_converter(mut self, converter: ValueConverter) -> Self {
        self.value_converter = Some(converter);
        self
    }

    pub fn with_preamble(mut self, enabled: bool) -> Self {
        self.props_to_preamble = enabled;
        self
    }

    /// One full pass. Page-level failures are logged and skipped so one
    /// broken page cannot sink the whole run; configuration errors are
    /// operator mistakes and abort immediately.
    pub async fn run(&self) -> Result<(), AppError> {
        let pages = self
            .loader
            .load_pages(&self.database_id, self.filter.as_ref())
            .await?;
        log::info!("Ingesting {} pages", pages.len());

        for page in pages {
            let page_id = page.id.clone();
            match self.ingest_page(page).await {
                Ok(()) => {}
                Err(err @ AppError::Configuration(_)) => return Err(err),
                Err(err) => log::error!("Skipping page {}: {}", page_id, err),
            }
        }
        Ok(())
    }

    /// Re-runs the pass on a fixed interval, never returning. A tick that
    /// would overlap an in-flight pass is skipped with a warning.
    pub async fn run_periodically(self: &Arc<Self>, interval: Duration) -> Result<(), AppError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.in_flight.swap(true, Ordering::SeqCst) {
                log::warn!("Previous ingestion pass still running, skipping this tick");
                continue;
            }
            let driver = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = driver.run().await {
                    log::error!("Scheduled ingestion pass failed: {}", err);
                }
                driver.in_flight.store(false, Ordering::SeqCst);
            });
        }
    }

    async fn ingest_page(&self, page: Page) -> Result<(), AppError> {
        let title = page_title(&page);
        let mut properties = self.normalize_properties(&page);

        let slug = match &self.slug {
            Some(policy) => self.resolve_slug(policy, &mut properties, &page).await?,
            None => None,
        };

        let mut body = self.compiler.compile(&page.children);
        if self.props_to_preamble {
            body = format!("---\n{}\n---\n\n{}", encode_preamble(&properties)?, body);
        }

        let document = Document {
            id: page.id.clone(),
            title,
            properties,
            body,
            created_at: page.created_time.clone(),
            updated_at: page.last_edited_time.to_rfc3339(),
            slug,
            raw: page.raw,
        };
        self.sink.emit(document).await
    }

    fn normalize_properties(&self, page: &Page) -> IndexMap<String, NormalizedValue> {
        page.properties
            .iter()
            .map(|(name, property)| {
                let key = match &self.key_converter {
                    Some(convert) => convert(name, property),
                    None => name.clone(),
                };
                let mut value = normalize_property(property);
                if let Some(convert) = &self.value_converter {
                    value = convert(name, property, value);
                }
                (key, value)
            })
            .collect()
    }

    /// Applies the slug policy to one page. The property must exist and be
    /// a string; an empty string triggers minting and a back-write, with
    /// the cache entry invalidated first so a later pass cannot serve the
    /// pre-mutation snapshot.
    async fn resolve_slug(
        &self,
        policy: &SlugPolicy,
        properties: &mut IndexMap<String, NormalizedValue>,
        page: &Page,
    ) -> Result<Option<String>, AppError> {
        let current = properties.get(&policy.key).ok_or_else(|| {
            AppError::Configuration(format!(
                "Slug property '{}' does not exist on page {}",
                policy.key, page.id
            ))
        })?;
        let current = current
            .as_str()
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Slug property '{}' on page {} is not a text value",
                    policy.key, page.id
                ))
            })?
            .to_string();

        if !current.is_empty() {
            return Ok(Some(current));
        }

        self.loader.invalidate_page(&page.id);
        let minted = (policy.generator)(properties, page);

        match self
            .loader
            .update_page_property(&page.id, &minted.notion_key, &minted.value, minted.url.as_deref())
            .await
        {
            Ok(_) => {
                properties.insert(
                    policy.key.clone(),
                    NormalizedValue::String(minted.value.clone()),
                );
                Ok(Some(minted.value))
            }
            Err(err) => {
                log::warn!("Could not write slug for page {}: {}", page.id, err);
                Ok(None)
            }
        }
    }
}

fn encode_preamble(properties: &IndexMap<String, NormalizedValue>) -> Result<String, AppError> {
    serde_json::to_string_pretty(properties)
        .map_err(|err| AppError::MalformedResponse(format!("preamble encoding failed: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preamble_encodes_untagged_scalars() {
        let mut properties = IndexMap::new();
        properties.insert("Name".to_string(), NormalizedValue::String("A".to_string()));
        properties.insert("Done".to_string(), NormalizedValue::Bool(true));

        let encoded = encode_preamble(&properties).unwrap();
        assert_eq!(encoded, "{\n  \"Name\": \"A\",\n  \"Done\": true\n}");
    }
}
