//! The storefront's service catalog and its import from provider price lists.

use rust_decimal::Decimal;
use serde::Serialize;
use smm_types::catalog::{Service, ServiceDraft};
use smm_types::money::with_markup;
use smm_upstream::provider::{ProviderBalance, ProviderService};
use smm_upstream::{ProviderClient, ProviderRegistry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;

use crate::error::ApiError;
use crate::store::Store;

/// Outcome of a provider catalog import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub provider: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct CatalogDesk {
    store: Arc<dyn Store>,
    providers: Arc<ProviderRegistry>,
    /// Percentage added on top of each provider's rate.
    markups: BTreeMap<String, Decimal>,
}

impl CatalogDesk {
    pub fn new(
        store: Arc<dyn Store>,
        providers: Arc<ProviderRegistry>,
        markups: BTreeMap<String, Decimal>,
    ) -> Self {
        Self {
            store,
            providers,
            markups,
        }
    }

    pub async fn services(
        &self,
        active_only: bool,
        category: Option<&str>,
    ) -> Result<Vec<Service>, ApiError> {
        let mut services = self.store.list_services(active_only).await?;
        if let Some(category) = category {
            services.retain(|s| s.category.eq_ignore_ascii_case(category));
        }
        Ok(services)
    }

    pub async fn save_service(&self, draft: ServiceDraft) -> Result<Service, ApiError> {
        draft.validate().map_err(ApiError::validation)?;
        if self.providers.by_id(&draft.provider_id).is_none() {
            return Err(ApiError::validation(format!(
                "unknown provider {}",
                draft.provider_id
            )));
        }
        Ok(self.store.upsert_service(draft).await?)
    }

    pub async fn set_active(&self, service_id: i64, active: bool) -> Result<Service, ApiError> {
        let service = self.store.set_service_active(service_id, active).await?;
        tracing::info!(service_id, active, "Service visibility changed");
        Ok(service)
    }

    /// Imports the provider's price list. Known services keep their name, category and
    /// visibility; new ones arrive hidden so an admin can review them first.
    #[instrument(skip_all, fields(provider = provider_id))]
    pub async fn sync_provider(&self, provider_id: &str) -> Result<SyncReport, ApiError> {
        let provider = self.provider(provider_id)?;
        let markup = self
            .markups
            .get(provider_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let listed = provider.services().await?;

        let existing: HashMap<String, Service> = self
            .store
            .list_services(false)
            .await?
            .into_iter()
            .filter(|s| s.provider_id == provider_id)
            .map(|s| (s.provider_service_id.clone(), s))
            .collect();

        let mut report = SyncReport {
            provider: provider_id.to_string(),
            ..SyncReport::default()
        };
        for item in listed {
            let known = existing.get(&item.service);
            let draft = draft_from(provider_id, item, markup, known);
            if let Err(reason) = draft.validate() {
                tracing::warn!(service = %draft.provider_service_id, reason, "Skipping provider service");
                report.skipped += 1;
                continue;
            }
            self.store.upsert_service(draft).await?;
            if known.is_some() {
                report.updated += 1;
            } else {
                report.created += 1;
            }
        }
        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "Provider catalog synced"
        );
        Ok(report)
    }

    pub async fn provider_balance(&self, provider_id: &str) -> Result<ProviderBalance, ApiError> {
        Ok(self.provider(provider_id)?.balance().await?)
    }

    fn provider(&self, provider_id: &str) -> Result<&ProviderClient, ApiError> {
        self.providers
            .by_id(provider_id)
            .ok_or_else(|| ApiError::not_found("provider"))
    }
}

fn draft_from(
    provider_id: &str,
    item: ProviderService,
    markup: Decimal,
    known: Option<&Service>,
) -> ServiceDraft {
    let rate = with_markup(item.rate, markup);
    match known {
        Some(service) => ServiceDraft {
            provider_id: provider_id.to_string(),
            provider_service_id: item.service,
            name: service.name.clone(),
            category: service.category.clone(),
            description: service.description.clone(),
            rate,
            min: item.min,
            max: item.max,
            active: service.active,
            refill: item.refill,
            cancel: item.cancel,
        },
        None => ServiceDraft {
            provider_id: provider_id.to_string(),
            provider_service_id: item.service,
            name: item.name,
            category: item.category,
            description: item.kind,
            rate,
            min: item.min,
            max: item.max,
            active: false,
            refill: item.refill,
            cancel: item.cancel,
        },
    }
}
