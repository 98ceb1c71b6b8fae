use std::sync::Arc;

use haulboard_core::{trucks, HaulResult, HaulboardConfig, Operator};
use haulboard_storage::{DataBackend, TtlCache};

use crate::calendar::Calendar;
use crate::schema::{SchemaMemo, SchemaProber};
use crate::services::{
    ClientService, Dashboard, OperatorService, ProjectService, SchemaRepair, TripService,
    TruckService,
};
use crate::volume::VolumePipeline;

/// Wires every accessor around one backend.
///
/// The schema prober, the trucks column memo and the operator cache are
/// created once here and shared, so all accessors built from the same
/// context agree on them.
#[derive(Clone)]
pub struct DataContext {
    backend: Arc<dyn DataBackend>,
    config: HaulboardConfig,
    calendar: Calendar,
    prober: Arc<SchemaProber>,
    trucks_memo: Arc<SchemaMemo>,
    operators_cache: TtlCache<Vec<Operator>>,
}

impl DataContext {
    pub fn new(backend: Arc<dyn DataBackend>, config: &HaulboardConfig) -> HaulResult<Self> {
        let calendar = Calendar::from_config(&config.volume)?;
        Ok(Self::with_calendar(backend, config, calendar))
    }

    /// Context whose "today" comes from `calendar`.
    pub fn with_calendar(
        backend: Arc<dyn DataBackend>,
        config: &HaulboardConfig,
        calendar: Calendar,
    ) -> Self {
        let prober = Arc::new(SchemaProber::new(Arc::clone(&backend), config.schema.clone()));
        Self {
            backend,
            config: config.clone(),
            calendar,
            prober,
            trucks_memo: Arc::new(SchemaMemo::new(trucks::TABLE_NAME)),
            operators_cache: TtlCache::new(),
        }
    }

    pub fn config(&self) -> &HaulboardConfig {
        &self.config
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn backend(&self) -> Arc<dyn DataBackend> {
        Arc::clone(&self.backend)
    }

    pub fn prober(&self) -> Arc<SchemaProber> {
        Arc::clone(&self.prober)
    }

    pub fn operators_cache(&self) -> &TtlCache<Vec<Operator>> {
        &self.operators_cache
    }

    pub fn trucks(&self) -> TruckService {
        TruckService::new(self.backend(), self.prober(), Arc::clone(&self.trucks_memo))
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.backend())
    }

    pub fn clients(&self) -> ClientService {
        ClientService::new(self.backend())
    }

    pub fn operators(&self) -> OperatorService {
        OperatorService::new(
            self.backend(),
            self.operators_cache.clone(),
            self.config.cache.operators_ttl(),
        )
    }

    pub fn trips(&self) -> TripService {
        TripService::new(self.backend(), self.calendar)
    }

    pub fn volume(&self) -> VolumePipeline {
        VolumePipeline::new(self.backend(), self.calendar)
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.volume(), self.trips())
    }

    pub fn repair(&self) -> SchemaRepair {
        SchemaRepair::new(self.backend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulboard_core::{BackendConfig, TruckPatch};
    use haulboard_storage::MockBackend;

    fn config() -> HaulboardConfig {
        HaulboardConfig::with_backend(BackendConfig::new("https://fleet.example.co", "anon"))
    }

    #[tokio::test]
    async fn test_truck_services_share_memo() {
        let backend = MockBackend::new().with_table("trucks", ["id", "name", "loadVolume"]);
        let context = DataContext::new(Arc::new(backend.clone()), &config()).unwrap();

        let first = context.trucks();
        assert!(first.columns().await.load_volume_camel);
        let created = context
            .trucks()
            .create(&TruckPatch::new().with_name("Scania R450").with_load_volume(18.0))
            .await
            .unwrap();
        assert_eq!(created.load_volume, Some(18.0));
        assert_eq!(backend.call_count("catalog trucks"), 1);
    }

    #[tokio::test]
    async fn test_operator_services_share_cache() {
        let backend = MockBackend::new();
        backend.register_rpc("get_operators_joined", |_| Ok(serde_json::json!([])));
        let context = DataContext::new(Arc::new(backend.clone()), &config()).unwrap();

        assert!(context.operators().list().await.is_ok());
        assert!(context.operators().list().await.is_ok());
        assert_eq!(backend.call_count("rpc get_operators_joined"), 1);
        assert_eq!(context.operators_cache().stats().await.hits, 1);
    }

    #[test]
    fn test_rejects_bad_offset() {
        let mut config = config();
        config.volume.utc_offset_minutes = Some(24 * 60);
        let context = DataContext::new(Arc::new(MockBackend::new()), &config);
        assert!(context.is_err());
    }
}
