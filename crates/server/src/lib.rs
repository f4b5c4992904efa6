use std::sync::Arc;

use db::DBService;
use services::services::{
    config::CompanySettings,
    events::LiveEvent,
    geocode::ReverseGeocoder,
    mailer::Mailer,
    tracking::TrackingGateway,
    verification::VerificationService,
};
use utils::pubsub::Broker;

pub mod error;
pub mod http;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    settings: CompanySettings,
    broker: Arc<Broker<LiveEvent>>,
    verification: Arc<VerificationService>,
    tracking: Arc<TrackingGateway>,
}

impl AppState {
    pub fn new(
        db: DBService,
        settings: CompanySettings,
        mailer: Arc<dyn Mailer>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let broker = Arc::new(Broker::new());
        let verification = Arc::new(VerificationService::new(
            settings.clone(),
            mailer,
            broker.clone(),
        ));
        let tracking = Arc::new(TrackingGateway::new(
            settings.clone(),
            geocoder,
            broker.clone(),
        ));
        Self {
            db,
            settings,
            broker,
            verification,
            tracking,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn settings(&self) -> &CompanySettings {
        &self.settings
    }

    pub fn broker(&self) -> &Arc<Broker<LiveEvent>> {
        &self.broker
    }

    pub fn verification(&self) -> &VerificationService {
        &self.verification
    }

    pub fn tracking(&self) -> &TrackingGateway {
        &self.tracking
    }
}
