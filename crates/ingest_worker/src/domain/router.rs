use std::sync::Arc;

use ais_domain::error::DomainResult;
use ais_domain::event::{FeedEvent, FeedEventKind};
use ais_domain::identity::IdentityCache;
use ais_domain::repository::VesselRepository;
use ais_domain::vessel::{PositionRecord, UnknownVesselRecord, VesselUpsert};
use tracing::{info, warn};

/// Where an event belongs in storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Vessel(VesselUpsert),
    Position(PositionRecord),
    Unknown(UnknownVesselRecord),
}

/// Resolves each event's MMSI to a registered vessel identity.
///
/// Static data frames carry the IMO number directly and teach the cache;
/// position reports only carry the MMSI and are resolved through the cache
/// with a storage fallback. Anything unresolvable goes to the unknown
/// vessel table under its MMSI.
pub struct VesselRouter<R> {
    cache: IdentityCache,
    repository: Arc<R>,
}

impl<R: VesselRepository> VesselRouter<R> {
    pub fn new(repository: Arc<R>, cache_capacity: usize) -> Self {
        Self {
            cache: IdentityCache::new(cache_capacity),
            repository,
        }
    }

    /// Preload the cache from storage so a restart does not funnel every
    /// known vessel through the fallback path.
    pub async fn warm(&mut self) -> DomainResult<usize> {
        let mappings = self.repository.load_identity_map().await?;
        let count = mappings.len();
        self.cache.warm(mappings);
        info!(mappings = count, "identity cache warmed");
        Ok(count)
    }

    pub async fn route(&mut self, event: FeedEvent) -> DomainResult<Routed> {
        match event.kind {
            FeedEventKind::Static(data) => match FeedEvent::valid_imo(data.imo_number) {
                Some(imo) => {
                    if let Some(previous) = self.cache.put(event.mmsi, imo) {
                        if previous != imo {
                            // An MMSI can legitimately move between hulls;
                            // the most recent static data wins.
                            warn!(
                                mmsi = event.mmsi,
                                previous_imo = previous,
                                imo_number = imo,
                                "mmsi remapped to a different vessel"
                            );
                        }
                    }
                    Ok(Routed::Vessel(VesselUpsert {
                        imo_number: imo,
                        mmsi: event.mmsi,
                        name: data.name,
                        type_code: data.type_code,
                        length: data.length,
                        width: data.width,
                        max_draught: data.max_draught,
                        destination: data.destination,
                        updated_at: event.collected_at,
                    }))
                }
                None => Ok(Routed::Unknown(UnknownVesselRecord {
                    mmsi: event.mmsi,
                    name: data.name,
                    destination: data.destination,
                    lat: event.lat,
                    lon: event.lon,
                    speed_over_ground: None,
                    course_over_ground: None,
                    nav_status: None,
                    collected_at: event.collected_at,
                })),
            },
            FeedEventKind::Position(data) => {
                let imo = match self.cache.get(event.mmsi) {
                    Some(imo) => Some(imo),
                    None => match self.repository.find_imo_by_mmsi(event.mmsi).await? {
                        Some(imo) => {
                            self.cache.put(event.mmsi, imo);
                            Some(imo)
                        }
                        None => None,
                    },
                };

                match imo {
                    Some(imo) => Ok(Routed::Position(PositionRecord {
                        imo_number: Some(imo),
                        mmsi: event.mmsi,
                        lat: event.lat,
                        lon: event.lon,
                        speed_over_ground: data.speed_over_ground,
                        course_over_ground: data.course_over_ground,
                        nav_status: data.nav_status,
                        rate_of_turn: data.rate_of_turn,
                        true_heading: data.true_heading,
                        collected_at: event.collected_at,
                    })),
                    None => Ok(Routed::Unknown(UnknownVesselRecord {
                        mmsi: event.mmsi,
                        name: None,
                        destination: None,
                        lat: event.lat,
                        lon: event.lon,
                        speed_over_ground: data.speed_over_ground,
                        course_over_ground: data.course_over_ground,
                        nav_status: data.nav_status,
                        collected_at: event.collected_at,
                    })),
                }
            }
        }
    }
}
