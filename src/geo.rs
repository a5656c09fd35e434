//! Per-state map layer: one point per state sized and coloured by its share
//! of the largest state's sales.

use std::collections::BTreeMap;

use log::warn;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::{
    aggregate::{Measure, checked_total},
    clean::OrderRecord,
    config::MapStyle,
    error::DashboardError,
};

/// Approximate geographic centres of the US states and DC as (lat, lon).
const STATE_CENTROIDS: &[(&str, f64, f64)] = &[
    ("Alabama", 32.806671, -86.791130),
    ("Alaska", 61.370716, -152.404419),
    ("Arizona", 33.729759, -111.431221),
    ("Arkansas", 34.969704, -92.373123),
    ("California", 36.116203, -119.681564),
    ("Colorado", 39.059811, -105.311104),
    ("Connecticut", 41.597782, -72.755371),
    ("Delaware", 39.318523, -75.507141),
    ("District of Columbia", 38.897438, -77.026817),
    ("Florida", 27.766279, -81.686783),
    ("Georgia", 33.040619, -83.643074),
    ("Hawaii", 21.094318, -157.498337),
    ("Idaho", 44.240459, -114.478828),
    ("Illinois", 40.349457, -88.986137),
    ("Indiana", 39.849426, -86.258278),
    ("Iowa", 42.011539, -93.210526),
    ("Kansas", 38.526600, -96.726486),
    ("Kentucky", 37.668140, -84.670067),
    ("Louisiana", 31.169546, -91.867805),
    ("Maine", 44.693947, -69.381927),
    ("Maryland", 39.063946, -76.802101),
    ("Massachusetts", 42.230171, -71.530106),
    ("Michigan", 43.326618, -84.536095),
    ("Minnesota", 45.694454, -93.900192),
    ("Mississippi", 32.741646, -89.678696),
    ("Missouri", 38.456085, -92.288368),
    ("Montana", 46.921925, -110.454353),
    ("Nebraska", 41.125370, -98.268082),
    ("Nevada", 38.313515, -117.055374),
    ("New Hampshire", 43.452492, -71.563896),
    ("New Jersey", 40.298904, -74.521011),
    ("New Mexico", 34.840515, -106.248482),
    ("New York", 42.165726, -74.948051),
    ("North Carolina", 35.630066, -79.806419),
    ("North Dakota", 47.528912, -99.784012),
    ("Ohio", 40.388783, -82.764915),
    ("Oklahoma", 35.565342, -96.928917),
    ("Oregon", 44.572021, -122.070938),
    ("Pennsylvania", 40.590752, -77.209755),
    ("Rhode Island", 41.680893, -71.511780),
    ("South Carolina", 33.856892, -80.945007),
    ("South Dakota", 44.299782, -99.438828),
    ("Tennessee", 35.747845, -86.692345),
    ("Texas", 31.054487, -97.563461),
    ("Utah", 40.150032, -111.862434),
    ("Vermont", 44.045876, -72.710686),
    ("Virginia", 37.769337, -78.169968),
    ("Washington", 47.400902, -121.490494),
    ("West Virginia", 38.491226, -80.954453),
    ("Wisconsin", 44.268543, -89.616508),
    ("Wyoming", 42.755966, -107.302490),
];

pub fn state_centroid(state: &str) -> Option<(f64, f64)> {
    let state = state.trim();
    STATE_CENTROIDS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(state))
        .map(|(_, lat, lon)| (*lat, *lon))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    Weighted,
    Unweighted,
    Centroid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sales: Decimal,
    pub radius: f64,
    pub color: [u8; 4],
    pub source: CoordinateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub points: Vec<MapPoint>,
    pub omitted_states: Vec<String>,
}

#[derive(Default)]
struct StateAccumulator {
    sales: Decimal,
    weight: f64,
    weighted_lat: f64,
    weighted_lon: f64,
    lat: f64,
    lon: f64,
    located: usize,
}

impl StateAccumulator {
    fn ingest(&mut self, state: &str, record: &OrderRecord) -> Result<(), DashboardError> {
        self.sales = checked_total(self.sales, record.sales, Measure::Sales, state)?;
        if let Some((lat, lon)) = record.coordinates() {
            let weight = record.sales.to_f64().unwrap_or(0.0);
            self.weight += weight;
            self.weighted_lat += lat * weight;
            self.weighted_lon += lon * weight;
            self.lat += lat;
            self.lon += lon;
            self.located += 1;
        }
        Ok(())
    }

    fn row_position(&self) -> Option<(f64, f64, CoordinateSource)> {
        if self.located == 0 {
            None
        } else if self.weight.abs() > f64::EPSILON {
            Some((
                self.weighted_lat / self.weight,
                self.weighted_lon / self.weight,
                CoordinateSource::Weighted,
            ))
        } else {
            let count = self.located as f64;
            Some((
                self.lat / count,
                self.lon / count,
                CoordinateSource::Unweighted,
            ))
        }
    }
}

/// Builds the map layer from filtered rows.
///
/// With `use_row_coordinates` each state sits at the sales-weighted mean of
/// its rows' coordinates; otherwise at its centroid. States that cannot be
/// placed are listed in `omitted_states`.
pub fn build_map_layer<'a, I>(
    rows: I,
    use_row_coordinates: bool,
    style: &MapStyle,
) -> Result<MapLayer, DashboardError>
where
    I: IntoIterator<Item = &'a OrderRecord>,
{
    let mut states: BTreeMap<&'a str, StateAccumulator> = BTreeMap::new();
    for record in rows {
        if let Some(state) = record.state.as_deref() {
            states.entry(state).or_default().ingest(state, record)?;
        }
    }

    let mut placed = Vec::with_capacity(states.len());
    let mut omitted_states = Vec::new();
    for (state, acc) in &states {
        let position = if use_row_coordinates {
            acc.row_position()
        } else {
            state_centroid(state).map(|(lat, lon)| (lat, lon, CoordinateSource::Centroid))
        };
        match position {
            Some((lat, lon, source)) => placed.push((*state, acc.sales, lat, lon, source)),
            None => omitted_states.push(state.to_string()),
        }
    }
    if !omitted_states.is_empty() {
        warn!(
            "No coordinates for {} state(s): {}",
            omitted_states.len(),
            omitted_states.join(", ")
        );
    }

    let max_sales = placed
        .iter()
        .map(|(_, sales, ..)| *sales)
        .max()
        .filter(|max| !max.is_zero())
        .unwrap_or(Decimal::ONE);
    let points = placed
        .into_iter()
        .map(|(state, sales, latitude, longitude, source)| {
            let share = sales
                .checked_div(max_sales)
                .and_then(|share| share.to_f64())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            MapPoint {
                state: state.to_string(),
                latitude,
                longitude,
                sales,
                radius: style.min_radius + share * (style.max_radius - style.min_radius),
                color: blend(style.low_color, style.high_color, share),
                source,
            }
        })
        .collect();
    Ok(MapLayer {
        points,
        omitted_states,
    })
}

fn blend(low: [u8; 4], high: [u8; 4], share: f64) -> [u8; 4] {
    let mut color = [0u8; 4];
    for (idx, channel) in color.iter_mut().enumerate() {
        let from = f64::from(low[idx]);
        let to = f64::from(high[idx]);
        *channel = (from + (to - from) * share).round().clamp(0.0, 255.0) as u8;
    }
    color
}
