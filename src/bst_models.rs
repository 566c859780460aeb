// Data model and dataset loading for the Bluebikes Station Traffic explorer
//
// Input datasets (loaded from local files, see --help for paths):
// - Stations JSON: GBFS-style station_information snapshot,
//   e.g. https://dsc106.com/labs/lab07/data/bluebikes-stations.json
// - Trips CSV: one row per rental with start/end station ids and timestamps,
//   e.g. https://dsc106.com/labs/lab07/data/bluebikes-traffic-2024-03.csv
//
// The interesting part lives in MinuteBuckets: trips are binned by
// minute-of-day (1440 slots, one index keyed by start minute and one by end
// minute) so that the ±60 minute window around any slider position is
// answered in O(trips-in-range) instead of a full rescan per scrub step.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Data Structures
// ============================================================================

/// A fixed bike dock with geographic coordinates. Static after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub short_name: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

/// One rental event. Immutable once loaded; the minute fields are derived
/// from the timestamps at parse time and always lie in [0, 1439].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub start_station_id: String,
    pub end_station_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub started_minute: u16,
    pub ended_minute: u16,
}

/// A station with traffic counts merged on. Rebuilt from scratch on every
/// filter change; the base station list is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationTraffic {
    pub short_name: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub arrivals: u32,
    pub departures: u32,
    pub total_traffic: u32,
}

/// Everything the application holds in memory: the loaded datasets plus the
/// two minute indices. Owned by the controller, read by everything else.
#[derive(Debug, Clone)]
pub struct TrafficData {
    pub stations: Vec<Station>,
    pub trips: Vec<Trip>,
    pub departures_by_minute: MinuteBuckets,
    pub arrivals_by_minute: MinuteBuckets,
    pub skipped_rows: usize,
    pub loaded_at: u64,
}

// ============================================================================
// Time Filter
// ============================================================================

/// The user-selected query minute. The slider speaks integers in [-1, 1439]
/// where -1 means "any time"; everything past the controller uses this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    AnyTime,
    Minute(u16),
}

impl TimeFilter {
    pub fn from_slider(value: i32) -> Option<TimeFilter> {
        if value == BSTModels::ANY_TIME_SLIDER_VALUE {
            Some(TimeFilter::AnyTime)
        } else if (0..BSTModels::MINUTES_PER_DAY as i32).contains(&value) {
            Some(TimeFilter::Minute(value as u16))
        } else {
            None
        }
    }

    pub fn slider_value(&self) -> i32 {
        match self {
            TimeFilter::AnyTime => BSTModels::ANY_TIME_SLIDER_VALUE,
            TimeFilter::Minute(minute) => *minute as i32,
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, TimeFilter::Minute(_))
    }
}

// ============================================================================
// Minute Buckets
// ============================================================================

/// 1440 ordered slots of trip indices, one slot per minute of the day.
/// Two instances exist side by side: one keyed by start minute (departures)
/// and one by end minute (arrivals). Built once per dataset load and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct MinuteBuckets {
    slots: Vec<Vec<usize>>,
}

impl MinuteBuckets {
    pub fn by_start_minute(trips: &[Trip]) -> Self {
        Self::build(trips, |trip| trip.started_minute)
    }

    pub fn by_end_minute(trips: &[Trip]) -> Self {
        Self::build(trips, |trip| trip.ended_minute)
    }

    fn build<F>(trips: &[Trip], minute_of: F) -> Self
    where
        F: Fn(&Trip) -> u16,
    {
        let mut slots = vec![Vec::new(); BSTModels::MINUTES_PER_DAY];
        for (index, trip) in trips.iter().enumerate() {
            slots[minute_of(trip) as usize].push(index);
        }
        MinuteBuckets { slots }
    }

    /// Trips within ±60 minutes of the filter minute, wrapping past midnight.
    /// With no filter, the concatenation of all buckets (the full trip set).
    pub fn in_window<'a>(&self, trips: &'a [Trip], filter: TimeFilter) -> Vec<&'a Trip> {
        match filter {
            TimeFilter::AnyTime => self.collect_range(trips, 0, BSTModels::MINUTES_PER_DAY - 1),
            TimeFilter::Minute(minute) => {
                let minute = minute as usize;
                let lower = (minute + BSTModels::MINUTES_PER_DAY - BSTModels::TIME_WINDOW_MINUTES)
                    % BSTModels::MINUTES_PER_DAY;
                let upper = (minute + BSTModels::TIME_WINDOW_MINUTES) % BSTModels::MINUTES_PER_DAY;

                if lower <= upper {
                    self.collect_range(trips, lower, upper)
                } else {
                    // The window crosses midnight: tail of the day first,
                    // then the start of the day
                    let mut in_range =
                        self.collect_range(trips, lower, BSTModels::MINUTES_PER_DAY - 1);
                    in_range.extend(self.collect_range(trips, 0, upper));
                    in_range
                }
            }
        }
    }

    fn collect_range<'a>(&self, trips: &'a [Trip], lower: usize, upper: usize) -> Vec<&'a Trip> {
        self.slots[lower..=upper]
            .iter()
            .flatten()
            .map(|&index| &trips[index])
            .collect()
    }

    /// The minute with the most trips, with its count. None on an empty index.
    pub fn busiest_minute(&self) -> Option<(u16, usize)> {
        self.slots
            .iter()
            .enumerate()
            .max_by_key(|(_, slot)| slot.len())
            .filter(|(_, slot)| !slot.is_empty())
            .map(|(minute, slot)| (minute as u16, slot.len()))
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum BSTError {
    FileError(String),
    ParseError(String),
    DataError(String),
}

impl std::fmt::Display for BSTError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BSTError::FileError(e) => write!(f, "File error: {}", e),
            BSTError::ParseError(e) => write!(f, "Parse error: {}", e),
            BSTError::DataError(e) => write!(f, "Data error: {}", e),
        }
    }
}

impl std::error::Error for BSTError {}

pub type Result<T> = std::result::Result<T, BSTError>;

// ============================================================================
// Main Implementation
// ============================================================================

pub struct BSTModels;

impl BSTModels {
    pub const MINUTES_PER_DAY: usize = 1440;
    pub const TIME_WINDOW_MINUTES: usize = 60;
    pub const ANY_TIME_SLIDER_VALUE: i32 = -1;

    const TIMESTAMP_FORMATS: [&'static str; 2] =
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    /// Load both datasets and build the two minute indices. Both loads must
    /// succeed before any bucketing or rendering happens; a failure in either
    /// leaves the caller with no data at all rather than half a view.
    pub fn load_dataset(stations_path: &Path, trips_path: &Path) -> Result<TrafficData> {
        let stations = Self::load_stations(stations_path)?;
        let (trips, skipped_rows) = Self::load_trips(trips_path)?;

        let departures_by_minute = MinuteBuckets::by_start_minute(&trips);
        let arrivals_by_minute = MinuteBuckets::by_end_minute(&trips);

        let loaded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        info!(
            "dataset ready: {} stations, {} trips ({} rows skipped)",
            stations.len(),
            trips.len(),
            skipped_rows
        );

        Ok(TrafficData {
            stations,
            trips,
            departures_by_minute,
            arrivals_by_minute,
            skipped_rows,
            loaded_at,
        })
    }

    /// Parse the stations document. The list normally sits under
    /// data.stations (GBFS snapshot shape); a bare top-level array is also
    /// accepted. Records missing short_name/lon/lat are skipped.
    pub fn load_stations(path: &Path) -> Result<Vec<Station>> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BSTError::FileError(format!(
                "Failed to read stations file {}: {}",
                path.display(),
                e
            ))
        })?;

        let json: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|e| BSTError::ParseError(format!("Invalid stations JSON: {}", e)))?;

        let records = json["data"]["stations"]
            .as_array()
            .or_else(|| json.as_array())
            .ok_or_else(|| {
                BSTError::ParseError(
                    "Missing station list in stations document".to_string(),
                )
            })?;

        let stations: Vec<Station> = records
            .iter()
            .filter_map(|record| {
                let short_name = record["short_name"].as_str()?.to_string();
                let lon = record["lon"].as_f64()?;
                let lat = record["lat"].as_f64()?;
                let name = record["name"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| short_name.clone());

                Some(Station {
                    short_name,
                    name,
                    lon,
                    lat,
                })
            })
            .collect();

        if stations.is_empty() {
            return Err(BSTError::ParseError(
                "No valid station records in stations document".to_string(),
            ));
        }

        let skipped = records.len() - stations.len();
        if skipped > 0 {
            warn!(
                "{} station records missing short_name/lon/lat were skipped",
                skipped
            );
        }
        debug!("parsed {} station records", stations.len());

        Ok(stations)
    }

    /// Parse the trips table. Required columns are resolved from the header
    /// row by name; both the started_at/ended_at and start_time/end_time
    /// spellings are accepted. Malformed rows are dropped and counted, never
    /// fatal: an all-malformed file simply yields an all-zero view.
    pub fn load_trips(path: &Path) -> Result<(Vec<Trip>, usize)> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            BSTError::FileError(format!(
                "Failed to open trips file {}: {}",
                path.display(),
                e
            ))
        })?;

        let headers = reader
            .headers()
            .map_err(|e| BSTError::ParseError(format!("Failed to read trips header row: {}", e)))?
            .clone();

        let column =
            |names: &[&str]| headers.iter().position(|header| names.contains(&header.trim()));

        let start_id_column = column(&["start_station_id"]).ok_or_else(|| {
            BSTError::DataError("Trips file has no start_station_id column".to_string())
        })?;
        let end_id_column = column(&["end_station_id"]).ok_or_else(|| {
            BSTError::DataError("Trips file has no end_station_id column".to_string())
        })?;
        let started_column = column(&["started_at", "start_time"]).ok_or_else(|| {
            BSTError::DataError("Trips file has no started_at/start_time column".to_string())
        })?;
        let ended_column = column(&["ended_at", "end_time"]).ok_or_else(|| {
            BSTError::DataError("Trips file has no ended_at/end_time column".to_string())
        })?;

        let mut trips = Vec::new();
        let mut skipped_rows = 0usize;

        for (row_number, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable trip row {}: {}", row_number + 2, e);
                    skipped_rows += 1;
                    continue;
                }
            };

            match Self::parse_trip_record(
                &record,
                start_id_column,
                end_id_column,
                started_column,
                ended_column,
            ) {
                Some(trip) => trips.push(trip),
                None => {
                    warn!("Skipping malformed trip row {}", row_number + 2);
                    skipped_rows += 1;
                }
            }
        }

        if trips.is_empty() {
            warn!(
                "Trips file {} yielded no usable rows; all traffic will read zero",
                path.display()
            );
        }
        info!("loaded {} trips ({} rows skipped)", trips.len(), skipped_rows);

        Ok((trips, skipped_rows))
    }

    fn parse_trip_record(
        record: &csv::StringRecord,
        start_id_column: usize,
        end_id_column: usize,
        started_column: usize,
        ended_column: usize,
    ) -> Option<Trip> {
        let start_station_id = record.get(start_id_column)?.trim();
        let end_station_id = record.get(end_id_column)?.trim();
        if start_station_id.is_empty() || end_station_id.is_empty() {
            return None;
        }

        let started_at = Self::parse_timestamp(record.get(started_column)?)?;
        let ended_at = Self::parse_timestamp(record.get(ended_column)?)?;

        Some(Trip {
            start_station_id: start_station_id.to_string(),
            end_station_id: end_station_id.to_string(),
            started_minute: Self::minutes_since_midnight(&started_at),
            ended_minute: Self::minutes_since_midnight(&ended_at),
            started_at,
            ended_at,
        })
    }

    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        Self::TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    }

    /// Minutes elapsed since local midnight, discarding the date. [0, 1439].
    pub fn minutes_since_midnight(timestamp: &NaiveDateTime) -> u16 {
        (timestamp.hour() * 60 + timestamp.minute()) as u16
    }

    /// The station view model: windows both indices, counts departures and
    /// arrivals per station id, then merges the counts onto a fresh copy of
    /// the station list. Stations without matching trips read zero; counts
    /// for ids that match no station are dropped silently.
    pub fn compute_station_traffic(data: &TrafficData, filter: TimeFilter) -> Vec<StationTraffic> {
        let departing = data.departures_by_minute.in_window(&data.trips, filter);
        let arriving = data.arrivals_by_minute.in_window(&data.trips, filter);

        let departures = Self::count_by(&departing, |trip| trip.start_station_id.as_str());
        let arrivals = Self::count_by(&arriving, |trip| trip.end_station_id.as_str());

        data.stations
            .iter()
            .map(|station| {
                let arrivals = arrivals.get(&station.short_name).copied().unwrap_or(0);
                let departures = departures.get(&station.short_name).copied().unwrap_or(0);

                StationTraffic {
                    short_name: station.short_name.clone(),
                    name: station.name.clone(),
                    lon: station.lon,
                    lat: station.lat,
                    arrivals,
                    departures,
                    total_traffic: arrivals + departures,
                }
            })
            .collect()
    }

    fn count_by<F>(trips: &[&Trip], station_id: F) -> HashMap<String, u32>
    where
        F: Fn(&Trip) -> &str,
    {
        let mut counts = HashMap::new();
        for &trip in trips {
            *counts.entry(station_id(trip).to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Minutes since midnight as a 12-hour clock label, e.g. 90 -> "1:30 AM".
    pub fn format_time(minutes: u16) -> String {
        let minutes = minutes as u32;
        match NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0) {
            Some(time) => time.format("%-I:%M %p").to_string(),
            None => "??:??".to_string(),
        }
    }

    pub fn get_dataset_stats(data: &TrafficData) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let age = now.saturating_sub(data.loaded_at);

        let busiest_minute = match data.departures_by_minute.busiest_minute() {
            Some((minute, count)) => {
                format!("{} ({} departures)", Self::format_time(minute), count)
            }
            None => "n/a (no trips loaded)".to_string(),
        };

        let traffic = Self::compute_station_traffic(data, TimeFilter::AnyTime);
        let busiest_station = traffic
            .iter()
            .max_by_key(|station| station.total_traffic)
            .filter(|station| station.total_traffic > 0)
            .map(|station| format!("{} ({} trips)", station.name, station.total_traffic))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "📊 Dataset Statistics:\n\
             • Stations: {} | Trips: {} | Rows skipped: {}\n\
             • Busiest minute: {}\n\
             • Busiest station (any time): {}\n\
             • Loaded {}s ago",
            data.stations.len(),
            data.trips.len(),
            data.skipped_rows,
            busiest_minute,
            busiest_station,
            age
        )
    }

    /// Write the current view model as pretty JSON.
    pub fn export_traffic(path: &Path, traffic: &[StationTraffic]) -> Result<()> {
        let json = serde_json::to_string_pretty(traffic).map_err(|e| {
            BSTError::ParseError(format!("Failed to serialize station traffic: {}", e))
        })?;

        fs::write(path, json).map_err(|e| {
            BSTError::FileError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
