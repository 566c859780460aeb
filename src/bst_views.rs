// Terminal presentation for the Bluebikes Station Traffic explorer
//
// The model layer hands over finished Vec<StationTraffic> snapshots; this
// module only formats. The two small geometry types (RadiusScale and
// MapViewport) are the seams a real map front end would plug into: the
// scale turns a traffic count into a circle radius, the viewport turns
// lon/lat into grid coordinates.

use crate::bst_models::{BSTModels, StationTraffic, TimeFilter};
use std::io::{self, Write};
use std::path::Path;

// ============================================================================
// Radius Scale
// ============================================================================

/// Square-root scale from total traffic to a circle radius, so circle AREA
/// tracks the count. The output range widens while a time filter is active:
/// filtered windows hold far fewer trips and thin traffic would otherwise
/// vanish at radius zero.
#[derive(Debug, Clone, Copy)]
pub struct RadiusScale {
    domain_max: f64,
    range_min: f64,
    range_max: f64,
}

impl RadiusScale {
    pub const UNFILTERED_RANGE: (f64, f64) = (0.0, 25.0);
    pub const FILTERED_RANGE: (f64, f64) = (3.0, 50.0);

    pub fn for_traffic(traffic: &[StationTraffic], filter: TimeFilter) -> Self {
        let domain_max = traffic
            .iter()
            .map(|station| station.total_traffic)
            .max()
            .unwrap_or(0) as f64;

        let (range_min, range_max) = if filter.is_filtered() {
            Self::FILTERED_RANGE
        } else {
            Self::UNFILTERED_RANGE
        };

        RadiusScale {
            domain_max,
            range_min,
            range_max,
        }
    }

    pub fn radius(&self, total_traffic: u32) -> f64 {
        if self.domain_max <= 0.0 {
            return self.range_min;
        }
        let normalized = (total_traffic as f64 / self.domain_max).clamp(0.0, 1.0);
        self.range_min + (self.range_max - self.range_min) * normalized.sqrt()
    }

    pub fn max_radius(&self) -> f64 {
        self.range_max
    }
}

// ============================================================================
// Map Viewport
// ============================================================================

/// Projects lon/lat into a fixed text grid. Fitted to the bounding box of
/// the stations it is asked to draw; points outside the box clamp to the
/// nearest edge instead of escaping the grid.
#[derive(Debug, Clone, Copy)]
pub struct MapViewport {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
    columns: usize,
    rows: usize,
}

impl MapViewport {
    pub fn fit(traffic: &[StationTraffic], columns: usize, rows: usize) -> Option<MapViewport> {
        if traffic.is_empty() || columns < 2 || rows < 2 {
            return None;
        }

        let mut west = f64::INFINITY;
        let mut east = f64::NEG_INFINITY;
        let mut south = f64::INFINITY;
        let mut north = f64::NEG_INFINITY;
        for station in traffic {
            west = west.min(station.lon);
            east = east.max(station.lon);
            south = south.min(station.lat);
            north = north.max(station.lat);
        }
        if !west.is_finite() || !east.is_finite() || !south.is_finite() || !north.is_finite() {
            return None;
        }

        // A single station (or a perfectly straight line of them) still
        // needs a non-degenerate box
        if east - west < 1e-9 {
            west -= 0.005;
            east += 0.005;
        }
        if north - south < 1e-9 {
            south -= 0.005;
            north += 0.005;
        }

        Some(MapViewport {
            west,
            east,
            south,
            north,
            columns,
            rows,
        })
    }

    /// (column, row) for a coordinate pair; row 0 is the north edge.
    pub fn project(&self, lon: f64, lat: f64) -> (usize, usize) {
        let x = (lon - self.west) / (self.east - self.west) * (self.columns - 1) as f64;
        let y = (self.north - lat) / (self.north - self.south) * (self.rows - 1) as f64;

        let column = x.round().clamp(0.0, (self.columns - 1) as f64) as usize;
        let row = y.round().clamp(0.0, (self.rows - 1) as f64) as usize;
        (column, row)
    }
}

// ============================================================================
// Views
// ============================================================================

pub struct BSTViews;

impl BSTViews {
    const MAP_COLUMNS: usize = 64;
    const MAP_ROWS: usize = 20;
    const SLIDER_WIDTH: usize = 48;

    // steelblue for departure-heavy stations, darkorange for arrival-heavy
    const DEPARTURE_COLOR: (u8, u8, u8) = (70, 130, 180);
    const ARRIVAL_COLOR: (u8, u8, u8) = (255, 140, 0);

    pub fn show_menu() {
        println!("\n{}", "═".repeat(50));
        println!("🚲 BLUEBIKES STATION TRAFFIC");
        println!("{}", "═".repeat(50));
        println!("1. Set time filter ⏰");
        println!("2. Clear time filter (any time) 🌐");
        println!("3. Scrub through the day 🔄");
        println!("4. Station traffic table 🚲");
        println!("5. Station map 🗺️");
        println!("6. Find a station 🔍");
        println!("7. Browse all stations 📄");
        println!("8. Dataset statistics 📊");
        println!("9. Export current view 💾");
        println!("0. Exit 👋");
        println!("{}", "═".repeat(50));
        print!("➜ Select option: ");
        io::stdout().flush().unwrap();
    }

    pub fn prompt_minute() -> String {
        print!("\n➜ Enter a time (minute 0-1439, 8:05, 8:05 PM, or -1 for any): ");
        io::stdout().flush().unwrap();
        Self::read_line()
    }

    pub fn prompt_station() -> String {
        print!("\n➜ Enter a station name or short name (or part of it): ");
        io::stdout().flush().unwrap();
        Self::read_line()
    }

    fn read_line() -> String {
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(_) => input.trim().to_string(),
            Err(_) => String::new(),
        }
    }

    pub fn filter_label(filter: TimeFilter) -> String {
        match filter {
            TimeFilter::AnyTime => "(any time)".to_string(),
            TimeFilter::Minute(minute) => BSTModels::format_time(minute),
        }
    }

    /// The time slider, in terminal form. The knob position maps the full
    /// 0-1439 range onto the gauge width; any-time renders an empty track.
    pub fn show_slider(filter: TimeFilter) {
        match filter {
            TimeFilter::AnyTime => {
                println!("\n  🕐 ├{}┤ (any time)", "─".repeat(Self::SLIDER_WIDTH));
            }
            TimeFilter::Minute(minute) => {
                let position = Self::slider_position(minute, Self::SLIDER_WIDTH);
                let before = "─".repeat(position);
                let after = "─".repeat(Self::SLIDER_WIDTH - position - 1);
                println!(
                    "\n  🕐 ├{}●{}┤ {}",
                    before,
                    after,
                    BSTModels::format_time(minute)
                );
            }
        }
    }

    fn slider_position(minute: u16, width: usize) -> usize {
        (minute as usize * (width - 1)) / (BSTModels::MINUTES_PER_DAY - 1)
    }

    /// Ranked traffic table under the current filter. Each row carries the
    /// same line a map tooltip would (total, departures, arrivals) plus a
    /// bar sized by the circle radius the scale would give the station.
    pub fn show_traffic_table(traffic: &[StationTraffic], filter: TimeFilter, top: usize) {
        let scale = RadiusScale::for_traffic(traffic, filter);

        println!("\n{}", "═".repeat(70));
        match filter {
            TimeFilter::AnyTime => println!("🚲 STATION TRAFFIC - ALL TRIPS (any time)"),
            TimeFilter::Minute(minute) => println!(
                "🚲 STATION TRAFFIC - ±{} MIN AROUND {}",
                BSTModels::TIME_WINDOW_MINUTES,
                BSTModels::format_time(minute)
            ),
        }
        println!("{}", "═".repeat(70));
        Self::show_slider(filter);

        let mut ranked: Vec<&StationTraffic> = traffic.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_traffic
                .cmp(&a.total_traffic)
                .then_with(|| a.short_name.cmp(&b.short_name))
        });

        if ranked.iter().all(|station| station.total_traffic == 0) {
            println!("\n⚠️  No trips in this window; every station reads zero");
        }

        for (rank, station) in ranked.iter().take(top).enumerate() {
            let radius = scale.radius(station.total_traffic);
            let bar_width = radius.round() as usize;
            let bar = if bar_width == 0 {
                "·".to_string()
            } else {
                Self::colorize_balance(
                    &"█".repeat(bar_width),
                    station.departures,
                    station.total_traffic,
                )
            };

            println!("\n{:>4}. {} ({})", rank + 1, station.name, station.short_name);
            println!(
                "      {} trips ({} departures, {} arrivals)",
                station.total_traffic, station.departures, station.arrivals
            );
            println!("      {}  r={:.1}", bar, radius);
        }

        println!("\n{}", "─".repeat(70));
        println!(
            "  Showing top {} of {} stations",
            top.min(ranked.len()),
            ranked.len()
        );
        println!("{}", "═".repeat(70));
    }

    /// ASCII projection of the station circles. Glyph size follows the
    /// radius scale; when two stations land on one cell the larger circle
    /// wins, same as the bigger SVG circle drawing on top.
    pub fn show_station_map(traffic: &[StationTraffic], scale: &RadiusScale, filter: TimeFilter) {
        let viewport = match MapViewport::fit(traffic, Self::MAP_COLUMNS, Self::MAP_ROWS) {
            Some(viewport) => viewport,
            None => {
                println!("\n✗ Nothing to draw: no stations with coordinates");
                return;
            }
        };

        let mut cells: Vec<Vec<Option<(f64, String)>>> =
            vec![vec![None; Self::MAP_COLUMNS]; Self::MAP_ROWS];
        for station in traffic {
            let (column, row) = viewport.project(station.lon, station.lat);
            let radius = scale.radius(station.total_traffic);
            let replace = match &cells[row][column] {
                Some((existing, _)) => radius > *existing,
                None => true,
            };
            if replace {
                cells[row][column] = Some((radius, Self::station_glyph(station, radius, scale)));
            }
        }

        println!("\n{}", "═".repeat(Self::MAP_COLUMNS + 2));
        println!("🗺️  STATION MAP - {}", Self::filter_label(filter));
        println!("{}", "═".repeat(Self::MAP_COLUMNS + 2));
        println!("┌{}┐", "─".repeat(Self::MAP_COLUMNS));
        for row in &cells {
            let mut line = String::new();
            for cell in row {
                match cell {
                    Some((_, glyph)) => line.push_str(glyph),
                    None => line.push(' '),
                }
            }
            println!("│{}│", line);
        }
        println!("└{}┘", "─".repeat(Self::MAP_COLUMNS));
        println!("  size · ∘ ○ ◎ ● = total traffic | steelblue = departures, orange = arrivals");
    }

    fn station_glyph(station: &StationTraffic, radius: f64, scale: &RadiusScale) -> String {
        const GLYPHS: [char; 5] = ['·', '∘', '○', '◎', '●'];

        let share = if scale.max_radius() > 0.0 {
            (radius / scale.max_radius()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let glyph = GLYPHS[(share * (GLYPHS.len() - 1) as f64).round() as usize];
        Self::colorize_balance(&glyph.to_string(), station.departures, station.total_traffic)
    }

    /// Truecolor between the departure and arrival hues by departure share,
    /// matching the circle fill a map front end would use. Idle stations
    /// render dim.
    fn colorize_balance(text: &str, departures: u32, total_traffic: u32) -> String {
        if total_traffic == 0 {
            return format!("\x1b[2m{}\x1b[0m", text);
        }
        let share = departures as f64 / total_traffic as f64;
        let (r, g, b) = Self::mix_color(Self::ARRIVAL_COLOR, Self::DEPARTURE_COLOR, share);
        format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, text)
    }

    fn mix_color(low: (u8, u8, u8), high: (u8, u8, u8), amount: f64) -> (u8, u8, u8) {
        let amount = amount.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * amount).round() as u8;
        (
            channel(low.0, high.0),
            channel(low.1, high.1),
            channel(low.2, high.2),
        )
    }

    pub fn show_station_selected(
        station: &StationTraffic,
        rank: usize,
        station_count: usize,
        radius: f64,
        filter: TimeFilter,
    ) {
        println!("\n✓ Station: {} ({})", station.name, station.short_name);
        println!("  📌 Location: ({:.6}, {:.6})", station.lon, station.lat);
        println!("  🕐 Window: {}", Self::filter_label(filter));
        println!(
            "  🚲 {} trips ({} departures, {} arrivals)",
            station.total_traffic, station.departures, station.arrivals
        );
        println!(
            "  🔘 Circle radius: {:.1} (rank {} of {} by total traffic)",
            radius, rank, station_count
        );
    }

    pub fn show_station_choices(stations: &[&StationTraffic]) {
        println!("\n🚏 Found {} matching stations:", stations.len());
        for (index, station) in stations.iter().enumerate() {
            println!(
                "  {}. {} ({}): {} trips",
                index + 1,
                station.name,
                station.short_name,
                station.total_traffic
            );
        }
    }

    pub fn all_stations_warning(count: usize) {
        println!("\n⚠️  This will list all {} stations with their current counts", count);
    }

    pub fn show_all_stations(traffic: &[StationTraffic], filter: TimeFilter) {
        const PAGE_SIZE: usize = 20;

        println!("\n{}", "═".repeat(70));
        println!("📄 ALL STATIONS - {}", Self::filter_label(filter));
        println!("{}", "═".repeat(70));

        for (index, station) in traffic.iter().enumerate() {
            println!(
                "{:>4}. {:<42} {:>5} trips ({:>4} dep / {:>4} arr)",
                index + 1,
                Self::truncate(&station.name, 42),
                station.total_traffic,
                station.departures,
                station.arrivals
            );

            if (index + 1) % PAGE_SIZE == 0 && index + 1 < traffic.len() {
                print!("\n-- {} of {} -- press Enter for more --", index + 1, traffic.len());
                io::stdout().flush().unwrap();
                let mut pause = String::new();
                let _ = io::stdin().read_line(&mut pause);
            }
        }

        println!("\n{}", "─".repeat(70));
        println!("  {} stations listed", traffic.len());
    }

    fn truncate(text: &str, max: usize) -> String {
        if text.chars().count() <= max {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
            format!("{}…", truncated)
        }
    }

    pub fn invalid_minute(value: i32) {
        println!("\n✗ {} is not a valid minute of the day", value);
        println!("💡 Use 0-1439 (minutes since midnight), or -1 for any time");
    }

    pub fn invalid_minute_input(input: &str) {
        println!("\n✗ Could not read '{}' as a time", input);
        println!("💡 Try a minute count like 485, a clock time like 8:05 or 8:05 PM, or -1 for any time");
    }

    pub fn invalid_station(query: &str) {
        println!("\n✗ No station matches '{}'", query);
        println!("💡 Try part of the name (e.g. 'Central') or an exact short name (e.g. 'M32015')");
    }

    pub fn dataset_error(error: &str) {
        println!("\n{}", "═".repeat(50));
        println!("❌ DATASET ERROR");
        println!("{}", "═".repeat(50));
        println!("\n{}", error);
        println!("\n💡 Troubleshooting:");
        println!("  • Check that both dataset files exist at the given paths");
        println!("  • Pass --stations / --trips or set BST_STATIONS / BST_TRIPS");
        println!("  • The stations file is JSON, the trips file is CSV");
        println!("  • Re-download the exports if either file looks truncated:");
        println!("      https://dsc106.com/labs/lab07/data/bluebikes-stations.json");
        println!("      https://dsc106.com/labs/lab07/data/bluebikes-traffic-2024-03.csv");
        println!("\n{}", "═".repeat(50));
    }

    pub fn export_success(path: &Path, station_count: usize) {
        println!(
            "\n✓ Exported {} station records to {}",
            station_count,
            path.display()
        );
    }

    pub fn operation_cancelled() {
        println!("\n⚠️  Operation cancelled");
    }

    pub fn goodbye_message() {
        println!("\n{}", "═".repeat(50));
        println!("👋 Thanks for exploring Bluebikes traffic!");
        println!("🚲 Ride safe out there");
        println!("{}", "═".repeat(50));
    }

    pub fn show_loading(message: &str) {
        print!("⏳ {}...", message);
        io::stdout().flush().unwrap();
    }

    pub fn clear_loading() {
        print!("\r{}\r", " ".repeat(60));
        io::stdout().flush().unwrap();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic(
        short_name: &str,
        lon: f64,
        lat: f64,
        departures: u32,
        arrivals: u32,
    ) -> StationTraffic {
        StationTraffic {
            short_name: short_name.to_string(),
            name: short_name.to_string(),
            lon,
            lat,
            arrivals,
            departures,
            total_traffic: arrivals + departures,
        }
    }

    #[test]
    fn radius_scale_spans_zero_to_twenty_five_unfiltered() {
        let stations = vec![
            traffic("A", 0.0, 0.0, 4, 0),
            traffic("B", 0.0, 0.0, 0, 0),
        ];
        let scale = RadiusScale::for_traffic(&stations, TimeFilter::AnyTime);
        assert!((scale.radius(0) - 0.0).abs() < 1e-9);
        assert!((scale.radius(4) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn radius_scale_widens_when_filtered() {
        let stations = vec![traffic("A", 0.0, 0.0, 9, 0)];
        let scale = RadiusScale::for_traffic(&stations, TimeFilter::Minute(480));
        assert!((scale.radius(0) - 3.0).abs() < 1e-9);
        assert!((scale.radius(9) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn radius_scale_is_square_root_shaped() {
        let stations = vec![traffic("A", 0.0, 0.0, 100, 0)];
        let scale = RadiusScale::for_traffic(&stations, TimeFilter::AnyTime);
        // a quarter of the domain lands at half the range
        assert!((scale.radius(25) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn radius_scale_handles_empty_domain() {
        let scale = RadiusScale::for_traffic(&[], TimeFilter::AnyTime);
        assert!((scale.radius(0) - 0.0).abs() < 1e-9);

        let filtered = RadiusScale::for_traffic(&[], TimeFilter::Minute(0));
        assert!((filtered.radius(7) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn viewport_projects_bounding_box_corners() {
        let stations = vec![
            traffic("SW", -71.2, 42.3, 1, 0),
            traffic("NE", -71.0, 42.4, 0, 1),
        ];
        let viewport = MapViewport::fit(&stations, 64, 20).unwrap();

        assert_eq!(viewport.project(-71.2, 42.4), (0, 0)); // north-west corner
        assert_eq!(viewport.project(-71.0, 42.3), (63, 19)); // south-east corner
        assert_eq!(viewport.project(-71.2, 42.3), (0, 19));
    }

    #[test]
    fn viewport_clamps_points_outside_the_box() {
        let stations = vec![
            traffic("SW", -71.2, 42.3, 1, 0),
            traffic("NE", -71.0, 42.4, 0, 1),
        ];
        let viewport = MapViewport::fit(&stations, 64, 20).unwrap();

        assert_eq!(viewport.project(-72.0, 43.0), (0, 0));
        assert_eq!(viewport.project(-70.0, 41.0), (63, 19));
    }

    #[test]
    fn viewport_fits_a_single_station() {
        let stations = vec![traffic("A", -71.1, 42.35, 1, 1)];
        let viewport = MapViewport::fit(&stations, 64, 20).unwrap();

        let (column, row) = viewport.project(-71.1, 42.35);
        assert!(column < 64 && row < 20);
    }

    #[test]
    fn viewport_requires_stations_and_a_grid() {
        assert!(MapViewport::fit(&[], 64, 20).is_none());

        let stations = vec![traffic("A", -71.1, 42.35, 1, 1)];
        assert!(MapViewport::fit(&stations, 1, 20).is_none());
    }

    #[test]
    fn slider_position_covers_full_width() {
        assert_eq!(BSTViews::slider_position(0, 48), 0);
        assert_eq!(BSTViews::slider_position(1439, 48), 47);

        let midday = BSTViews::slider_position(720, 48);
        assert!((20..=27).contains(&midday));
    }

    #[test]
    fn color_mix_hits_both_endpoints() {
        assert_eq!(
            BSTViews::mix_color((255, 140, 0), (70, 130, 180), 0.0),
            (255, 140, 0)
        );
        assert_eq!(
            BSTViews::mix_color((255, 140, 0), (70, 130, 180), 1.0),
            (70, 130, 180)
        );
    }

    #[test]
    fn filter_label_matches_slider_text() {
        assert_eq!(BSTViews::filter_label(TimeFilter::AnyTime), "(any time)");
        assert_eq!(BSTViews::filter_label(TimeFilter::Minute(90)), "1:30 AM");
    }

    #[test]
    fn truncate_keeps_short_names_intact() {
        assert_eq!(BSTViews::truncate("Central Sq", 40), "Central Sq");

        let long = "A very long station name that overflows the table column";
        let truncated = BSTViews::truncate(long, 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.ends_with('…'));
    }
}
