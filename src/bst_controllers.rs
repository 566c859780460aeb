// Interaction layer: the menu loop, the time filter state, and the
// keyboard stand-ins for slider and map gestures.
//
// The filter is plain data owned by run(); every change flows through
// apply_filter(), which recomputes the station view model and redraws.
// Nothing else holds traffic state, so a scrub step can never observe a
// stale count.

use crate::bst_models::{BSTModels, StationTraffic, TimeFilter, TrafficData};
use crate::bst_views::{BSTViews, RadiusScale};
use chrono::{NaiveTime, Timelike};
use clap::Parser;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

/// Command line options. Dataset paths fall back to BST_STATIONS /
/// BST_TRIPS (a .env file works too), then to the bundled defaults.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bst",
    about = "Bluebikes station traffic explorer: time-of-day bike traffic at every station"
)]
pub struct Args {
    /// Path to the stations JSON document
    #[arg(long)]
    pub stations: Option<PathBuf>,

    /// Path to the trips CSV table
    #[arg(long)]
    pub trips: Option<PathBuf>,

    /// Initial time filter in minutes since midnight, -1 for any time
    #[arg(long, default_value_t = BSTModels::ANY_TIME_SLIDER_VALUE, allow_negative_numbers = true)]
    pub time_filter: i32,

    /// How many stations the traffic table shows
    #[arg(long, default_value_t = 12)]
    pub top: usize,

    /// Print one traffic table and exit without the interactive menu
    #[arg(long)]
    pub once: bool,
}

/// One scrub-mode keystroke, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrubCommand {
    Set(i32),
    Nudge(i32),
    AnyTime,
    Quit,
}

pub struct BSTControllers;

impl BSTControllers {
    const DEFAULT_STATIONS_FILE: &'static str = "data/bluebikes-stations.json";
    const DEFAULT_TRIPS_FILE: &'static str = "data/bluebikes-traffic-2024-03.csv";

    pub fn run(args: Args) {
        let initial_filter = match TimeFilter::from_slider(args.time_filter) {
            Some(filter) => filter,
            None => {
                BSTViews::invalid_minute(args.time_filter);
                return;
            }
        };

        if !args.once {
            Self::show_welcome_screen();
        }

        let stations_path =
            Self::resolve_path(args.stations.clone(), "BST_STATIONS", Self::DEFAULT_STATIONS_FILE);
        let trips_path =
            Self::resolve_path(args.trips.clone(), "BST_TRIPS", Self::DEFAULT_TRIPS_FILE);

        BSTViews::show_loading("Loading Bluebikes datasets");
        let data = match BSTModels::load_dataset(&stations_path, &trips_path) {
            Ok(data) => {
                BSTViews::clear_loading();
                println!(
                    "✓ Loaded {} stations and {} trips",
                    data.stations.len(),
                    data.trips.len()
                );
                if data.skipped_rows > 0 {
                    println!("⚠️  {} malformed trip rows were skipped", data.skipped_rows);
                }
                data
            }
            Err(e) => {
                BSTViews::clear_loading();
                BSTViews::dataset_error(&e.to_string());
                return; // nothing to explore without data
            }
        };

        let mut filter = initial_filter;

        if args.once {
            Self::apply_filter(&data, filter, args.top);
            return;
        }

        loop {
            BSTViews::show_menu();
            let choice = Self::read_input();

            match choice.trim() {
                "1" => {
                    filter = Self::handle_set_filter(&data, filter, args.top);
                    Self::pause();
                }
                "2" => {
                    filter = TimeFilter::AnyTime;
                    Self::apply_filter(&data, filter, args.top);
                    Self::pause();
                }
                "3" => {
                    filter = Self::handle_scrub_mode(&data, filter, args.top);
                }
                "4" => {
                    Self::apply_filter(&data, filter, args.top);
                    Self::pause();
                }
                "5" => {
                    Self::handle_show_map(&data, filter);
                    Self::pause();
                }
                "6" => {
                    Self::handle_station_lookup(&data, filter);
                    Self::pause();
                }
                "7" => {
                    Self::handle_browse_all_stations(&data, filter);
                    Self::pause();
                }
                "8" => {
                    println!("\n{}", BSTModels::get_dataset_stats(&data));
                    Self::pause();
                }
                "9" => {
                    Self::handle_export(&data, filter);
                    Self::pause();
                }
                "0" => {
                    BSTViews::goodbye_message();
                    break;
                }
                _ => {
                    println!("\n✗ Invalid option. Please select 0-9.");
                    Self::pause();
                }
            }
        }
    }

    fn show_welcome_screen() {
        println!("\n{}", "═".repeat(70));
        println!("  ╔════════════════════════════════════════════════════════════╗");
        println!("  ║        🚲 BLUEBIKES STATION TRAFFIC - BOSTON METRO         ║");
        println!("  ║              time-of-day traffic, per station              ║");
        println!("  ╚════════════════════════════════════════════════════════════╝");
        println!("{}", "═".repeat(70));
        println!("\n  • Per-station arrivals, departures and total traffic");
        println!(
            "  • ±{} minute window around any minute of the day, wrapping midnight",
            BSTModels::TIME_WINDOW_MINUTES
        );
        println!("  • Scrub the day minute by minute, like dragging a map slider");
        println!("\n{}", "═".repeat(70));
    }

    fn resolve_path(argument: Option<PathBuf>, env_var: &str, default: &str) -> PathBuf {
        argument
            .or_else(|| env::var(env_var).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(default))
    }

    fn handle_set_filter(data: &TrafficData, current: TimeFilter, top: usize) -> TimeFilter {
        let input = BSTViews::prompt_minute();
        if input.is_empty() {
            println!("\n⚠️  No input provided");
            return current;
        }

        match Self::parse_minute_input(&input) {
            Some(value) => match TimeFilter::from_slider(value) {
                Some(filter) => {
                    Self::apply_filter(data, filter, top);
                    filter
                }
                None => {
                    BSTViews::invalid_minute(value);
                    current
                }
            },
            None => {
                BSTViews::invalid_minute_input(&input);
                current
            }
        }
    }

    /// The one place a filter change turns into output: recompute the view
    /// model for the new filter, then redraw the table.
    fn apply_filter(data: &TrafficData, filter: TimeFilter, top: usize) {
        let traffic = BSTModels::compute_station_traffic(data, filter);
        BSTViews::show_traffic_table(&traffic, filter, top);
    }

    fn handle_scrub_mode(data: &TrafficData, start: TimeFilter, top: usize) -> TimeFilter {
        let mut filter = start;

        loop {
            Self::clear_screen();
            println!("{}", "═".repeat(70));
            println!("🔄 SCRUB MODE: redrawn after every command");
            println!("{}", "═".repeat(70));
            println!("  <minute|H:MM|H:MM AM> jump | +N / -N nudge | a = any time | Enter = back");

            Self::apply_filter(data, filter, top);

            print!("\n➜ scrub: ");
            io::stdout().flush().unwrap();
            let input = Self::read_input();

            match Self::parse_scrub_command(input.trim()) {
                Some(ScrubCommand::Quit) => break,
                Some(ScrubCommand::AnyTime) => filter = TimeFilter::AnyTime,
                Some(ScrubCommand::Set(value)) => match TimeFilter::from_slider(value) {
                    Some(next) => filter = next,
                    None => {
                        BSTViews::invalid_minute(value);
                        Self::pause();
                    }
                },
                Some(ScrubCommand::Nudge(delta)) => filter = Self::nudge(filter, delta),
                None => {
                    BSTViews::invalid_minute_input(input.trim());
                    Self::pause();
                }
            }
        }

        filter
    }

    /// Move the filter like dragging the slider: clamped at both stops, and
    /// the left stop (-1) is the any-time position.
    fn nudge(filter: TimeFilter, delta: i32) -> TimeFilter {
        let value = filter.slider_value().saturating_add(delta).clamp(
            BSTModels::ANY_TIME_SLIDER_VALUE,
            BSTModels::MINUTES_PER_DAY as i32 - 1,
        );
        TimeFilter::from_slider(value).unwrap_or(TimeFilter::AnyTime)
    }

    /// Accepts a raw minute count (485), the -1 sentinel, or a clock time
    /// in 24h (8:05, 20:30) or 12h with AM/PM form.
    fn parse_minute_input(input: &str) -> Option<i32> {
        let input = input.trim();
        if let Ok(value) = input.parse::<i32>() {
            return Some(value);
        }
        Self::parse_time_of_day(input).map(|minute| minute as i32)
    }

    fn parse_time_of_day(input: &str) -> Option<u16> {
        const CLOCK_FORMATS: [&str; 2] = ["%H:%M", "%I:%M %p"];

        CLOCK_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(input, format).ok())
            .map(|time| (time.hour() * 60 + time.minute()) as u16)
    }

    fn parse_scrub_command(input: &str) -> Option<ScrubCommand> {
        if input.is_empty() || input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit")
        {
            return Some(ScrubCommand::Quit);
        }
        if input.eq_ignore_ascii_case("a") || input.eq_ignore_ascii_case("any") {
            return Some(ScrubCommand::AnyTime);
        }
        if let Some(rest) = input.strip_prefix('+') {
            return rest.trim().parse::<i32>().ok().map(ScrubCommand::Nudge);
        }
        // "-1" selects any time, every other negative number nudges backwards
        if input.starts_with('-') && input != "-1" {
            return input.parse::<i32>().ok().map(ScrubCommand::Nudge);
        }
        Self::parse_minute_input(input).map(ScrubCommand::Set)
    }

    fn handle_station_lookup(data: &TrafficData, filter: TimeFilter) {
        let query = BSTViews::prompt_station();
        if query.is_empty() {
            println!("\n⚠️  No input provided");
            return;
        }

        let traffic = BSTModels::compute_station_traffic(data, filter);
        let mut ranked: Vec<&StationTraffic> = traffic.iter().collect();
        ranked.sort_by(|a, b| b.total_traffic.cmp(&a.total_traffic));

        let needle = query.to_lowercase();
        let matches: Vec<&StationTraffic> = ranked
            .iter()
            .copied()
            .filter(|station| {
                station.short_name.eq_ignore_ascii_case(&query)
                    || station.name.to_lowercase().contains(&needle)
            })
            .collect();

        let shown = &matches[..matches.len().min(10)];
        let selected = match shown.len() {
            0 => {
                BSTViews::invalid_station(&query);
                return;
            }
            1 => Some(shown[0]),
            _ => {
                if matches.len() > shown.len() {
                    println!(
                        "\n⚠️  {} matches; showing the {} busiest",
                        matches.len(),
                        shown.len()
                    );
                }
                BSTViews::show_station_choices(shown);
                Self::select_from_list(shown)
            }
        };

        if let Some(station) = selected {
            let rank = ranked
                .iter()
                .position(|s| s.short_name == station.short_name)
                .map(|position| position + 1)
                .unwrap_or(0);
            let scale = RadiusScale::for_traffic(&traffic, filter);
            BSTViews::show_station_selected(
                station,
                rank,
                ranked.len(),
                scale.radius(station.total_traffic),
                filter,
            );
        }
    }

    fn select_from_list<'a>(stations: &[&'a StationTraffic]) -> Option<&'a StationTraffic> {
        print!("\n➜ Enter number (1-{}): ", stations.len());
        io::stdout().flush().unwrap();
        let input = Self::read_input();

        match input.trim().parse::<usize>() {
            Ok(number) if number > 0 && number <= stations.len() => Some(stations[number - 1]),
            _ => {
                println!(
                    "✗ Invalid selection. Please enter a number between 1 and {}",
                    stations.len()
                );
                None
            }
        }
    }

    fn handle_show_map(data: &TrafficData, filter: TimeFilter) {
        let traffic = BSTModels::compute_station_traffic(data, filter);
        let scale = RadiusScale::for_traffic(&traffic, filter);
        BSTViews::show_station_map(&traffic, &scale, filter);
    }

    fn handle_browse_all_stations(data: &TrafficData, filter: TimeFilter) {
        BSTViews::all_stations_warning(data.stations.len());
        print!("\nContinue? (y/n): ");
        io::stdout().flush().unwrap();
        let input = Self::read_input();

        if input.trim().eq_ignore_ascii_case("y") {
            let mut traffic = BSTModels::compute_station_traffic(data, filter);
            traffic.sort_by(|a, b| b.total_traffic.cmp(&a.total_traffic));
            BSTViews::show_all_stations(&traffic, filter);
        } else {
            BSTViews::operation_cancelled();
        }
    }

    fn handle_export(data: &TrafficData, filter: TimeFilter) {
        let traffic = BSTModels::compute_station_traffic(data, filter);
        let path = PathBuf::from(Self::export_file_name(filter));

        match BSTModels::export_traffic(&path, &traffic) {
            Ok(()) => BSTViews::export_success(&path, traffic.len()),
            Err(e) => println!("\n✗ Export failed: {}", e),
        }
    }

    fn export_file_name(filter: TimeFilter) -> String {
        match filter {
            TimeFilter::AnyTime => "bst-traffic-any.json".to_string(),
            TimeFilter::Minute(minute) => format!("bst-traffic-{:04}.json", minute),
        }
    }

    fn read_input() -> String {
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(_) => input.trim().to_string(),
            Err(e) => {
                eprintln!("⚠️  Failed to read input: {}", e);
                String::new()
            }
        }
    }

    fn pause() {
        print!("\n⏎ Press Enter to continue...");
        io::stdout().flush().unwrap();
        let mut dummy = String::new();
        let _ = io::stdin().read_line(&mut dummy);
    }

    fn clear_screen() {
        print!("\x1B[2J\x1B[1;1H");
        io::stdout().flush().unwrap();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_input_accepts_raw_minutes_and_sentinel() {
        assert_eq!(BSTControllers::parse_minute_input("485"), Some(485));
        assert_eq!(BSTControllers::parse_minute_input(" 0 "), Some(0));
        assert_eq!(BSTControllers::parse_minute_input("-1"), Some(-1));
        assert_eq!(BSTControllers::parse_minute_input("1439"), Some(1439));
        // out-of-range integers still parse here; from_slider rejects them
        assert_eq!(BSTControllers::parse_minute_input("4000"), Some(4000));
    }

    #[test]
    fn minute_input_accepts_clock_times() {
        assert_eq!(BSTControllers::parse_minute_input("8:05"), Some(485));
        assert_eq!(BSTControllers::parse_minute_input("20:30"), Some(1230));
        assert_eq!(BSTControllers::parse_minute_input("8:05 PM"), Some(1205));
        assert_eq!(BSTControllers::parse_minute_input("12:00 AM"), Some(0));
        assert_eq!(BSTControllers::parse_minute_input("12:00 PM"), Some(720));
    }

    #[test]
    fn minute_input_rejects_garbage() {
        assert_eq!(BSTControllers::parse_minute_input("24:00"), None);
        assert_eq!(BSTControllers::parse_minute_input("8:65"), None);
        assert_eq!(BSTControllers::parse_minute_input("noonish"), None);
    }

    #[test]
    fn scrub_commands_parse() {
        assert_eq!(BSTControllers::parse_scrub_command(""), Some(ScrubCommand::Quit));
        assert_eq!(BSTControllers::parse_scrub_command("q"), Some(ScrubCommand::Quit));
        assert_eq!(BSTControllers::parse_scrub_command("a"), Some(ScrubCommand::AnyTime));
        assert_eq!(BSTControllers::parse_scrub_command("ANY"), Some(ScrubCommand::AnyTime));
        assert_eq!(BSTControllers::parse_scrub_command("+15"), Some(ScrubCommand::Nudge(15)));
        assert_eq!(BSTControllers::parse_scrub_command("-30"), Some(ScrubCommand::Nudge(-30)));
        assert_eq!(BSTControllers::parse_scrub_command("-1"), Some(ScrubCommand::Set(-1)));
        assert_eq!(BSTControllers::parse_scrub_command("485"), Some(ScrubCommand::Set(485)));
        assert_eq!(BSTControllers::parse_scrub_command("8:05"), Some(ScrubCommand::Set(485)));
        assert_eq!(BSTControllers::parse_scrub_command("sideways"), None);
    }

    #[test]
    fn nudging_clamps_at_both_slider_stops() {
        assert_eq!(
            BSTControllers::nudge(TimeFilter::Minute(1430), 15),
            TimeFilter::Minute(1439)
        );
        assert_eq!(
            BSTControllers::nudge(TimeFilter::Minute(5), -30),
            TimeFilter::AnyTime
        );
        // nudging up from the any-time stop enters the timed range
        assert_eq!(
            BSTControllers::nudge(TimeFilter::AnyTime, 10),
            TimeFilter::Minute(9)
        );
        assert_eq!(
            BSTControllers::nudge(TimeFilter::Minute(480), 60),
            TimeFilter::Minute(540)
        );
        // deltas at the i32 limits saturate instead of overflowing
        assert_eq!(
            BSTControllers::nudge(TimeFilter::Minute(485), i32::MAX),
            TimeFilter::Minute(1439)
        );
        assert_eq!(
            BSTControllers::nudge(TimeFilter::Minute(485), i32::MIN),
            TimeFilter::AnyTime
        );
    }

    #[test]
    fn paths_fall_back_to_defaults() {
        let explicit = BSTControllers::resolve_path(
            Some(PathBuf::from("custom.json")),
            "BST_TEST_UNSET_VAR",
            "default.json",
        );
        assert_eq!(explicit, PathBuf::from("custom.json"));

        let fallback = BSTControllers::resolve_path(None, "BST_TEST_UNSET_VAR", "default.json");
        assert_eq!(fallback, PathBuf::from("default.json"));
    }

    #[test]
    fn export_file_names_encode_the_filter() {
        assert_eq!(
            BSTControllers::export_file_name(TimeFilter::AnyTime),
            "bst-traffic-any.json"
        );
        assert_eq!(
            BSTControllers::export_file_name(TimeFilter::Minute(485)),
            "bst-traffic-0485.json"
        );
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["bst"]);
        assert_eq!(args.time_filter, -1);
        assert_eq!(args.top, 12);
        assert!(!args.once);
        assert!(args.stations.is_none());

        let args = Args::parse_from(["bst", "--time-filter", "485", "--once", "--top", "5"]);
        assert_eq!(args.time_filter, 485);
        assert!(args.once);
        assert_eq!(args.top, 5);

        // the any-time sentinel must survive the flag parser
        let args = Args::parse_from(["bst", "--time-filter", "-1"]);
        assert_eq!(args.time_filter, -1);
    }
}
