use chrono::{NaiveDate, NaiveDateTime};
use lake_field::{
    build_field, grid_from_readings, parse_readings, parse_sun_table, rng_from_seed,
    CellOrigin, FieldParams, Policy, Resolution, Speed, Step, DEFAULT_HEADER_LINES,
};

const DEPTHS: [f64; 3] = [0.0, 2.0, 4.0];

fn at(year: i32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn temperature(depth: f64, hour: u32) -> f64 {
    22.0 - 1.5 * depth + 0.05 * hour as f64
}

/// Two June days in 2004 and 2005; 2005 is missing every hour h with h % 5 == 3.
fn hourly_export() -> String {
    let mut text = String::from("sampledate,year4,month,daynum,hour,depth,wtemp,flag_wtemp\n");
    for year in [2004, 2005] {
        for day in 1..=2u32 {
            for hour in 0..24u32 {
                if year == 2005 && hour % 5 == 3 {
                    continue;
                }
                for depth in DEPTHS {
                    text.push_str(&format!(
                        "{}-06-{:02},{},6,{},{},{:.1},{:.2},\n",
                        year,
                        day,
                        year,
                        day,
                        hour * 100,
                        depth,
                        temperature(depth, hour)
                    ));
                }
            }
        }
    }
    text.push_str("2005-06-01,2005,6,1,abc,1.0,20.0,\n");
    text
}

fn june_sun_table() -> String {
    let mut text = String::from("LOCATION\nRise and Set for the Sun\n       Jan.\n");
    for day in 1..=2u32 {
        text.push_str(&format!("{:02}  ", day));
        for _ in 0..5 {
            text.push_str(&" ".repeat(11));
        }
        text.push_str("0512 2044\n");
    }
    text
}

fn field_params(step: Step) -> FieldParams {
    FieldParams {
        year: 2005,
        step,
        ..FieldParams::default()
    }
}

#[test]
fn sensor_export_to_trajectories() {
    let parsed = parse_readings(hourly_export().as_bytes(), Resolution::Hourly).unwrap();
    assert_eq!(parsed.rejected.len(), 1);
    assert_eq!(parsed.readings.len(), 2 * 48 * 3 - 10 * 3);

    let grid = grid_from_readings(&parsed).unwrap();
    let field = build_field(grid, &field_params(Step::Hourly)).unwrap();

    assert_eq!(field.reports.gap_fill.filled_timestamps, 10);
    assert_eq!(field.reports.gap_fill.filled_depths, 0);
    for day in 1..=2 {
        for hour in 0..24 {
            let profile = field.grid.profile(&at(2005, day, hour)).unwrap();
            assert_eq!(profile.len(), 41, "day {} hour {}", day, hour);
        }
    }
    let filled = field.grid.cell(&at(2005, 1, 3), 2.0).unwrap();
    assert_eq!(filled.origin, CellOrigin::Climatology);
    assert!((filled.temperature - temperature(2.0, 3)).abs() < 1e-9);
    let between = field.grid.cell(&at(2005, 1, 0), 1.0).unwrap();
    assert_eq!(between.origin, CellOrigin::Interpolated);
    assert_eq!(between.temperature, 20.5);

    for (timestamp, scores) in field.fitness.iter() {
        assert!(*timestamp >= field.start && *timestamp <= field.end);
        assert_eq!(scores.len(), field.grid.profile(timestamp).unwrap().len());
    }

    let sun = parse_sun_table(june_sun_table().as_bytes(), 2005, DEFAULT_HEADER_LINES).unwrap();
    assert_eq!(sun.table.len(), 2);
    let simulation = field.simulation_with_sun(&sun.table);

    let oracle = simulation.run(&Policy::Oracle, &mut rng_from_seed(Some(1))).unwrap();
    assert_eq!(oracle.len(), 48);
    assert!(oracle.depths.iter().all(|d| *d == 0.0));

    let climber = simulation
        .run(&Policy::HillClimbing, &mut rng_from_seed(Some(1)))
        .unwrap();
    assert_eq!(climber.depths.last(), Some(&0.0));
    assert!(climber.total_fitness() <= oracle.total_fitness());

    let migrant = Policy::Circadian { speed: Speed::Fast };
    let first = simulation.run(&migrant, &mut rng_from_seed(Some(5))).unwrap();
    let second = simulation.run(&migrant, &mut rng_from_seed(Some(5))).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 48);
    assert!(first.depths.iter().all(|d| (0.0..=4.0).contains(d)));
    // Fifteen daylight hours of ascent reach the surface by 20:00.
    assert_eq!(first.depths[20], 0.0);
}

#[test]
fn daily_step_walks_midnights_only() {
    let parsed = parse_readings(hourly_export().as_bytes(), Resolution::Hourly).unwrap();
    let grid = grid_from_readings(&parsed).unwrap();
    let field = build_field(grid, &field_params(Step::Daily)).unwrap();
    let path = field
        .simulation()
        .run(&Policy::StableDepth { depth: 4.0 }, &mut rng_from_seed(None))
        .unwrap();
    assert_eq!(path.dates, vec![at(2005, 1, 0), at(2005, 2, 0)]);
    assert_eq!(path.temperatures, vec![temperature(4.0, 0); 2]);
}
