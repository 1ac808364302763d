//! Identification runs end to end: acceptance, partial failure, stop, negative data

use chrono::{TimeZone, Utc};
use stardb_rs::{
    CatalogStar, Coor, EventLog, Identifier, ItemRef, MagnitudeWriter, MatchResult, MemoryCatalogReader,
    NegativeMode, OperationObserver, QueryStars, Result, RunState, StarDatabase, StopHandle, StoreError,
};
use tempfile::TempDir;

fn detected(name: &str, position: Coor) -> CatalogStar {
    CatalogStar::new("Detected", name, position).with_magnitude(11.0)
}

/// A row of reference stars 60" apart, each with one detection 0.5" off
fn field(count: usize) -> (Vec<CatalogStar>, Vec<CatalogStar>) {
    let origin = Coor::new(245.0, 12.0);
    let reference: Vec<CatalogStar> = (0..count)
        .map(|i| {
            CatalogStar::new("Hipparcos", format!("{}", 80_000 + i), origin.offset_dec_arcsec(i as f64 * 60.0))
                .with_position_error(1.0)
                .with_magnitude(8.0 + i as f64 / 10.0)
        })
        .collect();
    let query = reference
        .iter()
        .enumerate()
        .map(|(i, r)| detected(&format!("d{}", i), r.position.offset_dec_arcsec(0.5)))
        .collect();
    (reference, query)
}

#[test]
fn test_either_error_radius_accepts() -> Result<()> {
    let center = Coor::new(150.0, 2.0);
    let query = vec![detected("q", center).with_position_error(1.5)];
    let reference = vec![
        detected("a", center.offset_dec_arcsec(1.2)).with_position_error(0.5),
        detected("b", center.offset_dec_arcsec(-1.2)).with_position_error(0.3),
        detected("c", center.offset_dec_arcsec(2.0)).with_position_error(1.5),
    ];

    let mut sink: Vec<MatchResult> = Vec::new();
    let mut log = EventLog::new();
    let summary = Identifier::new().run(
        &mut QueryStars::from_stars(query, 1.5),
        &mut MemoryCatalogReader::new(reference, 1.5),
        &mut sink,
        &mut log,
    )?;

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.identified, 1);
    assert_eq!(summary.matches, 2);
    let mut names: Vec<&str> = sink.iter().map(|m| m.reference.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "b"]);
    assert!(sink.iter().all(|m| (m.distance_arcsec - 1.2).abs() < 1e-3));
    Ok(())
}

#[test]
fn test_matches_reported_nearest_first() -> Result<()> {
    let center = Coor::new(30.0, -20.0);
    let reference = vec![
        detected("far", center.offset_dec_arcsec(0.9)).with_position_error(1.0),
        detected("near", center.offset_dec_arcsec(-0.2)).with_position_error(1.0),
        detected("mid", center.offset_dec_arcsec(0.5)).with_position_error(1.0),
    ];
    let mut reader = MemoryCatalogReader::new(reference, 1.0);
    let fov = Identifier::search_fov_deg(1.0, 1.0);

    let matches = Identifier::new().identify_star(&detected("q", center), 1.0, &mut reader, fov)?;
    let names: Vec<&str> = matches.iter().map(|m| m.reference.name.as_str()).collect();
    assert_eq!(names, vec!["near", "mid", "far"]);
    Ok(())
}

#[test]
fn test_unreadable_query_star_does_not_end_run() -> Result<()> {
    let (reference, query) = field(10);
    let items: Vec<Result<CatalogStar>> = query
        .into_iter()
        .enumerate()
        .map(|(i, star)| {
            if i == 4 {
                Err(StoreError::decode("d4", "missing ra"))
            } else {
                Ok(star)
            }
        })
        .collect();

    let mut sink: Vec<MatchResult> = Vec::new();
    let mut log = EventLog::new();
    let summary = Identifier::new().run(
        &mut QueryStars::new(items.into_iter(), 1.0),
        &mut MemoryCatalogReader::new(reference, 1.0),
        &mut sink,
        &mut log,
    )?;

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.processed, 10);
    assert_eq!(summary.identified, 9);
    assert_eq!(summary.failed, 1);
    assert_eq!(log.succeeded(), 9);
    assert_eq!(log.failed(), 1);
    assert_eq!(log.failed_items()[0].index, 4);
    assert_eq!(log.final_state(), Some(RunState::Completed));
    Ok(())
}

#[test]
fn test_io_error_ends_run_failed() -> Result<()> {
    let (reference, query) = field(3);
    let items: Vec<Result<CatalogStar>> = vec![
        Ok(query[0].clone()),
        Err(StoreError::Io(std::io::Error::other("device gone"))),
        Ok(query[2].clone()),
    ];

    let mut identifier = Identifier::new();
    let mut sink: Vec<MatchResult> = Vec::new();
    let mut log = EventLog::new();
    let result = identifier.run(
        &mut QueryStars::new(items.into_iter(), 1.0),
        &mut MemoryCatalogReader::new(reference, 1.0),
        &mut sink,
        &mut log,
    );

    assert!(matches!(result, Err(StoreError::Io(_))));
    assert_eq!(identifier.state(), RunState::Failed);
    assert_eq!(log.final_state(), Some(RunState::Failed));
    assert_eq!(sink.len(), 1);
    Ok(())
}

/// Stops the run once `after` stars were identified
struct StopAfter {
    stop: StopHandle,
    after: usize,
    seen: usize,
}

impl OperationObserver for StopAfter {
    fn notify_succeeded(&mut self, _item: &ItemRef) {
        self.seen += 1;
        if self.seen == self.after {
            self.stop.stop();
        }
    }
}

#[test]
fn test_stop_keeps_results_so_far() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    let (reference, query) = field(12);
    for star in &reference {
        db.catalog().add_star(star)?;
    }

    let mut identifier = Identifier::new();
    let mut observer = StopAfter {
        stop: identifier.stop_handle(),
        after: 5,
        seen: 0,
    };
    let observed = Utc.with_ymd_and_hms(2024, 4, 2, 3, 0, 0).unwrap();
    let mut writer = MagnitudeWriter::new(db.magnitude().clone(), "m13_042.fits", observed);
    let mut reader = db.catalog_reader("Stars", "Hipparcos")?;

    let summary = identifier.run(
        &mut QueryStars::from_stars(query, 1.0),
        &mut reader,
        &mut writer,
        &mut observer,
    )?;

    assert_eq!(summary.state, RunState::Stopped);
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.identified, 5);

    let written: usize = reference
        .iter()
        .map(|star| db.magnitude().get_elements(star).map(|records| records.len()))
        .sum::<Result<usize>>()?;
    assert_eq!(written, 5);
    assert_eq!(db.magnitude().get_elements(&reference[0])?[0].magnitude, Some(11.0));
    assert!(db.magnitude().get_elements(&reference[5])?.is_empty());
    Ok(())
}

#[test]
fn test_two_detections_of_one_star_both_recorded() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    let center = Coor::new(101.28, -16.71);
    let sirius = CatalogStar::new("Hipparcos", "32349", center)
        .with_position_error(2.0)
        .with_magnitude(-1.46);
    db.catalog().add_star(&sirius)?;

    // A blended pair on one image, both within the reference error
    let query = vec![
        detected("d1", center.offset_dec_arcsec(0.4)),
        detected("d2", center.offset_dec_arcsec(-0.4)).with_magnitude(11.7),
    ];
    let observed = Utc.with_ymd_and_hms(2024, 2, 9, 20, 0, 0).unwrap();
    let mut writer = MagnitudeWriter::new(db.magnitude().clone(), "sirius_blend.fits", observed);
    let mut reader = db.catalog_reader("Stars", "Hipparcos")?;

    let summary = Identifier::new().run(
        &mut QueryStars::from_stars(query, 1.0),
        &mut reader,
        &mut writer,
        &mut (),
    )?;
    assert_eq!(summary.identified, 2);
    assert_eq!(summary.matches, 2);

    let records = db.magnitude().get_elements(&sirius)?;
    assert_eq!(records.len(), 2);
    let mut magnitudes: Vec<f64> = records.iter().filter_map(|r| r.magnitude).collect();
    magnitudes.sort_by(f64::total_cmp);
    assert_eq!(magnitudes, vec![11.0, 11.7]);
    assert!(records.iter().all(|r| r.image == "sirius_blend.fits"));
    Ok(())
}

#[test]
fn test_accept_negative_is_superset() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    let (reference, query) = field(8);
    // Every third reference star has no magnitude
    let reference: Vec<CatalogStar> = reference
        .into_iter()
        .enumerate()
        .map(|(i, mut star)| {
            if i % 3 == 0 {
                star.magnitude = None;
            }
            star
        })
        .collect();
    for star in &reference {
        db.catalog().add_star(star)?;
    }

    let mut except = Vec::new();
    let mut accept = Vec::new();
    for region in db
        .catalog()
        .get_path_oriented_folders(&stardb_rs::FolderPath::new(["Stars", "Hipparcos"])?)?
    {
        let regions = [region];
        except.extend(db.catalog().get_stars("Stars", "Hipparcos", &regions, NegativeMode::Except, &mut ())?);
        accept.extend(db.catalog().get_stars("Stars", "Hipparcos", &regions, NegativeMode::Accept, &mut ())?);
    }
    assert_eq!(accept.len(), 8);
    assert_eq!(except.len(), 5);
    assert!(except.iter().all(|s| accept.contains(s)));

    let run = |identifier: Identifier| -> Result<Vec<MatchResult>> {
        let mut identifier = identifier;
        let mut sink: Vec<MatchResult> = Vec::new();
        let mut reader = db.catalog_reader("Stars", "Hipparcos")?.with_mode(identifier.mode());
        identifier.run(&mut QueryStars::from_stars(query.clone(), 1.0), &mut reader, &mut sink, &mut ())?;
        Ok(sink)
    };
    let strict = run(Identifier::new())?;
    let loose = run(Identifier::new().accept_negative())?;

    assert_eq!(strict.len(), 5);
    assert_eq!(loose.len(), 8);
    assert!(strict.iter().all(|m| loose.contains(m)));
    Ok(())
}
