//! Tree listings do not depend on insertion order, cache state or reopen

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use stardb_rs::{
    CatalogStar, Coor, FolderPath, HierarchyIndex, ImageInformation, NegativeMode, Orientation, Result,
    StarDatabase, StoreError,
};
use tempfile::TempDir;

fn nights() -> Vec<DateTime<Utc>> {
    vec![
        Utc.with_ymd_and_hms(2023, 11, 2, 21, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 15, 22, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 5, 23, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 21, 1, 10, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 10, 9, 20, 45, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap(),
    ]
}

/// Years, then every month of every year, then every day of every month
fn date_tree(db: &StarDatabase) -> Result<Vec<(FolderPath, Vec<String>)>> {
    let information = db.information();
    let mut tree = Vec::new();
    let root = FolderPath::root();
    let years = information.get_date_oriented_folders(&root)?;
    tree.push((root.clone(), years.clone()));
    for year in years {
        let year_path = root.child(year)?;
        let months = information.get_date_oriented_folders(&year_path)?;
        tree.push((year_path.clone(), months.clone()));
        for month in months {
            let month_path = year_path.child(month)?;
            let days = information.get_date_oriented_folders(&month_path)?;
            tree.push((month_path, days));
        }
    }
    Ok(tree)
}

#[test]
fn test_date_listing_independent_of_insertion_order() -> Result<()> {
    let mut rng = rand::thread_rng();
    let mut trees = Vec::new();

    for _ in 0..3 {
        let dir = TempDir::new()?;
        let db = StarDatabase::open(dir.path())?;
        let mut images: Vec<ImageInformation> = nights()
            .into_iter()
            .enumerate()
            .map(|(i, at)| ImageInformation::new(format!("img_{:03}.fits", i), at))
            .collect();
        images.shuffle(&mut rng);
        for image in &images {
            db.information().add_image(image)?;
        }
        trees.push(date_tree(&db)?);
    }

    assert_eq!(trees[0], trees[1]);
    assert_eq!(trees[1], trees[2]);

    let tree = &trees[0];
    assert_eq!(tree[0].1, vec!["2023", "2024"]);
    let months_2024 = tree
        .iter()
        .find(|(path, _)| path.segments() == ["2024"])
        .map(|(_, months)| months.clone());
    assert_eq!(
        months_2024,
        Some(vec!["January".to_string(), "March".to_string(), "October".to_string()])
    );
    Ok(())
}

#[test]
fn test_listing_stable_across_calls_and_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let before = {
        let db = StarDatabase::open(dir.path())?;
        for (i, at) in nights().into_iter().enumerate() {
            db.information().add_image(&ImageInformation::new(format!("n{}.fits", i), at))?;
        }
        let first = date_tree(&db)?;
        assert_eq!(date_tree(&db)?, first);
        db.close()?;
        first
    };

    let db = StarDatabase::open(dir.path())?;
    assert_eq!(date_tree(&db)?, before);
    Ok(())
}

#[test]
fn test_month_label_resolves_folder() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    for (i, at) in nights().into_iter().enumerate() {
        db.information().add_image(&ImageInformation::new(format!("n{}.fits", i), at))?;
    }

    let by_label = db
        .information()
        .get_date_oriented_folders(&FolderPath::new(["2024", "March"])?)?;
    let by_number = db
        .information()
        .get_date_oriented_folders(&FolderPath::new(["2024", "03"])?)?;
    assert_eq!(by_label, vec!["05", "21"]);
    assert_eq!(by_label, by_number);

    let images: Vec<ImageInformation> = db
        .information()
        .records_in(&FolderPath::new(["2024", "March", "05"])?, NegativeMode::Accept, &mut ())?;
    assert_eq!(images.len(), 2);
    Ok(())
}

#[test]
fn test_path_listing_sorted_by_name() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    let mut stars: Vec<CatalogStar> = [9000u32, 12, 150_000, 1500, 77_777]
        .iter()
        .map(|n| CatalogStar::new("Hipparcos", n.to_string(), Coor::new(0.0, 0.0)))
        .collect();
    stars.shuffle(&mut rand::thread_rng());
    for star in &stars {
        db.catalog().add_star(star)?;
    }

    let regions = db
        .catalog()
        .get_path_oriented_folders(&FolderPath::new(["Stars", "Hipparcos"])?)?;
    assert_eq!(regions, vec!["0", "1", "150", "77", "9"]);
    Ok(())
}

#[test]
fn test_wrong_orientation_listing_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let db = StarDatabase::open(dir.path())?;
    assert!(matches!(
        db.catalog().get_date_oriented_folders(&FolderPath::root()),
        Err(StoreError::WrongOrientation { .. })
    ));
    assert!(matches!(
        db.information().get_path_oriented_folders(&FolderPath::root()),
        Err(StoreError::WrongOrientation { .. })
    ));
    Ok(())
}

proptest! {
    #[test]
    fn prop_star_folder_path_deterministic(number in 1u32..1_000_000, ra in 0.0f64..360.0, dec in -90.0f64..90.0) {
        let index = HierarchyIndex::new(Orientation::Path);
        let star = CatalogStar::new("Hipparcos", number.to_string(), Coor::new(ra, dec));
        let moved = CatalogStar::new("Hipparcos", number.to_string(), Coor::new(dec + 90.0, 0.0));

        let path = index.folder_path_of(&star).unwrap();
        prop_assert_eq!(&path, &index.folder_path_of(&star.clone()).unwrap());
        // Position plays no part in where a catalog star lives
        prop_assert_eq!(&path, &index.folder_path_of(&moved).unwrap());
        let region = (number / 1000).to_string();
        prop_assert_eq!(path.segments(), &["Stars".to_string(), "Hipparcos".to_string(), region][..]);
    }

    #[test]
    fn prop_image_folder_path_is_observation_date(secs in 0i64..4_102_444_800) {
        let index = HierarchyIndex::new(Orientation::Date);
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        let image = ImageInformation::new("frame.fits", at);

        let path = index.folder_path_of(&image).unwrap();
        prop_assert_eq!(&path, &index.folder_path_of(&image).unwrap());
        prop_assert_eq!(path.to_string(), format!("/{}", at.format("%Y/%m/%d")));
    }
}
