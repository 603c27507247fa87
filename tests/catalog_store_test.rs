use planmark::catalog::{CategoryCatalog, CategoryDraft};
use planmark::color::{Color, DEFAULT_PALETTE};
use planmark::data::{DataAccess, Entity, JsonFileStore};
use planmark::geometry::NormPoint;
use planmark::regions::{Geometry, Hit, PendingRegion, RegionStore};

fn square() -> Geometry {
    Geometry::polygon(vec![
        NormPoint::new(0.1, 0.1),
        NormPoint::new(0.1, 0.3),
        NormPoint::new(0.3, 0.3),
        NormPoint::new(0.3, 0.1),
    ])
    .unwrap()
}

fn pending(page: usize, geometry: Geometry) -> PendingRegion {
    PendingRegion {
        attachment_id: 11,
        page,
        geometry,
    }
}

#[test]
fn test_regions_and_categories_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let (category, region) = {
        let mut store = JsonFileStore::open(&path).unwrap();
        let mut catalog = CategoryCatalog::default();
        catalog.list(&store, Some(3));
        let category = catalog.create(&mut store, &CategoryDraft::named("Exit sign")).unwrap();

        let mut regions = RegionStore::new();
        regions.load(&store, 11, 1);
        let region = regions
            .create(&mut store, &pending(1, square()), category, catalog.color_of(category), None)
            .unwrap();
        (category, region)
    };

    let store = JsonFileStore::open(&path).unwrap();
    let mut catalog = CategoryCatalog::default();
    catalog.list(&store, Some(3));
    let exit = catalog.get(category).unwrap();
    assert_eq!(exit.name, "Exit sign");
    assert_eq!(exit.region_count, 1);
    assert_eq!(exit.color, DEFAULT_PALETTE[0]);

    let mut regions = RegionStore::new();
    regions.load(&store, 11, 1);
    let stored = regions.region(region).unwrap();
    assert_eq!(stored.geometry, square());
    assert_eq!(stored.color, DEFAULT_PALETTE[0]);
    assert_eq!(stored.category_name.as_deref(), Some("Exit sign"));
    assert!(stored.created_at.is_some());
}

#[test]
fn test_hit_test_prefers_first_region_in_storage_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
    let mut regions = RegionStore::new();
    regions.load(&store, 11, 1);

    let first = regions
        .create(&mut store, &pending(1, square()), 1, Color::default(), None)
        .unwrap();
    regions
        .create(&mut store, &pending(1, square()), 1, Color::default(), None)
        .unwrap();
    let point = regions
        .create(&mut store, &pending(1, Geometry::Point(NormPoint::new(0.8, 0.8))), 1, Color::default(), None)
        .unwrap();

    assert_eq!(regions.hit_test(NormPoint::new(0.2, 0.2)), Hit::Select(first));
    assert_eq!(regions.hit_test(NormPoint::new(0.82, 0.8)), Hit::Select(point));
    assert_eq!(regions.hit_test(NormPoint::new(0.84, 0.8)), Hit::Miss);
    assert_eq!(regions.hit_test(NormPoint::new(0.95, 0.05)), Hit::Miss);
}

#[test]
fn test_category_delete_cascades_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
    let mut catalog = CategoryCatalog::default();
    catalog.list(&store, None);
    let doomed = catalog.create(&mut store, &CategoryDraft::named("Temporary")).unwrap();
    let kept = catalog.create(&mut store, &CategoryDraft::named("Permanent")).unwrap();

    let mut regions = RegionStore::new();
    regions.load(&store, 11, 2);
    regions
        .create(&mut store, &pending(2, square()), doomed, Color::default(), None)
        .unwrap();
    regions
        .create(&mut store, &pending(2, square()), kept, Color::default(), None)
        .unwrap();

    assert_eq!(catalog.delete(&mut store, doomed).unwrap(), 1);
    regions.reload(&store);
    assert_eq!(regions.regions().len(), 1);
    assert_eq!(regions.regions()[0].category_id, Some(kept));
    assert_eq!(store.list(Entity::Category, &[], &[], None).unwrap().len(), 1);
}
