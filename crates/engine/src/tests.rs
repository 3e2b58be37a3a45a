use super::*;
use crate::protocol::records::*;

fn temp_engine() -> Engine {
    let p = std::env::temp_dir().join(format!(
        "tacmap-engine-test-{}-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos(),
        ID_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let engine = Engine::new(p);
    let _ = engine.open().expect("open db");
    engine
}

fn soldier(first: &str, last: &str) -> SoldierFields {
    SoldierFields {
        first_name: first.to_string(),
        last_name: last.to_string(),
        ..Default::default()
    }
}

#[test]
fn create_soldier_trims_and_lists_once() {
    let engine = temp_engine();
    let store = engine.store::<SoldierFields>();
    let created = store
        .create(SoldierFields {
            rank: Some("  Sergeant ".to_string()),
            latitude: Some(52.2297),
            longitude: Some(21.0122),
            ..soldier("  John ", "Doe  ")
        })
        .unwrap();

    assert!(created.id.starts_with("sol-"));
    assert_eq!(created.fields.first_name, "John");
    assert_eq!(created.fields.last_name, "Doe");
    assert_eq!(created.fields.rank.as_deref(), Some("Sergeant"));

    let all = store.list().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], created);
    assert_eq!(store.get(&created.id).unwrap(), created);
}

#[test]
fn blank_required_fields_are_rejected_without_writing() {
    let engine = temp_engine();
    let rev_before = engine.get_rev().unwrap();

    let err = engine
        .store::<SoldierFields>()
        .create(soldier("   ", "Doe"))
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("First name is required".to_string()));

    let err = engine
        .store::<UnitFields>()
        .create(UnitFields {
            name: "1st Platoon".to_string(),
            status: "\t".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Status is required".to_string()));

    let err = engine
        .store::<VehicleFields>()
        .create(VehicleFields {
            kind: "".to_string(),
            status: "ready".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Type is required".to_string()));

    let err = engine
        .store::<BaseFields>()
        .create(BaseFields::default())
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Name is required".to_string()));

    let err = engine
        .store::<MissionFields>()
        .create(MissionFields {
            name: "Recon".to_string(),
            start: " ".to_string(),
            status: "planned".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Start date is required".to_string()));

    let err = engine
        .store::<DeliveryFields>()
        .create(DeliveryFields {
            kind: "fuel".to_string(),
            quantity: 3,
            status: "".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Status is required".to_string()));

    let err = engine
        .store::<ArmamentFields>()
        .create(ArmamentFields {
            kind: " ".to_string(),
            quantity: 1,
            status: "ok".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Type is required".to_string()));

    assert_eq!(engine.get_rev().unwrap(), rev_before);
    assert!(engine.store::<SoldierFields>().list().unwrap().is_empty());
    assert!(engine.store::<UnitFields>().list().unwrap().is_empty());
    assert!(engine.store::<MissionFields>().list().unwrap().is_empty());
}

#[test]
fn every_collection_accepts_its_required_fields() {
    let engine = temp_engine();
    let loc = engine
        .store::<LocationFields>()
        .create(LocationFields {
            latitude: 50.0,
            longitude: 20.0,
            name: Some(" Depot ".to_string()),
            kind: None,
        })
        .unwrap();
    assert_eq!(loc.fields.name.as_deref(), Some("Depot"));

    let sol = engine.store::<SoldierFields>().create(soldier("Anna", "Nowak")).unwrap();
    let unit = engine
        .store::<UnitFields>()
        .create(UnitFields {
            name: "Alpha".to_string(),
            status: "active".to_string(),
            commander_id: Some(sol.id.clone()),
            size: Some(12),
            ..Default::default()
        })
        .unwrap();
    engine
        .store::<VehicleFields>()
        .create(VehicleFields {
            kind: "APC".to_string(),
            status: "ready".to_string(),
            unit_id: Some(unit.id.clone()),
            location_id: Some(loc.id.clone()),
            ..Default::default()
        })
        .unwrap();
    let base = engine
        .store::<BaseFields>()
        .create(BaseFields {
            name: "Fort".to_string(),
            capacity: Some(300),
            ..Default::default()
        })
        .unwrap();
    let mission = engine
        .store::<MissionFields>()
        .create(MissionFields {
            name: "Recon".to_string(),
            start: "2024-05-01".to_string(),
            end: Some("2024-05-02T18:00:00Z".to_string()),
            status: "planned".to_string(),
            unit_id: Some(unit.id.clone()),
            ..Default::default()
        })
        .unwrap();
    engine
        .store::<DeliveryFields>()
        .create(DeliveryFields {
            kind: "fuel".to_string(),
            quantity: 0,
            status: "en route".to_string(),
            sender_location_id: Some(loc.id.clone()),
            ..Default::default()
        })
        .unwrap();
    engine
        .store::<EnemyFields>()
        .create(EnemyFields::default())
        .unwrap();
    engine
        .store::<ArmamentFields>()
        .create(ArmamentFields {
            kind: "rifle".to_string(),
            quantity: 30,
            status: "stored".to_string(),
            soldier_id: Some(sol.id.clone()),
            ..Default::default()
        })
        .unwrap();
    engine
        .store::<EventFields>()
        .create(EventFields {
            mission_id: Some(mission.id.clone()),
            time: Some("2024-05-01T10:00:00Z".to_string()),
            ..Default::default()
        })
        .unwrap();

    for c in Collection::ALL {
        assert_eq!(engine.collection(c).list().unwrap().len(), 1, "{c}");
    }
    assert_eq!(base.fields.capacity, Some(300));
}

#[test]
fn unit_with_missing_commander_is_rejected() {
    let engine = temp_engine();
    let err = engine
        .store::<UnitFields>()
        .create(UnitFields {
            name: "Alpha".to_string(),
            status: "active".to_string(),
            commander_id: Some("sol-0-0".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Commander not found".to_string()));
    assert!(err.is_not_found());
    assert!(engine.store::<UnitFields>().list().unwrap().is_empty());
}

#[test]
fn reference_to_wrong_collection_is_rejected() {
    let engine = temp_engine();
    let sol = engine.store::<SoldierFields>().create(soldier("A", "B")).unwrap();
    // A soldier id is not a unit id.
    let err = engine
        .store::<SoldierFields>()
        .create(SoldierFields {
            unit_id: Some(sol.id),
            ..soldier("C", "D")
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Unit not found".to_string()));
}

#[test]
fn negative_quantities_and_bad_coordinates_are_rejected() {
    let engine = temp_engine();
    let err = engine
        .store::<DeliveryFields>()
        .create(DeliveryFields {
            kind: "ammo".to_string(),
            quantity: -1,
            status: "queued".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Quantity must be non-negative".to_string()));

    let err = engine
        .store::<EnemyFields>()
        .create(EnemyFields {
            estimated_strength: Some(-5),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Validation("Estimated strength must be non-negative".to_string())
    );

    let err = engine
        .store::<SoldierFields>()
        .create(SoldierFields {
            latitude: Some(91.0),
            longitude: Some(0.0),
            ..soldier("A", "B")
        })
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Validation("Latitude must be between -90 and 90".to_string())
    );

    let err = engine
        .store::<MissionFields>()
        .create(MissionFields {
            name: "Recon".to_string(),
            start: "tomorrow".to_string(),
            status: "planned".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Validation("Start date must be an ISO 8601 date".to_string())
    );
}

#[test]
fn update_with_one_field_keeps_the_rest() {
    let engine = temp_engine();
    let store = engine.store::<SoldierFields>();
    let created = store
        .create(SoldierFields {
            rank: Some("Private".to_string()),
            latitude: Some(1.0),
            longitude: Some(2.0),
            ..soldier("John", "Doe")
        })
        .unwrap();

    let updated = store
        .update(
            &created.id,
            SoldierChanges {
                rank: Some(" Corporal ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.fields.rank.as_deref(), Some("Corporal"));
    assert_eq!(updated.fields.first_name, "John");
    assert_eq!(updated.fields.last_name, "Doe");
    assert_eq!(updated.fields.latitude, Some(1.0));
    assert_eq!(updated.rev, created.rev + 1);
    assert_eq!(store.get(&created.id).unwrap(), updated);
}

#[test]
fn update_rejects_blank_required_and_clears_blank_optional() {
    let engine = temp_engine();
    let store = engine.store::<SoldierFields>();
    let created = store
        .create(SoldierFields {
            rank: Some("Private".to_string()),
            ..soldier("John", "Doe")
        })
        .unwrap();

    let err = store
        .update(
            &created.id,
            SoldierChanges {
                last_name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Last name cannot be empty".to_string()));

    let cleared = store
        .update(
            &created.id,
            SoldierChanges {
                rank: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.fields.rank, None);
}

#[test]
fn update_checks_only_new_references() {
    let engine = temp_engine();
    let unit = engine
        .store::<UnitFields>()
        .create(UnitFields {
            name: "Alpha".to_string(),
            status: "active".to_string(),
            ..Default::default()
        })
        .unwrap();
    let sol = engine
        .store::<SoldierFields>()
        .create(SoldierFields {
            unit_id: Some(unit.id.clone()),
            ..soldier("John", "Doe")
        })
        .unwrap();
    engine.store::<UnitFields>().remove(&unit.id).unwrap();

    // The dangling unit link is untouched, so the edit goes through.
    engine
        .store::<SoldierFields>()
        .update(
            &sol.id,
            SoldierChanges {
                rank: Some("Major".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let err = engine
        .store::<SoldierFields>()
        .update(
            &sol.id,
            SoldierChanges {
                location_id: Some("loc-missing".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("Location not found".to_string()));
}

#[test]
fn missing_ids_surface_not_found() {
    let engine = temp_engine();
    let store = engine.store::<VehicleFields>();
    assert_eq!(
        store.get("veh-nope").unwrap_err(),
        StoreError::NotFound("Vehicle not found".to_string())
    );
    assert_eq!(
        store.remove("veh-nope").unwrap_err(),
        StoreError::NotFound("Vehicle not found".to_string())
    );
    assert_eq!(
        store
            .update("veh-nope", VehicleChanges::default())
            .unwrap_err(),
        StoreError::NotFound("Vehicle not found".to_string())
    );
}

#[test]
fn remove_deletes_and_advances_rev() {
    let engine = temp_engine();
    let store = engine.store::<BaseFields>();
    let base = store
        .create(BaseFields {
            name: "Fort".to_string(),
            ..Default::default()
        })
        .unwrap();
    let rev = engine.get_rev().unwrap();

    let removed = store.remove(&base.id).unwrap();
    assert!(removed.success);
    assert_eq!(removed.id, base.id);
    assert!(store.list().unwrap().is_empty());
    assert!(engine.get_rev().unwrap() > rev);
}

#[test]
fn map_objects_only_include_located_records() {
    let engine = temp_engine();
    engine
        .store::<SoldierFields>()
        .create(SoldierFields {
            latitude: Some(52.2297),
            longitude: Some(21.0122),
            ..soldier("John", "Doe")
        })
        .unwrap();
    engine.store::<SoldierFields>().create(soldier("No", "Where")).unwrap();
    engine
        .store::<ArmamentFields>()
        .create(ArmamentFields {
            kind: "rifle".to_string(),
            quantity: 1,
            status: "ok".to_string(),
            ..Default::default()
        })
        .unwrap();

    let objects = engine.map_objects().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].object_type(), MapObjectType::Soldier);
    assert_eq!(
        objects[0].coordinate(),
        Some(tacmap_protocol::Coordinate::new(52.2297, 21.0122))
    );
}

#[test]
fn json_collection_round_trips_through_typed_rules() {
    let engine = temp_engine();
    let soldiers = engine.collection(Collection::Soldiers);
    let created = soldiers
        .create(serde_json::json!({ "firstName": " Jan ", "lastName": "Kowalski" }))
        .unwrap();
    assert_eq!(created["firstName"], "Jan");
    let id = created["id"].as_str().unwrap().to_string();

    let updated = soldiers
        .update(&id, serde_json::json!({ "rank": "Captain" }))
        .unwrap();
    assert_eq!(updated["rank"], "Captain");
    assert_eq!(updated["lastName"], "Kowalski");

    let err = soldiers
        .create(serde_json::json!({ "firstName": "x" }))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(m) if m.starts_with("invalid soldiers body")));
}

#[test]
fn unopenable_path_is_unavailable() {
    let dir = std::env::temp_dir().join(format!(
        "tacmap-engine-dir-{}",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    // A directory cannot be opened as a database file.
    let engine = Engine::new(&dir);
    let err = engine.store::<SoldierFields>().list().unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}
